//! Audio sample capture for recognition
//!
//! Recording itself happens elsewhere; this module only bounds how long we
//! wait for a sample.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RecognitionError;

/// Capture never runs longer than this.
pub const MAX_CAPTURE_WINDOW: Duration = Duration::from_secs(10);
const CAPTURE_GRACE: Duration = Duration::from_millis(500);

#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Record for roughly `window` and return the encoded sample.
    async fn record(&self, window: Duration) -> Result<Vec<u8>, RecognitionError>;
}

/// Record a sample, giving up once the capped window (plus a little slack
/// for the recorder to flush) has passed.
pub async fn capture_sample(
    source: &dyn AudioSource,
    window: Duration,
) -> Result<Vec<u8>, RecognitionError> {
    let window = window.min(MAX_CAPTURE_WINDOW);
    tracing::debug!(window_ms = window.as_millis() as u64, "Capturing audio sample");

    let sample = tokio::time::timeout(window + CAPTURE_GRACE, source.record(window))
        .await
        .map_err(|_| {
            tracing::warn!("Audio capture did not finish in time");
            RecognitionError::Timeout
        })??;

    if sample.is_empty() {
        return Err(RecognitionError::CaptureFailed("empty sample".into()));
    }
    tracing::debug!(bytes = sample.len(), "Captured audio sample");
    Ok(sample)
}

/// Serves a pre-recorded sample from disk.
#[derive(Clone, Debug)]
pub struct FileAudioSource {
    path: PathBuf,
}

impl FileAudioSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AudioSource for FileAudioSource {
    async fn record(&self, _window: Duration) -> Result<Vec<u8>, RecognitionError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| RecognitionError::CaptureFailed(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowSource;

    #[async_trait]
    impl AudioSource for SlowSource {
        async fn record(&self, _window: Duration) -> Result<Vec<u8>, RecognitionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1, 2, 3])
        }
    }

    struct FixedSource(Vec<u8>);

    #[async_trait]
    impl AudioSource for FixedSource {
        async fn record(&self, _window: Duration) -> Result<Vec<u8>, RecognitionError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let err = capture_sample(&SlowSource, Duration::from_secs(30)).await.unwrap_err();
        assert_eq!(err, RecognitionError::Timeout);
    }

    #[tokio::test]
    async fn empty_sample_is_a_capture_failure() {
        let err = capture_sample(&FixedSource(Vec::new()), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn file_source_reads_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.webm");
        std::fs::write(&path, b"webm-bytes").unwrap();

        let sample = capture_sample(&FileAudioSource::new(&path), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(sample, b"webm-bytes");
    }

    #[tokio::test]
    async fn missing_file_is_a_capture_failure() {
        let err = FileAudioSource::new("/definitely/not/here.webm")
            .record(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::CaptureFailed(_)));
    }
}
