//! Controller module - playback state machine
//!
//! The controller owns the playback state and drives the remote player
//! through the auth session and the media client. It is organized into
//! submodules by responsibility:
//!
//! - `playback`: play/pause/resume/skip commands and player queries
//! - `recovery`: the retry-once-after-refresh wrapper every remote call uses

mod playback;
mod recovery;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::audio::{AudioSource, capture_sample};
use crate::auth::AuthSession;
use crate::error::{RecognitionError, SessionError};
use crate::model::{MediaClient, PlaybackState, PlaybackStatus, Track};
use crate::recognition::RecognitionClient;

const DEFAULT_RECOGNITION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct PlaybackController {
    pub(crate) auth: AuthSession,
    pub(crate) media: MediaClient,
    recognizer: RecognitionClient,
    recognition_timeout: Duration,
    state: Arc<RwLock<PlaybackState>>,
    /// Held for the whole of each playback command so commands complete in
    /// the order they were issued.
    command_gate: Arc<Mutex<()>>,
}

impl PlaybackController {
    pub fn new(auth: AuthSession, media: MediaClient, recognizer: RecognitionClient) -> Self {
        Self {
            auth,
            media,
            recognizer,
            recognition_timeout: DEFAULT_RECOGNITION_TIMEOUT,
            state: Arc::new(RwLock::new(PlaybackState::default())),
            command_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_recognition_timeout(mut self, timeout: Duration) -> Self {
        self.recognition_timeout = timeout;
        self
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Snapshot of the current playback state.
    pub async fn state(&self) -> PlaybackState {
        self.state.read().await.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    /// Replace the current track and get ready to play it.
    pub async fn set_track(&self, track: Track) {
        tracing::info!(uri = %track.uri, title = %track.title, "Track selected");
        let mut state = self.state.write().await;
        state.track = Some(track);
        state.status = PlaybackStatus::Ready;
        state.position_ms = 0;
        state.last_error = None;
    }

    /// Capture a sample, identify it and make the result the current track.
    pub async fn recognize(
        &self,
        source: &dyn AudioSource,
        window: Duration,
    ) -> Result<Track, RecognitionError> {
        self.state.write().await.status = PlaybackStatus::Recognizing;

        match self.capture_and_identify(source, window).await {
            Ok(track) => {
                self.set_track(track.clone()).await;
                Ok(track)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recognition failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    async fn capture_and_identify(
        &self,
        source: &dyn AudioSource,
        window: Duration,
    ) -> Result<Track, RecognitionError> {
        let sample = capture_sample(source, window).await?;
        self.recognizer.identify(sample, self.recognition_timeout).await
    }

    /// Move to `Error` and remember why.
    pub(crate) async fn record_failure<E>(&self, err: E) -> E
    where
        E: Clone + Into<SessionError>,
    {
        let mut state = self.state.write().await;
        state.status = PlaybackStatus::Error;
        state.last_error = Some(err.clone().into());
        err
    }

    /// Remember a failed query without touching the status.
    pub(crate) async fn record_error<E>(&self, err: E) -> E
    where
        E: Clone + Into<SessionError>,
    {
        self.state.write().await.last_error = Some(err.clone().into());
        err
    }

    pub(crate) async fn transition(&self, status: PlaybackStatus, position_ms: Option<u64>) {
        let mut state = self.state.write().await;
        state.status = status;
        if let Some(position) = position_ms {
            state.position_ms = position;
        }
        state.last_error = None;
    }
}
