//! Track identification from a short audio sample

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RecognitionError;
use crate::http::{FormPart, FormValue, HttpRequest, HttpTransport};
use crate::model::{Album, Track};

pub const DEFAULT_RECOGNITION_URL: &str = "https://api.audd.io/";

const SAMPLE_FILENAME: &str = "recording.webm";
const SAMPLE_MIME: &str = "audio/webm";

#[derive(Deserialize)]
struct RecognitionResponse {
    status: Option<String>,
    result: Option<RecognitionResult>,
    error: Option<ServiceError>,
}

#[derive(Deserialize)]
struct ServiceError {
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(alias = "releaseDate")]
    release_date: Option<String>,
    #[serde(alias = "spotifyUri")]
    spotify_uri: Option<String>,
    #[serde(alias = "durationMs")]
    duration_ms: Option<u64>,
    explicit: Option<bool>,
    popularity: Option<u32>,
    spotify: Option<SpotifyMatch>,
}

#[derive(Deserialize)]
struct SpotifyMatch {
    id: Option<String>,
    uri: Option<String>,
    duration_ms: Option<u64>,
    explicit: Option<bool>,
    popularity: Option<u32>,
    #[serde(default)]
    artists: Vec<NamedDto>,
    album: Option<SpotifyAlbum>,
}

#[derive(Deserialize)]
struct NamedDto {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<ImageDto>,
}

#[derive(Deserialize)]
struct ImageDto {
    url: String,
}

impl RecognitionResult {
    /// `None` unless the match carries a playable uri.
    fn into_track(self) -> Option<Track> {
        let spotify = self.spotify;
        let uri = spotify
            .as_ref()
            .and_then(|s| s.uri.clone())
            .or(self.spotify_uri)
            .filter(|uri| !uri.is_empty())?;

        let id = spotify
            .as_ref()
            .and_then(|s| s.id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uri.rsplit(':').next().unwrap_or_default().to_string());

        let mut artists: Vec<String> = spotify
            .as_ref()
            .map(|s| s.artists.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default();
        if artists.is_empty() && !self.artist.is_empty() {
            artists.push(self.artist);
        }

        let artwork_url = spotify
            .as_ref()
            .and_then(|s| s.album.as_ref())
            .and_then(|a| a.images.first())
            .map(|image| image.url.clone())
            .unwrap_or_default();

        Some(Track {
            id,
            title: self.title,
            artists,
            album: Album {
                name: self.album,
                artwork_url,
                release_date: self.release_date.filter(|d| !d.is_empty()),
            },
            duration_ms: spotify
                .as_ref()
                .and_then(|s| s.duration_ms)
                .or(self.duration_ms)
                .unwrap_or(0),
            explicit: spotify
                .as_ref()
                .and_then(|s| s.explicit)
                .or(self.explicit)
                .unwrap_or(false),
            popularity: spotify.as_ref().and_then(|s| s.popularity).or(self.popularity),
            uri,
        })
    }
}

#[derive(Clone)]
pub struct RecognitionClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    api_token: String,
}

impl RecognitionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            api_token: api_token.into(),
        }
    }

    /// Identify the track playing in `sample`. Never retried: every failure
    /// goes straight back to the caller.
    pub async fn identify(&self, sample: Vec<u8>, timeout: Duration) -> Result<Track, RecognitionError> {
        if sample.is_empty() {
            return Err(RecognitionError::CaptureFailed("empty sample".into()));
        }
        tracing::info!(bytes = sample.len(), "Submitting sample for recognition");

        let request = HttpRequest::post(&self.endpoint)
            .multipart(vec![
                FormPart {
                    name: "file".into(),
                    value: FormValue::File {
                        filename: SAMPLE_FILENAME.into(),
                        mime: SAMPLE_MIME.into(),
                        bytes: sample,
                    },
                },
                FormPart {
                    name: "return".into(),
                    value: FormValue::Text("spotify".into()),
                },
                FormPart {
                    name: "api_token".into(),
                    value: FormValue::Text(self.api_token.clone()),
                },
            ])
            .timeout(timeout);

        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| RecognitionError::Timeout)?
            .map_err(|e| RecognitionError::ServiceUnavailable(e.to_string()))?;

        if !response.is_success() {
            return Err(RecognitionError::ServiceUnavailable(format!(
                "service answered {}",
                response.status
            )));
        }

        let body: RecognitionResponse = response
            .json()
            .map_err(|e| RecognitionError::ServiceUnavailable(format!("unreadable response: {e}")))?;

        if body.status.as_deref() == Some("error") {
            let message = body
                .error
                .and_then(|e| e.error_message)
                .unwrap_or_else(|| "unknown error".into());
            tracing::error!(%message, "Recognition service reported an error");
            return Err(RecognitionError::ServiceUnavailable(message));
        }

        match body.result.and_then(RecognitionResult::into_track) {
            Some(track) => {
                tracing::info!(uri = %track.uri, title = %track.title, "Track recognized");
                Ok(track)
            }
            None => {
                tracing::info!("No match for sample");
                Err(RecognitionError::NotRecognized)
            }
        }
    }
}
