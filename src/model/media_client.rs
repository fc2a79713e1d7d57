//! Media API client wrapper with the player endpoints
//!
//! Calls are stateless: the bearer token is passed in by the caller, which
//! owns the refresh-and-retry policy.

use std::sync::Arc;

use crate::error::RemoteError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::{log_api_request, log_api_result};

use super::playback::{NowPlaying, NowPlayingDto};
use super::types::{Device, DevicesDto};

pub const DEFAULT_MEDIA_API_URL: &str = "https://api.spotify.com/v1/me/player";

#[derive(Clone)]
pub struct MediaClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl MediaClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        let response = self.transport.send(request).await?;
        match response.status {
            401 => Err(RemoteError::Unauthorized),
            _ if response.is_success() => Ok(response),
            status => Err(RemoteError::Status {
                status,
                message: error_message(&response),
            }),
        }
    }

    async fn fetch_devices(&self, token: String) -> Result<Vec<Device>, RemoteError> {
        let response = self.send(HttpRequest::get(self.url("/devices")).bearer(token)).await?;
        let dto: DevicesDto = response
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(dto.devices.into_iter().map(Device::from).collect())
    }

    pub async fn devices(&self, token: String) -> Result<Vec<Device>, RemoteError> {
        log_api_request!("devices");
        let result = self.fetch_devices(token).await;
        log_api_result!("devices", result);
        if let Ok(devices) = &result {
            tracing::debug!(count = devices.len(), "Found devices");
        }
        result
    }

    /// Start `uris` on the given device. 202 and 204 (accepted, applied
    /// asynchronously) count as success like any other 2xx.
    pub async fn play(
        &self,
        token: String,
        device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> Result<(), RemoteError> {
        log_api_request!("play", device_id, ?position_ms);
        let mut body = serde_json::json!({ "uris": uris });
        if let Some(position) = position_ms {
            body["position_ms"] = serde_json::json!(position);
        }
        let request = HttpRequest::put(self.url("/play"))
            .query("device_id", device_id)
            .bearer(token)
            .json(body);
        let result = self.send(request).await.map(|_| ());
        log_api_result!("play", result);
        result
    }

    pub async fn pause(&self, token: String) -> Result<(), RemoteError> {
        log_api_request!("pause");
        let result = self
            .send(HttpRequest::put(self.url("/pause")).bearer(token))
            .await
            .map(|_| ());
        log_api_result!("pause", result);
        result
    }

    pub async fn next(&self, token: String) -> Result<(), RemoteError> {
        log_api_request!("next");
        let result = self
            .send(HttpRequest::post(self.url("/next")).bearer(token))
            .await
            .map(|_| ());
        log_api_result!("next", result);
        result
    }

    pub async fn previous(&self, token: String) -> Result<(), RemoteError> {
        log_api_request!("previous");
        let result = self
            .send(HttpRequest::post(self.url("/previous")).bearer(token))
            .await
            .map(|_| ());
        log_api_result!("previous", result);
        result
    }

    /// `None` when nothing is playing (the API answers 204 with no body).
    pub async fn currently_playing(&self, token: String) -> Result<Option<NowPlaying>, RemoteError> {
        tracing::trace!("Fetching currently playing");
        let response = self
            .send(HttpRequest::get(self.url("/currently-playing")).bearer(token))
            .await?;
        if response.status == 204 || response.body.is_empty() {
            return Ok(None);
        }
        let dto: NowPlayingDto = response
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(Some(dto.into()))
    }
}

fn error_message(response: &HttpResponse) -> String {
    // Player errors look like {"error": {"status": 404, "message": "..."}}.
    response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| response.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, RequestBody};
    use crate::test_utils::{FakeTransport, MEDIA};
    use serde_json::json;

    fn client(fake: &FakeTransport) -> MediaClient {
        MediaClient::new(Arc::new(fake.clone()), MEDIA)
    }

    const PLAYER: &str = "/v1/me/player";

    #[tokio::test]
    async fn devices_sends_bearer_and_decodes() {
        let fake = FakeTransport::new();
        fake.respond(
            Method::Get,
            &format!("{PLAYER}/devices"),
            200,
            json!({ "devices": [{ "id": "d1", "name": "Desk", "is_active": true, "type": "Computer" }] }),
        );

        let devices = client(&fake).devices("tok".into()).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "d1");

        let sent = fake.requests();
        assert_eq!(sent[0].bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn unauthorized_is_classified() {
        let fake = FakeTransport::new();
        fake.respond(Method::Put, &format!("{PLAYER}/pause"), 401, json!({}));

        let err = client(&fake).pause("stale".into()).await.unwrap_err();
        assert_eq!(err, RemoteError::Unauthorized);
    }

    #[tokio::test]
    async fn play_accepts_async_statuses_and_sends_position() {
        let fake = FakeTransport::new();
        let path = format!("{PLAYER}/play");
        fake.respond(Method::Put, &path, 202, serde_json::Value::Null);

        let uris = vec!["spotify:track:abc".to_string()];
        client(&fake)
            .play("tok".into(), "dev-9", &uris, Some(42_000))
            .await
            .unwrap();

        let sent = fake.requests_to(Method::Put, &path);
        assert_eq!(sent[0].query_value("device_id"), Some("dev-9"));
        assert_eq!(
            sent[0].body,
            RequestBody::Json(json!({ "uris": ["spotify:track:abc"], "position_ms": 42000 }))
        );
    }

    #[tokio::test]
    async fn error_message_is_extracted() {
        let fake = FakeTransport::new();
        fake.respond(
            Method::Post,
            &format!("{PLAYER}/next"),
            403,
            json!({ "error": { "status": 403, "message": "Player command failed: Restriction violated" } }),
        );

        let err = client(&fake).next("tok".into()).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 403,
                message: "Player command failed: Restriction violated".into()
            }
        );
    }

    #[tokio::test]
    async fn nothing_playing_is_none() {
        let fake = FakeTransport::new();
        fake.respond(Method::Get, &format!("{PLAYER}/currently-playing"), 204, serde_json::Value::Null);

        assert_eq!(client(&fake).currently_playing("tok".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn currently_playing_decodes_item() {
        let fake = FakeTransport::new();
        fake.respond(
            Method::Get,
            &format!("{PLAYER}/currently-playing"),
            200,
            json!({ "is_playing": true, "progress_ms": 1200, "item": { "uri": "spotify:track:abc", "name": "Song" } }),
        );

        let now = client(&fake).currently_playing("tok".into()).await.unwrap().unwrap();
        assert!(now.is_playing);
        assert_eq!(now.progress_ms, Some(1200));
        assert_eq!(now.track_uri.as_deref(), Some("spotify:track:abc"));
    }
}
