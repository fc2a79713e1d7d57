use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;
use crate::http::{HttpRequest, HttpTransport};
use crate::model::{CredentialStore, TokenPair};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

const LOGIN_PATH: &str = "/spotify/login";
const CALLBACK_PATH: &str = "/spotify/callback";
const REFRESH_PATH: &str = "/spotify/refresh";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
    /// Terminal until the user authorizes again.
    Failed,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "authUrl")]
    auth_url: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken", default)]
    access_token: String,
    #[serde(alias = "refreshToken", default)]
    refresh_token: Option<String>,
}

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, AuthError>>>;

struct Inner {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    backend_url: String,
    state: RwLock<AuthState>,
    tokens: RwLock<Option<TokenPair>>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

/// Owns the token pair and the authorization/refresh flows.
///
/// Cloning is cheap and every clone shares the same session.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

impl AuthSession {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        backend_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                backend_url: backend_url.into().trim_end_matches('/').to_string(),
                state: RwLock::new(AuthState::Unauthenticated),
                tokens: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Pick up a pair persisted by an earlier run.
    pub async fn restore(&self) -> bool {
        match self.inner.store.load() {
            Some(pair) if pair.has_access_token() => {
                tracing::info!("Found stored credentials");
                *self.inner.tokens.write().await = Some(pair);
                *self.inner.state.write().await = AuthState::Authenticated;
                true
            }
            _ => {
                tracing::info!("No stored credentials found");
                false
            }
        }
    }

    pub async fn state(&self) -> AuthState {
        *self.inner.state.read().await
    }

    pub async fn token_pair(&self) -> Option<TokenPair> {
        self.inner.tokens.read().await.clone()
    }

    /// The access token, only while authenticated.
    pub async fn current_token(&self) -> Option<String> {
        if self.state().await != AuthState::Authenticated {
            return None;
        }
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .filter(|pair| pair.has_access_token())
            .map(|pair| pair.access_token.clone())
    }

    /// Ask the backend where to send the user to grant access.
    pub async fn start_authorization(&self) -> Result<String, AuthError> {
        let previous = self.set_state(AuthState::Authenticating).await;
        tracing::info!("Requesting authorization URL");

        let result = self.request_auth_url().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Could not initiate authorization");
        }
        self.set_state(previous).await;
        result
    }

    async fn request_auth_url(&self) -> Result<String, AuthError> {
        let request = HttpRequest::get(self.inner.url(LOGIN_PATH));
        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::InitiationFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::InitiationFailed(format!(
                "backend answered {}",
                response.status
            )));
        }

        let body: LoginResponse = response
            .json()
            .map_err(|e| AuthError::InitiationFailed(e.to_string()))?;
        body.auth_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::InitiationFailed("response carried no auth_url".into()))
    }

    /// Exchange the one-time code from the authorization redirect.
    pub async fn complete_authorization(&self, code: &str) -> Result<TokenPair, AuthError> {
        self.set_state(AuthState::Authenticating).await;
        tracing::info!("Exchanging authorization code");

        match self.exchange_code(code).await {
            Ok(pair) => {
                self.inner.persist(&pair);
                *self.inner.tokens.write().await = Some(pair.clone());
                self.set_state(AuthState::Authenticated).await;
                tracing::info!("Authorization completed");
                Ok(pair)
            }
            Err(e) => {
                tracing::error!(error = %e, "Authorization code exchange failed");
                self.set_state(AuthState::Failed).await;
                Err(e)
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair, AuthError> {
        let request = HttpRequest::get(self.inner.url(CALLBACK_PATH)).query("code", code);
        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "backend answered {}: {}",
                response.status,
                response.text()
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(AuthError::ExchangeFailed("empty access token".into()));
        }
        Ok(TokenPair::new(
            body.access_token,
            body.refresh_token.unwrap_or_default(),
        ))
    }

    /// Trade the refresh token for a new access token.
    ///
    /// Concurrent callers share one in-flight request, so the refresh token
    /// is spent at most once.
    pub async fn refresh(&self) -> Result<TokenPair, AuthError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Joining refresh already in flight");
                    flight.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let flight = async move { inner.run_refresh().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self.inner.in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        result
    }

    /// Forget the session, both in memory and on disk.
    pub async fn sign_out(&self) {
        if let Err(e) = self.inner.store.clear() {
            tracing::warn!(error = %e, "Failed to clear stored credentials");
        }
        *self.inner.tokens.write().await = None;
        self.set_state(AuthState::Unauthenticated).await;
        tracing::info!("Signed out");
    }

    async fn set_state(&self, next: AuthState) -> AuthState {
        std::mem::replace(&mut *self.inner.state.write().await, next)
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }

    fn persist(&self, pair: &TokenPair) {
        // The session stays usable if the disk write fails.
        if let Err(e) = self.store.save(pair) {
            tracing::warn!(error = %e, "Failed to persist credentials");
        }
    }

    async fn run_refresh(&self) -> Result<TokenPair, AuthError> {
        if *self.state.read().await == AuthState::Failed {
            return Err(AuthError::RefreshFailed(
                "session failed, authorize again".into(),
            ));
        }

        let current = self.tokens.read().await.clone();
        let Some(current) = current.filter(|pair| pair.has_refresh_token()) else {
            tracing::warn!("Refresh requested without a refresh token");
            return Err(AuthError::NoRefreshToken);
        };

        let previous = std::mem::replace(&mut *self.state.write().await, AuthState::Refreshing);
        tracing::info!("Refreshing access token");

        match self.request_refresh(&current).await {
            Ok(pair) => {
                self.persist(&pair);
                *self.tokens.write().await = Some(pair.clone());
                *self.state.write().await = AuthState::Authenticated;
                tracing::info!("Token refreshed successfully");
                Ok(pair)
            }
            Err(e) => {
                tracing::error!(error = %e, previous_state = ?previous, "Failed to refresh token");
                *self.state.write().await = AuthState::Failed;
                Err(e)
            }
        }
    }

    async fn request_refresh(&self, current: &TokenPair) -> Result<TokenPair, AuthError> {
        let request = HttpRequest::post(self.url(REFRESH_PATH))
            .json(serde_json::json!({ "refresh_token": current.refresh_token }));
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "backend answered {}",
                response.status
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        // The old pair stays in place unless the new one is usable.
        if body.access_token.is_empty() {
            return Err(AuthError::RefreshFailed("empty access token".into()));
        }

        let refresh_token = body
            .refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| current.refresh_token.clone());
        Ok(TokenPair::new(body.access_token, refresh_token))
    }
}
