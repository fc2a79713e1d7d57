//! Retry-once-after-refresh policy for authorized remote calls

use std::future::Future;

use crate::auth::AuthState;
use crate::error::PlaybackError;

use super::PlaybackController;

impl PlaybackController {
    /// Run `operation` with the current access token. If the media API
    /// rejects the token, refresh once and reissue the identical call once.
    /// A second rejection, or a failed refresh, is `AuthExpired`.
    ///
    /// `operation` may span several requests; they all share the one
    /// refresh.
    pub(crate) async fn with_auth_recovery<T, E, F, Fut>(
        &self,
        operation_name: &'static str,
        operation: F,
    ) -> Result<T, PlaybackError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<PlaybackError>,
    {
        let token = match self.auth.current_token().await {
            Some(token) => token,
            None => self.await_pending_refresh(operation_name).await?,
        };

        match operation(token.clone()).await.map_err(Into::into) {
            Err(PlaybackError::AuthExpired) => {}
            other => return other,
        }

        let retry_token = match self.auth.current_token().await {
            Some(current) if current != token => {
                tracing::debug!(operation = operation_name, "Token already replaced, skipping refresh");
                current
            }
            _ => {
                tracing::info!(operation = operation_name, "Access token rejected, refreshing");
                match self.auth.refresh().await {
                    Ok(pair) => pair.access_token,
                    Err(e) => {
                        tracing::error!(operation = operation_name, error = %e, "Refresh failed, giving up");
                        return Err(PlaybackError::AuthExpired);
                    }
                }
            }
        };

        tracing::debug!(operation = operation_name, "Retrying after token refresh");
        match operation(retry_token).await.map_err(Into::into) {
            Ok(value) => {
                tracing::info!(operation = operation_name, "Succeeded after token refresh");
                Ok(value)
            }
            Err(PlaybackError::AuthExpired) => {
                tracing::error!(operation = operation_name, "Token rejected even after refresh");
                Err(PlaybackError::AuthExpired)
            }
            Err(e) => Err(e),
        }
    }

    /// Without a usable token the only way forward is a refresh somebody
    /// else already started; share its result.
    async fn await_pending_refresh(&self, operation_name: &'static str) -> Result<String, PlaybackError> {
        if self.auth.state().await != AuthState::Refreshing {
            tracing::warn!(operation = operation_name, "No valid access token");
            return Err(PlaybackError::AuthExpired);
        }
        tracing::debug!(operation = operation_name, "Waiting for refresh in flight");
        self.auth
            .refresh()
            .await
            .map(|pair| pair.access_token)
            .map_err(|_| PlaybackError::AuthExpired)
    }
}
