//! Error taxonomy shared by the session, the controller and the clients.
//!
//! Every error here is `Clone + PartialEq`: the controller keeps the last
//! failure in its state and a coalesced refresh hands the same result to
//! every waiter.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("failed to initiate authorization: {0}")]
    InitiationFailed(String),
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("no refresh token available")]
    NoRefreshToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no playback devices available")]
    NoneAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("authorization expired and could not be renewed")]
    AuthExpired,
    #[error("no playback device found, open the app on a phone, desktop or browser tab")]
    NoDevice,
    #[error("no track selected")]
    NoTrack,
    #[error("remote rejected command: {0}")]
    RemoteRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("could not recognize any song")]
    NotRecognized,
    #[error("audio capture failed: {0}")]
    CaptureFailed(String),
    #[error("recognition timed out")]
    Timeout,
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// The single error slot exposed through `PlaybackState::last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

impl From<DeviceError> for PlaybackError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NoneAvailable => PlaybackError::NoDevice,
        }
    }
}

/// Failure to get any response out of the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Classified outcome of a failed media API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<RemoteError> for PlaybackError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized => PlaybackError::AuthExpired,
            // Player endpoints answer 404 when the target device went away.
            RemoteError::Status { status: 404, .. } => PlaybackError::NoDevice,
            other => PlaybackError::RemoteRejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_becomes_no_device() {
        assert_eq!(PlaybackError::from(DeviceError::NoneAvailable), PlaybackError::NoDevice);
    }

    #[test]
    fn remote_errors_map_to_playback_errors() {
        assert_eq!(PlaybackError::from(RemoteError::Unauthorized), PlaybackError::AuthExpired);
        assert_eq!(
            PlaybackError::from(RemoteError::Status { status: 404, message: "gone".into() }),
            PlaybackError::NoDevice
        );
        assert!(matches!(
            PlaybackError::from(RemoteError::Status { status: 500, message: "boom".into() }),
            PlaybackError::RemoteRejected(msg) if msg.contains("500")
        ));
    }

    #[test]
    fn session_error_wraps_each_family() {
        let err: SessionError = RecognitionError::Timeout.into();
        assert_eq!(err, SessionError::Recognition(RecognitionError::Timeout));
        assert_eq!(err.to_string(), "recognition timed out");
    }
}
