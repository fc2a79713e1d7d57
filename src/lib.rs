//! Client-side controller for a remote media player: keeps an authorized
//! session alive, picks a playback device, and plays a track identified
//! from an audio sample.

pub mod audio;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod recognition;

#[cfg(test)]
pub(crate) mod test_utils;

pub use auth::{AuthSession, AuthState};
pub use config::Config;
pub use controller::PlaybackController;
pub use error::{AuthError, DeviceError, PlaybackError, RecognitionError, SessionError};
