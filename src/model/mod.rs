//! Model module - session data types and the media API client
//!
//! - `types`: token pair and device definitions
//! - `playback`: track metadata and playback state
//! - `credentials`: durable token storage
//! - `device`: playback target selection
//! - `media_client`: media API player endpoints

mod types;
mod playback;
mod credentials;
mod device;
mod media_client;

pub use types::{Device, DeviceKind, TokenPair};

pub use playback::{Album, NowPlaying, PlaybackState, PlaybackStatus, Track};

pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, DEFAULT_CREDENTIALS_FILE,
};

pub use device::resolve;

pub use media_client::{MediaClient, DEFAULT_MEDIA_API_URL};
