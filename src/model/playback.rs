//! Playback-related types and state

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    pub artwork_url: String,
    pub release_date: Option<String>,
}

/// A recognized track. Replaced wholesale, never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Album,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: Option<u32>,
    pub uri: String,
}

impl Track {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Recognizing,
    Ready,
    Playing,
    Paused,
    Error,
}

/// Controller-owned playback state. `position_ms` is advisory: it is only
/// set by resume requests, never polled from the remote player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub position_ms: u64,
    pub last_error: Option<SessionError>,
}

/// What the remote player reports as currently playing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NowPlaying {
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub track_uri: Option<String>,
    pub track_name: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct NowPlayingDto {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<PlayingItemDto>,
}

#[derive(Deserialize)]
struct PlayingItemDto {
    uri: Option<String>,
    name: Option<String>,
}

impl From<NowPlayingDto> for NowPlaying {
    fn from(dto: NowPlayingDto) -> Self {
        let (track_uri, track_name) = match dto.item {
            Some(item) => (item.uri, item.name),
            None => (None, None),
        };
        Self {
            is_playing: dto.is_playing,
            progress_ms: dto.progress_ms,
            track_uri,
            track_name,
        }
    }
}

impl NowPlaying {
    /// A bare track for whatever the player has loaded, so it can be resumed.
    /// Only the uri and title are known here.
    pub fn track(&self) -> Option<Track> {
        let uri = self.track_uri.clone()?;
        Some(Track {
            id: uri.rsplit(':').next().unwrap_or_default().to_string(),
            title: self.track_name.clone().unwrap_or_default(),
            artists: Vec::new(),
            album: Album {
                name: String::new(),
                artwork_url: String::new(),
                release_date: None,
            },
            duration_ms: 0,
            explicit: false,
            popularity: None,
            uri,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_playing_item_becomes_resumable_track() {
        let dto: NowPlayingDto = serde_json::from_value(serde_json::json!({
            "is_playing": false,
            "progress_ms": 73_000,
            "item": { "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC", "name": "Never Gonna Give You Up" }
        }))
        .unwrap();
        let now = NowPlaying::from(dto);

        let track = now.track().unwrap();
        assert_eq!(track.id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(track.title, "Never Gonna Give You Up");
        assert_eq!(track.uri, "spotify:track:4uLU6hMCjMI75M1A2tKUQC");
    }

    #[test]
    fn nothing_loaded_has_no_track() {
        let dto: NowPlayingDto = serde_json::from_value(serde_json::json!({ "is_playing": false })).unwrap();
        assert_eq!(NowPlaying::from(dto).track(), None);
    }
}
