//! Core type definitions for the session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh credential pair for the media API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// Player type as reported by the media API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Computer,
    Smartphone,
    Tablet,
    Speaker,
    #[serde(rename = "TV")]
    Tv,
    #[serde(rename = "AVR")]
    Avr,
    #[serde(rename = "STB")]
    Stb,
    AudioDongle,
    GameConsole,
    CastVideo,
    CastAudio,
    Automobile,
    #[serde(other)]
    Unknown,
}

/// A playback endpoint the session can target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_active: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active,
            kind: DeviceKind::Unknown,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct DeviceDto {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_active: bool,
    #[serde(rename = "type", default = "unknown_kind")]
    kind: DeviceKind,
}

fn unknown_kind() -> DeviceKind {
    DeviceKind::Unknown
}

impl From<DeviceDto> for Device {
    fn from(dto: DeviceDto) -> Self {
        Self {
            id: dto.id.unwrap_or_default(),
            name: dto.name,
            is_active: dto.is_active,
            kind: dto.kind,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct DevicesDto {
    #[serde(default)]
    pub devices: Vec<DeviceDto>,
}
