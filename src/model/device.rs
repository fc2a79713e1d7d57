//! Playback target selection

use super::types::Device;

/// Pick the device to send a playback command to.
///
/// The first active device wins. With no active device the first device in
/// API order is used, active or not. Only an empty list yields `None`.
pub fn resolve(devices: &[Device]) -> Option<&Device> {
    devices
        .iter()
        .find(|d| d.is_active)
        .or_else(|| devices.first())
}
