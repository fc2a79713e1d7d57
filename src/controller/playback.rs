//! Playback control methods

use crate::error::{DeviceError, PlaybackError};
use crate::model::{Device, NowPlaying, PlaybackStatus, resolve};

use super::PlaybackController;

impl PlaybackController {
    /// Start the current track from the beginning on the resolved device.
    pub async fn play(&self) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;
        tracing::debug!("Starting playback");

        match self.start_current_track(None).await {
            Ok(()) => {
                self.transition(PlaybackStatus::Playing, Some(0)).await;
                tracing::info!("Playback started");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Play failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    /// Continue the current track from the remembered position.
    pub async fn resume(&self) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;
        let position_ms = self.state.read().await.position_ms;
        self.resume_locked(position_ms).await
    }

    /// Resume starting at `position_ms`. The position is only kept if the
    /// player accepts it.
    pub async fn resume_from(&self, position_ms: u64) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;
        self.resume_locked(position_ms).await
    }

    /// Caller holds the command gate.
    async fn resume_locked(&self, position_ms: u64) -> Result<(), PlaybackError> {
        tracing::debug!(position_ms, "Resuming playback");

        match self.start_current_track(Some(position_ms)).await {
            Ok(()) => {
                self.transition(PlaybackStatus::Playing, Some(position_ms)).await;
                tracing::info!(position_ms, "Playback resumed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Resume failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;
        tracing::debug!("Pausing playback");

        match self.with_auth_recovery("pause", |token| self.media.pause(token)).await {
            Ok(()) => {
                self.transition(PlaybackStatus::Paused, None).await;
                tracing::info!("Playback paused");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Pause failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    pub async fn next_track(&self) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;
        tracing::debug!("Skipping to next track");

        match self.with_auth_recovery("next", |token| self.media.next(token)).await {
            Ok(()) => {
                self.transition(PlaybackStatus::Playing, Some(0)).await;
                tracing::info!("Skipped to next track");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Next track failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    pub async fn previous_track(&self) -> Result<(), PlaybackError> {
        let _gate = self.command_gate.lock().await;

        match self.with_auth_recovery("previous", |token| self.media.previous(token)).await {
            Ok(()) => {
                self.transition(PlaybackStatus::Playing, Some(0)).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Previous track failed");
                Err(self.record_failure(e).await)
            }
        }
    }

    /// Devices currently visible to the account, in API order.
    pub async fn devices(&self) -> Result<Vec<Device>, PlaybackError> {
        match self.with_auth_recovery("devices", |token| self.media.devices(token)).await {
            Ok(devices) => Ok(devices),
            Err(e) => Err(self.record_error(e).await),
        }
    }

    /// What the remote player reports right now. Leaves local state alone.
    pub async fn now_playing(&self) -> Result<Option<NowPlaying>, PlaybackError> {
        match self
            .with_auth_recovery("currently-playing", |token| self.media.currently_playing(token))
            .await
        {
            Ok(now) => Ok(now),
            Err(e) => Err(self.record_error(e).await),
        }
    }

    /// Check that the stored credentials still work, refreshing them if the
    /// access token has expired.
    pub async fn verify_session(&self) -> Result<(), PlaybackError> {
        self.now_playing().await?;
        tracing::info!("Session verified");
        Ok(())
    }

    /// Device lookup and the play request run as one unit so they share a
    /// single token refresh.
    async fn start_current_track(&self, position_ms: Option<u64>) -> Result<(), PlaybackError> {
        let track = self
            .state
            .read()
            .await
            .track
            .clone()
            .ok_or(PlaybackError::NoTrack)?;
        let uris = vec![track.uri];
        let uris: &[String] = &uris;

        self.with_auth_recovery("play", |token| async move {
            let device = self.target_device(token.clone()).await?;
            tracing::info!(device_name = %device.name, device_id = %device.id, "Playing on device");
            self.media.play(token, &device.id, uris, position_ms).await?;
            Ok::<_, PlaybackError>(())
        })
        .await
    }

    /// Fetch the device list fresh and pick a target.
    async fn target_device(&self, token: String) -> Result<Device, PlaybackError> {
        let devices = self.media.devices(token).await?;

        match resolve(&devices) {
            Some(device) => {
                if !device.is_active {
                    tracing::info!(device_name = %device.name, "No active device, using first available");
                }
                Ok(device.clone())
            }
            None => {
                tracing::warn!("No devices available");
                Err(DeviceError::NoneAvailable.into())
            }
        }
    }
}
