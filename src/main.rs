use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spotify_remote::audio::FileAudioSource;
use spotify_remote::http::ReqwestTransport;
use spotify_remote::logging;
use spotify_remote::model::{FileCredentialStore, MediaClient, Track};
use spotify_remote::recognition::RecognitionClient;
use spotify_remote::{AuthSession, Config, PlaybackController};

#[derive(Parser)]
#[command(name = "spotify-remote", version, about = "Recognize a song and play it on your Spotify devices")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "SPOTIFY_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the URL to open for granting access
    Login,
    /// Finish login with the code from the redirect
    Callback { code: String },
    /// Forget stored credentials
    Logout,
    /// List playback devices
    Devices,
    /// Identify the song in a recorded sample
    Identify { sample: PathBuf },
    /// Identify the song in a recorded sample and play it
    Play { sample: PathBuf },
    Pause,
    /// Resume what the player has loaded, optionally from a position
    Resume { position_ms: Option<u64> },
    Next,
    Previous,
    /// Show what the player reports as currently playing
    NowPlaying,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spotify-remote starting ===");

    let controller = build_controller(&config);
    let auth = controller.auth().clone();

    match cli.command {
        Command::Login => {
            let url = auth.start_authorization().await?;
            println!("Open this URL to authorize:\n{}", url);
        }
        Command::Callback { code } => {
            auth.complete_authorization(&code).await?;
            println!("✓ Logged in");
        }
        Command::Logout => {
            auth.sign_out().await;
            println!("Logged out");
        }
        command => {
            if !auth.restore().await {
                anyhow::bail!("Not logged in. Run `spotify-remote login` first.");
            }
            controller
                .verify_session()
                .await
                .context("Stored session is no longer valid. Run `spotify-remote login` again.")?;
            run_player_command(&controller, &config, command).await?;
        }
    }

    tracing::info!("spotify-remote finished");
    Ok(())
}

fn build_controller(config: &Config) -> PlaybackController {
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout()));
    let store = Arc::new(FileCredentialStore::new(config.credentials_path.clone()));

    let auth = AuthSession::new(transport.clone(), store, config.backend_url.clone());
    let media = MediaClient::new(transport.clone(), config.media_api_url.clone());
    let recognizer = RecognitionClient::new(
        transport,
        config.recognition_url.clone(),
        config.recognition_api_token.clone(),
    );

    PlaybackController::new(auth, media, recognizer)
        .with_recognition_timeout(config.recognition_timeout())
}

async fn run_player_command(
    controller: &PlaybackController,
    config: &Config,
    command: Command,
) -> Result<()> {
    match command {
        Command::Devices => {
            let devices = controller.devices().await?;
            if devices.is_empty() {
                println!("No devices found. Open Spotify on a phone, desktop app or browser tab.");
            }
            for device in devices {
                let marker = if device.is_active { "*" } else { " " };
                println!("{} {} ({:?}) [{}]", marker, device.name, device.kind, device.id);
            }
        }
        Command::Identify { sample } => {
            let track = controller
                .recognize(&FileAudioSource::new(sample), config.capture_window())
                .await?;
            print_track(&track);
        }
        Command::Play { sample } => {
            let track = controller
                .recognize(&FileAudioSource::new(sample), config.capture_window())
                .await?;
            print_track(&track);
            controller.play().await?;
            println!("▶ Playing");
        }
        Command::Pause => {
            controller.pause().await?;
            println!("⏸ Paused");
        }
        Command::Resume { position_ms } => {
            let now = controller.now_playing().await?;
            let Some(track) = now.as_ref().and_then(|now| now.track()) else {
                anyhow::bail!("Nothing to resume");
            };
            let position_ms = position_ms
                .or_else(|| now.and_then(|now| now.progress_ms))
                .unwrap_or(0);
            controller.set_track(track).await;
            controller.resume_from(position_ms).await?;
            println!("▶ Resumed at {} ms", position_ms);
        }
        Command::Next => controller.next_track().await?,
        Command::Previous => controller.previous_track().await?,
        Command::NowPlaying => match controller.now_playing().await? {
            Some(now) => {
                let name = now.track_name.unwrap_or_else(|| "unknown track".to_string());
                let state = if now.is_playing { "playing" } else { "paused" };
                println!("{} ({}) at {} ms", name, state, now.progress_ms.unwrap_or(0));
            }
            None => println!("Nothing playing"),
        },
        Command::Login | Command::Callback { .. } | Command::Logout => {}
    }
    Ok(())
}

fn print_track(track: &Track) {
    println!("♪ {} - {}", track.title, track.artist_line());
    if !track.album.name.is_empty() {
        println!("  {}", track.album.name);
    }
    println!("  {}", track.uri);
}
