use std::sync::Arc;

use mac_address::get_mac_address;
use tokio::signal;
use tokio::sync::mpsc;
use uuid::Uuid;

use nexus_voice_rs::audio::{AudioConfig, AudioSystem, CaptureEvent, PlaybackBuffer};
use nexus_voice_rs::audio::playback::DEFAULT_MAX_CHUNKS;
use nexus_voice_rs::config::Config;
use nexus_voice_rs::coordinator::{Coordinator, CoordinatorConfig};
use nexus_voice_rs::net_link::{NetCommand, NetEvent, NetLink};
use nexus_voice_rs::session::CommitPolicy;

const CLIENT_ID_FILE: &str = "nexus_voice_uuid.txt";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = Config::new().unwrap_or_default();

    // Device id: stable MAC address where available, fresh UUID otherwise.
    if config.device_id == "unknown-device" {
        config.device_id = match get_mac_address() {
            Ok(Some(mac)) => mac.to_string().to_lowercase(),
            _ => Uuid::new_v4().to_string(),
        };
    }

    // Client id persists across restarts so the backend sees one identity.
    if config.client_id == "unknown-client" {
        if let Ok(content) = std::fs::read_to_string(CLIENT_ID_FILE) {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                config.client_id = trimmed.to_string();
                log::info!("Loaded client id from {}", CLIENT_ID_FILE);
            }
        }
    }
    if config.client_id == "unknown-client" {
        config.client_id = Uuid::new_v4().to_string();
        if let Err(e) = std::fs::write(CLIENT_ID_FILE, &config.client_id) {
            log::warn!("Failed to persist client id: {}", e);
        } else {
            log::info!("Generated new client id");
        }
    }

    // Inter-component channels.
    let (tx_net_event, mut rx_net_event) = mpsc::channel::<NetEvent>(100);
    let (tx_net_cmd, rx_net_cmd) = mpsc::channel::<NetCommand>(100);
    let (tx_capture, mut rx_capture) = mpsc::channel::<CaptureEvent>(100);

    // The playback queue is the single control-domain → render-domain handoff.
    let playback = Arc::new(PlaybackBuffer::new(DEFAULT_MAX_CHUNKS));

    let audio_config = AudioConfig {
        capture_device: config.capture_device.to_string(),
        playback_device: config.playback_device.to_string(),
        capture_sample_rate: config.capture_sample_rate,
        capture_channels: config.capture_channels,
        playback_sample_rate: config.playback_sample_rate,
        playback_channels: config.playback_channels,
        playback_period_size: config.playback_period_size,
        input_sample_rate: config.input_sample_rate,
        frame_duration_ms: config.frame_duration_ms,
        ..AudioConfig::default()
    };
    let mut audio_system = AudioSystem::start(audio_config, tx_capture, Arc::clone(&playback))?;

    let mut coordinator = Coordinator::new(
        CoordinatorConfig {
            input_format: config.input_format.to_string(),
            output_format: config.output_format.to_string(),
            input_sample_rate: config.input_sample_rate,
            output_sample_rate: config.output_sample_rate,
            device_output_rate: audio_system.playback_params().sample_rate,
            voice: config.voice.to_string(),
            commit: CommitPolicy::default(),
        },
        Arc::clone(&playback),
        tx_net_cmd,
    )?;

    let net_link = NetLink::new(config, tx_net_event, rx_net_cmd);
    tokio::spawn(async move {
        net_link.run().await;
    });

    log::info!("NEXUS voice core started");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }
            Some(event) = rx_net_event.recv() => {
                coordinator.handle_net_event(event).await;
            }
            Some(event) = rx_capture.recv() => {
                coordinator.handle_capture_event(event).await;
            }
        }
    }

    audio_system.stop();
    Ok(())
}
