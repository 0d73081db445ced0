use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    network: Network,
    audio: Audio,
    session: Session,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    token_url: String,
    device_id: String,
    client_id: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    capture_sample_rate: u32,
    capture_channels: u32,
    playback_sample_rate: u32,
    playback_channels: u32,
    playback_period_size: usize,
}

#[derive(Deserialize)]
struct Session {
    input_format: String,
    output_format: String,
    input_sample_rate: u32,
    output_sample_rate: u32,
    frame_duration_ms: u32,
    voice: String,
}

// Read config.toml at compile time and expose it through rustc-env so the
// binary carries its deployment configuration.
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=TOKEN_URL={}", config.network.token_url);
    println!("cargo:rustc-env=DEVICE_ID={}", config.network.device_id);
    println!("cargo:rustc-env=CLIENT_ID={}", config.network.client_id);

    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!(
        "cargo:rustc-env=CAPTURE_SAMPLE_RATE={}",
        config.audio.capture_sample_rate
    );
    println!("cargo:rustc-env=CAPTURE_CHANNELS={}", config.audio.capture_channels);
    println!(
        "cargo:rustc-env=PLAYBACK_SAMPLE_RATE={}",
        config.audio.playback_sample_rate
    );
    println!("cargo:rustc-env=PLAYBACK_CHANNELS={}", config.audio.playback_channels);
    println!(
        "cargo:rustc-env=PLAYBACK_PERIOD_SIZE={}",
        config.audio.playback_period_size
    );

    println!("cargo:rustc-env=INPUT_FORMAT={}", config.session.input_format);
    println!("cargo:rustc-env=OUTPUT_FORMAT={}", config.session.output_format);
    println!(
        "cargo:rustc-env=INPUT_SAMPLE_RATE={}",
        config.session.input_sample_rate
    );
    println!(
        "cargo:rustc-env=OUTPUT_SAMPLE_RATE={}",
        config.session.output_sample_rate
    );
    println!(
        "cargo:rustc-env=FRAME_DURATION_MS={}",
        config.session.frame_duration_ms
    );
    println!("cargo:rustc-env=VOICE={}", config.session.voice);
}
