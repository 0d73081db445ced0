#[derive(Debug, Clone)]
pub struct Config {
    // Network endpoints (static)
    pub ws_url: &'static str,
    pub token_url: &'static str,

    // Device identity (dynamic, resolved at startup)
    pub device_id: String,
    pub client_id: String,

    // Local audio devices
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub capture_sample_rate: u32,
    pub capture_channels: u32,
    pub playback_sample_rate: u32,
    pub playback_channels: u32,
    pub playback_period_size: usize,

    // Wire audio formats negotiated in session.configure
    pub input_format: &'static str,
    pub output_format: &'static str,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub frame_duration_ms: u32,
    pub voice: &'static str,
}

impl Config {
    /// Build the configuration from the environment variables baked in at
    /// compile time from config.toml.
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            ws_url: env!("WS_URL"),
            token_url: env!("TOKEN_URL"),

            device_id: env!("DEVICE_ID").to_string(),
            client_id: env!("CLIENT_ID").to_string(),

            capture_device: env!("CAPTURE_DEVICE"),
            playback_device: env!("PLAYBACK_DEVICE"),
            capture_sample_rate: env!("CAPTURE_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse CAPTURE_SAMPLE_RATE")?,
            capture_channels: env!("CAPTURE_CHANNELS")
                .parse()
                .map_err(|_| "Failed to parse CAPTURE_CHANNELS")?,
            playback_sample_rate: env!("PLAYBACK_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse PLAYBACK_SAMPLE_RATE")?,
            playback_channels: env!("PLAYBACK_CHANNELS")
                .parse()
                .map_err(|_| "Failed to parse PLAYBACK_CHANNELS")?,
            playback_period_size: env!("PLAYBACK_PERIOD_SIZE")
                .parse()
                .map_err(|_| "Failed to parse PLAYBACK_PERIOD_SIZE")?,

            input_format: env!("INPUT_FORMAT"),
            output_format: env!("OUTPUT_FORMAT"),
            input_sample_rate: env!("INPUT_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse INPUT_SAMPLE_RATE")?,
            output_sample_rate: env!("OUTPUT_SAMPLE_RATE")
                .parse()
                .map_err(|_| "Failed to parse OUTPUT_SAMPLE_RATE")?,
            frame_duration_ms: env!("FRAME_DURATION_MS")
                .parse()
                .map_err(|_| "Failed to parse FRAME_DURATION_MS")?,
            voice: env!("VOICE"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
