//! The audio system: capture and render threads around the ALSA devices.
//!
//! Both directions run on dedicated OS threads (NOT tokio tasks) so the
//! real-time paths never contend with async network work. The capture thread
//! feeds the control domain through an mpsc channel; the render thread's
//! only contact with the rest of the system is the `PlaybackBuffer` it
//! pulls from. The render period is the one hard deadline in the pipeline:
//! a late period is an audible glitch, so nothing on that thread waits on
//! anything but the device itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use tokio::sync::mpsc;

use super::device::{self, DeviceParams};
use super::pcm_codec::{EncodedFrame, PcmEncoder};
use super::playback::PlaybackBuffer;
use super::vad::{VadConfig, VadEvent, VoiceActivityDetector};

/// Audio system configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// ALSA capture device name (e.g. "default", "plughw:0,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    /// Desired capture rate (may be renegotiated by hardware)
    pub capture_sample_rate: u32,
    /// Desired capture channel count
    pub capture_channels: u32,
    /// Desired playback rate
    pub playback_sample_rate: u32,
    /// Desired playback channel count
    pub playback_channels: u32,
    /// Desired playback period size in frames (0 = let ALSA decide)
    pub playback_period_size: usize,
    /// Wire input rate the encoder resamples to (e.g. 16000)
    pub input_sample_rate: u32,
    /// Batch duration per transmitted capture frame
    pub frame_duration_ms: u32,
    /// Voice-activity detector tuning
    pub vad: VadConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_device: "default".to_string(),
            playback_device: "default".to_string(),
            capture_sample_rate: 48000,
            capture_channels: 1,
            playback_sample_rate: 48000,
            playback_channels: 1,
            playback_period_size: 1024,
            input_sample_rate: 16000,
            frame_duration_ms: 220,
            vad: VadConfig::default(),
        }
    }
}

/// What the capture thread reports into the control domain.
#[derive(Debug)]
pub enum CaptureEvent {
    /// One encoded capture frame ready for transmission.
    Frame(EncodedFrame),
    /// A voice-activity transition (`Start` or `End`, never `None`).
    Vad(VadEvent),
}

/// Manages the capture and render threads.
///
/// - Capture thread: ALSA read → mono f32 → VAD tick + PCM16 frame encode → `capture_tx`
/// - Render thread: `PlaybackBuffer::pull` one period → ALSA write
pub struct AudioSystem {
    running: Arc<AtomicBool>,
    capture_handle: Option<JoinHandle<()>>,
    render_handle: Option<JoinHandle<()>>,
    playback_params: DeviceParams,
}

impl AudioSystem {
    /// Start the audio system.
    ///
    /// * `config`     - Audio configuration
    /// * `capture_tx` - Sender for capture events into the control domain
    /// * `playback`   - Queue the render thread pulls from
    ///
    /// Each thread opens its own device. The render thread reports the
    /// negotiated playback parameters back before entering its loop, so the
    /// caller learns the rate the decode path must convert to.
    pub fn start(
        config: AudioConfig,
        capture_tx: mpsc::Sender<CaptureEvent>,
        playback: Arc<PlaybackBuffer>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        let capture_handle = {
            let running = running.clone();
            let config = config.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    if let Err(e) = capture_thread(&config, capture_tx, &running) {
                        log::error!("Capture thread error: {}", e);
                    }
                })?
        };

        let (params_tx, params_rx) = std::sync::mpsc::channel::<Result<DeviceParams>>();
        let render_handle = {
            let running = running.clone();
            let config = config.clone();
            thread::Builder::new()
                .name("audio-render".into())
                .spawn(move || {
                    if let Err(e) = render_thread(&config, params_tx, &playback, &running) {
                        log::error!("Render thread error: {}", e);
                    }
                })?
        };

        let playback_params = params_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("Render thread exited before reporting device params"))??;

        Ok(Self {
            running,
            capture_handle: Some(capture_handle),
            render_handle: Some(render_handle),
            playback_params,
        })
    }

    /// Negotiated playback parameters; the decode path resamples to this rate.
    pub fn playback_params(&self) -> &DeviceParams {
        &self.playback_params
    }

    /// Signal both threads to stop and wait for them.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.capture_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.render_handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

// ======================== Capture thread ========================

fn capture_thread(
    config: &AudioConfig,
    capture_tx: mpsc::Sender<CaptureEvent>,
    running: &AtomicBool,
) -> Result<()> {
    let (pcm, params) = device::open_capture(
        &config.capture_device,
        config.capture_sample_rate,
        config.capture_channels,
    )?;

    let channels = params.channels as usize;
    let period_size = params.period_size;

    let mut encoder = PcmEncoder::new(
        params.sample_rate,
        config.input_sample_rate,
        config.frame_duration_ms,
    );
    let mut vad = VoiceActivityDetector::new(config.vad);

    let mut read_buf = vec![0i16; period_size * channels];
    let mut mono = vec![0f32; period_size];
    // Rolling window feeding fixed-size analysis ticks.
    let mut analysis: Vec<f32> = Vec::with_capacity(vad.frame_size() * 2);

    let io = pcm.io_i16()?;

    log::info!(
        "Capture started: rate={} channels={} period={} frame={}ms",
        params.sample_rate,
        params.channels,
        period_size,
        config.frame_duration_ms,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                // Interleaved i16 → mono f32 in [-1, 1].
                for (i, slot) in mono.iter_mut().take(frames).enumerate() {
                    let mut sum = 0i32;
                    for ch in 0..channels {
                        sum += i32::from(read_buf[i * channels + ch]);
                    }
                    *slot = (sum / channels as i32) as f32 / 32768.0;
                }
                let samples = &mono[..frames];

                // VAD runs on the same stream the encoder consumes, one
                // fixed window per tick.
                analysis.extend_from_slice(samples);
                while analysis.len() >= vad.frame_size() {
                    let event = vad.tick(&analysis[..vad.frame_size()]);
                    analysis.drain(..vad.frame_size());
                    if event != VadEvent::None
                        && capture_tx.blocking_send(CaptureEvent::Vad(event)).is_err()
                    {
                        log::warn!("Capture event receiver dropped");
                        return Ok(());
                    }
                }

                for frame in encoder.push(samples) {
                    if capture_tx.blocking_send(CaptureEvent::Frame(frame)).is_err() {
                        log::warn!("Capture event receiver dropped");
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("Capture stopped");
    Ok(())
}

// ======================== Render thread ========================

fn render_thread(
    config: &AudioConfig,
    params_tx: std::sync::mpsc::Sender<Result<DeviceParams>>,
    playback: &PlaybackBuffer,
    running: &AtomicBool,
) -> Result<()> {
    let period_size_opt =
        (config.playback_period_size > 0).then_some(config.playback_period_size);
    let (pcm, params) = match device::open_playback(
        &config.playback_device,
        config.playback_sample_rate,
        config.playback_channels,
        period_size_opt,
    ) {
        Ok(opened) => {
            let _ = params_tx.send(Ok(opened.1.clone()));
            opened
        }
        Err(e) => {
            let _ = params_tx.send(Err(anyhow::anyhow!("{e:#}")));
            return Err(e);
        }
    };

    let channels = params.channels as usize;
    let period_size = params.period_size;

    let mut mono = vec![0i16; period_size];
    let mut interleaved = vec![0i16; period_size * channels];

    let io = pcm.io_i16()?;

    log::info!(
        "Render started: rate={} channels={} period={}",
        params.sample_rate,
        params.channels,
        period_size,
    );

    while running.load(Ordering::Relaxed) {
        // One period per iteration; an empty queue renders as silence, which
        // is the defined underrun behavior, not an error.
        playback.pull(&mut mono);

        let out: &[i16] = if channels == 1 {
            &mono
        } else {
            for (i, &s) in mono.iter().enumerate() {
                for ch in 0..channels {
                    interleaved[i * channels + ch] = s;
                }
            }
            &interleaved
        };

        let mut frames_written = 0;
        let mut retry_count = 0u32;
        while frames_written < period_size {
            let offset = frames_written * channels;
            match io.writei(&out[offset..]) {
                Ok(n) => {
                    frames_written += n;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA render error: {}, recovering...", e);
                    retry_count += 1;
                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        return Ok(());
                    }
                    // Device persistently refusing writes: drop the rest of
                    // this period rather than spin.
                    if retry_count >= 3 {
                        log::error!(
                            "Max recovery retries reached, dropping {} frames",
                            period_size - frames_written
                        );
                        break;
                    }
                }
            }
        }
    }

    log::info!("Render stopped");
    Ok(())
}
