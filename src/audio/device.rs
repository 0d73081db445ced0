//! ALSA PCM device wrappers for capture and playback.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters actually negotiated with the hardware; callers size their
/// buffers from these, not from the requested values.
#[derive(Debug, Clone)]
pub struct DeviceParams {
    pub sample_rate: u32,
    pub channels: u32,
    /// Period size in frames; one render iteration services one period.
    pub period_size: usize,
}

/// Open a PCM device for capture.
pub fn open_capture(device: &str, sample_rate: u32, channels: u32) -> Result<(PCM, DeviceParams)> {
    open_pcm(device, Direction::Capture, sample_rate, channels, None)
}

/// Open a PCM device for playback. `period_size` bounds the render deadline;
/// the buffer is held to a small number of periods so cancellation is heard
/// quickly.
pub fn open_playback(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
) -> Result<(PCM, DeviceParams)> {
    open_pcm(device, Direction::Playback, sample_rate, channels, period_size)
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
) -> Result<(PCM, DeviceParams)> {
    let dir_name = match direction {
        Direction::Capture => "capture",
        Direction::Playback => "playback",
    };

    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open {} device '{}'", dir_name, device))?;

    {
        let hwp = HwParams::any(&pcm).context("Failed to initialize hardware params")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
            // Keep the device buffer shallow: latency from clear() to
            // audible silence is at most buffer_size / rate.
            hwp.set_buffer_size_near((ps * 4) as alsa::pcm::Frames)?;
        }
        pcm.hw_params(&hwp)?;
    }

    let params = {
        let hwp = pcm.hw_params_current()?;
        DeviceParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
        }
    };

    log::info!(
        "ALSA {} '{}': rate={} channels={} period={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}
