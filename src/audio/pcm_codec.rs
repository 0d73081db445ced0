//! PCM16 wire codec with integrated resampling.
//!
//! - Encoder: capture samples → mixdown handled upstream → resample to the
//!   wire input rate → saturating 16-bit quantization → little-endian bytes,
//!   batched into fixed-duration frames.
//! - Decoder: wire bytes → i16 samples → resample to the playback rate.

use anyhow::Result;

use super::resample::resample;
use super::stream_decoder::StreamDecoder;

// ======================== Encoder ========================

/// One encoded capture frame ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Little-endian PCM16 at the wire input rate.
    pub pcm: Vec<u8>,
    pub duration_ms: u32,
}

/// Accumulates raw capture samples and emits one encoded frame per
/// `frame_duration_ms` worth of input. Per-callback transmission would flood
/// the channel with message overhead; a ~200ms cadence keeps responsiveness
/// without that cost.
pub struct PcmEncoder {
    input_sample_rate: u32,
    output_sample_rate: u32,
    frame_duration_ms: u32,
    pending: Vec<f32>,
}

impl PcmEncoder {
    /// * `input_sample_rate`  - Capture device rate (e.g. 48000)
    /// * `output_sample_rate` - Wire input rate (e.g. 16000)
    /// * `frame_duration_ms`  - Batch duration per emitted frame (e.g. 220)
    pub fn new(input_sample_rate: u32, output_sample_rate: u32, frame_duration_ms: u32) -> Self {
        let capacity = (input_sample_rate * frame_duration_ms / 1000) as usize * 2;
        Self {
            input_sample_rate,
            output_sample_rate,
            frame_duration_ms,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Samples of input needed for one full frame.
    pub fn input_frame_samples(&self) -> usize {
        (self.input_sample_rate * self.frame_duration_ms / 1000) as usize
    }

    /// Feed capture samples; returns every frame completed by this batch.
    /// Leftover samples stay pending for the next call, so nothing is
    /// dropped at frame boundaries.
    pub fn push(&mut self, samples: &[f32]) -> Vec<EncodedFrame> {
        self.pending.extend_from_slice(samples);

        let frame_samples = self.input_frame_samples();
        let mut frames = Vec::new();
        while self.pending.len() >= frame_samples {
            let wire = resample(
                &self.pending[..frame_samples],
                self.input_sample_rate,
                self.output_sample_rate,
            );
            let mut pcm = Vec::with_capacity(wire.len() * 2);
            for &s in &wire {
                pcm.extend_from_slice(&quantize(s).to_le_bytes());
            }
            frames.push(EncodedFrame {
                pcm,
                duration_ms: self.frame_duration_ms,
            });
            self.pending.drain(..frame_samples);
        }
        frames
    }

    /// Samples currently carried over awaiting a full frame.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

/// Saturating float→i16 conversion. The negative half-scale is 32768 so that
/// -1.0 maps onto i16::MIN exactly.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

// ======================== Decoder ========================

/// Decodes raw PCM16 wire payloads to device-rate samples.
pub struct PcmDecoder {
    input_sample_rate: u32,
    output_sample_rate: u32,
}

impl PcmDecoder {
    /// * `input_sample_rate`  - Wire output rate (e.g. 24000)
    /// * `output_sample_rate` - Playback device rate
    pub fn new(input_sample_rate: u32, output_sample_rate: u32) -> Self {
        Self {
            input_sample_rate,
            output_sample_rate,
        }
    }
}

impl StreamDecoder for PcmDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>> {
        if data.len() % 2 != 0 {
            anyhow::bail!("PCM16 payload has odd length {}", data.len());
        }
        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        if self.input_sample_rate == self.output_sample_rate {
            return Ok(samples);
        }

        let as_f32: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
        let converted = resample(&as_f32, self.input_sample_rate, self.output_sample_rate);
        Ok(converted.into_iter().map(quantize).collect())
    }
}

/// Create a decoder for the configured inbound stream format.
pub fn create_decoder(
    format: &str,
    input_sample_rate: u32,
    output_sample_rate: u32,
) -> Result<Box<dyn StreamDecoder>> {
    match format {
        "pcm16" => Ok(Box::new(PcmDecoder::new(input_sample_rate, output_sample_rate))),
        other => anyhow::bail!("Unsupported stream format: {}", other),
    }
}
