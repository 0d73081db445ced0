//! Generic decoder trait for the inbound synthesized-audio stream.

use anyhow::Result;

/// Turns one wire payload (already base64-decoded) into interleaved i16 PCM
/// at the playback device rate. Implementations handle format parsing and
/// resampling internally.
pub trait StreamDecoder: Send {
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>>;
}
