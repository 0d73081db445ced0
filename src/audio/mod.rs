//! audio - capture, playback, detection, and PCM plumbing.
//!
//! ALSA for device I/O on dedicated threads, a linear resampler for rate
//! conversion, and an energy/ZCR voice-activity detector on the capture
//! stream. The playback queue is the single structure shared with the
//! render thread.

pub mod device;
pub mod pcm_codec;
pub mod playback;
pub mod resample;
pub mod stream_decoder;
pub mod system;
pub mod vad;

pub use pcm_codec::{EncodedFrame, PcmEncoder, create_decoder};
pub use playback::{DEFAULT_MAX_CHUNKS, PlaybackBuffer};
pub use stream_decoder::StreamDecoder;
pub use system::{AudioConfig, AudioSystem, CaptureEvent};
pub use vad::{VadConfig, VadEvent, VoiceActivityDetector};
