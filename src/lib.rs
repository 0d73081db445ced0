//! nexus_voice_rs - the real-time full-duplex audio core of the NEXUS voice
//! client.
//!
//! Two concurrency domains: a tokio control domain (channel I/O, protocol
//! coordination, encode/decode, VAD transitions) and a real-time render
//! domain (the audio output thread). The only state they share is the
//! playback queue; everything else moves over channels.

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod generation;
pub mod net_link;
pub mod protocol;
pub mod session;
