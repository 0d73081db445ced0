//! The streaming protocol coordinator.
//!
//! Owns the session lifecycle on top of the raw link: configuration after
//! connect, append/commit pacing for capture frames, response requests,
//! barge-in cancellation, and dispatch of inbound events into the playback
//! path. All of it runs in the control domain; the render thread is reached
//! only through the `PlaybackBuffer`.
//!
//! Barge-in ordering matters: local state is torn down (generation
//! invalidated, playback queue cleared) before the cancel event is sent, so
//! the speaker goes quiet even if the network is slow to take the cancel.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::audio::pcm_codec::{self, EncodedFrame};
use crate::audio::playback::PlaybackBuffer;
use crate::audio::stream_decoder::StreamDecoder;
use crate::audio::system::CaptureEvent;
use crate::audio::vad::VadEvent;
use crate::generation::GenerationTracker;
use crate::net_link::{NetCommand, NetEvent};
use crate::protocol::{self, AudioFormat, ClientEvent, ServerEvent, SessionConfig, TurnDetection};
use crate::session::{CommitPolicy, Session};

/// Channel lifecycle. `Configuring` is passed through synchronously: the
/// configure event is sent immediately on open and the coordinator is Active
/// as soon as it is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Configuring,
    Active,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub input_format: String,
    pub output_format: String,
    /// Wire rate of transmitted capture audio.
    pub input_sample_rate: u32,
    /// Wire rate of inbound synthesized audio.
    pub output_sample_rate: u32,
    /// Negotiated playback device rate the decode path converts to.
    pub device_output_rate: u32,
    pub voice: String,
    pub commit: CommitPolicy,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    state: ChannelState,
    session: Option<Session>,
    generations: GenerationTracker,
    decoder: Box<dyn StreamDecoder>,
    playback: Arc<PlaybackBuffer>,
    net_tx: mpsc::Sender<NetCommand>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        playback: Arc<PlaybackBuffer>,
        net_tx: mpsc::Sender<NetCommand>,
    ) -> Result<Self> {
        let decoder = pcm_codec::create_decoder(
            &config.output_format,
            config.output_sample_rate,
            config.device_output_rate,
        )?;
        Ok(Self {
            config,
            state: ChannelState::Disconnected,
            session: None,
            generations: GenerationTracker::new(),
            decoder,
            playback,
            net_tx,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn generations(&self) -> &GenerationTracker {
        &self.generations
    }

    pub async fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connecting => {
                self.state = ChannelState::Connecting;
            }
            NetEvent::Connected => {
                self.state = ChannelState::Configuring;
                self.session = Some(Session::new(
                    self.input_format(),
                    self.output_format(),
                ));
                let configure = ClientEvent::SessionConfigure {
                    session: SessionConfig {
                        input_format: self.input_format(),
                        output_format: self.output_format(),
                        turn_detection: TurnDetection::default(),
                        voice: self.config.voice.clone(),
                    },
                };
                self.send_event(configure).await;
                self.state = ChannelState::Active;
                log::info!("Session configured, channel active");
            }
            NetEvent::Text(text) => match ServerEvent::from_json(&text) {
                Ok(event) => self.dispatch_server_event(event).await,
                Err(e) => {
                    log::warn!("Dropping undecodable channel message: {}", e);
                }
            },
            NetEvent::Disconnected => {
                log::warn!("Channel lost; audio state cleared, reconnect pending");
                self.state = ChannelState::Disconnected;
                self.session = None;
                // Every in-flight generation is implicitly stale now.
                self.generations.invalidate_active();
                self.playback.clear();
            }
        }
    }

    async fn dispatch_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SpeechStarted => {
                // Remote VAD heard the user: secondary barge-in trigger.
                log::debug!("Remote speech start");
                self.barge_in().await;
            }
            ServerEvent::SpeechStopped => {
                log::debug!("Remote speech stop");
            }
            ServerEvent::ResponseCreated => {
                let id = self.generations.begin();
                log::debug!("Response started, generation {}", id);
            }
            ServerEvent::AudioDelta { generation, payload } => {
                if !self.generations.is_active(generation) {
                    log::debug!("Dropping audio chunk for stale generation {}", generation);
                    return;
                }
                let pcm = match protocol::decode_audio(&payload) {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        log::warn!("Dropping undecodable audio chunk: {}", e);
                        return;
                    }
                };
                match self.decoder.decode(&pcm) {
                    Ok(samples) => self.playback.push(samples),
                    Err(e) => {
                        log::warn!("Dropping malformed audio chunk: {}", e);
                    }
                }
            }
            ServerEvent::ResponseCompleted => {
                // The generation stays referenceable until the next response
                // starts or the user interrupts.
                log::debug!("Response complete");
            }
            ServerEvent::Error { code, message } => {
                log::error!(
                    "Channel error event: code={} message={}",
                    code.as_deref().unwrap_or("-"),
                    message.as_deref().unwrap_or("-"),
                );
            }
            ServerEvent::Unknown => {
                log::debug!("Ignoring unknown channel event");
            }
        }
    }

    pub async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Frame(frame) => self.handle_capture_frame(frame, Instant::now()).await,
            CaptureEvent::Vad(VadEvent::Start) => {
                log::info!("Local speech start");
                self.barge_in().await;
            }
            CaptureEvent::Vad(VadEvent::End) => {
                log::info!("Local speech end");
                self.on_speech_end(Instant::now()).await;
            }
            CaptureEvent::Vad(VadEvent::None) => {}
        }
    }

    /// Forward one encoded capture frame and apply the commit throttle.
    /// `now` is a parameter so callers (and tests) control the clock.
    pub async fn handle_capture_frame(&mut self, frame: EncodedFrame, now: Instant) {
        if self.state != ChannelState::Active {
            return;
        }
        let append = ClientEvent::InputAppend {
            audio: protocol::encode_audio(&frame.pcm),
        };
        self.send_event(append).await;

        if let Some(session) = self.session.as_mut() {
            session.record_append(frame.duration_ms);
            if session.should_commit(&self.config.commit, now) {
                session.mark_commit(now);
                self.send_event(ClientEvent::InputCommit).await;
            }
        }
    }

    /// The user stopped talking: finalize the utterance and ask for a reply.
    async fn on_speech_end(&mut self, now: Instant) {
        if self.state != ChannelState::Active {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        // Commit with nothing appended is a no-op, not an error.
        if !session.has_pending_audio() {
            return;
        }
        session.mark_commit(now);
        self.send_event(ClientEvent::InputCommit).await;
        self.send_event(ClientEvent::ResponseCreate {
            modalities: vec!["audio".to_string(), "text".to_string()],
            audio_format: self.output_format(),
        })
        .await;
    }

    /// The user talked over the assistant. Local state first — stop the
    /// audio even if the cancel message is delayed or lost — then the
    /// network. Idempotent: with no active generation nothing is sent.
    async fn barge_in(&mut self) {
        let had_active = self.generations.active().is_some();
        self.generations.invalidate_active();
        self.playback.clear();
        if had_active && self.state == ChannelState::Active {
            self.send_event(ClientEvent::ResponseCancel).await;
        }
    }

    async fn send_event(&self, event: ClientEvent) {
        match event.to_json() {
            Ok(text) => {
                if let Err(e) = self.net_tx.send(NetCommand::Send(text)).await {
                    log::error!("Failed to queue outbound event: {}", e);
                }
            }
            Err(e) => {
                log::error!("Failed to serialize outbound event: {}", e);
            }
        }
    }

    fn input_format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.config.input_format.clone(),
            sample_rate: self.config.input_sample_rate,
        }
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.config.output_format.clone(),
            sample_rate: self.config.output_sample_rate,
        }
    }
}
