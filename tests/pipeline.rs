//! End-to-end pipeline tests: a full conversation driven through the
//! coordinator with in-process channels standing in for the socket and the
//! audio devices. No hardware, no network.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;

use nexus_voice_rs::audio::pcm_codec::{EncodedFrame, PcmEncoder};
use nexus_voice_rs::audio::playback::PlaybackBuffer;
use nexus_voice_rs::audio::system::CaptureEvent;
use nexus_voice_rs::audio::vad::VadEvent;
use nexus_voice_rs::coordinator::{ChannelState, Coordinator, CoordinatorConfig};
use nexus_voice_rs::net_link::{NetCommand, NetEvent};
use nexus_voice_rs::protocol;
use nexus_voice_rs::session::CommitPolicy;

struct Harness {
    coordinator: Coordinator,
    playback: Arc<PlaybackBuffer>,
    net_rx: mpsc::Receiver<NetCommand>,
}

impl Harness {
    fn new() -> Self {
        let playback = Arc::new(PlaybackBuffer::new(64));
        let (net_tx, net_rx) = mpsc::channel(256);
        let coordinator = Coordinator::new(
            CoordinatorConfig {
                input_format: "pcm16".to_string(),
                output_format: "pcm16".to_string(),
                input_sample_rate: 16000,
                output_sample_rate: 24000,
                device_output_rate: 48000,
                voice: "nova".to_string(),
                commit: CommitPolicy::default(),
            },
            Arc::clone(&playback),
            net_tx,
        )
        .expect("coordinator");
        Self {
            coordinator,
            playback,
            net_rx,
        }
    }

    async fn connect(&mut self) {
        self.coordinator.handle_net_event(NetEvent::Connecting).await;
        self.coordinator.handle_net_event(NetEvent::Connected).await;
    }

    async fn server_says(&mut self, json: &str) {
        self.coordinator
            .handle_net_event(NetEvent::Text(json.to_string()))
            .await;
    }

    fn sent(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(NetCommand::Send(text)) = self.net_rx.try_recv() {
            out.push(serde_json::from_str(&text).expect("client events are JSON"));
        }
        out
    }
}

fn delta(generation: u64, samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    format!(
        r#"{{"type":"audio.delta","generation":{},"payload":"{}"}}"#,
        generation,
        protocol::encode_audio(&bytes)
    )
}

/// Run a realistic utterance through the capture encoder and feed the
/// resulting frames to the coordinator.
async fn speak_frames(harness: &mut Harness, ms: u32) {
    let mut encoder = PcmEncoder::new(16000, 16000, 20);
    let samples = vec![0.1f32; (16000 * ms / 1000) as usize];
    for frame in encoder.push(&samples) {
        harness
            .coordinator
            .handle_capture_event(CaptureEvent::Frame(frame))
            .await;
    }
}

#[tokio::test]
async fn conversation_flow_configures_appends_and_requests_response() {
    let mut h = Harness::new();
    h.connect().await;

    let setup = h.sent();
    assert_eq!(setup.len(), 1);
    assert_eq!(setup[0]["type"], "session.configure");
    assert_eq!(setup[0]["session"]["voice"], "nova");

    speak_frames(&mut h, 100).await;
    let streamed = h.sent();
    assert_eq!(streamed.len(), 5);
    assert!(streamed.iter().all(|e| e["type"] == "input.append"));
    // Payloads are valid base64 PCM16.
    for event in &streamed {
        let payload = event["audio"].as_str().expect("audio payload");
        let pcm = protocol::decode_audio(payload).expect("payload decodes");
        assert_eq!(pcm.len() % 2, 0);
        assert!(!pcm.is_empty());
    }

    h.coordinator
        .handle_capture_event(CaptureEvent::Vad(VadEvent::End))
        .await;
    let turn = h.sent();
    assert_eq!(turn[0]["type"], "input.commit");
    assert_eq!(turn[1]["type"], "response.create");
}

#[tokio::test]
async fn barge_in_while_assistant_speaks_cancels_exactly_once() {
    let mut h = Harness::new();
    h.connect().await;
    h.sent();

    // Assistant starts a turn and streams audio.
    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(&delta(1, &[500; 480])).await;
    h.server_says(&delta(1, &[500; 480])).await;
    assert!(h.coordinator.generations().is_active(1));
    // 24kHz wire → 48kHz device doubles the sample count.
    assert_eq!(h.playback.queued_samples(), 1920);

    // The user talks over it.
    h.coordinator
        .handle_capture_event(CaptureEvent::Vad(VadEvent::Start))
        .await;

    assert!(!h.coordinator.generations().is_active(1));
    assert_eq!(h.playback.queued_samples(), 0);
    let sent = h.sent();
    let cancels = sent.iter().filter(|e| e["type"] == "response.cancel").count();
    assert_eq!(cancels, 1);

    // Stale chunks still in flight for the cancelled turn are discarded.
    h.server_says(&delta(1, &[500; 480])).await;
    assert_eq!(h.playback.queued_samples(), 0);

    // The next turn starts clean.
    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(&delta(2, &[250; 480])).await;
    assert_eq!(h.playback.queued_samples(), 960);
}

#[tokio::test]
async fn completed_response_stays_playable_until_replaced() {
    let mut h = Harness::new();
    h.connect().await;
    h.sent();

    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(r#"{"type":"response.completed"}"#).await;
    // Trailing chunks delivered after completion still belong to the turn.
    h.server_says(&delta(1, &[9; 48])).await;
    assert_eq!(h.playback.queued_samples(), 96);

    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(&delta(1, &[9; 48])).await;
    assert_eq!(h.playback.queued_samples(), 96, "old generation must be gated");
}

#[tokio::test]
async fn disconnect_mid_turn_clears_audio_and_recovers() {
    let mut h = Harness::new();
    h.connect().await;
    h.sent();

    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(&delta(1, &[40; 480])).await;
    assert!(h.playback.queued_samples() > 0);

    h.coordinator.handle_net_event(NetEvent::Disconnected).await;
    assert_eq!(h.coordinator.state(), ChannelState::Disconnected);
    assert_eq!(h.playback.queued_samples(), 0);

    // Capture frames while down go nowhere.
    speak_frames(&mut h, 40).await;
    assert!(h.sent().is_empty());

    // Reconnect configures a fresh session.
    h.connect().await;
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "session.configure");
    assert_eq!(h.coordinator.state(), ChannelState::Active);
}

#[tokio::test]
async fn render_pull_stays_silent_through_a_whole_turn_teardown() {
    let mut h = Harness::new();
    h.connect().await;
    h.sent();

    h.server_says(r#"{"type":"response.created"}"#).await;
    h.server_says(&delta(1, &[1000; 480])).await;

    // Render domain view: pull a period, then the turn is cancelled, then
    // pulls keep returning silence without blocking.
    let mut period = [0i16; 256];
    h.playback.pull(&mut period);
    assert!(period.iter().any(|&s| s != 0));

    h.coordinator
        .handle_capture_event(CaptureEvent::Vad(VadEvent::Start))
        .await;
    for _ in 0..4 {
        h.playback.pull(&mut period);
        assert!(period.iter().all(|&s| s == 0));
    }
}

#[tokio::test]
async fn commit_pacing_holds_under_steady_capture() {
    let mut h = Harness::new();
    h.connect().await;
    h.sent();

    let base = Instant::now();
    let mut appended_ms = 0u32;
    let mut commits = 0usize;
    // Coordinator-level view of the throttle test: steady 20ms frames for
    // two seconds of audio time never commit faster than the policy floor.
    for step in 0..100u32 {
        let frame = EncodedFrame {
            pcm: vec![0u8; 640],
            duration_ms: 20,
        };
        h.coordinator
            .handle_capture_frame(frame, base + std::time::Duration::from_millis(u64::from(step) * 20))
            .await;
        appended_ms += 20;
        for event in h.sent() {
            if event["type"] == "input.commit" {
                commits += 1;
            }
        }
    }
    assert!(appended_ms >= 2000);
    // 2s of audio at one commit per >=300ms: at most 7 commits, and at
    // least a few once the minimum accumulation is met.
    assert!(commits >= 3, "expected steady commits, got {commits}");
    assert!(commits <= 7, "throttle violated: {commits} commits in 2s");
}
