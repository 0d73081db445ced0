//! Wire protocol of the realtime channel.
//!
//! Every message is a JSON object discriminated by its `type` field. The
//! client and server vocabularies are closed tagged unions; inbound messages
//! with an unrecognized type deserialize to [`ServerEvent::Unknown`] so the
//! dispatcher can drop them without tearing down the channel. Audio payloads
//! travel as base64 of little-endian PCM16 bytes.

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Audio format descriptor carried in session.configure and response.create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

/// Remote turn-detection policy sent with session.configure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub input_format: AudioFormat,
    pub output_format: AudioFormat,
    pub turn_detection: TurnDetection,
    pub voice: String,
}

/// Everything the client may send.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.configure")]
    SessionConfigure { session: SessionConfig },
    #[serde(rename = "input.append")]
    InputAppend { audio: String },
    #[serde(rename = "input.commit")]
    InputCommit,
    #[serde(rename = "response.create")]
    ResponseCreate {
        modalities: Vec<String>,
        audio_format: AudioFormat,
    },
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

/// Everything the server may send that this client understands.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "speech.started")]
    SpeechStarted,
    #[serde(rename = "speech.stopped")]
    SpeechStopped,
    #[serde(rename = "response.created")]
    ResponseCreated,
    #[serde(rename = "audio.delta")]
    AudioDelta { generation: u64, payload: String },
    #[serde(rename = "response.completed")]
    ResponseCompleted,
    #[serde(rename = "error")]
    Error {
        code: Option<String>,
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Base64-encode raw PCM bytes for an input.append payload.
pub fn encode_audio(pcm: &[u8]) -> String {
    BASE64.encode(pcm)
}

/// Decode an audio.delta payload back to raw PCM bytes.
pub fn decode_audio(payload: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_carry_their_type_tag() {
        let commit = serde_json::to_value(&ClientEvent::InputCommit).unwrap();
        assert_eq!(commit, json!({"type": "input.commit"}));

        let append = serde_json::to_value(&ClientEvent::InputAppend {
            audio: "AAAA".to_string(),
        })
        .unwrap();
        assert_eq!(append, json!({"type": "input.append", "audio": "AAAA"}));

        let cancel = serde_json::to_value(&ClientEvent::ResponseCancel).unwrap();
        assert_eq!(cancel, json!({"type": "response.cancel"}));
    }

    #[test]
    fn session_configure_includes_formats_and_policy() {
        let event = ClientEvent::SessionConfigure {
            session: SessionConfig {
                input_format: AudioFormat {
                    encoding: "pcm16".to_string(),
                    sample_rate: 16000,
                },
                output_format: AudioFormat {
                    encoding: "pcm16".to_string(),
                    sample_rate: 24000,
                },
                turn_detection: TurnDetection::default(),
                voice: "nova".to_string(),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "session.configure");
        assert_eq!(value["session"]["input_format"]["sample_rate"], 16000);
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["voice"], "nova");
    }

    #[test]
    fn audio_delta_parses_generation_and_payload() {
        let text = r#"{"type":"audio.delta","generation":3,"payload":"AAEC"}"#;
        match ServerEvent::from_json(text).unwrap() {
            ServerEvent::AudioDelta { generation, payload } => {
                assert_eq!(generation, 3);
                assert_eq!(payload, "AAEC");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_fold_into_unknown() {
        let text = r#"{"type":"telemetry.blip","detail":42}"#;
        assert!(matches!(
            ServerEvent::from_json(text).unwrap(),
            ServerEvent::Unknown
        ));
    }

    #[test]
    fn error_event_tolerates_missing_fields() {
        let text = r#"{"type":"error","message":"rate limited"}"#;
        match ServerEvent::from_json(text).unwrap() {
            ServerEvent::Error { code, message } => {
                assert_eq!(code, None);
                assert_eq!(message.as_deref(), Some("rate limited"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn non_json_input_is_an_error() {
        assert!(ServerEvent::from_json("listening...").is_err());
    }

    #[test]
    fn audio_payload_roundtrips_through_base64() {
        let pcm: Vec<u8> = vec![0, 1, 2, 255, 128, 7];
        assert_eq!(decode_audio(&encode_audio(&pcm)).unwrap(), pcm);
        assert!(decode_audio("not base64!!").is_err());
    }
}
