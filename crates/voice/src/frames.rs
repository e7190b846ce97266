//! JSON frames exchanged with the voice agent.
//!
//! Incoming frames are forgiving: a frame may carry several events, unknown
//! members are ignored and frames that aren't JSON are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder transcript sent while the user is still speaking.
pub const TRANSCRIPT_PLACEHOLDER: &str = "...";

/// Frames driving the conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Authenticates the connection.
    Auth {
        /// Vendor API key.
        api_key: String,
    },
    /// Starts a conversation with the agent.
    InitConversation {
        /// Identifier of the agent.
        agent_id: String,
    },
    /// Answers a ping.
    Pong {
        /// Identifier echoed from the ping.
        event_id: Value,
    },
}

/// Anything sent to the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutgoingFrame {
    /// A control frame.
    Control(ControlFrame),
    /// Microphone audio, base64 of 16-bit little-endian PCM.
    Audio {
        /// The encoded chunk.
        user_audio_chunk: String,
    },
}

impl OutgoingFrame {
    /// Serializes the frame.
    #[inline]
    pub fn to_json(&self) -> String {
        // Neither variant holds a map with non-string keys.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<ControlFrame> for OutgoingFrame {
    #[inline]
    fn from(frame: ControlFrame) -> Self {
        OutgoingFrame::Control(frame)
    }
}

/// Something the agent told us.
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceEvent {
    /// The agent said something.
    AgentResponse(String),
    /// The user's speech, transcribed.
    UserTranscript(String),
    /// Agent speech, base64 of 16-bit little-endian PCM.
    Audio(String),
    /// The agent expects a pong.
    Ping(Value),
}

#[derive(Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    agent_response_event: Option<AgentResponseEvent>,
    #[serde(default)]
    user_transcription_event: Option<UserTranscriptionEvent>,
    #[serde(default)]
    audio_event: Option<AudioEvent>,
    #[serde(default)]
    ping_event: Option<PingEvent>,
}

#[derive(Deserialize)]
struct AgentResponseEvent {
    agent_response: Option<String>,
}

#[derive(Deserialize)]
struct UserTranscriptionEvent {
    user_transcript: Option<String>,
}

#[derive(Deserialize)]
struct AudioEvent {
    audio_base_64: Option<String>,
}

#[derive(Deserialize)]
struct PingEvent {
    #[serde(default)]
    event_id: Value,
}

/// Extracts the events carried by one text frame.
pub fn parse_frame(text: &str) -> Vec<VoiceEvent> {
    let frame: IncomingFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            trace!("skipping non-JSON frame: {err}");
            return vec![];
        }
    };

    let mut events = vec![];
    if let Some(text) = frame
        .agent_response_event
        .and_then(|event| event.agent_response)
        .filter(|text| !text.is_empty())
    {
        events.push(VoiceEvent::AgentResponse(text));
    }
    if let Some(text) = frame
        .user_transcription_event
        .and_then(|event| event.user_transcript)
        .filter(|text| !text.is_empty() && text != TRANSCRIPT_PLACEHOLDER)
    {
        events.push(VoiceEvent::UserTranscript(text));
    }
    if let Some(audio) = frame
        .audio_event
        .and_then(|event| event.audio_base_64)
        .filter(|audio| !audio.is_empty())
    {
        events.push(VoiceEvent::Audio(audio));
    }
    if let Some(ping) = frame.ping_event {
        events.push(VoiceEvent::Ping(ping.event_id));
    }
    events
}
