use std::fmt::{self, Debug};

/// REST API of the voice vendor.
pub const API_BASE_URL: &str = "https://api.elevenlabs.io";

const CONVERSATION_URL: &str = "wss://api.elevenlabs.io/v1/convai/conversation";

/// Credentials of the hosted voice agent.
#[derive(Clone, PartialEq, Eq)]
pub struct VoiceCredentials {
    /// Vendor API key.
    pub api_key: String,
    /// Identifier of the configured agent.
    pub agent_id: String,
}

impl VoiceCredentials {
    /// Creates credentials from both parts.
    #[inline]
    pub fn new<K: Into<String>, A: Into<String>>(api_key: K, agent_id: A) -> Self {
        Self {
            api_key: api_key.into(),
            agent_id: agent_id.into(),
        }
    }

    /// URL the front-end connects to.
    #[inline]
    pub fn conversation_url(&self) -> String {
        format!("{CONVERSATION_URL}?agent_id={}", self.agent_id)
    }

    /// URL advertised by the relay server for header-authenticated
    /// connections.
    #[inline]
    pub fn websocket_url(&self) -> String {
        format!("{CONVERSATION_URL}/ws?agent_id={}", self.agent_id)
    }
}

impl Debug for VoiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceCredentials")
            .field("api_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .finish()
    }
}
