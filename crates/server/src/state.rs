use std::sync::Arc;

use reqwest::Client;
use survey_chat_anthropic_model::AnthropicProvider;
use survey_chat_core::ChatClient;
use survey_chat_voice::{API_BASE_URL, VoiceCredentials};

use crate::config::ServerConfig;
use crate::sheets::{GoogleSheets, SheetStore};

/// Collaborators shared by every handler. Missing ones are not configured.
#[derive(Clone)]
pub struct AppState {
    /// The language model.
    pub chat: Option<ChatClient>,
    /// Where transcripts are written.
    pub sheets: Option<Arc<dyn SheetStore>>,
    /// Credentials of the voice agent.
    pub voice: Option<VoiceCredentials>,
    /// Client of outbound calls made directly by handlers.
    pub http: Client,
    /// REST API of the voice vendor.
    pub voice_api_base: String,
}

impl AppState {
    /// Creates a state with nothing configured.
    pub fn new() -> Self {
        Self {
            chat: None,
            sheets: None,
            voice: None,
            http: Client::new(),
            voice_api_base: API_BASE_URL.to_owned(),
        }
    }

    /// Wires up the collaborators `config` has credentials for.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut state = Self::new();
        if let Some(anthropic) = config.anthropic() {
            state.chat = Some(ChatClient::new(AnthropicProvider::new(anthropic.build())));
        }
        if let Some(credentials) = &config.sheets {
            let sheets = GoogleSheets::new(state.http.clone(), credentials.clone());
            state.sheets = Some(Arc::new(sheets));
        }
        state.voice = config.voice.clone();
        state
    }

    /// Uses `chat` as the language model.
    #[inline]
    pub fn with_chat_client(mut self, chat: ChatClient) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Writes transcripts to `sheets`.
    #[inline]
    pub fn with_sheets<S: SheetStore>(mut self, sheets: Arc<S>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    /// Uses the voice agent of `credentials`, whose REST API lives at
    /// `api_base`.
    #[inline]
    pub fn with_voice<S: Into<String>>(mut self, credentials: VoiceCredentials, api_base: S) -> Self {
        self.voice = Some(credentials);
        self.voice_api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }
}

impl Default for AppState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
