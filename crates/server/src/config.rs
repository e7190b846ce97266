use std::env;
use std::fmt::{self, Debug};

use survey_chat_anthropic_model::AnthropicConfigBuilder;
use survey_chat_voice::VoiceCredentials;

use crate::sheets::SheetsCredentials;

/// Server settings, read from the environment.
#[derive(Clone)]
pub struct ServerConfig {
    /// Key of the language model API.
    pub anthropic_api_key: Option<String>,
    /// Model override.
    pub anthropic_model: Option<String>,
    /// Base URL override of the language model API.
    pub anthropic_base_url: Option<String>,
    /// Voice agent credentials, present only when both parts are set.
    pub voice: Option<VoiceCredentials>,
    /// Spreadsheet credentials, present only when all three parts are set.
    pub sheets: Option<SheetsCredentials>,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl ServerConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to
    /// honor a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let voice = match (var("ELEVENLABS_API_KEY"), var("ELEVENLABS_AGENT_ID")) {
            (Some(api_key), Some(agent_id)) => {
                Some(VoiceCredentials::new(api_key, agent_id))
            }
            _ => None,
        };
        let sheets = match (
            var("GOOGLE_SHEETS_SPREADSHEET_ID"),
            var("GOOGLE_SHEETS_CLIENT_EMAIL"),
            var("GOOGLE_SHEETS_PRIVATE_KEY"),
        ) {
            (Some(spreadsheet_id), Some(client_email), Some(private_key)) => {
                Some(SheetsCredentials {
                    spreadsheet_id,
                    client_email,
                    // Keys pasted into a single-line variable keep their
                    // newlines escaped.
                    private_key: private_key.replace("\\n", "\n"),
                })
            }
            _ => None,
        };

        Self {
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            anthropic_model: var("ANTHROPIC_MODEL"),
            anthropic_base_url: var("ANTHROPIC_BASE_URL"),
            voice,
            sheets,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: var("PORT").and_then(|port| port.parse().ok()).unwrap_or(3000),
        }
    }

    /// Returns the language model settings, if a key is configured.
    pub fn anthropic(&self) -> Option<AnthropicConfigBuilder> {
        let api_key = self.anthropic_api_key.as_ref()?;
        let mut builder = AnthropicConfigBuilder::with_api_key(api_key);
        if let Some(model) = &self.anthropic_model {
            builder = builder.with_model(model);
        }
        if let Some(base_url) = &self.anthropic_base_url {
            builder = builder.with_base_url(base_url);
        }
        Some(builder)
    }

    /// Address to listen on.
    #[inline]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("anthropic_model", &self.anthropic_model)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("voice", &self.voice)
            .field("sheets", &self.sheets)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("PORT", "not a port"), ("ANTHROPIC_API_KEY", "  ")]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert!(config.anthropic().is_none());
        assert!(config.voice.is_none());
        assert!(config.sheets.is_none());
    }

    #[test]
    fn test_credentials() {
        let config = config(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ELEVENLABS_API_KEY", "xi"),
            ("GOOGLE_SHEETS_SPREADSHEET_ID", "sheet"),
            ("GOOGLE_SHEETS_CLIENT_EMAIL", "bot@example.iam.gserviceaccount.com"),
            ("GOOGLE_SHEETS_PRIVATE_KEY", "-----BEGIN-----\\nabc\\n-----END-----"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert!(config.anthropic().is_some());
        // The agent id is missing.
        assert!(config.voice.is_none());

        let sheets = config.sheets.as_ref().unwrap();
        assert_eq!(sheets.private_key, "-----BEGIN-----\nabc\n-----END-----");

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant"));
        assert!(!debug.contains("abc"));
    }
}
