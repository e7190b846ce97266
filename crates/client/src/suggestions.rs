use reqwest::Client;
use survey_chat_core::wire::{SuggestionGroups, SuggestionQuery};

use crate::error::{ClientError, error_message};
use crate::join_url;

/// Asks the relay server for answer suggestions.
#[derive(Clone, Debug)]
pub struct SuggestionClient {
    client: Client,
    endpoint: String,
}

impl SuggestionClient {
    /// Creates a client for the server at `base_url`.
    #[inline]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client that reuses `client`.
    #[inline]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: join_url(base_url, "/api/suggestions"),
        }
    }

    /// Returns suggestion groups for `question`, capped for display.
    pub async fn suggest(&self, question: &str) -> Result<SuggestionGroups, ClientError> {
        let query = SuggestionQuery {
            question: question.to_owned(),
        };
        let resp = self.client.post(&self.endpoint).json(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            return Err(ClientError::Status { status, message });
        }
        let groups: SuggestionGroups = resp.json().await?;
        Ok(groups.capped())
    }
}
