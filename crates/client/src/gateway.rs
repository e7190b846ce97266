use async_trait::async_trait;
use reqwest::Client;
use survey_chat_core::wire::PersistAck;
use survey_chat_core::{PersistedRecord, PersistenceError, PersistenceGateway};

use crate::error::{ClientError, error_message};
use crate::join_url;

/// Forwards transcripts to the relay server's persistence endpoint.
#[derive(Clone, Debug)]
pub struct HttpPersistenceGateway {
    client: Client,
    endpoint: String,
}

impl HttpPersistenceGateway {
    /// Creates a gateway posting to the server at `base_url`.
    #[inline]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a gateway that reuses `client`.
    #[inline]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: join_url(base_url, "/api/sheets"),
        }
    }

    /// Posts one record and returns the server's acknowledgement.
    pub async fn send(&self, record: &PersistedRecord) -> Result<PersistAck, ClientError> {
        let resp = self.client.post(&self.endpoint).json(record).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            return Err(ClientError::Status { status, message });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PersistenceGateway for HttpPersistenceGateway {
    async fn persist(&self, record: PersistedRecord) -> Result<(), PersistenceError> {
        let ack = self.send(&record).await?;
        debug!("transcript stored as {}", ack.session_id);
        Ok(())
    }
}
