//! HTTP collaborators of the survey front-end.
//!
//! [`RelayProvider`] streams replies from the relay server's chat endpoint,
//! [`HttpPersistenceGateway`] forwards transcripts to its persistence
//! endpoint and [`SuggestionClient`] asks it for answer suggestions.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod gateway;
mod relay;
mod suggestions;

pub use error::{ClientError, RelayError};
pub use gateway::HttpPersistenceGateway;
pub use relay::{RelayProvider, RelayResponse};
pub use suggestions::SuggestionClient;

/// Address used when no server URL is configured.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:3000/", "/api/chat"),
            "http://localhost:3000/api/chat"
        );
        assert_eq!(join_url(DEFAULT_SERVER_URL, "/api/sheets"), "http://127.0.0.1:3000/api/sheets");
    }
}
