//! HTTP relay between survey front-ends and the hosted services they need:
//! the language model, the spreadsheet that stores transcripts and the
//! voice agent.
//!
//! Credentials stay on the server. Every one of them is optional, and an
//! endpoint whose collaborator isn't configured answers with a fixed error
//! instead of failing at startup.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod error;
pub mod prompts;
pub mod routes;
pub mod sheets;
mod state;

pub use config::ServerConfig;
pub use error::AppError;
pub use routes::router;
pub use state::AppState;
