//! A terminal front-end for the startup survey.
//!
//! The crate includes a CLI tool for taking the survey in the terminal. It
//! talks to the relay server, which owns every credential. You can also use
//! it as a library to run a survey session from your own host app.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod policy;
mod session;

pub use policy::{ParsePolicyError, PolicyKind};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`survey_chat_core`] crate.
pub mod core {
    pub use survey_chat_core::*;
}
