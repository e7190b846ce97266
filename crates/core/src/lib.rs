//! Core logic of the survey: the conversation log, the completion
//! heuristics, the session state machine and the task that drives it.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod chat_client;
pub mod clock;
pub mod controller;
pub mod conversation;
pub mod decoder;
pub mod heuristic;
pub mod persistence;
pub mod record;
mod session;
pub mod wire;

pub use chat_client::{ChatClient, ChatClientError, ChatClientResponse, ChatStream};
pub use controller::{Controller, FAILURE_MESSAGE, Phase, SubmitError};
pub use conversation::{Conversation, GREETING, Turn, TurnId};
pub use decoder::{DONE_SENTINEL, DecodeError, DeltaFrame, StreamDecoder};
pub use heuristic::{CompletionPolicy, ContentPolicy, DurationPolicy};
pub use persistence::{
    MemoryGateway, NoopGateway, PersistenceError, PersistenceGateway,
};
pub use record::{ExitMode, PersistedRecord, RecordTurn};
pub use session::{Session, SessionBuilder, SessionError, SessionSnapshot};
