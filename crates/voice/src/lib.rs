//! Voice variant of the survey, spoken with a hosted conversational agent
//! over a WebSocket.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod credentials;
pub mod frames;
pub mod pcm;
mod session;
mod transcript;

pub use credentials::{API_BASE_URL, VoiceCredentials};
pub use frames::{ControlFrame, OutgoingFrame, VoiceEvent};
pub use session::{VoiceConfig, VoiceError, VoiceSession};
pub use transcript::VoiceTranscript;
