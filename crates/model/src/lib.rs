//! A provider-neutral protocol for streamed chat completions.
//!
//! The survey front-end talks to a language model in two places: the
//! server relays the upstream model's stream, and the session controller
//! consumes the relayed stream. Both sides speak the types defined here,
//! so either end can be swapped for a scripted provider in tests.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
