//! Reading server-sent events from a chunked HTTP body.
//!
//! Both the upstream model provider and the relay client consume
//! `text/event-stream` bodies. This crate owns the byte-level framing, the
//! payload interpretation is left to the callers.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod chunks;
mod sse;

pub use chunks::{Chunks, Error as ChunksError};
pub use sse::{Error, Sse, SseEvent};
