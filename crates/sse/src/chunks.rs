use std::collections::VecDeque;
use std::fmt::{self, Display};

use bytes::Bytes;
use reqwest::Response;

/// The underlying body failed while reading.
#[derive(Debug, PartialEq, Eq)]
pub struct Error;

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read body chunk")
    }
}

impl std::error::Error for Error {}

/// An adapter for streaming byte chunks.
pub enum Chunks {
    /// Chunks pulled from an HTTP response body.
    Response(Response),
    /// Chunks held in memory, mostly useful for feeding tests.
    VecDeque(VecDeque<Bytes>),
    /// A chunk source that failed after yielding the held chunks.
    Broken(VecDeque<Bytes>),
}

impl Chunks {
    /// Reads chunks from a response body.
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    /// Reads chunks from memory.
    #[inline]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    /// Reads chunks from memory, then fails instead of ending.
    #[inline]
    pub fn broken_after(vec: VecDeque<Bytes>) -> Self {
        Chunks::Broken(vec)
    }

    /// Returns the next chunk, or `None` once the body is exhausted.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => match response.chunk().await {
                Ok(chunk) => Ok(chunk),
                Err(err) => {
                    debug!("body chunk failed: {err}");
                    Err(Error)
                }
            },
            Chunks::VecDeque(vec) => Ok(vec.pop_front()),
            Chunks::Broken(vec) => vec.pop_front().map(Some).ok_or(Error),
        }
    }
}
