use serde::{Deserialize, Serialize};

/// How a preset response should fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetFailure {
    /// The request itself is rejected, no stream is produced.
    #[serde(rename = "request")]
    Request,
    /// The stream errors after delivering this many deltas.
    #[serde(rename = "mid_stream")]
    MidStream(usize),
}

/// The preset response for an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Deltas in this response, in delivery order.
    pub deltas: Vec<String>,
    /// If set, the response fails instead of completing.
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified deltas.
    #[inline]
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Makes the response fail in the given way.
    #[inline]
    pub fn with_failure(mut self, failure: PresetFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}
