//! A local scripted chat provider for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use survey_chat_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse, ErrorKind, Role,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestResponse {
    preset: PresetResponse,
    delay: Duration,
    delta_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ChatResponse for TestResponse {
    type Error = crate::Error;

    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            let broken = matches!(
                this.preset.failure,
                Some(PresetFailure::MidStream(after)) if this.delta_idx >= after
            );
            if broken {
                return Poll::Ready(Err(Error {
                    message: "stream broken",
                    kind: ErrorKind::Transport,
                }));
            }

            if this.delta_idx < this.preset.deltas.len() {
                let delta = this.preset.deltas[this.delta_idx].clone();
                this.delta_idx += 1;
                return Poll::Ready(Ok(Some(delta)));
            }
            // Completed, and stays completed.
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_delta(cx)
    }
}

/// A local scripted provider for testing purpose.
///
/// Responses are selected by the number of user turns in the request: the
/// first user turn gets the first preset, and so on. If there are no
/// enough presets in the script, the request fails.
///
/// Every request is recorded, so tests can inspect the history and the
/// session context the caller sent.
#[derive(Clone, Default)]
pub struct TestChatProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl TestChatProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns a copy of every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ChatProvider for TestChatProvider {
    type Error = crate::Error;
    type Response = TestResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }

        let user_turns = req
            .messages
            .iter()
            .filter(|msg| msg.role == Role::User)
            .count();
        let result = 'blk: {
            let Some(preset) = user_turns
                .checked_sub(1)
                .and_then(|idx| self.script.get(idx))
            else {
                break 'blk Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                });
            };
            if preset.failure == Some(PresetFailure::Request) {
                break 'blk Err(Error {
                    message: "request rejected",
                    kind: ErrorKind::Status,
                });
            }
            Ok(TestResponse {
                preset: preset.clone(),
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                delta_idx: 0,
                sleep: None,
            })
        };
        ready(result)
    }
}
