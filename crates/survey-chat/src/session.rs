use survey_chat_client::{HttpPersistenceGateway, RelayProvider, SuggestionClient};
use survey_chat_core::wire::SuggestionGroups;
use survey_chat_core::{
    ContentPolicy, DurationPolicy, SessionError, SessionSnapshot,
};
use survey_chat_core::{Session as CoreSession, SessionBuilder as CoreSessionBuilder};
use survey_chat_model::Role;

use crate::policy::PolicyKind;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    inner: CoreSessionBuilder,
    suggestions: SuggestionClient,
}

impl SessionBuilder {
    /// Creates a session builder talking to the relay server at `base_url`.
    pub fn with_server_url(base_url: &str) -> Self {
        let inner = CoreSessionBuilder::with_chat_provider(RelayProvider::new(base_url))
            .with_gateway(HttpPersistenceGateway::new(base_url));
        Self {
            inner,
            suggestions: SuggestionClient::new(base_url),
        }
    }

    /// Sets the completion policy.
    #[inline]
    pub fn with_policy(mut self, kind: PolicyKind) -> Self {
        self.inner = match kind {
            PolicyKind::Content => self.inner.with_policy(ContentPolicy::default()),
            PolicyKind::Duration => self.inner.with_policy(DurationPolicy::default()),
        };
        self
    }

    /// Attaches a callback to be invoked for every streamed delta.
    #[inline]
    pub fn on_delta(mut self, on_delta: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.inner = self.inner.on_delta(on_delta);
        self
    }

    /// Attaches a callback to be invoked when the session state changes.
    #[inline]
    pub fn on_state_change(
        mut self,
        on_state_change: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.inner = self.inner.on_state_change(on_state_change);
        self
    }

    /// Attaches a callback to be invoked when a reply has finished.
    #[inline]
    pub fn on_idle(mut self, on_idle: impl Fn() + Send + Sync + 'static) -> Self {
        self.inner = self.inner.on_idle(on_idle);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            inner: self.inner.build(),
            suggestions: self.suggestions,
        }
    }
}

/// A survey session, like a chat window with an input box and a row of
/// suggestion chips.
///
/// It is basically a wrapper around the core session, wired to the relay
/// server.
pub struct Session {
    inner: CoreSession,
    suggestions: SuggestionClient,
}

impl Session {
    /// Records a keystroke, which starts the session clock.
    #[inline]
    pub fn note_keystroke(&self) {
        self.inner.note_keystroke();
    }

    /// Submits a user message.
    #[inline]
    pub async fn submit(&self, message: &str) -> Result<(), SessionError> {
        self.inner.submit(message).await
    }

    /// Returns the current state of the session.
    #[inline]
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.inner.snapshot().await
    }

    /// Asks for answer suggestions to the latest question. Failures are
    /// logged and yield no suggestions.
    pub async fn suggest(&self) -> SuggestionGroups {
        let Ok(snapshot) = self.inner.snapshot().await else {
            return SuggestionGroups::default();
        };
        let Some(question) = snapshot
            .turns
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::Assistant && !turn.is_in_flight())
        else {
            return SuggestionGroups::default();
        };

        match self.suggestions.suggest(question.content()).await {
            Ok(groups) => groups,
            Err(err) => {
                warn!("failed to fetch suggestions: {err}");
                SuggestionGroups::default()
            }
        }
    }

    /// Leaves the survey. An unfinished survey is saved as an abrupt exit.
    /// Returns once every pending save has finished.
    pub async fn close(self) {
        self.inner.unload();
        self.inner.closed().await;
    }
}
