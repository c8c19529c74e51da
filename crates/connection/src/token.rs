/// Source of the bearer token attached to the socket handshake and REST
/// calls. Retrieval is synchronous; `None` means the session is not
/// authenticated and the connection must not be attempted.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Fixed token, for the headless notifier and tests.
pub struct StaticTokenSource {
    token: Option<String>,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn absent() -> Self {
        Self { token: None }
    }
}

impl TokenSource for StaticTokenSource {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}
