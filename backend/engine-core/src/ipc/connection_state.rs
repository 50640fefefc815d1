//! Per-connection authentication state.

/// Tracks whether a connection has presented the expected token.
pub(crate) struct ConnectionState {
    authenticated: bool,
    expected_token: String,
}

impl ConnectionState {
    pub(crate) fn new(token: String) -> Self {
        Self {
            authenticated: false,
            expected_token: token,
        }
    }

    /// Mark the connection authenticated if `token` matches.
    ///
    /// A failed attempt never clears an earlier success.
    pub(crate) fn validate_token(&mut self, token: &str) -> bool {
        let matches = token == self.expected_token;
        self.authenticated |= matches;
        matches
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
