//! Authenticated session state

/// Login state of one protocol client
///
/// A session starts out anonymous, becomes authenticated after a successful
/// `LogIn` and is reset on logout, on a rejected token or when a keep-alive
/// ping reports a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    authenticated: bool,
    privileged: bool,
}

impl Session {
    /// Session established with `token`
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            authenticated: true,
            privileged: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Token to send with calls; only present while authenticated
    pub fn token(&self) -> Option<&str> {
        if self.authenticated {
            self.token.as_deref()
        } else {
            None
        }
    }

    pub fn mark_privileged(&mut self) {
        self.privileged = true;
    }

    /// Drop the token and fall back to an anonymous session
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
