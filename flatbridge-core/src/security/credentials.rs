//! Secure credential container with automatic memory zeroing.
//!
//! # Security
//! - The username and token live in `Zeroizing<T>` containers
//! - Memory is cleared when the credentials go out of scope
//! - The token is never exposed through `Debug`

use zeroize::{Zeroize, Zeroizing};

/// Username plus optional bearer token (a JWT in the usual deployment).
///
/// # Example
///
/// ```rust
/// use flatbridge_core::security::Credentials;
///
/// let creds = Credentials::new("default".to_string(), Some("eyJhbGciOi".to_string()));
/// assert_eq!(creds.username(), "default");
/// assert!(creds.has_token());
/// assert!(!format!("{:?}", creds).contains("eyJhbGciOi"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    token: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, token: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            token: Zeroizing::new(token.filter(|t| !t.is_empty())),
        }
    }

    /// Credentials for a server that accepts the default user without a token.
    pub fn anonymous() -> Self {
        Self::new("default".to_string(), None)
    }

    /// Replaces the username, keeping the token.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Zeroizing::new(username);
        self
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if a token is present without exposing it.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Borrows the token for placing it into a request header.
    ///
    /// Callers must not log or format the returned value.
    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("token", &self.token.as_ref().map(|_| "****"))
            .finish()
    }
}
