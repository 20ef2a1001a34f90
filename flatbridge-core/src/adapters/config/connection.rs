//! ClickHouse connection configuration.
//!
//! This module provides the `ConnectionConfig` struct for addressing a
//! ClickHouse server over its HTTP interface.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default port of the ClickHouse HTTP interface.
pub const DEFAULT_HTTP_PORT: u16 = 8123;

/// Default port of the ClickHouse HTTPS interface.
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// How the token from [`crate::security::Credentials`] is presented to the
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    #[default]
    Bearer,
    /// Token sent as the ClickHouse password (`X-ClickHouse-Key`)
    Password,
}

impl std::str::FromStr for AuthScheme {
    type Err = crate::error::FlatbridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bearer" | "jwt" => Ok(Self::Bearer),
            "password" | "key" => Ok(Self::Password),
            other => Err(crate::error::FlatbridgeError::configuration(format!(
                "unknown auth scheme '{}', expected 'bearer' or 'password'",
                other
            ))),
        }
    }
}

/// Configuration for ClickHouse connections.
///
/// # Security
/// This struct intentionally does NOT store the token. Credentials are
/// handled separately and never logged or serialized.
///
/// # Example
/// ```rust
/// use flatbridge_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(8123)
///     .with_database("analytics".to_string())
///     .with_table("events".to_string());
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.base_url(), "http://localhost:8123/");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub host: String,
    /// HTTP interface port
    pub port: u16,
    /// Database to operate in
    pub database: String,
    /// Target table for column listing, preview and transfers
    pub table: Option<String>,
    /// Use HTTPS
    pub secure: bool,
    /// How the token is presented
    pub auth_scheme: AuthScheme,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Per-request timeout for catalog and insert statements
    pub query_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_HTTP_PORT,
            database: "default".to_string(),
            table: None,
            secure: false,
            auth_scheme: AuthScheme::default(),
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(300),
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            if self.secure { "https" } else { "http" },
            self.host,
            self.port,
            self.database
        )?;
        if let Some(table) = &self.table {
            write!(f, ".{}", table)?;
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns a configuration error if any value is unusable.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(crate::error::FlatbridgeError::configuration(
                "host cannot be empty",
            ));
        }

        if self.port == 0 {
            return Err(crate::error::FlatbridgeError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.database.trim().is_empty() {
            return Err(crate::error::FlatbridgeError::configuration(
                "database cannot be empty",
            ));
        }

        if matches!(&self.table, Some(t) if t.trim().is_empty()) {
            return Err(crate::error::FlatbridgeError::configuration(
                "table cannot be empty when set",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::FlatbridgeError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(crate::error::FlatbridgeError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = database;
        self
    }

    /// Builder method to set the target table.
    pub fn with_table(mut self, table: String) -> Self {
        self.table = Some(table);
        self
    }

    /// Builder method to switch to HTTPS.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Builder method to set the auth scheme.
    pub fn with_auth_scheme(mut self, auth_scheme: AuthScheme) -> Self {
        self.auth_scheme = auth_scheme;
        self
    }

    /// Builder method to set the per-request timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Root URL of the HTTP interface.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}/",
            if self.secure { "https" } else { "http" },
            self.host,
            self.port
        )
    }

    /// Target table or a `Configuration` error naming the operation.
    pub fn require_table(&self, operation: &str) -> crate::Result<&str> {
        self.table.as_deref().ok_or_else(|| {
            crate::error::FlatbridgeError::configuration(format!(
                "{} requires a target table",
                operation
            ))
        })
    }
}
