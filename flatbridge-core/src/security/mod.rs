//! Credential protection.
//!
//! - `credentials`: token container with automatic memory zeroing
//! - `connection`: connection URL parsing with credential extraction
//!
//! # Security Guarantees
//! - Tokens are stored in `Zeroizing` containers and cleared on drop
//! - Tokens never appear in `Debug`, `Display`, logs or error messages

mod connection;
mod credentials;

pub use connection::parse_connection_url;
pub use credentials::Credentials;
