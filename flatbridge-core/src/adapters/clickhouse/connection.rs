//! HTTP session handling and failure classification.
//!
//! No connection is pooled: every client is built with an idle pool of zero,
//! so the socket closes as soon as the response (or its body stream) is
//! dropped, whichever path the operation exits by.

use super::ClickHouseClient;
use crate::adapters::config::AuthScheme;
use crate::error::{FlatbridgeError, redact_secret};
use crate::Result;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::OnceLock;
use std::time::Duration;

/// Header carrying the server's exception code.
pub(crate) const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Header carrying the progress summary of a finished statement.
pub(crate) const SUMMARY_HEADER: &str = "X-ClickHouse-Summary";

const AUTH_CODES: &[u32] = &[192, 193, 194, 195, 497, 516];
const NOT_FOUND_CODES: &[u32] = &[16, 47, 60, 81];
const VALIDATION_CODES: &[u32] = &[
    6, 26, 27, 32, 38, 41, 53, 69, 70, 72, 117, 131, 321, 349, 469,
];

/// Server error text is truncated to this many bytes.
const MAX_ERROR_TEXT: usize = 2_048;

fn exception_code_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"Code:\s*(\d+)").expect("Invalid exception code pattern")
    })
}

/// Finds the `Code: N` marker in server error text.
pub(crate) fn exception_code_in(text: &str) -> Option<u32> {
    exception_code_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Maps a server failure onto the engine's error kinds.
///
/// The exception code wins over the HTTP status because the server reports
/// most statement failures as 500 or 404 regardless of their cause.
pub(crate) fn classify_failure(
    status: Option<StatusCode>,
    code: Option<u32>,
    message: String,
) -> FlatbridgeError {
    match code {
        Some(c) if AUTH_CODES.contains(&c) => {
            FlatbridgeError::authentication(format!("server rejected credentials (code {})", c))
        }
        Some(c) if NOT_FOUND_CODES.contains(&c) => FlatbridgeError::not_found(message),
        Some(c) if VALIDATION_CODES.contains(&c) => FlatbridgeError::validation(message),
        Some(c) => FlatbridgeError::query_failed(message, Some(c)),
        None => match status {
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                FlatbridgeError::authentication("server rejected credentials")
            }
            Some(status) => {
                FlatbridgeError::query_failed(format!("HTTP {}: {}", status, message), None)
            }
            None => FlatbridgeError::query_failed(message, None),
        },
    }
}

fn header_code(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(EXCEPTION_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn trim_error_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= MAX_ERROR_TEXT {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_TEXT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

impl ClickHouseClient {
    /// Builds a dedicated, non-pooling HTTP client for one logical operation.
    pub(crate) fn http_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| FlatbridgeError::network("building HTTP client", e))
    }

    /// Prepares a request carrying auth, the database and common settings.
    pub(crate) fn request(&self, client: &Client, timeout: Option<Duration>) -> RequestBuilder {
        let mut builder = client
            .post(self.config.base_url())
            .header("X-ClickHouse-User", self.credentials.username())
            .query(&[("database", self.config.database.as_str())]);

        if let Some(token) = self.credentials.token() {
            builder = match self.config.auth_scheme {
                AuthScheme::Bearer => builder.bearer_auth(token),
                AuthScheme::Password => builder.header("X-ClickHouse-Key", token),
            };
        }

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    /// Sends a request and turns any non-success reply into a classified
    /// error with the token masked out of the server text.
    pub(crate) async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| self.transport_error(context, e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let header_code = header_code(response.headers());
        let body = response.text().await.unwrap_or_default();
        let body = redact_secret(&body, self.credentials.token());
        let code = header_code.or_else(|| exception_code_in(&body));

        tracing::debug!(
            "{} failed with HTTP {} (code {:?})",
            context,
            status.as_u16(),
            code
        );

        Err(classify_failure(
            Some(status),
            code,
            format!("{}: {}", context, trim_error_text(&body)),
        ))
    }

    /// Runs a small statement and returns its whole reply body.
    pub(crate) async fn execute_text(
        &self,
        client: &Client,
        sql: &str,
        params: &[(&str, &str)],
        context: &str,
    ) -> Result<String> {
        let builder = self
            .request(client, Some(self.config.query_timeout))
            .query(params)
            .body(sql.to_string());
        let response = self.send(builder, context).await?;
        response
            .text()
            .await
            .map_err(|e| self.transport_error(context, e))
    }

    /// Wraps an HTTP client failure. Timeouts and refused connections are
    /// network errors; the request URL is never included.
    pub(crate) fn transport_error(&self, context: &str, error: reqwest::Error) -> FlatbridgeError {
        let detail = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "transport error"
        };
        FlatbridgeError::network(
            format!("{} against {}: {}", context, self.config, detail),
            error,
        )
    }
}
