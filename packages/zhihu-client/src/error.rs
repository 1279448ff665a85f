//! Error types for the Zhihu API client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the API.
    #[error("api error {status} for {url}")]
    Api { status: u16, url: String },

    /// Response body did not match the expected shape.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored credential blob could not be interpreted.
    #[error("invalid credentials: {0}")]
    Credentials(String),
}
