//! Error types for the option-bag HTTP handler.
//!
//! # Design
//! The handler performs no recovery: every variant is surfaced to the
//! immediate caller. Transport failures keep the underlying `ureq::Error`
//! untouched, while non-2xx responses land in `Status` with the raw status
//! code and body for debugging.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the handler, the factory and the response decoder.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, TLS or timeout failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The server answered with a status >= 400 while `http_errors` is on.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was requested as JSON but is not valid JSON.
    #[error("failed to parse response body as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Name-based dispatch without a URI argument, or with a name that is
    /// not a valid HTTP method token.
    #[error("invalid call to {name}(): {reason}")]
    InvalidCall { name: String, reason: String },

    /// A stored option cannot be turned into a request.
    #[error("invalid option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },

    /// The request URI could not be resolved to an absolute URL.
    #[error("invalid URI `{uri}`: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// Configuration could not be loaded or interpreted.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Filesystem failure while publishing the default configuration, or a
    /// read failure while framing a multipart body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
