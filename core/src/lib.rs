//! Option-bag HTTP handler over a blocking `ureq` transport.
//!
//! # Overview
//! A `Handler` keeps two option bags: client options (base URI, default
//! headers, timeout), fixed at construction, and request options (headers,
//! auth, body, TLS verification, ...), which callers mutate between
//! requests. Verb methods turn the current bags into an `HttpRequest`, hand
//! it to a `Transport` and return the buffered `HttpResponse`.
//!
//! # Design
//! - Request preparation is pure (`HttpRequest::prepare`); only the
//!   transport does I/O, so the option rules are tested without a server.
//! - How form/JSON/multipart bodies are stored (`BodyStyle`) is chosen once,
//!   by the transport, at construction.
//! - Configuration comes from figment: defaults, `config/guzzle.toml`,
//!   then `GUZZLE_*` environment variables. See [`factory`].
//! - Nothing is retried; every failure reaches the caller as an [`Error`].

pub mod config;
pub mod error;
pub mod factory;
pub mod handler;
pub mod http;
pub mod multipart;
pub mod options;
pub mod response;
pub mod transport;

pub use config::{publish_default_config, resolve_defaults, ConfigLoader, GuzzleConfig};
pub use error::{Error, Result};
pub use handler::Handler;
pub use http::{HttpMethod, HttpRequest};
pub use options::{AuthSpec, OptionMap};
pub use response::{resolve_response_body, BodyFormat, HttpResponse, ResolvedBody};
pub use transport::{BodyStyle, Transport, UreqTransport};
