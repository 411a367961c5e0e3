//! Transports execute prepared requests.
//!
//! # Design
//! The handler never talks to the network itself. A `Transport` takes an
//! `HttpRequest` (plain data) and returns an `HttpResponse` (plain data),
//! so the handler can be driven by `UreqTransport` in production and by a
//! recording fake in tests. The transport also decides, once at
//! construction, how structured bodies are stored in the option bag.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};
use ureq::http;
use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::error::{Error, Result};
use crate::http::{parse_timeout, HttpRequest};
use crate::options::{OptionMap, HEADERS, TIMEOUT};
use crate::response::HttpResponse;

/// How form, JSON and multipart bodies are recorded in the request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyStyle {
    /// Dedicated `form_params` / `json` / `multipart` keys.
    #[default]
    Keyed,
    /// A `Content-Type` header plus the data under `body`.
    Raw,
}

/// Executes prepared requests.
pub trait Transport {
    fn body_style(&self) -> BodyStyle {
        BodyStyle::Keyed
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by `ureq`.
///
/// Status codes are always returned as data; the handler decides whether a
/// status is an error. TLS verification is a per-request option, so one
/// agent is kept for each setting.
#[derive(Clone)]
pub struct UreqTransport {
    verified: Agent,
    unverified: Agent,
    timeout: Option<Duration>,
    body_style: BodyStyle,
}

impl UreqTransport {
    /// Build agents from the client options (`timeout` is honoured here).
    pub fn new(client_options: &OptionMap) -> Result<Self> {
        let timeout = client_options
            .get(TIMEOUT)
            .map(|value| parse_timeout(TIMEOUT, value))
            .transpose()?;
        Ok(Self {
            verified: build_agent(timeout, true),
            unverified: build_agent(timeout, false),
            timeout,
            body_style: BodyStyle::default(),
        })
    }

    pub fn with_body_style(mut self, body_style: BodyStyle) -> Self {
        self.body_style = body_style;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .field("body_style", &self.body_style)
            .finish_non_exhaustive()
    }
}

fn build_agent(timeout: Option<Duration>, verify: bool) -> Agent {
    let mut builder = Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .timeout_global(timeout);
    if !verify {
        builder = builder.tls_config(TlsConfig::builder().disable_verification(true).build());
    }
    builder.build().new_agent()
}

impl Transport for UreqTransport {
    fn body_style(&self) -> BodyStyle {
        self.body_style
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let agent = match request.timeout {
            Some(timeout) => build_agent(Some(timeout), request.verify),
            None if request.verify => self.verified.clone(),
            None => self.unverified.clone(),
        };
        if !request.verify {
            warn!(url = %request.url, "TLS certificate verification disabled");
        }

        let method = http::Method::from_bytes(request.method.as_str().as_bytes()).map_err(|_| {
            Error::InvalidCall {
                name: request.method.to_string(),
                reason: "not a valid HTTP method".to_string(),
            }
        })?;
        let mut builder = http::Request::builder().method(method).uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(
            method = %request.method,
            url = %request.url,
            headers = request.headers.len(),
            body_len = request.body.as_ref().map_or(0, Vec::len),
            "sending request"
        );
        let mut response = match &request.body {
            Some(body) => agent.run(builder.body(body.clone()).map_err(invalid_headers)?),
            None => agent.run(builder.body(()).map_err(invalid_headers)?),
        }?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // Responses are buffered whole; ureq's default 10 MiB cap does not apply.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()?;
        debug!(status, body_len = body.len(), "received response");

        Ok(HttpResponse { status, headers, body })
    }
}

fn invalid_headers(err: http::Error) -> Error {
    Error::invalid_option(HEADERS, err.to_string())
}
