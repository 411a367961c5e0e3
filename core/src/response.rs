//! Buffered responses and body decoding.

use serde_json::Value;

use crate::error::Result;

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// How [`resolve_response_body`] should interpret a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Raw,
    Json,
}

impl BodyFormat {
    /// `"json"` selects JSON decoding; any other tag leaves the body raw.
    pub fn from_tag(tag: &str) -> Self {
        if tag == "json" {
            BodyFormat::Json
        } else {
            BodyFormat::Raw
        }
    }
}

/// A response body as returned by [`resolve_response_body`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBody {
    Raw(Vec<u8>),
    Json(Value),
}

impl ResolvedBody {
    pub fn into_json(self) -> Option<Value> {
        match self {
            ResolvedBody::Json(value) => Some(value),
            ResolvedBody::Raw(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResolvedBody::Raw(bytes) => bytes,
            ResolvedBody::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// Return the body of `response`, parsed as JSON when `format` asks for it.
pub fn resolve_response_body(
    response: &HttpResponse,
    format: Option<BodyFormat>,
) -> Result<ResolvedBody> {
    match format.unwrap_or_default() {
        BodyFormat::Json => Ok(ResolvedBody::Json(serde_json::from_slice(&response.body)?)),
        BodyFormat::Raw => Ok(ResolvedBody::Raw(response.body.clone())),
    }
}
