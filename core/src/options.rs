//! Option bags for the client and for individual requests.
//!
//! Both bags are plain JSON objects so callers can store any option the
//! transport understands, and so that "absent" stays distinguishable from
//! "present but empty".

use serde_json::{Map, Value};

/// A key-value bag of client or request options.
pub type OptionMap = Map<String, Value>;

/// Client-level option: base URI relative request URIs are resolved against.
pub const BASE_URI: &str = "base_uri";
/// Request option: TLS certificate verification flag.
pub const VERIFY: &str = "verify";
/// Request or client option: nested map of header name to value.
pub const HEADERS: &str = "headers";
/// Request option: raw body.
pub const BODY: &str = "body";
/// Request option: `application/x-www-form-urlencoded` body fields.
pub const FORM_PARAMS: &str = "form_params";
/// Request option: JSON body.
pub const JSON: &str = "json";
/// Request option: `multipart/form-data` parts.
pub const MULTIPART: &str = "multipart";
/// Request option: `[username, password]` or `[username, password, method]`.
pub const AUTH: &str = "auth";
/// Request option: query string, as a map or a pre-encoded string.
pub const QUERY: &str = "query";
/// Request or client option: total timeout in seconds.
pub const TIMEOUT: &str = "timeout";
/// Request option: fail on responses with status >= 400.
pub const HTTP_ERRORS: &str = "http_errors";

/// Credentials for the `auth` request option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSpec {
    pub username: String,
    pub password: String,
    pub method: Option<String>,
}

impl AuthSpec {
    pub fn new(username: &str, password: &str, method: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            method: method.filter(|m| !m.is_empty()).map(str::to_string),
        }
    }

    /// Shape stored under [`AUTH`]: the method is appended only when set.
    pub fn to_value(&self) -> Value {
        let mut parts = vec![
            Value::String(self.username.clone()),
            Value::String(self.password.clone()),
        ];
        if let Some(method) = &self.method {
            parts.push(Value::String(method.clone()));
        }
        Value::Array(parts)
    }

    /// Read credentials back from a stored `auth` option.
    pub fn from_value(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        let username = parts.first()?.as_str()?;
        let password = parts.get(1)?.as_str()?;
        let method = parts.get(2).and_then(Value::as_str);
        Some(Self::new(username, password, method))
    }
}
