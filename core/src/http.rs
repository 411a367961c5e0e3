//! HTTP request types and their preparation from option bags.
//!
//! # Design
//! `HttpRequest` describes a request as plain data: everything the transport
//! needs is resolved here, from the client and request option bags, without
//! touching the network. Keeping preparation pure means every option rule
//! (URI resolution, header merging, auth, body encoding) is testable without
//! a server; the transport only moves bytes.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};
use crate::multipart;
use crate::options::{
    AuthSpec, OptionMap, AUTH, BASE_URI, BODY, FORM_PARAMS, HEADERS, HTTP_ERRORS, JSON, MULTIPART,
    QUERY, TIMEOUT, VERIFY,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any other method token, always upper-cased.
    Custom(String),
}

impl HttpMethod {
    /// Parse a method name case-insensitively. Returns `None` when `name` is
    /// not a valid HTTP token.
    pub fn parse(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let method = match upper.as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ if is_token(&upper) => HttpMethod::Custom(upper),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Custom(name) => name,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// A fully resolved HTTP request described as plain data.
///
/// Built by [`HttpRequest::prepare`] from the handler's option bags and
/// executed by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub verify: bool,
    /// Per-request override of the client timeout.
    pub timeout: Option<Duration>,
    pub http_errors: bool,
}

impl HttpRequest {
    /// Resolve `uri` and the option bags into a request.
    pub fn prepare(
        method: HttpMethod,
        uri: &str,
        client_options: &OptionMap,
        request_options: &OptionMap,
    ) -> Result<Self> {
        let mut url = resolve_url(uri, client_options)?;
        if let Some(query) = request_options.get(QUERY) {
            apply_query(&mut url, query)?;
        }

        let mut headers = match client_options.get(HEADERS) {
            Some(value) => header_entries(value)?,
            None => Vec::new(),
        };
        if let Some(value) = request_options.get(HEADERS) {
            let entries = header_entries(value)?;
            headers.retain(|(existing, _)| {
                !entries
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case(existing))
            });
            headers.extend(entries);
        }

        if let Some(auth) = request_options.get(AUTH) {
            apply_auth(&mut headers, auth)?;
        }

        let body = prepare_body(&mut headers, request_options)?;

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
            verify: bool_option(request_options, VERIFY, true)?,
            timeout: request_options.get(TIMEOUT).map(|v| parse_timeout(TIMEOUT, v)).transpose()?,
            http_errors: bool_option(request_options, HTTP_ERRORS, true)?,
        })
    }

    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn resolve_url(uri: &str, client_options: &OptionMap) -> Result<Url> {
    let parse = |input: &str, base: Option<&Url>| {
        let parsed = match base {
            Some(base) => base.join(input),
            None => Url::parse(input),
        };
        parsed.map_err(|source| Error::InvalidUri {
            uri: input.to_string(),
            source,
        })
    };
    match client_options.get(BASE_URI) {
        Some(Value::String(base)) if !base.is_empty() => {
            let base = parse(base.as_str(), None)?;
            parse(uri, Some(&base))
        }
        Some(Value::String(_)) | Some(Value::Null) | None => parse(uri, None),
        Some(_) => Err(Error::invalid_option(BASE_URI, "expected a string")),
    }
}

fn apply_query(url: &mut Url, query: &Value) -> Result<()> {
    match query {
        Value::String(encoded) => {
            let encoded = encoded.trim_start_matches('?');
            url.set_query((!encoded.is_empty()).then_some(encoded));
        }
        Value::Object(fields) => {
            let pairs = form_pairs(QUERY, fields)?;
            url.set_query(None);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }
        Value::Null => {}
        _ => return Err(Error::invalid_option(QUERY, "expected an object or a string")),
    }
    Ok(())
}

/// Flatten a field map into name/value pairs; arrays repeat the name.
fn form_pairs(key: &str, fields: &Map<String, Value>) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (name, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((name.clone(), scalar_string(key, item)?));
                }
            }
            other => pairs.push((name.clone(), scalar_string(key, other)?)),
        }
    }
    Ok(pairs)
}

fn encode_form(key: &str, fields: &Map<String, Value>) -> Result<Vec<u8>> {
    let pairs = form_pairs(key, fields)?;
    Ok(url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
        .into_bytes())
}

fn scalar_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => {
            Err(Error::invalid_option(key, "nested values are not supported"))
        }
    }
}

fn header_entries(value: &Value) -> Result<Vec<(String, String)>> {
    let Value::Object(map) = value else {
        return Err(Error::invalid_option(HEADERS, "expected an object of header values"));
    };
    let mut entries = Vec::new();
    for (name, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    entries.push((name.clone(), scalar_string(HEADERS, item)?));
                }
            }
            other => entries.push((name.clone(), scalar_string(HEADERS, other)?)),
        }
    }
    Ok(entries)
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn put_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

fn default_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if find_header(headers, name).is_none() {
        headers.push((name.to_string(), value.to_string()));
    }
}

fn apply_auth(headers: &mut Vec<(String, String)>, auth: &Value) -> Result<()> {
    if auth.is_null() {
        return Ok(());
    }
    let creds = AuthSpec::from_value(auth).ok_or_else(|| {
        Error::invalid_option(
            AUTH,
            "expected [username, password] or [username, password, method]",
        )
    })?;
    match creds.method.as_deref() {
        None => {}
        Some(method) if method.eq_ignore_ascii_case("basic") => {}
        Some(method) => {
            return Err(Error::invalid_option(
                AUTH,
                format!("unsupported authentication method `{method}`"),
            ));
        }
    }
    let credentials = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", creds.username, creds.password));
    put_header(headers, "Authorization", format!("Basic {credentials}"));
    Ok(())
}

fn prepare_body(
    headers: &mut Vec<(String, String)>,
    options: &OptionMap,
) -> Result<Option<Vec<u8>>> {
    if let Some(parts) = options.get(MULTIPART) {
        let encoded = multipart::encode(parts)?;
        put_header(headers, "Content-Type", encoded.content_type());
        return Ok(Some(encoded.bytes));
    }
    if let Some(fields) = options.get(FORM_PARAMS) {
        let Value::Object(fields) = fields else {
            return Err(Error::invalid_option(FORM_PARAMS, "expected an object of fields"));
        };
        default_header(headers, "Content-Type", FORM_CONTENT_TYPE);
        return encode_form(FORM_PARAMS, fields).map(Some);
    }
    if let Some(json) = options.get(JSON) {
        default_header(headers, "Content-Type", JSON_CONTENT_TYPE);
        return Ok(Some(json.to_string().into_bytes()));
    }
    match options.get(BODY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw.clone().into_bytes())),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => {
            Ok(Some(value.to_string().into_bytes()))
        }
        Some(structured) => encode_structured_body(headers, structured).map(Some),
    }
}

/// Encode a map or array stored under `body` according to Content-Type.
fn encode_structured_body(headers: &mut Vec<(String, String)>, body: &Value) -> Result<Vec<u8>> {
    let content_type = find_header(headers, "Content-Type")
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if content_type.starts_with(MULTIPART_CONTENT_TYPE) {
        let encoded = multipart::encode(body)?;
        put_header(headers, "Content-Type", encoded.content_type());
        return Ok(encoded.bytes);
    }
    if content_type.starts_with(JSON_CONTENT_TYPE) {
        return Ok(body.to_string().into_bytes());
    }
    if content_type.starts_with(FORM_CONTENT_TYPE) {
        let Value::Object(fields) = body else {
            return Err(Error::invalid_option(BODY, "form bodies must be objects"));
        };
        return encode_form(BODY, fields);
    }
    Err(Error::invalid_option(
        BODY,
        "a structured body needs a form, JSON or multipart Content-Type header",
    ))
}

fn bool_option(options: &OptionMap, key: &str, default: bool) -> Result<bool> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(Error::invalid_option(key, "expected a boolean")),
    }
}

/// Interpret a timeout option given in (possibly fractional) seconds.
pub(crate) fn parse_timeout(key: &str, value: &Value) -> Result<Duration> {
    let secs = value
        .as_f64()
        .ok_or_else(|| Error::invalid_option(key, "expected a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| Error::invalid_option(key, e.to_string()))
}
