//! The option-bag handler.
//!
//! # Design
//! `Handler` owns two option bags: client options, fixed at construction,
//! and request options, which callers mutate between requests. Every request
//! reads the current request options in full; there is no per-call override.
//! Mutators take `&mut self` and requests take `&self`, so option changes and
//! request execution can never interleave on one handler.

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::options::{
    AuthSpec, OptionMap, AUTH, BASE_URI, BODY, FORM_PARAMS, HEADERS, JSON, MULTIPART,
};
use crate::response::{self, BodyFormat, HttpResponse, ResolvedBody};
use crate::transport::{BodyStyle, Transport, UreqTransport};

/// Mutable request configuration plus a transport to send it with.
#[derive(Debug, Clone)]
pub struct Handler<T = UreqTransport> {
    client_options: OptionMap,
    request_options: OptionMap,
    client: T,
}

impl Handler<UreqTransport> {
    /// Build a handler whose transport is a `UreqTransport` configured from
    /// `client_options`.
    pub fn new(client_options: OptionMap, request_options: OptionMap) -> Result<Self> {
        let client = UreqTransport::new(&client_options)?;
        Self::with_transport(client_options, request_options, client)
    }
}

impl<T: Transport> Handler<T> {
    pub fn with_transport(
        client_options: OptionMap,
        request_options: OptionMap,
        client: T,
    ) -> Result<Self> {
        if let Some(Value::String(base)) = client_options.get(BASE_URI) {
            if !base.is_empty() {
                Url::parse(base).map_err(|source| Error::InvalidUri {
                    uri: base.clone(),
                    source,
                })?;
            }
        }
        Ok(Self {
            client_options,
            request_options,
            client,
        })
    }

    pub fn client(&self) -> &T {
        &self.client
    }

    pub fn client_options(&self) -> &OptionMap {
        &self.client_options
    }

    pub fn request_options(&self) -> &OptionMap {
        &self.request_options
    }

    pub fn set_request_option(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.request_options.insert(key.into(), value.into());
    }

    /// Upsert every entry of `options`, in iteration order.
    pub fn set_request_option_array<I, K, V>(&mut self, options: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in options {
            self.set_request_option(key, value);
        }
    }

    /// Returns whether `key` was present.
    pub fn clear_request_option(&mut self, key: &str) -> bool {
        self.request_options.remove(key).is_some()
    }

    /// Set a request header. An existing header with the same key is only
    /// overwritten when `replace` is true.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<Value>, replace: bool) {
        if !matches!(self.request_options.get(HEADERS), Some(Value::Object(_))) {
            self.request_options.insert(HEADERS.to_string(), Value::Object(Map::new()));
        }
        if let Some(Value::Object(headers)) = self.request_options.get_mut(HEADERS) {
            let key = key.into();
            if replace || !headers.contains_key(&key) {
                headers.insert(key, value.into());
            }
        }
    }

    /// Returns whether the header existed.
    pub fn clear_header(&mut self, key: &str) -> bool {
        match self.request_options.get_mut(HEADERS) {
            Some(Value::Object(headers)) => headers.remove(key).is_some(),
            _ => false,
        }
    }

    /// Returns whether a headers map existed.
    pub fn clear_all_headers(&mut self) -> bool {
        self.clear_request_option(HEADERS)
    }

    pub fn set_auth(&mut self, username: &str, password: &str, method: Option<&str>) {
        let auth = AuthSpec::new(username, password, method);
        self.request_options.insert(AUTH.to_string(), auth.to_value());
    }

    pub fn clear_auth(&mut self) -> bool {
        self.clear_request_option(AUTH)
    }

    pub fn set_body(&mut self, data: impl Into<Value>) {
        self.set_request_option(BODY, data);
    }

    pub fn set_form_body(&mut self, data: impl Into<Value>) {
        self.set_structured_body(FORM_PARAMS, "application/x-www-form-urlencoded", data.into());
    }

    pub fn set_json_body(&mut self, data: impl Into<Value>) {
        self.set_structured_body(JSON, "application/json", data.into());
    }

    pub fn set_multipart_body(&mut self, data: impl Into<Value>) {
        self.set_structured_body(MULTIPART, "multipart/form-data", data.into());
    }

    fn set_structured_body(&mut self, key: &str, content_type: &str, data: Value) {
        match self.client.body_style() {
            BodyStyle::Keyed => self.set_request_option(key, data),
            BodyStyle::Raw => {
                self.set_header("Content-Type", content_type, false);
                self.set_body(data);
            }
        }
    }

    /// Send a request with the current request options.
    pub fn request(&self, method: HttpMethod, uri: &str) -> Result<HttpResponse> {
        let request =
            HttpRequest::prepare(method, uri, &self.client_options, &self.request_options)?;
        let response = self.client.send(&request)?;
        if request.http_errors && response.status >= 400 {
            debug!(
                status = response.status,
                url = %request.url,
                "request failed with error status"
            );
            return Err(Error::Status {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(response)
    }

    /// Send a request whose method is given by name, e.g. `"purge"`.
    ///
    /// Only the first argument is used, as the URI.
    pub fn dispatch(&self, name: &str, args: &[&str]) -> Result<HttpResponse> {
        let method = HttpMethod::parse(name).ok_or_else(|| Error::InvalidCall {
            name: name.to_string(),
            reason: "not a valid HTTP method".to_string(),
        })?;
        let uri = args.first().ok_or_else(|| Error::InvalidCall {
            name: name.to_string(),
            reason: "a URI argument is required".to_string(),
        })?;
        self.request(method, uri)
    }

    pub fn get(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Get, uri)
    }

    pub fn post(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Post, uri)
    }

    pub fn put(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Put, uri)
    }

    pub fn patch(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Patch, uri)
    }

    pub fn delete(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Delete, uri)
    }

    pub fn head(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Head, uri)
    }

    pub fn options(&self, uri: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Options, uri)
    }

    pub fn resolve_response_body(
        &self,
        response: &HttpResponse,
        format: Option<BodyFormat>,
    ) -> Result<ResolvedBody> {
        response::resolve_response_body(response, format)
    }
}
