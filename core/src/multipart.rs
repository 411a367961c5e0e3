//! `multipart/form-data` body encoding.
//!
//! Parts are described as JSON so they can live in the option bag:
//! either an array of `{ "name", "contents", "filename"?, "headers"? }`
//! objects, or a flat object mapping field names to contents. The framing
//! itself is written by `ureq`'s multipart form; this module only maps the
//! JSON description onto form parts.

use std::io::Read;

use serde_json::Value;
use ureq::unversioned::multipart::{Form, Part as FormPart};

use crate::error::{Error, Result};
use crate::options::MULTIPART;

const OCTET_STREAM: &str = "application/octet-stream";

/// An encoded multipart body and the boundary it was written with.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

struct Part {
    name: String,
    contents: Vec<u8>,
    filename: Option<String>,
    content_type: Option<String>,
}

/// Encode `parts` with a freshly generated boundary.
pub fn encode(parts: &Value) -> Result<MultipartBody> {
    let parts = collect_parts(parts)?;

    let mut form = Form::new();
    for part in &parts {
        let mut field = FormPart::bytes(&part.contents);
        if let Some(filename) = &part.filename {
            field = field.file_name(filename);
        }
        let mime = match (&part.content_type, &part.filename) {
            (Some(content_type), _) => Some(content_type.as_str()),
            (None, Some(_)) => Some(OCTET_STREAM),
            (None, None) => None,
        };
        if let Some(mime) = mime {
            field = field.mime_str(mime).map_err(|err| {
                Error::invalid_option(MULTIPART, format!("part `{}`: {err}", part.name))
            })?;
        }
        form = form.part(&part.name, field);
    }

    let boundary = form.boundary().to_string();
    let mut bytes = Vec::new();
    form.read_to_end(&mut bytes)?;
    Ok(MultipartBody { boundary, bytes })
}

fn collect_parts(parts: &Value) -> Result<Vec<Part>> {
    match parts {
        Value::Array(items) => items.iter().map(part_from_object).collect(),
        Value::Object(fields) => fields
            .iter()
            .map(|(name, contents)| {
                Ok(Part {
                    name: escape(name),
                    contents: scalar_string(contents)?.into_bytes(),
                    filename: None,
                    content_type: None,
                })
            })
            .collect(),
        _ => Err(Error::invalid_option(
            MULTIPART,
            "expected an array of parts or an object of fields",
        )),
    }
}

fn part_from_object(item: &Value) -> Result<Part> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_option(MULTIPART, "every part needs a string `name`"))?;
    let contents = item.get("contents").ok_or_else(|| {
        Error::invalid_option(MULTIPART, format!("part `{name}` has no `contents`"))
    })?;
    Ok(Part {
        name: escape(name),
        contents: scalar_string(contents)?.into_bytes(),
        filename: item.get("filename").and_then(Value::as_str).map(escape),
        content_type: part_content_type(name, item.get("headers"))?,
    })
}

/// Only `Content-Type` can be set per part; values must stay on one line.
fn part_content_type(name: &str, headers: Option<&Value>) -> Result<Option<String>> {
    let map = match headers {
        None => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::invalid_option(
                MULTIPART,
                format!("headers of part `{name}` must be an object"),
            ));
        }
    };

    let mut content_type = None;
    for (key, value) in map {
        let value = scalar_string(value)?;
        if key.contains(['\r', '\n']) || value.contains(['\r', '\n']) {
            return Err(Error::invalid_option(
                MULTIPART,
                format!("a header of part `{name}` contains a line break"),
            ));
        }
        if !key.eq_ignore_ascii_case("content-type") {
            return Err(Error::invalid_option(
                MULTIPART,
                format!("part `{name}` sets `{key}`; only Content-Type is supported"),
            ));
        }
        content_type = Some(value);
    }
    Ok(content_type)
}

fn scalar_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => {
            Err(Error::invalid_option(MULTIPART, "part contents must be a scalar"))
        }
    }
}

// Names and filenames sit inside a quoted Content-Disposition parameter.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_of(body: &MultipartBody) -> String {
        String::from_utf8(body.bytes.clone()).unwrap()
    }

    #[test]
    fn encodes_named_parts() {
        let parts = json!([
            {"name": "field", "contents": "value"},
            {"name": "upload", "contents": "data", "filename": "a.txt"}
        ]);
        let body = encode(&parts).unwrap();
        let text = text_of(&body);

        assert!(text.starts_with(&format!("--{}\r\n", body.boundary)));
        assert!(text.ends_with(&format!("\r\n--{}--\r\n", body.boundary)));
        assert!(text.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
        assert!(text.contains(
            "Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             data\r\n"
        ));
    }

    #[test]
    fn part_content_type_replaces_default() {
        let parts = json!([{
            "name": "doc",
            "contents": "{}",
            "filename": "d.json",
            "headers": {"content-type": "application/json"}
        }]);
        let text = text_of(&encode(&parts).unwrap());
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(!text.contains(OCTET_STREAM));
    }

    #[test]
    fn flat_object_becomes_one_part_per_field() {
        let text = text_of(&encode(&json!({"a": 1, "b": true})).unwrap());
        assert!(text.contains("name=\"a\"\r\n\r\n1\r\n"));
        assert!(text.contains("name=\"b\"\r\n\r\ntrue\r\n"));
    }

    #[test]
    fn content_type_carries_boundary() {
        let body = encode(&json!([])).unwrap();
        assert!(!body.boundary.is_empty());
        assert_eq!(
            body.content_type(),
            format!("multipart/form-data; boundary={}", body.boundary)
        );
    }

    #[test]
    fn quotes_and_line_breaks_in_names_are_escaped() {
        let parts = json!([
            {"name": "a\"b", "contents": "x", "filename": "evil\r\nX-Injected: 1.txt"}
        ]);
        let text = text_of(&encode(&parts).unwrap());
        assert!(text.contains("name=\"a%22b\"; filename=\"evil%0D%0AX-Injected: 1.txt\""));
        assert!(!text.contains("\r\nX-Injected"));
    }

    #[test]
    fn line_break_in_part_header_is_rejected() {
        let parts = json!([{
            "name": "doc",
            "contents": "x",
            "headers": {"Content-Type": "text/plain\r\nX-Injected: 1"}
        }]);
        let err = encode(&parts).unwrap_err();
        assert!(
            matches!(err, Error::InvalidOption { ref reason, .. } if reason.contains("line break"))
        );
    }

    #[test]
    fn headers_other_than_content_type_are_rejected() {
        let parts = json!([{"name": "doc", "contents": "x", "headers": {"X-Trace": "1"}}]);
        let err = encode(&parts).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { ref key, .. } if key == MULTIPART));
    }

    #[test]
    fn unparsable_part_content_type_is_rejected() {
        let parts = json!([{"name": "doc", "contents": "x", "headers": {"Content-Type": "nope"}}]);
        let err = encode(&parts).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = encode(&json!([{"contents": "x"}])).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }

    #[test]
    fn nested_contents_are_rejected() {
        let err = encode(&json!([{"name": "x", "contents": {"nested": 1}}])).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }
}
