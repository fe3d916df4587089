//! The response envelope and its content-type writers.
//!
//! One [`Response`] exists per request. Middleware and the terminal resolver
//! mutate it in place; the transport reads it once at the end.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::config::BodyKeys;
use crate::error::Error;
use crate::status::{self, StatusType};

// ── ContentKind ───────────────────────────────────────────────────────────────

/// Registered response writers.
///
/// Resolved once from [`Settings::response_type`](crate::Settings) at startup.
/// Names that are not registered deserialize to [`ContentKind::Unknown`], whose
/// content type is the literal `unknown`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Api,     // application/json, wrapped in { data, meta, status }
    Atom,    // application/atom+xml
    Css,     // text/css
    Html,    // text/html; charset=UTF-8
    Jpeg,    // image/jpeg
    Json,    // application/json
    Pdf,     // application/pdf
    Plain,   // text/plain
    Rss,     // application/rss+xml; charset=ISO-8859-1
    Xml,     // text/xml
    #[serde(other)]
    Unknown, // unknown
}

impl ContentKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "api"   => Self::Api,
            "atom"  => Self::Atom,
            "css"   => Self::Css,
            "html"  => Self::Html,
            "jpeg"  => Self::Jpeg,
            "json"  => Self::Json,
            "pdf"   => Self::Pdf,
            "plain" => Self::Plain,
            "rss"   => Self::Rss,
            "xml"   => Self::Xml,
            _       => Self::Unknown,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Api | Self::Json => "application/json",
            Self::Atom    => "application/atom+xml",
            Self::Css     => "text/css",
            Self::Html    => "text/html; charset=UTF-8",
            Self::Jpeg    => "image/jpeg",
            Self::Pdf     => "application/pdf",
            Self::Plain   => "text/plain",
            Self::Rss     => "application/rss+xml; charset=ISO-8859-1",
            Self::Xml     => "text/xml",
            Self::Unknown => "unknown",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The HTTP response envelope.
///
/// Header names are stored lowercased. [`Response::header`] replaces every
/// value of a name; [`Response::add_header`] appends one. Values of the same
/// name are joined with `,` when the envelope is emitted.
///
/// ```rust
/// use kiln::Response;
/// use serde_json::json;
///
/// let mut res = Response::new();
/// res.json(&json!({ "id": 42 }), Some(201)).header("Location", "/users/42");
///
/// assert_eq!(res.status_code(), 201);
/// assert_eq!(res.header_line("location").as_deref(), Some("/users/42"));
/// assert!(res.is_success());
/// ```
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(String, Vec<String>)>,
    body: Vec<u8>,
    error: Option<Arc<Error>>,
}

impl Default for Response {
    fn default() -> Self {
        Self { status: 200, headers: Vec::new(), body: Vec::new(), error: None }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    // ── headers ──────────────────────────────────────────────────────────────

    /// Sets `name` to exactly `value`, dropping previous values.
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => *values = vec![value],
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    /// Appends `value` to `name`, keeping previous values.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => values.push(value),
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    /// Case-insensitive lookup; multiple values are joined with `,`.
    pub fn header_line(&self, name: &str) -> Option<String> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.join(","))
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Headers in insertion order, multi-values joined with `,`.
    pub fn headers(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.headers.iter().map(|(k, values)| (k.as_str(), values.join(",")))
    }

    // ── body ─────────────────────────────────────────────────────────────────

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Appends bytes to the body.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(bytes.as_ref());
        self
    }

    /// Replaces the whole body.
    pub fn set_body(&mut self, body: Vec<u8>) -> &mut Self {
        self.body = body;
        self
    }

    pub fn clear_body(&mut self) -> &mut Self {
        self.body.clear();
        self
    }

    // ── error and classification ─────────────────────────────────────────────

    pub fn error(&self) -> Option<&Arc<Error>> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: Arc<Error>) -> &mut Self {
        self.error = Some(error);
        self
    }

    pub fn status_type(&self) -> StatusType {
        StatusType::of(self.status)
    }

    /// `false` whenever an error is attached, whatever the status says.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_type() == StatusType::Success
    }

    pub fn is_fail(&self) -> bool {
        self.status_type() == StatusType::Fail
    }

    pub fn is_error(&self) -> bool {
        self.status_type() == StatusType::Error
    }

    // ── writers ──────────────────────────────────────────────────────────────

    /// Generic writer: appends `content` serialized for `kind`, sets the
    /// content type, and applies `status` when one is given.
    ///
    /// Strings, numbers, and booleans are written as their text form, `null`
    /// as nothing, arrays and objects as JSON.
    pub fn write_as(&mut self, kind: ContentKind, content: &Value, status: Option<u16>) -> &mut Self {
        let text = to_text(content);
        self.write(text.as_bytes());
        self.header("content-type", kind.mime());
        if let Some(code) = status {
            self.status = code;
        }
        self
    }

    pub fn json(&mut self, content: &Value, status: Option<u16>) -> &mut Self {
        self.write_as(ContentKind::Json, content, status)
    }

    pub fn html(&mut self, content: &Value, status: Option<u16>) -> &mut Self {
        self.write_as(ContentKind::Html, content, status)
    }

    pub fn xml(&mut self, content: &Value, status: Option<u16>) -> &mut Self {
        self.write_as(ContentKind::Xml, content, status)
    }

    pub fn plain(&mut self, content: &Value, status: Option<u16>) -> &mut Self {
        self.write_as(ContentKind::Plain, content, status)
    }

    /// JSON body wrapped as `{ <body>: data, <meta>: meta, <status>: { code, phrase, type } }`.
    pub fn api(&mut self, data: Value, status: Option<u16>, meta: Value, keys: &BodyKeys) -> &mut Self {
        let code = status.unwrap_or(self.status);
        let mut body = Map::new();
        body.insert(keys.body.clone(), data);
        body.insert(keys.meta.clone(), meta);
        body.insert(keys.status.clone(), json!({
            "code": code,
            "phrase": status::phrase(code),
            "type": StatusType::of(code),
        }));
        self.json(&Value::Object(body), status)
    }

    /// Dispatches to the writer registered for `kind`.
    pub fn render(
        &mut self,
        kind: ContentKind,
        content: Value,
        status: u16,
        meta: Value,
        keys: &BodyKeys,
    ) -> &mut Self {
        match kind {
            ContentKind::Api => self.api(content, Some(status), meta, keys),
            other => self.write_as(other, &content, Some(status)),
        }
    }

    /// Sets `property` inside the body's meta object.
    ///
    /// No-op unless the body is a JSON object that already has an object
    /// under `meta_key`. Applying it twice overwrites the same field.
    pub fn meta(&mut self, property: &str, value: Value, meta_key: &str) -> &mut Self {
        let Ok(Value::Object(mut contents)) = serde_json::from_slice::<Value>(&self.body) else {
            return self;
        };
        let Some(Value::Object(meta)) = contents.get_mut(meta_key) else {
            return self;
        };
        meta.insert(property.to_owned(), value);
        match serde_json::to_vec(&Value::Object(contents)) {
            Ok(body) => self.body = body,
            Err(e) => warn!("re-encoding body after meta update failed: {e}"),
        }
        self
    }

    // ── fallback merge and emission ──────────────────────────────────────────

    /// Takes status, headers, and body from `fallback`.
    ///
    /// Headers `fallback` does not set are kept.
    pub fn merge(&mut self, fallback: Response) -> &mut Self {
        self.status = fallback.status;
        for (name, values) in fallback.headers {
            match self.headers.iter_mut().find(|(k, _)| *k == name) {
                Some((_, existing)) => *existing = values,
                None => self.headers.push((name, values)),
            }
        }
        self.body = fallback.body;
        self
    }

    /// Converts into the `http` type hyper emits.
    ///
    /// Header names or values that are not valid on the wire are dropped with
    /// a warning; an out-of-range status becomes `500`.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = http::StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            warn!(status = self.status, "status out of range, sending 500");
            http::StatusCode::INTERNAL_SERVER_ERROR
        });
        for (name, values) in self.headers {
            let value = values.join(",");
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(n), Ok(v)) => {
                    res.headers_mut().insert(n, v);
                }
                _ => warn!(header = %name, "dropping header that is not valid on the wire"),
            }
        }
        res
    }
}

fn to_text(content: &Value) -> Cow<'_, str> {
    match content {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}
