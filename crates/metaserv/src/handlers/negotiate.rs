//! Response representation chosen from the `Accept` header.
//!
//! Resources are built as JSON values and rendered as JSON, a small HTML
//! page, or indented plain text. Errors go through the same rendering so a
//! browser asking for HTML gets an HTML error page.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

/// Supported response media types, in server preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    #[default]
    Json,
    Html,
    Plain,
}

impl Representation {
    const ALL: [Representation; 3] = [
        Representation::Json,
        Representation::Html,
        Representation::Plain,
    ];

    pub fn media_type(&self) -> &'static str {
        match self {
            Representation::Json => "application/json",
            Representation::Html => "text/html",
            Representation::Plain => "text/plain",
        }
    }

    /// Pick the representation with the highest q-value. No header, or
    /// nothing acceptable, means JSON.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return Representation::Json;
        };
        let ranges: Vec<MediaRange> = accept.split(',').filter_map(MediaRange::parse).collect();
        if ranges.is_empty() {
            return Representation::Json;
        }

        let mut best = (Representation::Json, 0.0_f32);
        for repr in Self::ALL {
            let q = quality(&ranges, repr.media_type());
            if q > best.1 {
                best = (repr, q);
            }
        }
        best.0
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_accept(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()))
    }

    /// Wrap a list as `{"results": [...]}`.
    pub fn results<T: Serialize>(self, result: AppResult<Vec<T>>) -> Reply {
        self.wrap("results", result)
    }

    /// Wrap one resource as `{"result": {...}}`.
    pub fn result<T: Serialize>(self, result: AppResult<T>) -> Reply {
        self.wrap("result", result)
    }

    pub fn error(self, err: AppError) -> Reply {
        let (status, message) = err.status_and_message();
        Reply {
            repr: self,
            status,
            body: json!({ "error": message, "status": status.as_u16() }),
        }
    }

    fn wrap<T: Serialize>(self, key: &str, result: AppResult<T>) -> Reply {
        let value = result.and_then(|v| {
            serde_json::to_value(v).map_err(|e| AppError::Internal(e.to_string()))
        });
        match value {
            Ok(value) => {
                let mut body = serde_json::Map::new();
                body.insert(key.to_string(), value);
                Reply {
                    repr: self,
                    status: StatusCode::OK,
                    body: Value::Object(body),
                }
            }
            Err(err) => self.error(err),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Representation {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Representation::from_headers(&parts.headers))
    }
}

struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
}

impl MediaRange {
    fn parse(item: &str) -> Option<Self> {
        let mut parts = item.split(';');
        let (kind, subtype) = parts.next()?.trim().split_once('/')?;
        let mut q = 1.0;
        for param in parts {
            if let Some((name, value)) = param.split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse::<f32>().ok()?.clamp(0.0, 1.0);
                }
            }
        }
        Some(MediaRange {
            kind: kind.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
            q,
        })
    }

    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`.
    fn specificity(&self, kind: &str, subtype: &str) -> Option<u8> {
        match (self.kind.as_str(), self.subtype.as_str()) {
            (k, s) if k == kind && s == subtype => Some(2),
            (k, "*") if k == kind => Some(1),
            ("*", "*") => Some(0),
            _ => None,
        }
    }
}

/// q-value of the most specific range matching `media_type`.
fn quality(ranges: &[MediaRange], media_type: &str) -> f32 {
    let (kind, subtype) = media_type.split_once('/').unwrap_or((media_type, ""));
    ranges
        .iter()
        .filter_map(|r| r.specificity(kind, subtype).map(|s| (s, r.q)))
        .max_by_key(|(s, _)| *s)
        .map_or(0.0, |(_, q)| q)
}

/// A rendered response body.
#[derive(Debug)]
pub struct Reply {
    pub repr: Representation,
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.repr {
            Representation::Json => (self.status, Json(self.body)).into_response(),
            Representation::Html => text_response(
                self.status,
                "text/html; charset=utf-8",
                render_html(&self.body),
            ),
            Representation::Plain => text_response(
                self.status,
                "text/plain; charset=utf-8",
                render_plain(&self.body),
            ),
        }
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        body,
    )
        .into_response()
}

/// Render a JSON value as a minimal HTML page.
pub fn render_html(value: &Value) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>metaserv</title></head><body>\n",
    );
    html_value(value, None, &mut out);
    out.push_str("\n</body></html>\n");
    out
}

fn html_value(value: &Value, key: Option<&str>, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push_str("<dl>");
            for (k, v) in map {
                out.push_str("<dt>");
                out.push_str(&escape_html(k));
                out.push_str("</dt><dd>");
                html_value(v, Some(k), out);
                out.push_str("</dd>");
            }
            out.push_str("</dl>");
        }
        Value::Array(items) => {
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                html_value(item, None, out);
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        Value::String(s) if key == Some("url") => {
            let escaped = escape_html(s);
            out.push_str(&format!("<a href=\"{0}\">{0}</a>", escaped));
        }
        Value::String(s) => out.push_str(&escape_html(s)),
        Value::Null => {}
        other => out.push_str(&escape_html(&other.to_string())),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render a JSON value as indented `key: value` lines.
pub fn render_plain(value: &Value) -> String {
    let mut out = String::new();
    plain_value(value, 0, &mut out);
    out
}

fn plain_value(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if is_scalar(v) {
                    out.push_str(&format!("{}{}: {}\n", pad, k, scalar_text(v)));
                } else {
                    out.push_str(&format!("{}{}:\n", pad, k));
                    plain_value(v, indent + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if is_scalar(item) {
                    out.push_str(&format!("{}- {}\n", pad, scalar_text(item)));
                } else {
                    out.push_str(&format!("{}-\n", pad));
                    plain_value(item, indent + 1, out);
                }
            }
        }
        scalar => out.push_str(&format!("{}{}\n", pad, scalar_text(scalar))),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_json() {
        assert_eq!(Representation::from_accept(None), Representation::Json);
        assert_eq!(Representation::from_accept(Some("*/*")), Representation::Json);
        assert_eq!(Representation::from_accept(Some("")), Representation::Json);
        assert_eq!(
            Representation::from_accept(Some("image/png")),
            Representation::Json
        );
    }

    #[test]
    fn test_browser_accept_prefers_html() {
        let accept = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
        assert_eq!(Representation::from_accept(Some(accept)), Representation::Html);
    }

    #[test]
    fn test_q_values_are_honored() {
        assert_eq!(
            Representation::from_accept(Some("text/html;q=0.5, text/plain")),
            Representation::Plain
        );
        assert_eq!(
            Representation::from_accept(Some("application/json;q=0.1, text/*;q=0.2")),
            Representation::Html
        );
        assert_eq!(
            Representation::from_accept(Some("text/plain, */*;q=0")),
            Representation::Plain
        );
    }

    #[test]
    fn test_specific_range_overrides_wildcard() {
        assert_eq!(
            Representation::from_accept(Some("*/*;q=0.9, application/json;q=0.1")),
            Representation::Html
        );
    }

    #[test]
    fn test_results_envelope() {
        let reply = Representation::Json.results(Ok(vec!["L1", "L2"]));
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({"results": ["L1", "L2"]}));
    }

    #[test]
    fn test_error_envelope() {
        let reply = Representation::Plain.result::<String>(Err(AppError::NotFound(
            "Database 'x' not found".into(),
        )));
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(
            reply.body,
            json!({"error": "Database 'x' not found", "status": 404})
        );
    }

    #[test]
    fn test_render_html_escapes_and_links() {
        let html = render_html(&json!({"result": {"name": "a<b", "url": "/db/L2"}}));
        assert!(html.contains("a&lt;b"));
        assert!(html.contains("<a href=\"/db/L2\">/db/L2</a>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_render_plain() {
        let text = render_plain(&json!({"results": [{"name": "L2", "url": "/db/L2"}]}));
        assert_eq!(text, "results:\n  -\n    name: L2\n    url: /db/L2\n");
    }
}
