//! Inbound request view and token lookup.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;
use url::form_urlencoded;

/// Largest body the extractor buffers.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The parts of an HTTP request a token can be read from.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Structured body (JSON, or a urlencoded form as a flat object)
    pub body: Option<Value>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

impl InboundRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Build from request parts and a buffered body.
    ///
    /// The body is read as JSON or as a urlencoded form depending on the
    /// content type; anything else, or anything unparseable, leaves it empty.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        let mut query = HashMap::new();
        if let Some(raw) = parts.uri.query() {
            for (key, value) in form_urlencoded::parse(raw.as_bytes()).into_owned() {
                query.entry(key).or_insert(value);
            }
        }

        Self {
            body: parse_body(&parts.headers, body),
            query,
            headers: parts.headers.clone(),
        }
    }
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }

    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/json" => match serde_json::from_slice(body) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring unparseable JSON body: {}", e);
                None
            }
        },
        "application/x-www-form-urlencoded" => {
            let mut form = Map::new();
            for (key, value) in form_urlencoded::parse(body).into_owned() {
                form.entry(key).or_insert(Value::String(value));
            }
            Some(Value::Object(form))
        }
        _ => None,
    }
}

impl<S> FromRequest<S> for InboundRequest
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes: Bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read request body: {}", e),
                )
            })?;

        Ok(Self::from_parts(&parts, &bytes))
    }
}

/// Where a token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Body,
    Query,
    Header,
}

/// Reads one named field from one part of the request.
pub type TokenAccessor = fn(&InboundRequest, &str) -> Option<String>;

/// Lookup order: body, then query string, then headers.
pub const LOOKUP_ORDER: [(TokenSource, TokenAccessor); 3] = [
    (TokenSource::Body, body_field),
    (TokenSource::Query, query_field),
    (TokenSource::Header, header_field),
];

fn body_field(request: &InboundRequest, field: &str) -> Option<String> {
    match request.body.as_ref()?.get(field)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn query_field(request: &InboundRequest, field: &str) -> Option<String> {
    request.query.get(field).cloned()
}

fn header_field(request: &InboundRequest, field: &str) -> Option<String> {
    request
        .headers
        .get(field)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Return the first non-empty value of `field`, with the location it came
/// from. No format validation happens here.
pub fn locate_token(request: &InboundRequest, field: &str) -> Option<(TokenSource, String)> {
    LOOKUP_ORDER.iter().find_map(|(source, accessor)| {
        accessor(request, field)
            .filter(|value| !value.is_empty())
            .map(|value| (*source, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    fn header(value: &'static str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("id_token"),
            HeaderValue::from_static(value),
        )
    }

    #[test]
    fn test_body_wins_over_query_and_headers() {
        let (name, value) = header("from-header");
        let request = InboundRequest::new()
            .with_body(json!({"id_token": "from-body"}))
            .with_query("id_token", "from-query")
            .with_header(name, value);

        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Body, "from-body".to_string()))
        );
    }

    #[test]
    fn test_query_wins_over_headers() {
        let (name, value) = header("from-header");
        let request = InboundRequest::new()
            .with_query("id_token", "from-query")
            .with_header(name, value);

        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Query, "from-query".to_string()))
        );
    }

    #[test]
    fn test_header_fallback() {
        let (name, value) = header("from-header");
        let request = InboundRequest::new().with_header(name, value);

        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Header, "from-header".to_string()))
        );
    }

    #[test]
    fn test_empty_values_fall_through() {
        let (name, value) = header("from-header");
        let request = InboundRequest::new()
            .with_body(json!({"id_token": ""}))
            .with_query("id_token", "")
            .with_header(name, value);

        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Header, "from-header".to_string()))
        );
    }

    #[test]
    fn test_missing_everywhere() {
        let request = InboundRequest::new()
            .with_body(json!({"other": "value", "id_token": null}))
            .with_query("access_token", "abc");

        assert_eq!(locate_token(&request, "id_token"), None);
    }

    #[test]
    fn test_body_scalar_values() {
        let request = InboundRequest::new().with_body(json!({"id_token": 12345}));
        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Body, "12345".to_string()))
        );

        let request = InboundRequest::new().with_body(json!({"id_token": {"nested": "x"}}));
        assert_eq!(locate_token(&request, "id_token"), None);
    }

    #[test]
    fn test_malformed_values_pass_through() {
        let request = InboundRequest::new().with_query("id_token", "not a jwt at all");
        assert_eq!(
            locate_token(&request, "id_token").map(|(_, token)| token),
            Some("not a jwt at all".to_string())
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = InboundRequest::new().with_header(
            HeaderName::from_static("x-id-token"),
            HeaderValue::from_static("abc"),
        );
        assert_eq!(
            locate_token(&request, "X-ID-Token"),
            Some((TokenSource::Header, "abc".to_string()))
        );
    }

    #[test]
    fn test_from_parts_json_body() {
        let (parts, _) = http::Request::builder()
            .method("POST")
            .uri("/auth?id_token=from-query&id_token=second")
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(())
            .unwrap()
            .into_parts();

        let request = InboundRequest::from_parts(&parts, br#"{"id_token": "from-body"}"#);
        assert_eq!(request.query.get("id_token").unwrap(), "from-query");
        assert_eq!(request.body, Some(json!({"id_token": "from-body"})));
    }

    #[test]
    fn test_from_parts_form_body() {
        let (parts, _) = http::Request::builder()
            .method("POST")
            .uri("/auth")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();

        let request = InboundRequest::from_parts(&parts, b"id_token=abc.def.ghi&remember=1");
        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Body, "abc.def.ghi".to_string()))
        );
    }

    #[test]
    fn test_from_parts_unparseable_body_is_absent() {
        let (parts, _) = http::Request::builder()
            .method("POST")
            .uri("/auth?id_token=from-query")
            .header(CONTENT_TYPE, "application/json")
            .body(())
            .unwrap()
            .into_parts();

        let request = InboundRequest::from_parts(&parts, b"{not json");
        assert!(request.body.is_none());
        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Query, "from-query".to_string()))
        );
    }

    #[tokio::test]
    async fn test_axum_extractor() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/auth")
            .header(CONTENT_TYPE, "application/json")
            .header("id_token", "from-header")
            .body(Body::from(r#"{"id_token": "from-body"}"#))
            .unwrap();

        let request = InboundRequest::from_request(req, &()).await.unwrap();
        assert_eq!(
            locate_token(&request, "id_token"),
            Some((TokenSource::Body, "from-body".to_string()))
        );
        assert_eq!(request.headers.get("id_token").unwrap(), "from-header");
    }
}
