//! Request data that takes part in cache key derivation.

use axum::extract::MatchedPath;
use axum::http::request::Parts;
use tracing::warn;
use url::form_urlencoded;

/// Header listing the fields requested by the client, comma separated.
pub const FIELDS_HEADER: &str = "fields";

/// Query parameters in the order the request carried them.
///
/// A name repeated in the query string keeps its first position and collects
/// its values joined by `,`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a raw (still percent-encoded) query string.
    pub fn parse(raw: &str) -> Self {
        form_urlencoded::parse(raw.as_bytes())
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => {
                values.push(',');
                values.push_str(&value);
            }
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for QueryParams
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut params = Self::default();
        for (name, value) in iter {
            params.push(name, value);
        }
        params
    }
}

/// The parts of a request the cache reads.
///
/// `method` and `path` only name the route in configuration errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: QueryParams,
    pub fields: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Capture the context of an incoming request.
    ///
    /// The route pattern is preferred over the concrete path when the router
    /// recorded one. Repeated `fields` headers are joined with `", "`.
    pub fn from_parts(parts: &Parts) -> Self {
        let path = parts
            .extensions
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_else(|| parts.uri.path().to_owned());

        let query = parts.uri.query().map(QueryParams::parse).unwrap_or_default();

        let fields: Vec<String> = parts
            .headers
            .get_all(FIELDS_HEADER)
            .iter()
            .map(|value| match value.to_str() {
                Ok(text) => text.to_owned(),
                Err(_) => {
                    warn!(path = %path, "Non UTF-8 fields header decoded lossily");
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                }
            })
            .collect();

        Self {
            method: parts.method.as_str().to_owned(),
            path,
            query,
            fields: (!fields.is_empty()).then(|| fields.join(", ")),
        }
    }

    /// `METHOD /path`, used to name the route in error messages.
    pub fn route_label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_parse_keeps_request_order() {
        let query = QueryParams::parse("search=username_1&page=2&limit=10");
        let pairs: Vec<_> = query.iter().collect();
        assert_eq!(
            pairs,
            vec![("search", "username_1"), ("page", "2"), ("limit", "10")]
        );
    }

    #[test]
    fn test_parse_decodes_values() {
        let query = QueryParams::parse("search=john%20doe&tag=a+b");
        assert_eq!(query.get("search"), Some("john doe"));
        assert_eq!(query.get("tag"), Some("a b"));
    }

    #[test]
    fn test_repeated_names_are_merged() {
        let query = QueryParams::parse("id=1&sort=name&id=2");
        let pairs: Vec<_> = query.iter().collect();
        assert_eq!(pairs, vec![("id", "1,2"), ("sort", "name")]);
    }

    #[test]
    fn test_from_parts() {
        let parts = parts(
            Request::builder()
                .method("GET")
                .uri("/users?search=username_1")
                .header(FIELDS_HEADER, "id, username")
                .body(())
                .unwrap(),
        );

        let ctx = RequestContext::from_parts(&parts);
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.path, "/users");
        assert_eq!(ctx.query.get("search"), Some("username_1"));
        assert_eq!(ctx.fields.as_deref(), Some("id, username"));
    }

    #[test]
    fn test_non_utf8_fields_header_still_keys_the_request() {
        let value = HeaderValue::from_bytes(b"id, na\xffme").unwrap();
        let parts = parts(
            Request::builder()
                .uri("/users")
                .header(FIELDS_HEADER, value)
                .body(())
                .unwrap(),
        );

        let ctx = RequestContext::from_parts(&parts);
        assert_eq!(ctx.fields.as_deref(), Some("id, na\u{FFFD}me"));
    }

    #[test]
    fn test_from_parts_without_query_or_fields() {
        let parts = parts(Request::builder().uri("/users").body(()).unwrap());
        let ctx = RequestContext::from_parts(&parts);
        assert!(ctx.query.is_empty());
        assert_eq!(ctx.fields, None);
    }

    #[test]
    fn test_route_label_uppercases_method() {
        assert_eq!(
            RequestContext::new("post", "/user-clear").route_label(),
            "POST /user-clear"
        );
    }
}
