//! Cache key derivation.
//!
//! A key is built from the route's rule, an optional per-call spec (usually a
//! resource id), the query string and the `fields` header:
//!
//! | spec | query/fields        | key                          |
//! |------|---------------------|------------------------------|
//! | -    | -                   | `rule&default`               |
//! | -    | `search=a`          | `rule&search=a`              |
//! | `1`  | -                   | `rule&1`                     |
//! | `1`  | `search=a`          | `rule&1&search=a`            |
//! | -    | `search=a`, `id,b`  | `rule&search=a&fields= id,b` |
//!
//! The fields token keeps a single space after `=` and joins the fields with
//! `,`. Existing keys depend on that exact shape.

use crate::context::{QueryParams, RequestContext};
use crate::error::Result;
use crate::route::not_informed;

/// Suffix used when a key has neither spec nor request component.
pub const DEFAULT_SUFFIX: &str = "default";

/// Renders query parameters as `name=value` pairs joined by `&`.
pub fn format_query(query: &QueryParams) -> String {
    query
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Renders the `fields` header as `fields= a,b,c`, or nothing when absent.
pub fn format_fields(header: Option<&str>) -> String {
    match header {
        Some(header) if !header.is_empty() => {
            let fields: Vec<&str> = header.split(',').map(str::trim).collect();
            format!("fields= {}", fields.join(","))
        }
        _ => String::new(),
    }
}

/// The request-dependent part of a key: query string and fields token.
pub fn request_component(ctx: &RequestContext) -> String {
    let query = format_query(&ctx.query);
    let fields = format_fields(ctx.fields.as_deref());

    match (query.is_empty(), fields.is_empty()) {
        (false, false) => format!("{query}&{fields}"),
        (false, true) => query,
        _ => fields,
    }
}

/// Derives the cache key of a request.
///
/// An empty `spec` counts as absent. Fails when `rule` is empty.
pub fn derive_key(rule: &str, spec: Option<&str>, ctx: &RequestContext) -> Result<String> {
    if rule.is_empty() {
        return Err(not_informed("rule", ctx));
    }

    let component = request_component(ctx);
    let spec = spec.filter(|spec| !spec.is_empty());

    let key = match (spec, component.is_empty()) {
        (Some(spec), false) => format!("{rule}&{spec}&{component}"),
        (Some(spec), true) => format!("{rule}&{spec}"),
        (None, false) => format!("{rule}&{component}"),
        (None, true) => format!("{rule}&{DEFAULT_SUFFIX}"),
    };

    Ok(key)
}
