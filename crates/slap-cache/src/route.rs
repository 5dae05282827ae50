//! Per-route cache settings.
//!
//! Settings are attached to a route as an [`axum::Extension`] holding a
//! [`RoutePlugins`] block. They are validated lazily: a route that is missing
//! what an operation needs fails that operation with
//! [`CacheError::Invalid`], it never fails at registration.
//!
//! ```ignore
//! use axum::{Extension, Router, routing::get};
//! use slap_cache::{RoutePlugins, SlapSettings};
//!
//! let app = Router::new().route(
//!     "/users",
//!     get(list_users).layer(Extension(RoutePlugins::with_slap(SlapSettings::rule("users-cache")))),
//! );
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::{CacheError, Result};

/// Plugin settings attached to a route.
///
/// Settings of other plugins are kept in `others` so that a block without a
/// `slap` entry can be told apart from no block at all.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RoutePlugins {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slap: Option<SlapSettings>,

    #[serde(flatten)]
    pub others: BTreeMap<String, serde_json::Value>,
}

impl RoutePlugins {
    pub fn with_slap(settings: SlapSettings) -> Self {
        Self {
            slap: Some(settings),
            others: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slap.is_none() && self.others.is_empty()
    }
}

/// Cache settings of a single route.
///
/// Read/write routes set `rule`, invalidation routes set `clear`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlapSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Per-route TTL in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<ClearTarget>,
}

/// Groups removed by an invalidation route.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClearTarget {
    One(String),
    Many(Vec<String>),
}

impl ClearTarget {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// `false` for an empty name, an empty list, or a list holding an empty name.
    pub fn is_informed(&self) -> bool {
        match self {
            Self::One(name) => !name.is_empty(),
            Self::Many(names) => !names.is_empty() && names.iter().all(|name| !name.is_empty()),
        }
    }
}

impl From<&str> for ClearTarget {
    fn from(name: &str) -> Self {
        Self::One(name.to_owned())
    }
}

impl From<String> for ClearTarget {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for ClearTarget {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl SlapSettings {
    /// Settings for a cached read/write route.
    pub fn rule(rule: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.into()),
            ..Self::default()
        }
    }

    /// Settings for a route invalidating a single group.
    pub fn clear_one(name: impl Into<String>) -> Self {
        Self {
            clear: Some(ClearTarget::One(name.into())),
            ..Self::default()
        }
    }

    /// Settings for a route invalidating several groups.
    pub fn clear_many<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            clear: Some(ClearTarget::Many(names.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    pub fn with_expire(mut self, seconds: u64) -> Self {
        self.expire = Some(seconds);
        self
    }

    /// The route's rule, or a configuration error naming the route.
    pub fn rule_for(&self, ctx: &RequestContext) -> Result<&str> {
        match self.rule.as_deref() {
            Some(rule) if !rule.is_empty() => Ok(rule),
            _ => Err(not_informed("rule", ctx)),
        }
    }

    /// The route's clear target, or a configuration error naming the route.
    pub fn clear_for(&self, ctx: &RequestContext) -> Result<&ClearTarget> {
        match &self.clear {
            Some(target) if target.is_informed() => Ok(target),
            _ => Err(not_informed("clear", ctx)),
        }
    }

    /// The route's TTL, falling back to `default` when unset or zero.
    pub fn expire_or(&self, default: u64) -> u64 {
        match self.expire {
            Some(seconds) if seconds > 0 => seconds,
            _ => default,
        }
    }
}

/// Resolves the `slap` settings of a route.
///
/// Fails when the route carries no plugin settings at all, or when its plugin
/// block has no `slap` entry.
pub fn resolve<'a>(plugins: Option<&'a RoutePlugins>, ctx: &RequestContext) -> Result<&'a SlapSettings> {
    let plugins = match plugins {
        Some(plugins) if !plugins.is_empty() => plugins,
        _ => {
            return Err(CacheError::invalid(format!(
                "plugin slap not configured for {}",
                ctx.route_label()
            )));
        }
    };

    plugins
        .slap
        .as_ref()
        .ok_or_else(|| CacheError::invalid(format!("slap not configured for {}", ctx.route_label())))
}

pub(crate) fn not_informed(field: &str, ctx: &RequestContext) -> CacheError {
    CacheError::invalid(format!(
        "slap ({field}) not informed for {}",
        ctx.route_label()
    ))
}
