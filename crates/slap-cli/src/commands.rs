use anyhow::{Context, Result, anyhow};
use slap_cache::{CacheStore, ClearTarget, QueryParams, RequestContext, Slap, derive_key};

/// Parses `name=value` arguments into ordered query parameters.
pub fn parse_query(pairs: &[String]) -> Result<QueryParams> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .ok_or_else(|| anyhow!("query parameter `{pair}` must look like name=value"))
        })
        .collect()
}

/// Derives the key a GET request with these inputs would be cached under.
pub fn derive(
    rule: &str,
    spec: Option<&str>,
    query: &[String],
    fields: Option<&str>,
) -> Result<String> {
    let mut ctx = RequestContext::new("GET", "/").with_query(parse_query(query)?);
    if let Some(fields) = fields {
        ctx = ctx.with_fields(fields);
    }

    Ok(derive_key(rule, spec, &ctx)?)
}

/// Builds the clear target for one or more group names.
pub fn clear_target(groups: &[String]) -> ClearTarget {
    match groups {
        [single] => ClearTarget::One(single.clone()),
        _ => ClearTarget::Many(groups.to_vec()),
    }
}

pub async fn list_members<S: CacheStore>(cache: &Slap<S>, group: &str) -> Result<Vec<String>> {
    cache
        .store()
        .members_of(group)
        .await
        .with_context(|| format!("failed to read members of `{group}`"))
}

/// Invalidates the groups, returning the size of the deletion batch.
pub async fn clear_groups<S: CacheStore>(cache: &Slap<S>, groups: &[String]) -> Result<usize> {
    cache
        .clear_groups(&clear_target(groups))
        .await
        .context("failed to clear cache groups")
}
