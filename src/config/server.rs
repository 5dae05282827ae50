use std::env;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            addr: lookup("SLAP_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ADDR.to_string()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}
