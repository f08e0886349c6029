use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "WIREHTTP_CONFIG";
/// Environment variable that overrides `listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Base URL that `/httpbin/<rest>` is proxied to.
    pub upstream_base: String,
    /// Cap on in-flight connections; unbounded when absent.
    pub max_connections: Option<usize>,
    pub upstream_connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:42069".to_string(),
            upstream_base: "http://httpbin.org".to_string(),
            max_connections: None,
            upstream_connect_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Defaults, overlaid by the YAML file in `WIREHTTP_CONFIG` (if set),
    /// overlaid by `LISTEN` (if set).
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                Self::from_yaml_str(&raw)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("invalid config yaml")
    }
}
