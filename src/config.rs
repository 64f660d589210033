//! Runtime configuration for the search engine and the HTTP server.

/// Search behaviour.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    /// Seed for VP-tree vantage selection. `None` draws from entropy on
    /// every query; a fixed seed makes tree shapes reproducible.
    pub vptree_seed: Option<u64>,
}

/// Configuration for the `serve` command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub addr: String,
    /// Shared secret expected in the `X-Key` header. `None` disables the check.
    pub api_key: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            api_key: None,
            log_filter: "info".to_string(),
            search: SearchConfig::default(),
        }
    }
}
