use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Whole-request budget. Individual statements have their own deadline.
    pub timeout_ms: u64,
    pub max_msg_bytes: usize,
    pub db: PathBuf,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_msg_bytes: 1_000_000,
            db: PathBuf::from(".sqlcheck/sqlcheck.db"),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("SQLCHECK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.timeout_ms = n;
            }
        }
        if let Ok(v) = env::var("SQLCHECK_MAX_BYTES") {
            if let Ok(n) = v.parse() {
                cfg.max_msg_bytes = n;
            }
        }
        if let Ok(v) = env::var("SQLCHECK_DB") {
            if !v.is_empty() {
                cfg.db = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("SQLCHECK_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}
