//! Bridge config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use netlog_core::error::{NetlogError, Result};

pub use schema::{BridgeSection, NetlogConfig};

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "netlog.yaml";

pub fn load_from_file(path: impl AsRef<Path>) -> Result<NetlogConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| NetlogError::BadConfig(format!("read {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<NetlogConfig> {
    let cfg: NetlogConfig = serde_yaml::from_str(s)
        .map_err(|e| NetlogError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Explicit path, else `netlog.yaml` if present, else built-in defaults.
pub fn load(path: Option<&str>) -> Result<NetlogConfig> {
    match path {
        Some(p) => load_from_file(p),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => load_from_file(DEFAULT_CONFIG_FILE),
        None => {
            tracing::info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            Ok(NetlogConfig::default())
        }
    }
}
