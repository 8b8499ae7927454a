//! Configuration file helpers
//!
//! Loading follows a fixed order:
//! 1. Read the TOML text
//! 2. Replace `${VAR}` references with environment values
//! 3. Deserialize into the caller's config type
//!
//! Unset variables substitute as empty strings (with a warning) so optional
//! secrets can be left out of the environment.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid"));

/// Replace every `${VAR}` in `raw` with the value of environment variable `VAR`
pub fn substitute_env(raw: &str) -> String {
    ENV_REFERENCE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => {
                    warn!("Environment variable {} referenced in config is not set", name);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Parse TOML text (after environment substitution)
pub fn parse_toml<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let substituted = substitute_env(raw);
    toml::from_str(&substituted).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Read and parse a TOML config file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml(&raw)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Serialize `config` to `path`, returning `true` when the file content changed
pub fn write_toml_if_changed<T: Serialize>(config: &T, path: &Path) -> Result<bool> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == rendered {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, rendered)?;
    Ok(true)
}

/// OS-dependent default database path
///
/// `~/.local/share/acars-processor/messages.db` on Linux, the platform's local
/// data dir elsewhere, falling back to the working directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("acars-processor"))
        .unwrap_or_else(|| PathBuf::from("./acars_processor_data"))
        .join("messages.db")
}
