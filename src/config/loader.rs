//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Bind address override, `host:port`.
pub const ENV_BIND: &str = "FRICU_SERVER_BIND";
/// Database file override.
pub const ENV_DB_PATH: &str = "FRICU_DB_PATH";
/// Worker count override.
pub const ENV_WORKERS: &str = "FRICU_SERVER_WORKERS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML configuration file. Missing sections fall back to defaults.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply `FRICU_*` overrides using `lookup` to read variables.
///
/// Taking the lookup as a closure keeps this testable without touching the
/// process environment.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup(ENV_BIND) {
        config.listener.bind_address = bind;
    }
    if let Some(path) = lookup(ENV_DB_PATH) {
        config.storage.path = path;
    }
    if let Some(raw) = lookup(ENV_WORKERS) {
        config.workers.count = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_WORKERS,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

/// Defaults, then the optional file, then the environment, then validation.
pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_BIND, "127.0.0.1:9999"),
                (ENV_DB_PATH, "/tmp/x.db"),
                (ENV_WORKERS, "4"),
            ]),
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.storage.path, "/tmp/x.db");
        assert_eq!(config.workers.count, 4);
    }

    #[test]
    fn unparsable_worker_count_is_an_error() {
        let mut config = ServerConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_WORKERS, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_WORKERS, .. }));
    }

    #[test]
    fn absent_variables_leave_config_alone() {
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.storage.path, "fricu_server.db");
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:7000\"\n\n[timeouts]\nidle_secs = 5"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
        assert_eq!(config.timeouts.idle_secs, 5);
        assert_eq!(config.workers.count, 64);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
