//! Configuration loading from disk and the process environment.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { key: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { key, message } => write!(f, "Invalid {}: {}", key, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, overlay the process
/// environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    load_config_with(path, |_| {})
}

/// Like [`load_config`], but lets the caller adjust the merged config
/// (command-line flags, for instance) before it is validated.
pub fn load_config_with<F>(path: Option<&Path>, adjust: F) -> Result<GateConfig, ConfigError>
where
    F: FnOnce(&mut GateConfig),
{
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => GateConfig::default(),
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    adjust(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts `std::env::var` so the overlay can be exercised
/// without touching the real environment. Unset variables leave the file
/// value (or default) in place.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let db = &mut config.database;
    if let Some(host) = lookup("DB_HOST") {
        db.host = host;
    }
    if let Some(port) = lookup("DB_PORT") {
        db.port = parse_var("DB_PORT", &port)?;
    }
    if let Some(user) = lookup("DB_USER") {
        db.user = user;
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        db.password = password;
    }
    if let Some(name) = lookup("DB_NAME") {
        db.name = name;
    }
    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        db.url = Some(url);
    }

    let admin = &mut config.bootstrap_admin;
    if let Some(enabled) = lookup("BOOTSTRAP_ADMIN_ENABLED") {
        admin.enabled = parse_bool("BOOTSTRAP_ADMIN_ENABLED", &enabled)?;
    }
    if let Some(email) = lookup("BOOTSTRAP_ADMIN_EMAIL") {
        admin.email = email;
    }
    if let Some(username) = lookup("BOOTSTRAP_ADMIN_USERNAME") {
        admin.username = username;
    }
    if let Some(password) = lookup("BOOTSTRAP_ADMIN_PASSWORD") {
        admin.password = password;
    }

    Ok(())
}

fn parse_var<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        message: e.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            key,
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: GateConfig = toml::from_str(
            r#"
            [database]
            host = "from-file"
            port = 6543

            [bootstrap_admin]
            email = "root@example.org"
            "#,
        )
        .unwrap();

        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("DB_HOST", "postgres.internal"),
                ("DB_NAME", "books"),
                ("BOOTSTRAP_ADMIN_PASSWORD", "s3cret"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.host, "postgres.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.name, "books");
        assert_eq!(config.bootstrap_admin.email, "root@example.org");
        assert_eq!(config.bootstrap_admin.password, "s3cret");
        assert!(!config.bootstrap_admin.uses_default_password());
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = GateConfig::default();
        let err = apply_env_overrides(&mut config, lookup_from(&[("DB_PORT", "five")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_admin_can_be_disabled_from_env() {
        let mut config = GateConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[("BOOTSTRAP_ADMIN_ENABLED", "False")]),
        )
        .unwrap();
        assert!(!config.bootstrap_admin.enabled);
    }

    #[test]
    fn test_blank_database_url_is_ignored() {
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_adjustments_are_validated() {
        let err = load_config_with(None, |config| {
            config.handoff.command = vec![String::new(), "--bind".into()];
        })
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.field == "handoff.command"), "{errors:?}");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_parse_file_reads_toml() {
        let path = std::env::temp_dir().join(format!("booknest-gate-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[readiness]\ninterval_ms = 250\nmax_attempts = 4\n\n[handoff]\nmode = \"spawn\"\ncommand = [\"gunicorn\", \"BookNest.wsgi\"]"
        )
        .unwrap();

        let config = parse_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.readiness.interval_ms, 250);
        assert_eq!(config.readiness.max_attempts, Some(4));
        assert_eq!(config.handoff.command, vec!["gunicorn", "BookNest.wsgi"]);
        assert_eq!(config.database.port, 5432);
    }
}
