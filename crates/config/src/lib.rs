//! Environment-driven configuration for the balancer and storage binaries.
//!
//! Mirrors `cmd/balancer/config.go`'s loading order: an optional `.env` file
//! (`balancer.env` / `storage.env`) is loaded first with `dotenvy`, then the
//! process environment is parsed into a typed config via `clap`'s `env`
//! support, then field-level constraints are checked with `validator` and
//! collapsed into one message naming every invalid field
//! (`pkg/validation/format.go`'s `Pretty`).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use validator::{Validate, ValidationErrors};

/// Ceiling shared by both binaries' `TIMEOUT` field: 120 minutes.
const MAX_TIMEOUT: Duration = Duration::from_secs(120 * 60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
    #[error("parse environment: {0}")]
    Parse(#[from] clap::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `LISTEN`, `LIMIT`, `TIMEOUT`, `DIR`, `STORAGES` — the balancer's full
/// environment contract.
#[derive(Debug, Clone, Parser, Validate)]
pub struct BalancerConfig {
    /// Address the balancer's HTTP server listens on, e.g. `0.0.0.0:8080`.
    #[arg(long, env)]
    pub listen: String,

    /// Maximum accepted request body size, in bytes.
    #[arg(long, env, default_value_t = 4_000_000)]
    #[validate(range(min = 4000, max = 20_000_000_000))]
    pub limit: u64,

    /// Read/write timeout applied to both the server and outbound requests.
    #[arg(long, env, value_parser = humantime::parse_duration, default_value = "30s")]
    #[validate(custom(function = "validate_timeout"))]
    pub timeout: Duration,

    /// Directory the content-addressed store is rooted at.
    #[arg(long, env)]
    pub dir: PathBuf,

    /// Storage backend addresses (`host:port`), comma-separated.
    #[arg(long, env, value_delimiter = ',')]
    #[validate(length(min = 1))]
    pub storages: Vec<String>,
}

impl BalancerConfig {
    /// Loads `balancer.env` (if present) then the process environment,
    /// validating the result. Matches `cmd/balancer/config.go::NewConfig`.
    pub fn load() -> Result<Self, Error> {
        load_dotenv("balancer.env")?;
        let config = Self::try_parse()?;
        config.validate().map_err(|e| Error::Invalid(pretty(e)))?;
        Ok(config)
    }
}

/// `LISTEN`, `LIMIT`, `TIMEOUT`, `DIR` — the storage node's environment
/// contract; it has no `STORAGES` of its own.
#[derive(Debug, Clone, Parser, Validate)]
pub struct StorageConfig {
    #[arg(long, env)]
    pub listen: String,

    #[arg(long, env, default_value_t = 4_000_000)]
    #[validate(range(min = 4000, max = 20_000_000_000))]
    pub limit: u64,

    #[arg(long, env, value_parser = humantime::parse_duration, default_value = "30s")]
    #[validate(custom(function = "validate_timeout"))]
    pub timeout: Duration,

    #[arg(long, env)]
    pub dir: PathBuf,
}

impl StorageConfig {
    /// Loads `storage.env` (if present) then the process environment,
    /// validating the result. Matches `cmd/storage/main.go`'s config use.
    pub fn load() -> Result<Self, Error> {
        load_dotenv("storage.env")?;
        let config = Self::try_parse()?;
        config.validate().map_err(|e| Error::Invalid(pretty(e)))?;
        Ok(config)
    }
}

fn load_dotenv(path: &str) -> Result<(), Error> {
    match dotenvy::from_filename(path) {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn validate_timeout(timeout: &Duration) -> Result<(), validator::ValidationError> {
    if *timeout > MAX_TIMEOUT {
        return Err(validator::ValidationError::new("max=120m"));
    }
    Ok(())
}

/// Collapses a `ValidationErrors` into one human-readable line per invalid
/// field, the same shape as the original's `strings.Join(fields, ", ")`.
fn pretty(errors: ValidationErrors) -> String {
    let mut fields = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for err in field_errors {
            let mut msg = format!("invalid {field} should be {}", err.code);
            if let Some(param) = err.params.get("min") {
                msg.push_str(&format!("={param}"));
            }
            fields.push(msg);
        }
    }
    fields.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "balancer",
            "--listen",
            "0.0.0.0:8080",
            "--dir",
            "/tmp/data",
            "--storages",
            "s1:8081,s2:8081,s3:8081",
        ]
    }

    #[test]
    fn parses_required_fields_and_defaults() {
        let config = BalancerConfig::try_parse_from(base_args()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.storages, vec!["s1:8081", "s2:8081", "s3:8081"]);
        assert_eq!(config.limit, 4_000_000);
        assert_eq!(config.timeout, Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_limit_below_the_floor() {
        let mut args = base_args();
        args.extend(["--limit", "10"]);
        let config = BalancerConfig::try_parse_from(args).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_timeout_past_the_ceiling() {
        let mut args = base_args();
        args.extend(["--timeout", "3h"]);
        let config = BalancerConfig::try_parse_from(args).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        assert!(BalancerConfig::try_parse_from(["balancer", "--dir", "/tmp/data"]).is_err());
    }

    #[test]
    fn pretty_names_every_invalid_field() {
        let mut args = base_args();
        args.extend(["--limit", "1", "--timeout", "3h"]);
        let config = BalancerConfig::try_parse_from(args).unwrap();
        let err = config.validate().unwrap_err();
        let message = pretty(err);
        assert!(message.contains("limit"));
        assert!(message.contains("timeout"));
    }

    #[test]
    fn storage_config_has_no_storages_field() {
        let config = StorageConfig::try_parse_from([
            "storage",
            "--listen",
            "0.0.0.0:9090",
            "--dir",
            "/tmp/data",
        ])
        .unwrap();
        config.validate().unwrap();
    }
}
