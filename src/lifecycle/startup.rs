//! Startup orchestration.
//!
//! # Responsibilities
//! - Merge the optional config file with command line overrides
//! - Validate the result before anything is bound
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, after logging and metrics are up

use crate::cli::Cli;
use crate::config::validation::join_errors;
use crate::config::{load_config, validate_config, ConfigError, ProxyConfig, ValidationError};
use crate::net::ListenerError;

/// Any error that prevents the proxy from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Build the effective configuration from the command line.
pub fn resolve_config(cli: &Cli) -> Result<ProxyConfig, StartupError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(StartupError::Invalid)?;
    Ok(config)
}
