//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ProxyConfig;

#[derive(Debug, Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forwarding HTTP/1.0 proxy with a fixed concurrency ceiling", long_about = None)]
pub struct Cli {
    /// Port to listen on
    pub port: u16,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrently handled connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Overlay command line values onto `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        config.listener.port = self.port;
        if let Some(max) = self.max_connections {
            config.listener.max_connections = max;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_required() {
        let err = Cli::try_parse_from(["forward-proxy"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["forward-proxy", "http"]).is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let cli = Cli::try_parse_from([
            "forward-proxy",
            "3128",
            "--max-connections",
            "4",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let mut config = ProxyConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listener.port, 3128);
        assert_eq!(config.listener.max_connections, 4);
        assert_eq!(config.observability.log_level, "debug");
        assert!(cli.config.is_none());
    }
}
