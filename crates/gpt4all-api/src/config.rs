//! Service configuration.

use clap::Parser;
use std::net::{AddrParseError, IpAddr, SocketAddr};

use gpt4all_local::ModelConfig;

/// GPT4All Chat API - serve a local language model over HTTP
#[derive(Debug, Parser)]
#[command(name = "gpt4all-api")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// IP address to bind (IPv4 or IPv6)
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything the service reads at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub verbose: bool,
    pub model: ModelConfig,
}

impl ServiceConfig {
    /// Combine CLI flags with the model settings from the environment.
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            verbose: cli.verbose,
            model: ModelConfig::from_env(),
        }
    }

    /// Socket address to listen on. `host` is an IPv4 or IPv6 literal,
    /// optionally bracketed (`[::1]`).
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: IpAddr = host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["gpt4all-api"]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 5000);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_bind_addr() {
        let cli = Cli::parse_from(["gpt4all-api", "--host", "127.0.0.1", "-p", "8080", "-v"]);
        let config = ServiceConfig::from_cli(cli);
        assert!(config.verbose);
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_bad_host() {
        let cli = Cli::parse_from(["gpt4all-api", "--host", "not a host"]);
        assert!(ServiceConfig::from_cli(cli).bind_addr().is_err());
    }

    #[test]
    fn test_ipv6_bind_addr() {
        let cli = Cli::parse_from(["gpt4all-api", "--host", "::"]);
        assert_eq!(
            ServiceConfig::from_cli(cli).bind_addr().unwrap().to_string(),
            "[::]:5000"
        );

        let cli = Cli::parse_from(["gpt4all-api", "--host", "[::1]", "-p", "8080"]);
        assert_eq!(
            ServiceConfig::from_cli(cli).bind_addr().unwrap().to_string(),
            "[::1]:8080"
        );
    }
}
