//! Server configuration: command-line flags and the YAML documents they point at.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use beacon_alerts::{DestinationConfig, DestinationsConfig, LabelEnrichmentConfig, TeamsConfig};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;

use crate::error::{ServerError, ServerResult};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line configuration for the `beacon` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "beacon")]
#[command(about = "Receives Alertmanager webhooks and delivers them to team destinations")]
#[command(version)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Log filter directive, e.g. `info` or `beacon_alerts=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Path to the destinations YAML file.
    #[arg(long, env = "DESTINATIONS_CONFIG_PATH", default_value = "/etc/beacon/destinations.yaml")]
    pub destinations_config: PathBuf,

    /// Path to the teams YAML file.
    #[arg(long, env = "TEAMS_CONFIG_PATH", default_value = "/etc/beacon/teams.yaml")]
    pub teams_config: PathBuf,

    /// Path to the label enrichment YAML file. Defaults apply when unset.
    #[arg(long, env = "ENRICHMENT_CONFIG_PATH")]
    pub enrichment_config: Option<PathBuf>,

    /// Seconds to let in-flight requests finish after a shutdown signal.
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Returns the graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Loads destination declarations, resolving `${VAR}` API keys from the environment.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, declares an
/// unsupported destination kind, or references a missing variable.
pub fn load_destinations(path: &Path) -> ServerResult<Vec<DestinationConfig>> {
    let content = read(path)?;
    parse_destinations(&content, path, |name| std::env::var(name).ok())
}

/// Parses a destinations document. `lookup` resolves `${VAR}` placeholders.
///
/// # Errors
///
/// See [`load_destinations`].
pub fn parse_destinations(
    content: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> ServerResult<Vec<DestinationConfig>> {
    let document: DestinationsConfig = parse_yaml(content, path)?;
    let mut declarations = document.declarations()?;

    for declaration in &mut declarations {
        match declaration {
            DestinationConfig::Slack(slack) => {
                if let Some(var) = env_placeholder(&slack.api_key) {
                    slack.api_key = lookup(var).ok_or_else(|| ServerError::MissingEnv {
                        var: var.to_string(),
                        kind: "slack",
                        destination: slack.name.clone(),
                    })?;
                }
            }
        }
    }

    Ok(declarations)
}

/// Loads the teams document.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_teams(path: &Path) -> ServerResult<TeamsConfig> {
    parse_yaml(&read(path)?, path)
}

/// Loads the enrichment document, or the defaults when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_enrichment(path: Option<&Path>) -> ServerResult<LabelEnrichmentConfig> {
    match path {
        Some(path) => parse_yaml(&read(path)?, path),
        None => Ok(LabelEnrichmentConfig::default()),
    }
}

// `${NAME}` -> `NAME`
fn env_placeholder(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

fn read(path: &Path) -> ServerResult<String> {
    std::fs::read_to_string(path).map_err(|e| ServerError::Config {
        path: path.to_path_buf(),
        reason: format!("failed to read file: {e}"),
    })
}

fn parse_yaml<T: DeserializeOwned + Default>(content: &str, path: &Path) -> ServerResult<T> {
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(content).map_err(|e| ServerError::Config {
        path: path.to_path_buf(),
        reason: format!("invalid YAML: {e}"),
    })
}
