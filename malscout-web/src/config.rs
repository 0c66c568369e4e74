//! Configuration resolution for malscout-web
//!
//! Per-field priority: CLI flag, then environment variable, then the TOML
//! config file, then the compiled default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use malscout_core::{Error, Result};

/// Command-line arguments. Every flag can also be set through its
/// environment variable; unset values fall back to the TOML file, then to
/// compiled defaults.
#[derive(Debug, Parser)]
#[command(name = "malscout-web", about = "Import-table enrichment service")]
pub struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "MALSCOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "MALSCOUT_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "MALSCOUT_PORT")]
    pub port: Option<u16>,

    /// Base URL of the description lookup endpoint
    #[arg(long, env = "MALSCOUT_LOOKUP_URL")]
    pub lookup_base_url: Option<String>,

    /// Per-lookup request timeout in seconds
    #[arg(long, env = "MALSCOUT_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Number of concurrent lookup workers
    #[arg(long, env = "MALSCOUT_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Directory for exported report artifacts
    #[arg(long, env = "MALSCOUT_REPORTS_DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Directory of static UI assets to serve (UI disabled when unset)
    #[arg(long, env = "MALSCOUT_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    lookup_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    concurrency: Option<usize>,
    reports_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

/// Resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub lookup_base_url: String,
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub reports_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            lookup_base_url: malscout_core::lookup::DEFAULT_BASE_URL.to_string(),
            request_timeout: malscout_core::lookup::DEFAULT_TIMEOUT,
            concurrency: malscout_core::pipeline::DEFAULT_CONCURRENCY,
            reports_dir: PathBuf::from("reports"),
            static_dir: None,
        }
    }
}

impl Settings {
    pub fn resolve(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
                toml::from_str::<FileConfig>(&content)
                    .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?
            }
            None => FileConfig::default(),
        };

        let defaults = Self::default();
        Ok(Self {
            host: args.host.or(file.host).unwrap_or(defaults.host),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            lookup_base_url: args
                .lookup_base_url
                .or(file.lookup_base_url)
                .unwrap_or(defaults.lookup_base_url),
            request_timeout: args
                .request_timeout_secs
                .or(file.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults.concurrency),
            reports_dir: args
                .reports_dir
                .or(file.reports_dir)
                .unwrap_or(defaults.reports_dir),
            static_dir: args.static_dir.or(file.static_dir),
        })
    }
}
