use clap::Parser;
use digest_client::{ClientConfig, config::DEFAULT_BASE_URL};
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/admin.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub ai_results_limit: u32,
    /// Seconds to wait for pending edits on quit.
    pub teardown_grace_secs: u64,
    pub log_file: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: client.request_timeout_secs,
            poll_interval_secs: client.poll_interval_secs,
            ai_results_limit: client.ai_results_limit,
            teardown_grace_secs: 3,
            log_file: "config/digest_admin.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn client(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            poll_interval_secs: self.poll_interval_secs,
            ai_results_limit: self.ai_results_limit,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "digest_admin", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override backend base URL (e.g. http://localhost:8000/api).
    #[arg(long)]
    base_url: Option<String>,
    /// Override polling interval in seconds.
    #[arg(long)]
    poll_secs: Option<u64>,
    /// Override log file path.
    #[arg(long)]
    log_file: Option<String>,
    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

pub fn load() -> Result<AppConfig> {
    let args = Args::parse();
    resolve(args)
}

fn resolve(args: Args) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("DIGEST_ADMIN"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(poll_secs) = args.poll_secs {
        settings.poll_interval_secs = poll_secs;
    }
    if let Some(log_file) = args.log_file {
        settings.log_file = log_file;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }

    Ok(settings)
}
