// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use stockroom_core::{resolve_stockroom_data_dir, ENV_STOCKROOM_LOG_LEVEL};
use stockroom_ingest::{DEFAULT_HISTORY_SECTION, DEFAULT_PEOPLE_SECTION, DEFAULT_SECTIONS};

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind: String,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
    pub sheets_api_base: String,
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing)]
    pub sheets_access_token: Option<String>,
    pub source_file: Option<PathBuf>,
    pub sections: Vec<String>,
    pub history_section: String,
    pub people_section: String,
    pub slack_api_base: String,
    #[serde(skip_serializing)]
    pub slack_bot_token: Option<String>,
    pub slack_channel: Option<String>,
    pub chat_enabled_default: bool,
    pub sync_interval: Duration,
    pub external_timeout: Duration,
    /// Bound on each record source call during a sync pass.
    pub sync_fetch_timeout: Duration,
    pub log_json: bool,
    /// `EnvFilter` directive; `RUST_LOG` applies when unset.
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    raw.and_then(|v| match v.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    })
    .unwrap_or(default)
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_list(raw: Option<String>, default: &[&str]) -> Vec<String> {
    match raw {
        Some(v) if !v.trim().is_empty() => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => default.iter().map(ToString::to_string).collect(),
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any name -> value lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_bool = |name: &str, default: bool| parse_bool(lookup(name), default);
        let env_u64 = |name: &str, default: u64| parse_u64(lookup(name), default);
        let env_string = |name: &str, default: &str| {
            non_empty(lookup(name)).unwrap_or_else(|| default.to_string())
        };
        let data_dir = resolve_stockroom_data_dir();
        Self {
            bind: env_string("STOCKROOM_BIND", DEFAULT_BIND),
            db_path: non_empty(lookup("STOCKROOM_DB_PATH"))
                .map_or_else(|| data_dir.join("stockroom.sqlite"), PathBuf::from),
            settings_path: non_empty(lookup("STOCKROOM_SETTINGS_PATH"))
                .map_or_else(|| data_dir.join("settings.json"), PathBuf::from),
            sheets_api_base: env_string("STOCKROOM_SHEETS_API_BASE", DEFAULT_SHEETS_API_BASE),
            spreadsheet_id: non_empty(lookup("STOCKROOM_SHEETS_SPREADSHEET_ID")),
            sheets_access_token: non_empty(lookup("STOCKROOM_SHEETS_ACCESS_TOKEN")),
            source_file: non_empty(lookup("STOCKROOM_SOURCE_FILE")).map(PathBuf::from),
            sections: parse_list(lookup("STOCKROOM_SECTIONS"), DEFAULT_SECTIONS),
            history_section: env_string("STOCKROOM_HISTORY_SECTION", DEFAULT_HISTORY_SECTION),
            people_section: env_string("STOCKROOM_PEOPLE_SECTION", DEFAULT_PEOPLE_SECTION),
            slack_api_base: env_string("STOCKROOM_SLACK_API_BASE", DEFAULT_SLACK_API_BASE),
            slack_bot_token: non_empty(lookup("STOCKROOM_SLACK_BOT_TOKEN")),
            slack_channel: non_empty(lookup("STOCKROOM_SLACK_CHANNEL")),
            chat_enabled_default: env_bool("STOCKROOM_CHAT_ENABLED", true),
            sync_interval: Duration::from_secs(env_u64("STOCKROOM_SYNC_INTERVAL_SECS", 300)),
            external_timeout: Duration::from_millis(env_u64(
                "STOCKROOM_EXTERNAL_TIMEOUT_MS",
                5000,
            )),
            sync_fetch_timeout: Duration::from_millis(env_u64(
                "STOCKROOM_SYNC_FETCH_TIMEOUT_MS",
                30_000,
            )),
            log_json: env_bool("STOCKROOM_LOG_JSON", true),
            log_level: non_empty(lookup(ENV_STOCKROOM_LOG_LEVEL)),
        }
    }

    #[must_use]
    pub fn sheets_enabled(&self) -> bool {
        self.spreadsheet_id.is_some()
    }

    /// Same rule the processor applies: a bot token and a channel.
    #[must_use]
    pub fn notifier_configured(&self) -> bool {
        self.slack_bot_token.is_some() && self.slack_channel.is_some()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|e| format!("invalid STOCKROOM_BIND `{}`: {e}", self.bind))
    }
}

pub fn validate_startup_config_contract(config: &ServerConfig) -> Result<(), String> {
    if config.external_timeout.is_zero() {
        return Err("external timeout must be > 0".to_string());
    }
    if config.sync_fetch_timeout.is_zero() {
        return Err("sync fetch timeout must be > 0".to_string());
    }
    if config.sections.is_empty() {
        return Err("at least one section must be configured".to_string());
    }
    if config.slack_bot_token.is_some() && config.slack_channel.is_none() {
        return Err("STOCKROOM_SLACK_BOT_TOKEN requires STOCKROOM_SLACK_CHANNEL".to_string());
    }
    if config.sheets_access_token.is_some() && config.spreadsheet_id.is_none() {
        return Err(
            "STOCKROOM_SHEETS_ACCESS_TOKEN requires STOCKROOM_SHEETS_SPREADSHEET_ID".to_string(),
        );
    }
    if let Some(level) = &config.log_level {
        tracing_subscriber::EnvFilter::try_new(level)
            .map_err(|e| format!("invalid {ENV_STOCKROOM_LOG_LEVEL} `{level}`: {e}"))?;
    }
    config.bind_addr()?;
    Ok(())
}
