use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = "data/software.sqlite";
pub const DEFAULT_INDEX_URL: &str = "http://igem.org/Team_Wikis";

/// What a crawl does when one candidate page cannot be fetched or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole year.
    #[default]
    FailFast,
    /// Log it, count it as processed, move on.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub index_url: String,
    pub failure_policy: FailurePolicy,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Settings {
    /// Defaults, then `sara.toml` if present, then `SARA_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("index_url", DEFAULT_INDEX_URL)?
            .set_default("failure_policy", "fail_fast")?
            .set_default("timeout_secs", 30)?
            .add_source(File::with_name("sara").required(false))
            .add_source(Environment::with_prefix("SARA"))
            .build()?
            .try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
