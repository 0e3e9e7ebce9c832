use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "ingest";
const ENV_PREFIX: &str = "TMDB";

/// How the API credential is attached to each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` (TMDB read access token).
    Bearer,
    /// `?api_key=<key>` query parameter (TMDB v3 key).
    QueryKey,
}

/// Runtime settings, read from `ingest.toml` and `TMDB_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub auth_mode: AuthMode,
    pub base_url: String,
    pub db_path: PathBuf,
    pub sort_by: String,
    /// Stop once this many movies have been loaded in the current run.
    pub target_movies: usize,
    /// Hard ceiling on discovery pages requested, regardless of target.
    pub page_cap: u32,
    pub commit_every: usize,
    pub cast_limit: usize,
    pub page_backoff_ms: u64,
    pub page_backoff_max_ms: u64,
    pub page_max_attempts: u32,
    pub detail_backoff_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: String::new(),
            auth_mode: AuthMode::Bearer,
            base_url: "https://api.themoviedb.org/3".to_string(),
            db_path: PathBuf::from("data/movies.sqlite"),
            sort_by: "popularity.desc".to_string(),
            target_movies: 5000,
            page_cap: 300,
            commit_every: 50,
            cast_limit: 10,
            page_backoff_ms: 10_000,
            page_backoff_max_ms: 60_000,
            page_max_attempts: 5,
            detail_backoff_ms: 5_000,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings: Settings = ::config::Config::builder()
            .add_source(::config::File::with_name(CONFIG_FILE).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings)
    }

    /// Checks that the pipeline can start. Missing credentials are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("TMDB_API_KEY is not set (or api_key in {}.toml)", CONFIG_FILE);
        }
        if self.commit_every == 0 {
            bail!("commit_every must be at least 1");
        }
        if self.page_max_attempts == 0 {
            bail!("page_max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn page_backoff(&self) -> Duration {
        Duration::from_millis(self.page_backoff_ms)
    }

    pub fn page_backoff_max(&self) -> Duration {
        Duration::from_millis(self.page_backoff_max_ms)
    }

    pub fn detail_backoff(&self) -> Duration {
        Duration::from_millis(self.detail_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
