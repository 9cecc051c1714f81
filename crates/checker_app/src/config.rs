use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use checker_engine::{ClientSettings, DEFAULT_API_URL};
use checker_logging::{checker_info, LogDestination, DEFAULT_LOG_FILE};
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "checker.ron";
pub const API_URL_ENV: &str = "CHECKER_API_URL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    /// Directory holding the persisted task handle.
    pub state_dir: PathBuf,
    pub log_to_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            state_dir: PathBuf::from("."),
            log_to_file: false,
        }
    }
}

impl AppConfig {
    /// Read `explicit`, or `checker.ron` in the working directory. Only an
    /// explicitly named file has to exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read config {:?}", path))
            }
        };
        let config: AppConfig =
            ron::from_str(&content).with_context(|| format!("failed to parse config {:?}", path))?;
        checker_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Later sources win: file, then environment, then command line.
    pub fn apply_overrides(mut self, env_url: Option<String>, flag_url: Option<String>) -> Self {
        if let Some(url) = flag_url.or(env_url).filter(|url| !url.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        self
    }

    /// A verbose run that also logs to file keeps the terminal output.
    pub fn log_destination(&self, verbose: bool) -> LogDestination {
        match (self.log_to_file, verbose) {
            (true, true) => LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)),
            (true, false) => LogDestination::default_file(),
            (false, _) => LogDestination::Terminal,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::with_api_url(self.api_url.clone())
    }
}
