//! Persisted user settings.
//!
//! Settings live in a JSON file in the home directory. A missing file means
//! defaults; unknown keys are ignored so older and newer builds can share a
//! file. Commands read the settings at start, override them with any flags
//! given, and write them back when they finish.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, retry::DEFAULT_MAX_ATTEMPTS, sync::DEFAULT_BATCH_SIZE};

pub const SETTINGS_FILE_NAME: &str = ".stock_sync.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_file_directory: Option<PathBuf>,
    pub overwrite_mode: bool,
    pub verbatim_copy: bool,
    pub column_mapping: bool,
    pub batch_size: usize,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: None,
            sheet_url: None,
            last_file_directory: None,
            overwrite_mode: true,
            verbatim_copy: true,
            column_mapping: true,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_ATTEMPTS,
            last_synced_at: None,
        }
    }
}

impl Settings {
    /// `~/.stock_sync.json`, or the file name alone when no home directory
    /// can be determined.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(SETTINGS_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("No settings at {path:?}; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let file = File::create(path).map_err(write_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|err| {
            ConfigError::Write {
                path: path.to_path_buf(),
                source: err.into(),
            }
        })
    }

    /// Remembers the directory of the last input file.
    pub fn remember_input(&mut self, input: &Path) {
        if let Some(dir) = input.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.last_file_directory = Some(dir.to_path_buf());
        }
    }
}
