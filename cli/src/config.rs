use std::path::{Path, PathBuf};

use color_eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{LOG_DIR, config_path, load_ron_file};

/// Optional `prompt_tools.ron` in the local config dir. Flags and environment variables
/// take precedence over everything in here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_cloud_project: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_optional(config_path().as_deref())
    }

    /// Without a config dir there is nothing to load.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                debug!("No config dir, using an empty config");
                Ok(Self::default())
            }
        }
    }

    /// A missing file is an empty config, a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}", path.display());
            Ok(Self::default())
        } else {
            debug!("Loading config from {}", path.display());
            load_ron_file(path)
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(LOG_DIR))
    }
}
