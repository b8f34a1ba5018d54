use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::assignment::{self, AssignmentKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub assignment_count: usize,
    pub board_width: usize,
    pub board_height: usize,
    pub assignment_types: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assignment_count: 10,
            board_width: 40,
            board_height: 12,
            assignment_types: AssignmentKind::ALL.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("assignment count must be positive")]
    ZeroAssignments,
    #[error("board must be at least 1x1, got {width}x{height}")]
    EmptyBoard { width: usize, height: usize },
    #[error("{count} assignments do not fit on a {width}x{height} board")]
    InsufficientSpace {
        count: usize,
        width: usize,
        height: usize,
    },
    #[error("no known assignment types configured")]
    EmptyTypePool,
}

/// A config that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillSettings {
    pub assignment_count: usize,
    pub board_width: usize,
    pub board_height: usize,
    pub pool: Vec<AssignmentKind>,
    /// Problems that were tolerated, e.g. unknown type tags that were dropped.
    pub warnings: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> Result<DrillSettings, ConfigError> {
        if self.assignment_count == 0 {
            return Err(ConfigError::ZeroAssignments);
        }
        if self.board_width == 0 || self.board_height == 0 {
            return Err(ConfigError::EmptyBoard {
                width: self.board_width,
                height: self.board_height,
            });
        }
        let capacity = self.board_width.checked_mul(self.board_height);
        if capacity.map_or(true, |cells| self.assignment_count > cells) {
            return Err(ConfigError::InsufficientSpace {
                count: self.assignment_count,
                width: self.board_width,
                height: self.board_height,
            });
        }

        let mut pool = Vec::new();
        let mut warnings = Vec::new();
        for tag in &self.assignment_types {
            match assignment::lookup(tag) {
                Ok(d) if !pool.contains(&d.kind) => pool.push(d.kind),
                Ok(_) => {}
                Err(err) => warnings.push(err.to_string()),
            }
        }
        if pool.is_empty() {
            return Err(ConfigError::EmptyTypePool);
        }

        Ok(DrillSettings {
            assignment_count: self.assignment_count,
            board_width: self.board_width,
            board_height: self.board_height,
            pool,
            warnings,
        })
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "gridrill") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("gridrill_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
