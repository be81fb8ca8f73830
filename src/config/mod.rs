// ABOUTME: Scan configuration handed to the core as a validated list of root directories

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configured root does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("no root directories configured")]
    NoRoots,
}

/// Root directories under which working trees are discovered. The core does
/// not parse configuration files; callers hand it this list already loaded.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub roots: Vec<PathBuf>,
}

impl ScanConfig {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Every configured root must exist before any scanning starts; a missing
    /// root is a fatal configuration error, never silently skipped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        for root in &self.roots {
            if !root.is_dir() {
                return Err(ConfigError::MissingRoot(root.clone()));
            }
        }
        Ok(())
    }
}
