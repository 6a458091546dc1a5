//! Source directory checks run before any build or deploy.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ProjectConfig;

/// Executable loader every package must contain.
pub const LOADER_BINARY: &str = "eboot.bin";

/// Script the loader runs on start.
pub const ENTRY_SCRIPT: &str = "index.lua";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source directory not found: {}", path.display())]
    SourceDirMissing { path: PathBuf },

    #[error("eboot.bin is missing from {}", dir.display())]
    EbootMissing { dir: PathBuf },

    #[error("index.lua is missing from {}", dir.display())]
    IndexLuaMissing { dir: PathBuf },
}

/// Verify the source directory and its mandatory files, in that order.
#[instrument(skip(config), fields(src_dir = %config.src_dir.display()))]
pub fn check(config: &ProjectConfig) -> Result<(), SourceError> {
    let dir = &config.src_dir;
    if !dir.is_dir() {
        return Err(SourceError::SourceDirMissing { path: dir.clone() });
    }
    if !dir.join(LOADER_BINARY).is_file() {
        return Err(SourceError::EbootMissing { dir: dir.clone() });
    }
    if !dir.join(ENTRY_SCRIPT).is_file() {
        return Err(SourceError::IndexLuaMissing { dir: dir.clone() });
    }
    debug!("Required files present");
    Ok(())
}
