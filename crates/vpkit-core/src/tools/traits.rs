//! External tool abstraction.
//!
//! Defines the `ExternalTools` trait covering the two binaries a build
//! shells out to, so packaging can run against fakes in tests.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found on PATH")]
    NotFound { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not produce {}", path.display())]
    MissingOutput { tool: String, path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract interface over the external binaries.
pub trait ExternalTools: Send + Sync {
    /// Write a `param.sfo` for `id`/`title` to `out`.
    fn generate_sfo(&self, id: &str, title: &str, out: &Path) -> Result<(), ToolError>;

    /// Return recompressed bytes for the image `name`.
    ///
    /// Implementations return the input unchanged for formats they
    /// cannot handle.
    fn recompress_image(&self, name: &str, data: &[u8]) -> Result<Vec<u8>, ToolError>;
}
