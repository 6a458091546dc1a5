//! `param.sfo` generation.

use tracing::{info, instrument};

use crate::assets::FileEntry;
use crate::config::ProjectConfig;
use crate::tools::{ExternalTools, ToolError};

/// Location of the metadata file inside the package.
pub const SFO_PATH: &str = "sce_sys/param.sfo";

/// Run the metadata tool in a scratch directory and return the result as
/// the package entry [`SFO_PATH`].
#[instrument(skip_all, fields(id = %config.id))]
pub fn generate(config: &ProjectConfig, tools: &dyn ExternalTools) -> Result<FileEntry, ToolError> {
    let scratch = tempfile::tempdir()?;
    let out = scratch.path().join("param.sfo");

    tools.generate_sfo(&config.id, &config.title, &out)?;
    let contents = std::fs::read(&out)?;

    info!(bytes = contents.len(), "Generated {}", SFO_PATH);
    Ok(FileEntry::new(SFO_PATH, contents))
}
