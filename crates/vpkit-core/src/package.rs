//! Package builder: metadata + processed assets into a `.vpk` archive.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::assets::{self, FileEntry};
use crate::config::ProjectConfig;
use crate::metadata;
use crate::sources;
use crate::tools::ExternalTools;

/// Combine entries, keeping the first entry for each path.
///
/// Callers pass the metadata entry first so it wins over a source file
/// with the same path.
pub fn merge_entries(entries: impl IntoIterator<Item = FileEntry>) -> Vec<FileEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.path.clone());
            if !fresh {
                warn!(path = %entry.path, "Duplicate package path dropped");
            }
            fresh
        })
        .collect()
}

/// Write `entries` as a deflated zip archive at `out`, then sync it.
#[instrument(skip(entries), fields(count = entries.len()))]
pub fn write_archive(entries: &[FileEntry], out: &Path) -> Result<()> {
    let file =
        File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.path.as_str(), options)?;
        zip.write_all(&entry.contents)?;
        debug!(path = %entry.path, bytes = entry.contents.len(), "Added entry");
    }

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

/// Build `<out_dir>/<title>.vpk` from the project sources.
#[instrument(skip_all, fields(id = %config.id, title = %config.title))]
pub fn build(config: &ProjectConfig, tools: &dyn ExternalTools) -> Result<PathBuf> {
    sources::check(config)?;

    let sfo = metadata::generate(config, tools).context("Metadata generation failed")?;
    let files = assets::collect_source_files(&config.src_dir)
        .with_context(|| format!("Failed to read {}", config.src_dir.display()))?;
    let files = assets::process_images(files, tools).context("Image processing failed")?;

    let entries = merge_entries(std::iter::once(sfo).chain(files));

    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("Failed to create {}", config.out_dir.display()))?;
    let out = config.package_path();
    write_archive(&entries, &out)?;

    info!(path = %out.display(), entries = entries.len(), "Package written");
    Ok(out)
}
