//! Source asset collection and image recompression.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::tools::{ExternalTools, ToolError};

/// Extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["bmp", "png", "jpg"];

/// A file destined for the package, addressed by its `/`-separated path
/// relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub contents: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Whether the entry has one of [`IMAGE_EXTENSIONS`].
    pub fn is_image(&self) -> bool {
        Path::new(&self.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

fn archive_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<FileEntry>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            out.push(FileEntry::new(archive_path(relative), std::fs::read(&path)?));
        }
    }
    Ok(())
}

/// Recursively read every file under `src_dir`, sorted by path.
#[instrument]
pub fn collect_source_files(src_dir: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    walk(src_dir, src_dir, &mut entries)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = entries.len(), "Collected source files");
    Ok(entries)
}

/// Recompress image entries; everything else passes through untouched.
#[instrument(skip_all, fields(count = entries.len()))]
pub fn process_images(
    entries: Vec<FileEntry>,
    tools: &dyn ExternalTools,
) -> Result<Vec<FileEntry>, ToolError> {
    let mut images = 0usize;
    let processed = entries
        .into_iter()
        .map(|entry| {
            if !entry.is_image() {
                return Ok(entry);
            }
            images += 1;
            let contents = tools.recompress_image(&entry.path, &entry.contents)?;
            Ok(FileEntry {
                path: entry.path,
                contents,
            })
        })
        .collect::<Result<Vec<_>, ToolError>>()?;
    info!(images, "Processed images");
    Ok(processed)
}

/// Write entries below `dir`, overwriting existing files. Existing files
/// not in `entries` are left alone.
#[instrument(skip(entries), fields(count = entries.len()))]
pub fn write_entries(entries: &[FileEntry], dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let target = dir.join(&entry.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &entry.contents)?;
        written.push(target);
    }
    Ok(written)
}
