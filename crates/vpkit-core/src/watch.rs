//! Source directory watching.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Deduplicate and sort changed paths, dropping anything under `ignore`
/// (the staging directory, which deploy itself writes to).
pub fn changed_paths(paths: impl IntoIterator<Item = PathBuf>, ignore: &Path) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| !path.starts_with(ignore))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Absolute, symlink-free form of `path`, which need not exist yet. The
/// deepest existing ancestor is canonicalized and the rest is appended.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    let mut missing = Vec::new();
    let mut existing = path.as_path();
    loop {
        match existing.canonicalize() {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc, part| acc.join(part)));
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Ok(path),
            },
        }
    }
}

/// Watch `dir` recursively and call `on_change` for every debounced batch
/// of changes. Blocks until `on_change` breaks or the watcher shuts down.
pub fn watch<F>(dir: &Path, ignore: &Path, debounce: Duration, mut on_change: F) -> Result<()>
where
    F: FnMut(&[PathBuf]) -> ControlFlow<()>,
{
    // Events carry paths under the watched root, so both sides use the
    // same resolved form. `ignore` is usually absent between deploys.
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    let ignore = resolve_path(ignore)?;

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(debounce, tx).context("Failed to start file watcher")?;
    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    info!(dir = %dir.display(), "Watching for changes");

    for result in rx {
        match result {
            Ok(events) => {
                let paths = changed_paths(events.into_iter().map(|e| e.path), &ignore);
                if paths.is_empty() {
                    continue;
                }
                debug!(?paths, "Changed");
                info!(count = paths.len(), "Change detected");
                if on_change(&paths).is_break() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Watch error"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_paths_dedup_and_ignore() {
        let paths = vec![
            PathBuf::from("/p/src/index.lua"),
            PathBuf::from("/p/src/tmp/index.lua"),
            PathBuf::from("/p/src/gfx/a.png"),
            PathBuf::from("/p/src/index.lua"),
        ];
        assert_eq!(
            changed_paths(paths, Path::new("/p/src/tmp")),
            vec![
                PathBuf::from("/p/src/gfx/a.png"),
                PathBuf::from("/p/src/index.lua"),
            ]
        );
    }

    #[test]
    fn test_resolve_path_of_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().canonicalize().unwrap();
        std::fs::create_dir(base.join("src")).unwrap();

        assert_eq!(
            resolve_path(&root.path().join("src/gfx/../stage/deep")).unwrap(),
            base.join("src/stage/deep")
        );
        assert_eq!(resolve_path(&root.path().join("src")).unwrap(), base.join("src"));

        let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
        let relative = resolve_path(Path::new("no-such-dir/stage")).unwrap();
        assert!(relative.is_absolute());
        assert_eq!(relative, cwd.join("no-such-dir/stage"));
    }

    #[test]
    fn test_ignored_dir_created_after_watch_starts() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        std::fs::create_dir_all(src.join("gfx")).unwrap();
        // Spelled differently from the event paths and absent at start.
        let stage = src.join("gfx/../stage");

        let writer_src = src.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            std::fs::create_dir_all(writer_src.join("stage")).unwrap();
            std::fs::write(writer_src.join("stage/staged.lua"), "-- staged").unwrap();
            std::thread::sleep(Duration::from_millis(300));
            std::fs::write(writer_src.join("real.lua"), "-- real").unwrap();
        });

        let mut batches = Vec::new();
        watch(&src, &stage, Duration::from_millis(100), |paths| {
            batches.push(paths.to_vec());
            if paths.iter().any(|p| p.ends_with("real.lua")) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        writer.join().unwrap();

        let seen: Vec<_> = batches.into_iter().flatten().collect();
        assert!(
            seen.iter().all(|p| !p.components().any(|c| c.as_os_str() == "stage")),
            "staging change reported: {seen:?}"
        );
        assert!(seen.iter().any(|p| p.ends_with("real.lua")));
    }

    #[test]
    fn test_watch_missing_dir_fails() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let result = watch(&missing, root.path(), DEFAULT_DEBOUNCE, |_| {
            ControlFlow::Break(())
        });
        assert!(result.is_err());
    }
}
