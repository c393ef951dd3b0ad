//! Static asset collection.
//!
//! Copies every file under the configured source directories into one
//! destination root. A relative path claimed by an earlier source is not
//! overwritten by a later one. Hidden entries and `~` backups are skipped.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::{DirEntry, WalkDir};

use super::{Stage, StartupContext, Step};
use crate::error::{SequencerError, SequencerResult};

/// Counts from one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Files written to the destination
    pub copied: usize,
    /// Files already up to date in the destination
    pub unmodified: usize,
    /// Entries skipped by the ignore rules
    pub ignored: usize,
    /// Files shadowed by the same path in an earlier source
    pub duplicates: usize,
}

/// Collect `sources` into `destination`.
///
/// With `clear` set the destination is emptied first. Any filesystem
/// error aborts the collection.
pub fn collect_static(
    sources: &[PathBuf],
    destination: &Path,
    clear: bool,
) -> SequencerResult<CollectReport> {
    if clear {
        clear_directory(destination)?;
    }
    fs::create_dir_all(destination).map_err(|e| SequencerError::filesystem(destination, e))?;
    let resolved_destination =
        fs::canonicalize(destination).map_err(|e| SequencerError::filesystem(destination, e))?;

    let mut report = CollectReport::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for source in sources {
        let meta = fs::metadata(source).map_err(|e| SequencerError::filesystem(source, e))?;
        if !meta.is_dir() {
            return Err(SequencerError::filesystem(
                source,
                io::Error::other("static source is not a directory"),
            ));
        }

        let resolved_source =
            fs::canonicalize(source).map_err(|e| SequencerError::filesystem(source, e))?;
        // Only a destination nested in this source can show up in the walk.
        let nested = resolved_destination.starts_with(&resolved_source);

        let mut ignored = 0;
        let walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if nested && is_same_dir(entry, &resolved_destination) {
                    return false;
                }
                if is_ignored(entry) {
                    ignored += 1;
                    return false;
                }
                true
            });

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(source, e))?;
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| SequencerError::filesystem(entry.path(), io::Error::other(e)))?
                .to_path_buf();

            if !claimed.insert(relative.clone()) {
                tracing::debug!(
                    path = %relative.display(),
                    source = %source.display(),
                    "Skipping file already collected from an earlier source"
                );
                report.duplicates += 1;
                continue;
            }

            let target = destination.join(&relative);
            if is_unmodified(entry.path(), &target) {
                report.unmodified += 1;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| SequencerError::filesystem(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| SequencerError::filesystem(&target, e))?;
            report.copied += 1;
        }

        report.ignored += ignored;
    }

    Ok(report)
}

/// Whether `entry` is the directory `resolved`, however its path is spelled.
fn is_same_dir(entry: &DirEntry, resolved: &Path) -> bool {
    entry.file_type().is_dir()
        && fs::canonicalize(entry.path()).is_ok_and(|path| path == resolved)
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.') || name.ends_with('~'))
}

/// Same length and a destination at least as new as the source.
fn is_unmodified(source: &Path, target: &Path) -> bool {
    let (Ok(src), Ok(dst)) = (fs::metadata(source), fs::metadata(target)) else {
        return false;
    };
    if !dst.is_file() || src.len() != dst.len() {
        return false;
    }
    match (src.modified(), dst.modified()) {
        (Ok(src_time), Ok(dst_time)) => dst_time >= src_time,
        _ => false,
    }
}

fn clear_directory(dir: &Path) -> SequencerResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SequencerError::filesystem(dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| SequencerError::filesystem(dir, e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SequencerError::filesystem(&path, e))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| SequencerError::filesystem(&path, e))?;
    }

    tracing::info!(destination = %dir.display(), "Cleared static destination");
    Ok(())
}

fn walk_error(source: &Path, err: walkdir::Error) -> SequencerError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| source.to_path_buf());
    let io_err = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
    SequencerError::filesystem(path, io_err)
}

/// Step 2: collect static assets into `STATIC_ROOT`.
#[derive(Debug, Default)]
pub struct CollectAssets;

#[async_trait]
impl Step for CollectAssets {
    fn name(&self) -> &'static str {
        "collectstatic"
    }

    fn stage(&self) -> Stage {
        Stage::CollectingAssets
    }

    async fn run(self: Box<Self>, ctx: &mut StartupContext) -> SequencerResult<()> {
        let config = &ctx.settings.assets;
        let destination = config.destination()?.to_path_buf();
        let sources = config.source_dirs();
        let clear = config.clear;

        tracing::info!(
            destination = %destination.display(),
            sources = sources.len(),
            clear,
            "Collecting static assets"
        );

        let dest = destination.clone();
        let report = tokio::task::spawn_blocking(move || collect_static(&sources, &dest, clear))
            .await
            .map_err(|e| {
                SequencerError::filesystem(
                    &destination,
                    io::Error::other(format!("collection task failed: {e}")),
                )
            })??;

        tracing::info!(
            copied = report.copied,
            unmodified = report.unmodified,
            ignored = report.ignored,
            duplicates = report.duplicates,
            "Static assets collected"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Relative path -> contents for every file under `root`.
    fn snapshot(root: &Path) -> BTreeMap<String, String> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_collects_all_files() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "css/site.css", "body {}");
        write(src.path(), "js/app.js", "console.log(1)");
        write(src.path(), "img/logo.svg", "<svg/>");

        let report = collect_static(&[src.path().to_path_buf()], dest.path(), false).unwrap();

        assert_eq!(report.copied, 3);
        assert_eq!(
            snapshot(dest.path()).keys().cloned().collect::<Vec<_>>(),
            vec!["css/site.css", "img/logo.svg", "js/app.js"]
        );
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "a.txt", "alpha");
        write(src.path(), "nested/b.txt", "beta");
        let sources = vec![src.path().to_path_buf()];

        collect_static(&sources, dest.path(), false).unwrap();
        let first = snapshot(dest.path());

        let report = collect_static(&sources, dest.path(), false).unwrap();
        assert_eq!(snapshot(dest.path()), first);
        assert_eq!(report.copied, 0);
        assert_eq!(report.unmodified, 2);
    }

    #[test]
    fn test_overwrites_stale_destination_file() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "a.txt", "new contents");
        write(dest.path(), "a.txt", "old");

        let report = collect_static(&[src.path().to_path_buf()], dest.path(), false).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "new contents");
    }

    #[test]
    fn test_earlier_source_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(first.path(), "theme.css", "first");
        write(second.path(), "theme.css", "second");
        write(second.path(), "extra.css", "extra");

        let report = collect_static(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            dest.path(),
            false,
        )
        .unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(fs::read_to_string(dest.path().join("theme.css")).unwrap(), "first");
        assert!(dest.path().join("extra.css").exists());
    }

    #[test]
    fn test_hidden_and_backup_files_are_ignored() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "app.js", "ok");
        write(src.path(), "app.js~", "backup");
        write(src.path(), ".DS_Store", "junk");
        write(src.path(), ".git/config", "junk");

        let report = collect_static(&[src.path().to_path_buf()], dest.path(), false).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.ignored, 3);
        assert_eq!(snapshot(dest.path()).len(), 1);
    }

    #[test]
    fn test_clear_removes_previous_contents() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "kept.txt", "kept");
        write(dest.path(), "stale/old.txt", "stale");

        collect_static(&[src.path().to_path_buf()], dest.path(), true).unwrap();

        assert_eq!(
            snapshot(dest.path()).keys().cloned().collect::<Vec<_>>(),
            vec!["kept.txt"]
        );
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dest = TempDir::new().unwrap();
        let missing = dest.path().join("does-not-exist");

        let err = collect_static(&[missing.clone()], &dest.path().join("out"), false).unwrap_err();

        match err {
            SequencerError::Filesystem { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_source_must_be_a_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file.txt", "x");

        let err = collect_static(&[dir.path().join("file.txt")], &dir.path().join("out"), false)
            .unwrap_err();
        assert!(matches!(err, SequencerError::Filesystem { .. }));
    }

    #[test]
    fn test_destination_inside_source_under_another_spelling() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("static");
        write(&src, "app.js", "main()");
        write(&src, "css/site.css", "body {}");
        fs::create_dir_all(dir.path().join("other")).unwrap();
        let dest = dir.path().join("other/../static/collected");
        let sources = vec![src.clone()];

        for _ in 0..3 {
            collect_static(&sources, &dest, false).unwrap();
        }

        assert_eq!(
            snapshot(&src.join("collected")).keys().cloned().collect::<Vec<_>>(),
            vec!["app.js", "css/site.css"]
        );
    }

    #[test]
    fn test_no_sources_creates_empty_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("static");

        let report = collect_static(&[], &dest, false).unwrap();

        assert_eq!(report, CollectReport::default());
        assert!(dest.is_dir());
    }
}
