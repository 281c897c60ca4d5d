//! Source tree watcher
//!
//! Turns filesystem changes under the watched project directories into
//! refresh requests. The watcher thread never blocks on the supervisor: a
//! request while one is pending is dropped.

use super::refresh::Refresher;
use crate::error::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Project directories watched while serving
pub const WATCHED_PATHS: &[&str] = &["app", "cmd", "x", "proto", "third_party"];

/// Active watch; dropping it releases the watch
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl std::fmt::Debug for SourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatcher")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl SourceWatcher {
    /// Watch [`WATCHED_PATHS`] below `root`; missing directories are skipped
    ///
    /// # Errors
    /// `ChainError::Watch` if the platform watcher cannot be created or a
    /// present directory cannot be watched.
    pub fn arm(root: &Path, refresher: Refresher) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event) => {
                if refresher.request() {
                    tracing::debug!(paths = ?event.paths, "source change detected");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        })?;

        let mut roots = Vec::new();
        for relative in WATCHED_PATHS {
            let path = root.join(relative);
            if !path.is_dir() {
                continue;
            }
            watcher.watch(&path, RecursiveMode::Recursive)?;
            roots.push(path);
        }

        tracing::debug!(roots = ?roots, "watching sources");
        Ok(Self {
            _watcher: watcher,
            roots,
        })
    }

    /// Directories actually watched
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn is_relevant(event: &Event) -> bool {
    let kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_)
    ) && !matches!(event.kind, EventKind::Modify(ModifyKind::Metadata(_)));

    kind && event.paths.iter().any(|p| !is_hidden(p))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n.ends_with('~'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serve::refresh::RefreshSlot;
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn relevance_filter() {
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "/a/x/keeper.go")));
        assert!(is_relevant(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/a/app/app.go"
        )));
        assert!(!is_relevant(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
            "/a/app/app.go"
        )));
        assert!(!is_relevant(&event(EventKind::Create(CreateKind::File), "/a/x/.keeper.go.swp")));
        assert!(!is_relevant(&event(EventKind::Access(notify::event::AccessKind::Any), "/a/x/k.go")));
    }

    #[test]
    fn missing_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();

        let slot = RefreshSlot::new();
        let watcher = SourceWatcher::arm(dir.path(), slot.refresher()).unwrap();
        assert_eq!(
            watcher.roots(),
            &[dir.path().join("app"), dir.path().join("x")]
        );
    }

    #[tokio::test]
    async fn file_write_requests_refresh() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("x/mars")).unwrap();

        let mut slot = RefreshSlot::new();
        let _watcher = SourceWatcher::arm(dir.path(), slot.refresher()).unwrap();

        std::fs::write(dir.path().join("x/mars/keeper.go"), "package mars").unwrap();
        tokio::time::timeout(Duration::from_secs(10), slot.requested())
            .await
            .expect("change should be reported");
    }
}
