//! Temp file tracking for the file-roundtrip strategy
//!
//! Every file written by a [`crate::FileRoundtripStrategy`] is recorded here
//! together with the strategy instance that owns it. The tracker is shared
//! through an `Arc` and supports concurrent appends from renders in flight.
//! Once more than `sweep_threshold` files are tracked, a background sweep
//! deletes files older than `max_age`. Dropping the tracker deletes every
//! file it still knows about.

use page_render_core::config::{DEFAULT_MAX_AGE_SECS, DEFAULT_SWEEP_THRESHOLD};
use page_render_core::RenderConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Identifies the strategy instance that created a file
pub type OwnerId = u64;

#[derive(Debug, Clone)]
struct TrackedFile {
    path: PathBuf,
    owner: OwnerId,
    created: Instant,
}

#[derive(Debug)]
pub struct TempFileTracker {
    directory: PathBuf,
    sweep_threshold: usize,
    max_age: Duration,
    entries: Mutex<Vec<TrackedFile>>,
    next_owner: AtomicU64,
    sweep_scheduled: AtomicBool,
}

impl TempFileTracker {
    /// Tracker with the default sweep threshold (100) and max age (1 hour)
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_limits(
            directory,
            DEFAULT_SWEEP_THRESHOLD,
            Duration::from_secs(DEFAULT_MAX_AGE_SECS),
        )
    }

    pub fn with_limits(directory: impl Into<PathBuf>, sweep_threshold: usize, max_age: Duration) -> Self {
        Self {
            directory: directory.into(),
            sweep_threshold,
            max_age,
            entries: Mutex::new(Vec::new()),
            next_owner: AtomicU64::new(1),
            sweep_scheduled: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::with_limits(
            config.temp_directory(),
            config.sweep_threshold(),
            config.max_temp_file_age(),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the temp directory if needed
    pub fn ensure_directory(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.directory)
    }

    /// Allocate an owner id for a new strategy instance
    pub fn register_owner(&self) -> OwnerId {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a created file; schedules a sweep once the threshold is exceeded
    pub fn track(self: &Arc<Self>, path: PathBuf, owner: OwnerId) {
        let len = {
            let mut entries = self.lock();
            entries.push(TrackedFile {
                path,
                owner,
                created: Instant::now(),
            });
            entries.len()
        };

        if len > self.sweep_threshold && !self.sweep_scheduled.swap(true, Ordering::AcqRel) {
            debug!("{} temp files tracked, scheduling sweep", len);
            self.schedule_sweep();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Paths currently tracked, oldest first
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|f| f.path.clone()).collect()
    }

    /// Delete tracked files older than the max age; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired = self.take_where(|f| now.duration_since(f.created) > self.max_age);
        let removed = delete_all(&expired);
        if removed > 0 {
            info!("Swept {} expired temp files from {}", removed, self.directory.display());
        }
        removed
    }

    /// Delete every file created by `owner`
    pub fn cleanup_owner(&self, owner: OwnerId) -> usize {
        let owned = self.take_where(|f| f.owner == owner);
        delete_all(&owned)
    }

    /// Delete every tracked file, for use at shutdown
    pub fn cleanup_all(&self) -> usize {
        let all = self.take_where(|_| true);
        let removed = delete_all(&all);
        if removed > 0 {
            info!("Removed {} temp files", removed);
        }
        removed
    }

    fn schedule_sweep(self: &Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let tracker = Arc::clone(self);
                handle.spawn_blocking(move || {
                    tracker.sweep_expired();
                    tracker.sweep_scheduled.store(false, Ordering::Release);
                });
            }
            Err(_) => {
                self.sweep_expired();
                self.sweep_scheduled.store(false, Ordering::Release);
            }
        }
    }

    /// Remove matching entries from the registry, returning them
    fn take_where(&self, mut pred: impl FnMut(&TrackedFile) -> bool) -> Vec<TrackedFile> {
        let mut entries = self.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = entries.drain(..).partition(|f| pred(f));
        *entries = kept;
        taken
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TrackedFile>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TempFileTracker {
    fn drop(&mut self) {
        self.cleanup_all();
    }
}

/// Delete a file, treating an already missing file as removed
pub(crate) fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove temp file {}: {}", path.display(), e);
            false
        }
    }
}

fn delete_all(files: &[TrackedFile]) -> usize {
    files.iter().filter(|f| remove_quietly(&f.path)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_cleanup_owner_only_removes_owned_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempFileTracker::new(dir.path()));
        let a = tracker.register_owner();
        let b = tracker.register_owner();
        let pa = touch(dir.path(), "a.png");
        let pb = touch(dir.path(), "b.png");
        tracker.track(pa.clone(), a);
        tracker.track(pb.clone(), b);

        assert_eq!(tracker.cleanup_owner(a), 1);
        assert!(!pa.exists());
        assert!(pb.exists());
        assert_eq!(tracker.tracked_paths(), vec![pb]);
    }

    #[test]
    fn test_sweep_only_removes_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempFileTracker::with_limits(
            dir.path(),
            1000,
            Duration::from_secs(3600),
        ));
        let owner = tracker.register_owner();
        let path = touch(dir.path(), "fresh.png");
        tracker.track(path.clone(), owner);

        assert_eq!(tracker.sweep_expired(), 0);
        assert!(path.exists());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_exceeding_threshold_sweeps_without_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempFileTracker::with_limits(dir.path(), 2, Duration::ZERO));
        let owner = tracker.register_owner();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| touch(dir.path(), &format!("p{i}.png")))
            .collect();
        tracker.track(paths[0].clone(), owner);
        tracker.track(paths[1].clone(), owner);
        std::thread::sleep(Duration::from_millis(5));
        tracker.track(paths[2].clone(), owner);

        // Third insert exceeds the threshold; with no runtime the sweep runs inline
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(tracker.len() <= 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exceeding_threshold_sweeps_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempFileTracker::with_limits(dir.path(), 2, Duration::ZERO));
        let owner = tracker.register_owner();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| touch(dir.path(), &format!("p{i}.png")))
            .collect();
        tracker.track(paths[0].clone(), owner);
        tracker.track(paths[1].clone(), owner);
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracker.track(paths[2].clone(), owner);

        let deadline = Instant::now() + Duration::from_secs(5);
        while paths[0].exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!paths[0].exists());
    }

    #[test]
    fn test_drop_removes_remaining_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "left.png");
        {
            let tracker = Arc::new(TempFileTracker::new(dir.path()));
            let owner = tracker.register_owner();
            tracker.track(path.clone(), owner);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_counts_as_removed() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(TempFileTracker::new(dir.path()));
        let owner = tracker.register_owner();
        tracker.track(dir.path().join("never-written.png"), owner);
        assert_eq!(tracker.cleanup_all(), 1);
        assert!(tracker.is_empty());
    }
}
