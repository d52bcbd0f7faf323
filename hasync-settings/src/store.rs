//! Locked read-modify-write access to the config file.
//!
//! A run holds an exclusive lock on a sidecar lock file from the read until
//! the replacement is in place. The new content is written to a temporary
//! file in the same directory and renamed over the original, so a reader
//! sees either the old or the new document and a failed write leaves the old
//! one untouched.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::document::ConfigDocument;
use crate::error::HaError;
use crate::probe::CapabilityProbe;
use crate::reconcile::{Outcome, ReconciliationResult, Reconciler};
use crate::request::HaSettingsRequest;

/// Default location of the OPNsense configuration.
pub const DEFAULT_CONFIG_PATH: &str = "/conf/config.xml";

/// Exclusive lock on a config file, released on drop.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %err, "failed to release config lock");
        }
    }
}

/// The config file and its lock.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    lock_path: PathBuf,
    stage_dir: Option<PathBuf>,
}

impl ConfigStore {
    /// Store for `path`, locked through `<path>.lock`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_name),
            stage_dir: None,
        }
    }

    pub fn with_lock_path(mut self, lock_path: impl Into<PathBuf>) -> Self {
        self.lock_path = lock_path.into();
        self
    }

    /// Write replacements in `dir` instead of next to the config. It must be
    /// on the same filesystem for the final rename to succeed.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stage_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the exclusive lock is held.
    pub fn lock(&self) -> Result<ConfigLock, HaError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| HaError::ConfigUnreadable {
                path: self.lock_path.clone(),
                source,
            })?;
        FileExt::lock_exclusive(&file).map_err(|source| HaError::ConfigUnreadable {
            path: self.lock_path.clone(),
            source,
        })?;
        debug!(lock = %self.lock_path.display(), "config lock acquired");
        Ok(ConfigLock {
            file,
            path: self.lock_path.clone(),
        })
    }

    /// Read and parse the config while holding `_lock`.
    pub fn read(&self, _lock: &ConfigLock) -> Result<ConfigDocument, HaError> {
        let raw = fs::read(&self.path).map_err(|source| HaError::ConfigUnreadable {
            path: self.path.clone(),
            source,
        })?;
        ConfigDocument::parse(&raw)
    }

    /// Atomically replace the config with `bytes` while holding `_lock`.
    ///
    /// The replacement keeps the permission bits of the original file.
    pub fn persist(&self, _lock: &ConfigLock, bytes: &[u8]) -> Result<(), HaError> {
        let persist_err = |source: std::io::Error| HaError::PersistenceError {
            path: self.path.clone(),
            source,
        };

        let dir = self.stage_dir.as_deref().unwrap_or_else(|| {
            self.path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
        });

        let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
        tmp.write_all(bytes).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;

        if let Ok(meta) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), meta.permissions()).map_err(persist_err)?;
        }

        tmp.persist(&self.path)
            .map_err(|err| persist_err(err.error))?;
        sync_dir(dir);

        info!(path = %self.path.display(), bytes = bytes.len(), "config written");
        Ok(())
    }

    /// Run one locked reconciliation against the config file.
    ///
    /// Nothing is written when validation fails, when there is no change, or
    /// when `check_mode` is set.
    pub fn reconcile<P: CapabilityProbe + ?Sized>(
        &self,
        reconciler: &Reconciler<'_, P>,
        request: &HaSettingsRequest,
        check_mode: bool,
    ) -> Result<ReconciliationResult, HaError> {
        let lock = self.lock()?;
        let mut document = self.read(&lock)?;
        let mut result = reconciler.reconcile(request, &mut document)?;

        if result.changed && !check_mode {
            debug!(stage = "writing", path = %self.path.display(), "persisting config");
            let bytes = document.render()?;
            self.persist(&lock, &bytes)?;
            result.outcome = Outcome::Committed;
        }

        Ok(result)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %err, "directory sync skipped");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::ConfigStore;
    use crate::catalog::ServiceCatalog;
    use crate::document::ConfigDocument;
    use crate::error::HaError;
    use crate::probe::{collect_interfaces, StaticProbe};
    use crate::reconcile::Reconciler;
    use crate::request::HaSettingsRequest;

    const CONFIG: &str = "<?xml version=\"1.0\"?>\n<opnsense>\n  <hasync/>\n</opnsense>\n";

    #[test]
    fn lock_path_defaults_next_to_config() {
        let store = ConfigStore::new("/conf/config.xml");
        assert_eq!(store.lock_path.to_str(), Some("/conf/config.xml.lock"));
    }

    #[test]
    fn persist_replaces_file_and_leaves_no_temp_files() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.xml");
        fs::write(&path, CONFIG).expect("write");

        let store = ConfigStore::new(&path);
        let lock = store.lock().expect("lock");
        store.persist(&lock, b"<opnsense/>\n").expect("persist");
        drop(lock);

        assert_eq!(fs::read_to_string(&path).expect("read"), "<opnsense/>\n");
        assert_eq!(entries(dir.path()), ["config.xml", "config.xml.lock"]);
    }

    #[cfg(unix)]
    #[test]
    fn persist_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.xml");
        fs::write(&path, CONFIG).expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");

        let store = ConfigStore::new(&path);
        let lock = store.lock().expect("lock");
        store.persist(&lock, CONFIG.as_bytes()).expect("persist");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn persist_into_missing_directory_fails_cleanly() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("missing").join("config.xml"))
            .with_lock_path(dir.path().join("config.lock"));
        let lock = store.lock().expect("lock");

        let err = store.persist(&lock, b"<opnsense/>").expect_err("no directory");
        assert!(matches!(err, HaError::PersistenceError { .. }));
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn second_holder_waits_for_the_lock() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.xml");
        fs::write(&path, CONFIG).expect("write");

        let store = ConfigStore::new(&path);
        let held = store.lock().expect("lock");

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let store = store.clone();
            thread::spawn(move || {
                let lock = store.lock().expect("second lock");
                let raw = fs::read_to_string(store.path()).expect("read");
                tx.send(raw).expect("send");
                drop(lock);
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        store.persist(&held, b"<opnsense/>\n").expect("persist");
        drop(held);

        let seen = rx.recv_timeout(Duration::from_secs(5)).expect("lock released");
        assert_eq!(seen, "<opnsense/>\n");
        waiter.join().expect("join");
    }

    #[test]
    fn failed_write_keeps_original_and_leaves_no_temp_file() {
        let dir = tempdir().expect("tempdir");
        let config_dir = dir.path().join("conf");
        fs::create_dir(&config_dir).expect("mkdir");
        let path = config_dir.join("config.xml");
        let original = "<opnsense>\n  <interfaces>\n    <lan><enable>1</enable><if>igb1</if></lan>\n  </interfaces>\n</opnsense>\n";
        fs::write(&path, original).expect("write");

        // Staging inside a regular file fails before anything is written.
        let not_a_dir = dir.path().join("staging");
        fs::write(&not_a_dir, "").expect("write");
        let store = ConfigStore::new(&path).with_staging_dir(&not_a_dir);

        let doc = ConfigDocument::parse(original.as_bytes()).expect("parse");
        let probe = StaticProbe {
            interfaces: collect_interfaces(doc.root()),
            version: "24.1".parse().expect("version"),
        };
        let catalog = ServiceCatalog::embedded().expect("catalog");
        let reconciler = Reconciler::new(&probe, &catalog);
        let request = HaSettingsRequest {
            synchronize_interface: "lan".to_string(),
            synchronize_states: Some(true),
            ..HaSettingsRequest::default()
        };

        let err = store
            .reconcile(&reconciler, &request, false)
            .expect_err("staging fails");
        assert!(matches!(err, HaError::PersistenceError { .. }));

        assert_eq!(fs::read_to_string(&path).expect("read"), original);
        assert_eq!(entries(&config_dir), ["config.xml", "config.xml.lock"]);
        assert_eq!(fs::read(&not_a_dir).expect("read"), b"");
    }

    #[test]
    fn read_reports_missing_config() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join("config.xml"));
        let lock = store.lock().expect("lock");

        let err = store.read(&lock).expect_err("missing");
        assert!(matches!(err, HaError::ConfigUnreadable { .. }));
    }
}
