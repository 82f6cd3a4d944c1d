//! JSON-file backed appeal store.
//!
//! Each operation takes an exclusive advisory lock on `<db>.lock`, loads the
//! ledger, applies the change and, for mutations, writes the new ledger to a
//! temp file that is fsynced and renamed over the database. The containing
//! directory is fsynced after the rename so the new entry survives a crash.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, info};

use super::record::{Appeal, AppealId, AppealKind, AppealStatus, UserId};
use super::store::{AppealLedger, AppealStore, LEDGER_VERSION, SubmissionPolicy};
use crate::error::{AppealError, StorageError};

pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    policy: SubmissionPolicy,
    // flock is per open file description; this serializes threads in one process.
    guard: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the database at `path`.
    ///
    /// An existing file is read once so a corrupt or future-version database
    /// is reported at startup rather than on the first action.
    pub fn open(path: impl Into<PathBuf>, policy: SubmissionPolicy) -> Result<Self, AppealError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock_path = sibling(&path, "lock");
        let store = Self {
            path,
            lock_path,
            policy,
            guard: Mutex::new(()),
        };
        store.read(|ledger| {
            debug!(path = %store.path.display(), appeals = ledger.appeals.len(), "opened appeal database");
            Ok(())
        })?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<(std::sync::MutexGuard<'_, ()>, File), AppealError> {
        let guard = self.guard.lock().map_err(|_| StorageError::Poisoned)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok((guard, file))
    }

    fn load(&self) -> Result<AppealLedger, AppealError> {
        if !self.path.exists() {
            return Ok(AppealLedger::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AppealLedger::default());
        }
        let ledger: AppealLedger = serde_json::from_str(&content)?;
        if ledger.version > LEDGER_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: ledger.version,
                supported: LEDGER_VERSION,
            }
            .into());
        }
        Ok(ledger)
    }

    fn save(&self, ledger: &AppealLedger) -> Result<(), AppealError> {
        let content = serde_json::to_string_pretty(ledger)?;
        let tmp_path = sibling(&self.path, "tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        File::open(parent_dir(&self.path))?.sync_all()?;
        Ok(())
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&AppealLedger) -> Result<T, AppealError>,
    ) -> Result<T, AppealError> {
        let (_guard, lock) = self.lock()?;
        let result = self.load().and_then(|ledger| f(&ledger));
        FileExt::unlock(&lock)?;
        result
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut AppealLedger) -> Result<T, AppealError>,
    ) -> Result<T, AppealError> {
        let (_guard, lock) = self.lock()?;
        let result = self.load().and_then(|mut ledger| {
            let value = f(&mut ledger)?;
            self.save(&ledger)?;
            Ok(value)
        });
        FileExt::unlock(&lock)?;
        result
    }
}

/// `<file name>.<suffix>` next to `path`; never equal to `path` itself.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl AppealStore for FileStore {
    fn create(
        &self,
        user_id: UserId,
        username: Option<String>,
        kind: AppealKind,
    ) -> Result<Appeal, AppealError> {
        let policy = self.policy;
        let appeal = self.write(|l| l.insert_pending(user_id, username, kind, policy))?;
        info!(id = appeal.id, user_id, %kind, "appeal created");
        Ok(appeal)
    }

    fn get(&self, id: AppealId) -> Result<Appeal, AppealError> {
        self.read(|l| l.get(id))
    }

    fn list_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, AppealError> {
        self.read(|l| Ok(l.by_status(status)))
    }

    fn set_status(&self, id: AppealId, status: AppealStatus) -> Result<Appeal, AppealError> {
        let appeal = self.write(|l| l.transition(id, status))?;
        info!(id, %status, "appeal resolved");
        Ok(appeal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> FileStore {
        FileStore::open(dir.path().join("appeals.json"), SubmissionPolicy::default()).unwrap()
    }

    #[test]
    fn missing_database_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store.list_by_status(AppealStatus::Pending).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = open(&dir);
            let appeal = store.create(42, Some("alice".into()), AppealKind::UnbanAppeal).unwrap();
            store.set_status(appeal.id, AppealStatus::Approved).unwrap();
            store.create(7, None, AppealKind::AdminRequest).unwrap();
            appeal.id
        };

        let reopened = open(&dir);
        let appeal = reopened.get(id).unwrap();
        assert_eq!(appeal.status, AppealStatus::Approved);
        assert_eq!(appeal.username.as_deref(), Some("alice"));
        assert!(appeal.resolved_at.is_some());

        let next = reopened.create(8, None, AppealKind::UnbanAppeal).unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn duplicate_check_is_persisted() {
        let dir = TempDir::new().unwrap();
        open(&dir).create(42, None, AppealKind::UnbanAppeal).unwrap();
        let err = open(&dir).create(42, None, AppealKind::UnbanAppeal).unwrap_err();
        assert!(matches!(err, AppealError::DuplicatePending { .. }));
    }

    #[test]
    fn failed_transition_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let appeal = store.create(42, None, AppealKind::UnbanAppeal).unwrap();
        store.set_status(appeal.id, AppealStatus::Approved).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        assert!(store.set_status(appeal.id, AppealStatus::Rejected).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn document_is_keyed_by_id() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.create(42, None, AppealKind::UnbanAppeal).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["next_id"], 2);
        assert_eq!(doc["appeals"]["1"]["kind"], "unban");
        assert_eq!(doc["appeals"]["1"]["status"], "pending");
    }

    #[test]
    fn newer_version_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appeals.json");
        fs::write(&path, r#"{"version": 99, "next_id": 1, "appeals": {}}"#).unwrap();

        let result = FileStore::open(&path, SubmissionPolicy::default());
        assert!(matches!(
            result,
            Err(AppealError::Storage(StorageError::UnsupportedVersion { found: 99, .. }))
        ));
    }

    #[test]
    fn corrupt_database_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appeals.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStore::open(&path, SubmissionPolicy::default()),
            Err(AppealError::Storage(StorageError::Json(_)))
        ));
    }

    #[test]
    fn side_files_never_alias_the_database() {
        let db = Path::new("data/appeals.lock");
        assert_eq!(sibling(db, "lock"), PathBuf::from("data/appeals.lock.lock"));
        assert_eq!(sibling(db, "tmp"), PathBuf::from("data/appeals.lock.tmp"));
        assert_eq!(
            sibling(Path::new("appeals.json"), "lock"),
            PathBuf::from("appeals.json.lock")
        );
    }

    #[test]
    fn database_named_like_a_lock_file_keeps_working() {
        let dir = TempDir::new().unwrap();
        let store =
            FileStore::open(dir.path().join("appeals.lock"), SubmissionPolicy::default()).unwrap();
        store.create(42, None, AppealKind::UnbanAppeal).unwrap();
        assert!(dir.path().join("appeals.lock.lock").exists());

        let err = store.create(42, None, AppealKind::UnbanAppeal).unwrap_err();
        assert!(matches!(err, AppealError::DuplicatePending { .. }));
    }

    #[test]
    fn bare_file_name_syncs_current_directory() {
        assert_eq!(parent_dir(Path::new("appeals.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/appeals.json")), Path::new("data"));
        assert!(File::open(parent_dir(Path::new("appeals.json"))).unwrap().sync_all().is_ok());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.create(42, None, AppealKind::UnbanAppeal).unwrap();
        assert!(store.path().exists());
        assert!(!sibling(store.path(), "tmp").exists());
    }

    #[test]
    fn concurrent_creates_across_handles_insert_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appeals.json");
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let store = FileStore::open(&path, SubmissionPolicy::default()).unwrap();
                    store.create(42, None, AppealKind::AdminRequest).is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);

        let store = FileStore::open(&path, SubmissionPolicy::default()).unwrap();
        assert_eq!(store.list_by_status(AppealStatus::Pending).unwrap().len(), 1);
    }
}
