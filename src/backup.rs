use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::CurateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub timestamped: bool,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            suffix: default_suffix(),
            timestamped: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_suffix() -> String {
    ".backup".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub path: String,
    pub backup: Option<String>,
    pub bytes: usize,
}

/// First free backup path for `path`: `<path><suffix>` (or
/// `<path>.<timestamp><suffix>`), then `.1`, `.2`, ... so an older backup
/// is never replaced.
pub fn backup_path(path: &Utf8Path, policy: &BackupPolicy) -> Utf8PathBuf {
    let base = if policy.timestamped {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        format!("{path}.{stamp}{}", policy.suffix)
    } else {
        format!("{path}{}", policy.suffix)
    };
    let mut candidate = Utf8PathBuf::from(&base);
    let mut counter = 1;
    while candidate.as_std_path().exists() {
        candidate = Utf8PathBuf::from(format!("{base}.{counter}"));
        counter += 1;
    }
    candidate
}

/// Exclusive hold on a destination file for one write.
///
/// Acquiring moves the current file (if any) aside to its backup path.
/// [`Destination::commit`] writes the new contents; dropping without a
/// commit moves the backup back.
#[derive(Debug)]
pub struct Destination {
    path: Utf8PathBuf,
    backup: Option<Utf8PathBuf>,
    committed: bool,
}

impl Destination {
    pub fn acquire(path: &Utf8Path, policy: &BackupPolicy) -> Result<Self, CurateError> {
        let mut backup = None;
        if policy.enabled && path.as_std_path().exists() {
            let target = backup_path(path, policy);
            fs::rename(path.as_std_path(), target.as_std_path()).map_err(|err| {
                CurateError::Backup {
                    path: path.to_path_buf(),
                    message: format!("rename to {target}: {err}"),
                }
            })?;
            info!(path = %path, backup = %target, "moved existing file to backup");
            backup = Some(target);
        }
        Ok(Self {
            path: path.to_path_buf(),
            backup,
            committed: false,
        })
    }

    pub fn backup(&self) -> Option<&Utf8Path> {
        self.backup.as_deref()
    }

    pub fn commit(mut self, contents: &[u8]) -> Result<WriteOutcome, CurateError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CurateError::Filesystem(format!("create {parent}: {err}")))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".kira-tc")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CurateError::Filesystem(err.to_string()))?;
        temp.write_all(contents)
            .map_err(|err| CurateError::Filesystem(format!("write {}: {err}", self.path)))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| CurateError::Filesystem(format!("sync {}: {err}", self.path)))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| CurateError::Filesystem(format!("persist {}: {err}", self.path)))?;

        self.committed = true;
        info!(path = %self.path, bytes = contents.len(), "wrote table");
        Ok(WriteOutcome {
            path: self.path.to_string(),
            backup: self.backup.as_ref().map(ToString::to_string),
            bytes: contents.len(),
        })
    }
}

impl Drop for Destination {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let Some(backup) = &self.backup else {
            return;
        };
        if self.path.as_std_path().exists() {
            return;
        }
        match fs::rename(backup.as_std_path(), self.path.as_std_path()) {
            Ok(()) => warn!(path = %self.path, "write not committed, restored backup"),
            Err(err) => error!(
                path = %self.path,
                backup = %backup,
                error = %err,
                "write not committed and backup could not be restored"
            ),
        }
    }
}

pub fn protected_write(
    path: &Utf8Path,
    contents: &[u8],
    policy: &BackupPolicy,
) -> Result<WriteOutcome, CurateError> {
    Destination::acquire(path, policy)?.commit(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn fixed_suffix_never_replaces_older_backup() {
        let (_temp, root) = scratch();
        let path = root.join("genes.tsv");
        let policy = BackupPolicy::default();

        assert_eq!(backup_path(&path, &policy), root.join("genes.tsv.backup"));
        fs::write(root.join("genes.tsv.backup"), b"old").unwrap();
        assert_eq!(backup_path(&path, &policy), root.join("genes.tsv.backup.1"));
    }

    #[test]
    fn timestamped_backup_keeps_suffix() {
        let (_temp, root) = scratch();
        let policy = BackupPolicy {
            timestamped: true,
            ..BackupPolicy::default()
        };
        let path = backup_path(&root.join("genes.tsv"), &policy);
        assert!(path.as_str().ends_with(".backup"));
        assert!(path.as_str().contains("genes.tsv."));
    }

    #[test]
    fn uncommitted_destination_restores_backup() {
        let (_temp, root) = scratch();
        let path = root.join("genes.tsv");
        fs::write(&path, b"previous").unwrap();

        let destination = Destination::acquire(&path, &BackupPolicy::default()).unwrap();
        assert!(!path.as_std_path().exists());
        assert!(destination.backup().is_some());
        drop(destination);

        assert_eq!(fs::read(&path).unwrap(), b"previous");
        assert!(!root.join("genes.tsv.backup").as_std_path().exists());
    }

    #[test]
    fn disabled_policy_overwrites_in_place() {
        let (_temp, root) = scratch();
        let path = root.join("genes.tsv");
        fs::write(&path, b"previous").unwrap();
        let policy = BackupPolicy {
            enabled: false,
            ..BackupPolicy::default()
        };

        let outcome = protected_write(&path, b"next", &policy).unwrap();

        assert!(outcome.backup.is_none());
        assert_eq!(fs::read(&path).unwrap(), b"next");
        assert!(!root.join("genes.tsv.backup").as_std_path().exists());
    }
}
