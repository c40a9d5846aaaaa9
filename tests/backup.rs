use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_table_curator::backup::{BackupPolicy, Destination, protected_write};
use kira_table_curator::error::CurateError;

fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn protected_write_keeps_previous_contents_in_backup() {
    let (_temp, root) = scratch();
    let path = root.join("genes.tsv");
    fs::write(&path, "gene\ng1\n").unwrap();

    let outcome = protected_write(&path, b"gene\ng1\ng2\n", &BackupPolicy::default()).unwrap();

    let backup = outcome.backup.expect("backup path");
    assert_eq!(fs::read_to_string(&backup).unwrap(), "gene\ng1\n");
    assert_eq!(fs::read_to_string(&path).unwrap(), "gene\ng1\ng2\n");
}

#[test]
fn repeated_writes_keep_every_backup() {
    let (_temp, root) = scratch();
    let path = root.join("genes.tsv");
    fs::write(&path, "v1").unwrap();

    protected_write(&path, b"v2", &BackupPolicy::default()).unwrap();
    protected_write(&path, b"v3", &BackupPolicy::default()).unwrap();

    assert_eq!(fs::read_to_string(root.join("genes.tsv.backup")).unwrap(), "v1");
    assert_eq!(fs::read_to_string(root.join("genes.tsv.backup.1")).unwrap(), "v2");
    assert_eq!(fs::read_to_string(&path).unwrap(), "v3");
}

#[test]
fn fresh_destination_has_no_backup() {
    let (_temp, root) = scratch();
    let path = root.join("nested").join("unified.tsv");

    let destination = Destination::acquire(&path, &BackupPolicy::default()).unwrap();
    assert!(destination.backup().is_none());
    let outcome = destination.commit(b"id\n").unwrap();

    assert!(outcome.backup.is_none());
    assert_eq!(fs::read_to_string(&path).unwrap(), "id\n");
}

#[test]
fn failed_backup_leaves_destination_untouched() {
    let (_temp, root) = scratch();
    let path = root.join("genes.tsv");
    fs::write(&path, "gene\ng1\n").unwrap();
    let policy = BackupPolicy {
        suffix: "/missing-dir/x".to_string(),
        ..BackupPolicy::default()
    };

    let err = protected_write(&path, b"gene\ng2\n", &policy).unwrap_err();

    assert_matches!(err, CurateError::Backup { path: failed, .. } if failed == path);
    assert_eq!(fs::read_to_string(&path).unwrap(), "gene\ng1\n");
}
