use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn deposit_file() -> tempfile::NamedTempFile {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op,user,order,amount,at,session,event").unwrap();
    writeln!(csv, "deposit,1,,100.00").unwrap();
    csv
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let csv = deposit_file();
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(csv.path()).arg("--db-path").arg(dir.path().join("ledger_db"));

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage.",
        ))
        .stdout(predicate::str::contains("1,100.00,0.00,100.00"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let csv = deposit_file();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(csv.path()).arg("--db-path").arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Falling back").not());
}
