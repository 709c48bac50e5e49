#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes a small real SQLite database and returns its bytes.
fn sqlite_file(path: &std::path::Path, marker: &str) -> Vec<u8> {
    {
        let conn = rusqlite::Connection::open(path).expect("open sqlite");
        conn.execute_batch("CREATE TABLE kv(key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .expect("create table");
        conn.execute("INSERT INTO kv(key, value) VALUES('marker', ?)", [marker])
            .expect("insert marker");
    }
    std::fs::read(path).expect("read sqlite bytes")
}

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("schoold-backup-src");
    let workspace2 = temp_dir("schoold-backup-dst");
    let out_dir = temp_dir("schoold-backup-out");

    let bytes = sqlite_file(&workspace.join("school.sqlite3"), "roundtrip");

    let bundle_path = out_dir.join("workspace.schoolbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 3);
    assert_eq!(export.db_sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    assert!(manifest.contains(&export.db_sha256));
    archive
        .by_name("db/school.sqlite3")
        .expect("database entry in bundle");

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);

    let restored = std::fs::read(workspace2.join("school.sqlite3")).expect("read restored db");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_database_entry_is_refused() {
    let out_dir = temp_dir("schoold-backup-tamper");
    let workspace = temp_dir("schoold-backup-tamper-dst");
    let current = sqlite_file(&workspace.join("school.sqlite3"), "current");

    let bundle_path = out_dir.join("tampered.zip");
    {
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        zip.write_all(
            br#"{"format":"schoold-workspace-v1","version":1,"dbSha256":"0000000000000000000000000000000000000000000000000000000000000000"}"#,
        )
        .expect("write manifest");
        zip.start_file("db/school.sqlite3", opts).expect("db entry");
        zip.write_all(b"other bytes").expect("write db");
        zip.finish().expect("finish");
    }

    let err = backup::import_workspace_bundle(&bundle_path, &workspace).unwrap_err();
    assert!(err.to_string().contains("checksum mismatch"), "{err}");
    let untouched = std::fs::read(workspace.join("school.sqlite3")).expect("read db");
    assert_eq!(untouched, current);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn raw_sqlite_import_is_supported() {
    let out_dir = temp_dir("schoold-backup-raw");
    let workspace = temp_dir("schoold-backup-raw-dst");

    let raw_file = out_dir.join("copy.sqlite3");
    let bytes = sqlite_file(&raw_file, "raw");

    let import = backup::import_workspace_bundle(&raw_file, &workspace).expect("import sqlite");
    assert_eq!(import.bundle_format_detected, backup::RAW_SQLITE_FORMAT);

    let restored = std::fs::read(workspace.join("school.sqlite3")).expect("read restored sqlite");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn files_that_are_not_databases_never_replace_the_live_one() {
    let out_dir = temp_dir("schoold-backup-junk");
    let workspace = temp_dir("schoold-backup-junk-dst");
    let current = sqlite_file(&workspace.join("school.sqlite3"), "current");

    let text = out_dir.join("notes.txt");
    std::fs::write(&text, b"this is not a database at all, just text").expect("write text");
    let err = backup::import_workspace_bundle(&text, &workspace).unwrap_err();
    assert!(err.to_string().contains("neither"), "{err}");

    // Right header, garbage body.
    let forged = out_dir.join("forged.sqlite3");
    let mut body = b"SQLite format 3\0".to_vec();
    body.extend(std::iter::repeat(0xAB).take(4096));
    std::fs::write(&forged, &body).expect("write forged");
    assert!(backup::import_workspace_bundle(&forged, &workspace).is_err());

    // A bundle whose checksum matches but whose database entry is text.
    let bundle_path = out_dir.join("text-inside.zip");
    {
        let junk = b"plain text";
        let sha = {
            use sha2::Digest;
            format!("{:x}", sha2::Sha256::digest(junk))
        };
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        write!(
            zip,
            r#"{{"format":"schoold-workspace-v1","version":1,"dbSha256":"{}"}}"#,
            sha
        )
        .expect("write manifest");
        zip.start_file("db/school.sqlite3", opts).expect("db entry");
        zip.write_all(junk).expect("write db");
        zip.finish().expect("finish");
    }
    assert!(backup::import_workspace_bundle(&bundle_path, &workspace).is_err());

    let untouched = std::fs::read(workspace.join("school.sqlite3")).expect("read db");
    assert_eq!(untouched, current);
    assert!(!workspace.join("school.sqlite3.importing").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
