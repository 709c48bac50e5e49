//! Workspace bundles.
//!
//! A bundle is a zip holding `manifest.json`, the workspace database under
//! `db/` and a small metadata entry. A bare SQLite file is accepted on import
//! as well. Nothing that fails to open as a SQLite database ever replaces the
//! live file.

use anyhow::{anyhow, bail, Context};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DB_FILE: &str = "school.sqlite3";
const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/school.sqlite3";
const META_ENTRY: &str = "meta/workspace.json";
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
pub const BUNDLE_FORMAT_V1: &str = "schoold-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exported_at: Option<String>,
    /// Older bundles carry no checksum; those are imported unverified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_sha256: Option<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn put_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, opts)
        .with_context(|| format!("failed to start bundle entry {}", name))?;
    zip.write_all(bytes)
        .with_context(|| format!("failed to write bundle entry {}", name))?;
    Ok(())
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle missing {}", name))?;
    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .with_context(|| format!("failed to read bundle entry {}", name))?;
    Ok(out)
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.display()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.display()))?;

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        version: 1,
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        db_sha256: Some(db_sha256.clone()),
    };
    let meta = serde_json::json!({ "sourceWorkspace": workspace_path.to_string_lossy() });

    let mut zip = ZipWriter::new(out_file);
    put_entry(
        &mut zip,
        MANIFEST_ENTRY,
        serde_json::to_string_pretty(&manifest)?.as_bytes(),
    )?;
    put_entry(&mut zip, DB_ENTRY, &db_bytes)?;
    put_entry(&mut zip, META_ENTRY, serde_json::to_string_pretty(&meta)?.as_bytes())?;
    zip.finish().context("failed to finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: 3,
        db_sha256,
    })
}

/// Restores a bundle or a bare SQLite file into `workspace_path`.
///
/// The database bytes are checked against the manifest checksum and staged
/// next to the live file; the live file is only replaced once staging has
/// succeeded.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;

    if !is_zip_file(in_path)? {
        if !has_sqlite_header(in_path)? {
            bail!(
                "{} is neither a workspace bundle nor a SQLite database",
                in_path.display()
            );
        }
        let db_bytes = std::fs::read(in_path)
            .with_context(|| format!("failed to read sqlite file {}", in_path.display()))?;
        replace_database(workspace_path, &db_bytes)?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest: Manifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let db_bytes = read_entry(&mut archive, DB_ENTRY)?;
    if let Some(expected) = manifest.db_sha256.as_deref() {
        let actual = sha256_hex(&db_bytes);
        if actual != expected {
            return Err(anyhow!(
                "database checksum mismatch: manifest {} but entry {}",
                expected,
                actual
            ));
        }
    }
    replace_database(workspace_path, &db_bytes)?;

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
    })
}

fn replace_database(workspace_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if !bytes.starts_with(SQLITE_MAGIC) {
        bail!("bundled database is not a SQLite file");
    }
    let dst = workspace_path.join(DB_FILE);
    let staged = workspace_path.join(format!("{}.importing", DB_FILE));
    if staged.exists() {
        std::fs::remove_file(&staged)
            .with_context(|| format!("failed to remove stale {}", staged.display()))?;
    }
    {
        let mut out = File::create(&staged)
            .with_context(|| format!("failed to create {}", staged.display()))?;
        out.write_all(bytes)
            .and_then(|_| out.sync_all())
            .with_context(|| format!("failed to write {}", staged.display()))?;
    }
    if let Err(e) = check_database(&staged) {
        if let Err(cleanup) = std::fs::remove_file(&staged) {
            tracing::warn!(path = %staged.display(), error = %cleanup, "staged database left behind");
        }
        return Err(e);
    }
    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("failed to remove existing database {}", dst.display()))?;
    }
    std::fs::rename(&staged, &dst)
        .with_context(|| format!("failed to move staged database to {}", dst.display()))?;
    Ok(())
}

/// Opens the staged copy read-only and runs SQLite's own integrity pass.
fn check_database(path: &Path) -> anyhow::Result<()> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open staged database {}", path.display()))?;
    let verdict: String = conn
        .query_row("PRAGMA quick_check", [], |r| r.get(0))
        .context("staged database failed integrity check")?;
    if verdict != "ok" {
        bail!("staged database failed integrity check: {}", verdict);
    }
    Ok(())
}

fn read_signature<const N: usize>(path: &Path) -> anyhow::Result<Option<[u8; N]>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let mut sig = [0u8; N];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(Some(sig)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<4>(path)? == Some(ZIP_MAGIC))
}

fn has_sqlite_header(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<16>(path)?.as_ref() == Some(SQLITE_MAGIC))
}
