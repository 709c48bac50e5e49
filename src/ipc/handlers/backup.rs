use crate::backup;
use crate::db;
use crate::ipc::helpers::{get_required_str, require_role, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::seed;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn backup_failed(e: anyhow::Error, path: &Path) -> HandlerErr {
    HandlerErr::new("backup_failed", format!("{e:#}"))
        .with_details(json!({ "path": path.to_string_lossy() }))
}

fn workspace_path(state: &AppState) -> Result<PathBuf, HandlerErr> {
    state.workspace.clone().ok_or_else(HandlerErr::no_workspace)
}

fn export_bundle(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let out = PathBuf::from(get_required_str(params, "outPath")?);
    let workspace = workspace_path(state)?;

    let summary = backup::export_workspace_bundle(&workspace, &out).map_err(|e| backup_failed(e, &out))?;
    tracing::info!(path = %out.display(), sha256 = %summary.db_sha256, "workspace exported");

    Ok(json!({
        "ok": true,
        "path": out.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "dbSha256": summary.db_sha256,
    }))
}

/// Replaces the workspace database and reopens it. The caller stays signed
/// in: the current session snapshot is written into the restored database.
fn import_bundle(state: &mut AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let src = PathBuf::from(get_required_str(params, "inPath")?);
    let workspace = workspace_path(state)?;
    if !src.is_file() {
        return Err(HandlerErr::not_found("bundle file not found")
            .with_details(json!({ "path": src.to_string_lossy() })));
    }

    // The open handle must be released before the file is replaced. A refused
    // import leaves the live file untouched, so the reopen below still works.
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace);
    let conn = db::open_db(&workspace)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    let imported = match imported {
        Ok(v) => v,
        Err(e) => {
            state.db = Some(conn);
            return Err(backup_failed(e, &src));
        }
    };

    let resumed = seed::initialize(&conn).and_then(|summary| {
        if let Some(user) = state.session.user().cloned() {
            state.session.update_current_user(&conn, user)?;
        }
        Ok(summary)
    });
    state.db = Some(conn);
    let seeded = resumed.map_err(HandlerErr::update_failed)?;
    tracing::info!(path = %src.display(), format = %imported.bundle_format_detected, "workspace imported");

    Ok(json!({
        "ok": true,
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": imported.bundle_format_detected,
        "seeded": seeded.seeded,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, &req.params),
        "backup.importWorkspaceBundle" => import_bundle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
