use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{conn, require_role, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::seed;
use crate::session::Session;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "signedIn": state.session.user().is_some(),
            "aiConfigured": state.config.ai_endpoint().is_some(),
        }),
    )
}

/// Opens the workspace database, seeds missing collections and resumes the
/// persisted session.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<Vec<&'static str>> {
    let conn = db::open_db(path)?;
    let summary = seed::initialize(&conn)?;
    let session = Session::restore(&conn)?;
    tracing::info!(
        workspace = %path.display(),
        seeded = ?summary.seeded,
        signed_in = session.user().is_some(),
        "workspace opened"
    );
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.session = session;
    Ok(summary.seeded)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(seeded) => ok(
            &req.id,
            json!({ "workspacePath": path.to_string_lossy(), "seeded": seeded }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn store_initialize(state: &mut AppState) -> HandlerResult {
    let conn = conn(state)?;
    let summary = seed::initialize(conn).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "seeded": summary.seeded }))
}

fn store_keys(state: &mut AppState) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let keys = db::kv_keys(conn).map_err(HandlerErr::query_failed)?;
    Ok(json!({ "keys": keys }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "store.initialize" => Some(respond(req, store_initialize(state))),
        "store.keys" => Some(respond(req, store_keys(state))),
        _ => None,
    }
}
