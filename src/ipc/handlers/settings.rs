use crate::ipc::helpers::{conn, require_role, respond, to_json, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, SystemSettings, GRADE_LEVELS, SUBJECTS};
use crate::store;
use serde_json::{json, Map, Value};

fn settings_get(state: &AppState) -> HandlerResult {
    require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let settings = store::load_settings(conn).map_err(HandlerErr::query_failed)?;
    Ok(json!({
        "settings": to_json(&settings)?,
        "gradeLevels": GRADE_LEVELS,
        "subjects": SUBJECTS,
    }))
}

/// Merges the given fields over the stored settings. Unknown keys are
/// refused.
fn settings_update(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let Some(patch) = params.get("settings").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing settings"));
    };

    let current = store::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let mut merged: Map<String, Value> = match to_json(&current)? {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    const KNOWN: [&str; 7] = [
        "schoolName",
        "schoolLogo",
        "contactPhone",
        "contactEmail",
        "address",
        "currentYear",
        "currentSemester",
    ];
    for (k, v) in patch {
        if !KNOWN.contains(&k.as_str()) {
            return Err(HandlerErr::bad_params(format!("unknown settings field: {}", k)));
        }
        merged.insert(k.clone(), v.clone());
    }
    let updated: SystemSettings = serde_json::from_value(Value::Object(merged))
        .map_err(|e| HandlerErr::bad_params(format!("invalid settings: {}", e)))?;
    store::save_settings(conn, &updated).map_err(HandlerErr::update_failed)?;
    tracing::info!("system settings updated");
    Ok(json!({ "settings": to_json(&updated)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "settings.get" => settings_get(state),
        "settings.update" => settings_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
