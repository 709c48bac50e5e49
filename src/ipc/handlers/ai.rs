use crate::ai;
use crate::ipc::helpers::{
    conn, get_opt_str, require_role, respond, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::{json, Value};

fn ai_transcript(state: &AppState) -> HandlerResult {
    let student = require_role(state, &[Role::Student])?;
    let conn = conn(state)?;
    let messages = ai::load_transcript(conn, &student.id).map_err(HandlerErr::query_failed)?;
    Ok(json!({ "messages": to_json(&messages)? }))
}

/// Blocks until the remote stream ends.
fn ai_send(state: &AppState, params: &Value) -> HandlerResult {
    let student = require_role(state, &[Role::Student])?;
    let conn = conn(state)?;
    let text = get_opt_str(params, "message").unwrap_or_default();
    let endpoint = state.config.ai_endpoint();
    let out = ai::exchange(conn, endpoint.as_ref(), student, &text)?;
    Ok(json!({ "reply": out.reply, "messages": to_json(&out.messages)? }))
}

fn ai_clear(state: &AppState) -> HandlerResult {
    let student = require_role(state, &[Role::Student])?;
    let conn = conn(state)?;
    let removed = ai::clear_transcript(conn, &student.id).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "ok": true, "removed": removed }))
}

fn ai_logs(state: &AppState) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let mut logs = ai::load_logs(conn).map_err(HandlerErr::query_failed)?;
    logs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(json!({ "logs": to_json(&logs)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "ai.transcript" => ai_transcript(state),
        "ai.send" => ai_send(state, &req.params),
        "ai.clear" => ai_clear(state),
        "ai.logs" => ai_logs(state),
        _ => return None,
    };
    Some(respond(req, result))
}
