use crate::authz::{self, Gate, Route};
use crate::ipc::helpers::{
    get_required_str, parse_param, public_account, require_signed_in, respond, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::session::ProfileUpdate;
use serde_json::{json, Value};

fn session_view(state: &AppState) -> Value {
    json!({
        "user": state.session.user().map(public_account),
        "home": authz::landing(&state.session).path(),
    })
}

/// Bad credentials are a normal outcome, not an IPC error.
fn login(state: &mut AppState, params: &Value) -> HandlerResult {
    let username = params.get("username").and_then(|v| v.as_str()).unwrap_or("");
    let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };
    let accepted = state
        .session
        .login(conn, username, password)
        .map_err(HandlerErr::query_failed)?;
    if !accepted {
        return Ok(json!({ "ok": false, "message": "invalid username or password" }));
    }
    let mut view = session_view(state);
    view["ok"] = json!(true);
    Ok(view)
}

fn logout(state: &mut AppState) -> HandlerResult {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };
    state
        .session
        .logout(conn)
        .map_err(HandlerErr::update_failed)?;
    Ok(json!({ "ok": true, "home": Route::Login.path() }))
}

fn gate(state: &AppState, params: &Value) -> HandlerResult {
    let path = get_required_str(params, "path")?;
    let route = if path == "/" {
        authz::landing(&state.session)
    } else {
        Route::from_path(&path)
            .ok_or_else(|| HandlerErr::not_found(format!("unknown route: {}", path)))?
    };
    Ok(match authz::gate_route(&state.session, route) {
        Gate::Allow => json!({ "allow": true, "route": route.path() }),
        Gate::Redirect(to) => json!({ "allow": false, "redirect": to.path() }),
    })
}

fn nav(state: &AppState) -> HandlerResult {
    let user = require_signed_in(state)?;
    let items: Vec<Value> = authz::nav_items(user.role)
        .iter()
        .map(|item| json!({ "label": item.label, "path": item.route.path() }))
        .collect();
    Ok(json!({ "items": items }))
}

fn profile_update(state: &mut AppState, params: &Value) -> HandlerResult {
    let form: ProfileUpdate = parse_param(params, "")?;
    require_signed_in(state)?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };
    let updated = state.session.update_profile(conn, &form)?;
    Ok(json!({ "user": public_account(&updated) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "auth.login" => login(state, &req.params),
        "auth.logout" => logout(state),
        "auth.session" => Ok(session_view(state)),
        "auth.gate" => gate(state, &req.params),
        "auth.nav" => nav(state),
        "profile.update" => profile_update(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
