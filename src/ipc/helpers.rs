//! Shared plumbing for handlers: the error carrier, parameter access,
//! workspace and role guards, and collection load/save with error mapping.

use crate::ai::AiError;
use crate::authz::{self, Gate};
use crate::chat::ChatError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Role};
use crate::session::ProfileError;
use crate::store::{self, Collection};
use crate::workflow::WorkflowError;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn no_workspace() -> Self {
        Self::new("no_workspace", "select a workspace first")
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn query_failed(e: anyhow::Error) -> Self {
        Self::new("db_query_failed", format!("{e:#}"))
    }

    pub fn update_failed(e: anyhow::Error) -> Self {
        Self::new("db_update_failed", format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<WorkflowError> for HandlerErr {
    fn from(e: WorkflowError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ChatError> for HandlerErr {
    fn from(e: ChatError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ProfileError> for HandlerErr {
    fn from(e: ProfileError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<AiError> for HandlerErr {
    fn from(e: AiError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(HandlerErr::no_workspace)
}

/// Same membership rule as the screen gate. Anonymous callers get
/// `unauthenticated`, wrong roles get `forbidden`; both carry the redirect.
pub fn require_role<'a>(state: &'a AppState, allowed: &[Role]) -> Result<&'a Account, HandlerErr> {
    match (authz::gate(&state.session, allowed), state.session.user()) {
        (Gate::Allow, Some(user)) => Ok(user),
        (Gate::Redirect(to), Some(_)) => Err(HandlerErr::new("forbidden", "not allowed for this role")
            .with_details(json!({ "redirect": to.path() }))),
        (_, None) => Err(HandlerErr::new("unauthenticated", "sign in first")
            .with_details(json!({ "redirect": authz::Route::Login.path() }))),
    }
}

pub fn require_signed_in(state: &AppState) -> Result<&Account, HandlerErr> {
    require_role(state, &Role::ALL)
}

/// Present and non-empty after trimming.
pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn get_opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Deserializes `params[key]`, or the whole params object when `key` is empty.
pub fn parse_param<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let raw = if key.is_empty() {
        params.clone()
    } else {
        params
            .get(key)
            .cloned()
            .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?
    };
    serde_json::from_value(raw).map_err(|e| {
        let what = if key.is_empty() { "params" } else { key };
        HandlerErr::bad_params(format!("invalid {}: {}", what, e))
    })
}

pub fn load<T: Collection>(conn: &Connection) -> Result<Vec<T>, HandlerErr> {
    store::load(conn).map_err(HandlerErr::query_failed)
}

pub fn save<T: Collection>(conn: &Connection, items: &[T]) -> Result<(), HandlerErr> {
    store::save(conn, items).map_err(HandlerErr::update_failed)
}

pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

/// Account as shown to its owner: everything but the password.
pub fn public_account(account: &Account) -> Value {
    let mut v = serde_json::to_value(account).unwrap_or(Value::Null);
    if let Some(obj) = v.as_object_mut() {
        obj.remove("password");
    }
    v
}
