use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use serde_json::Value;

type TryHandle = fn(&mut AppState, &Request) -> Option<Value>;

/// Handler families in dispatch order. The first one that claims the method
/// answers it.
const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::accounts::try_handle,
    handlers::students::try_handle,
    handlers::homework::try_handle,
    handlers::grades::try_handle,
    handlers::report_cards::try_handle,
    handlers::announcements::try_handle,
    handlers::chat::try_handle,
    handlers::content::try_handle,
    handlers::settings::try_handle,
    handlers::dashboard::try_handle,
    handlers::ai::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");

    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
