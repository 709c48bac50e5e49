use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

fn body(code: &str, message: String, details: Option<Value>) -> Value {
    serde_json::to_value(ErrorBody {
        code,
        message,
        details,
    })
    .unwrap_or_else(|_| json!({ "code": code }))
}

pub fn ok(id: &str, result: Value) -> Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    json!({ "id": id, "ok": false, "error": body(code, message.into(), details) })
}

/// Reply to a line that never became a request, so there is no id to echo.
pub fn bad_json(e: &serde_json::Error) -> Value {
    json!({ "ok": false, "error": body("bad_json", e.to_string(), None) })
}
