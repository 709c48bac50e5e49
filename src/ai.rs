//! Student AI assistant: transcript storage, the admin-visible audit log and
//! the streaming HTTP exchange with the remote chat endpoint.

use crate::db;
use crate::model::{Account, AiChatLog, AiMessage, AiRole};
use crate::store::{self, AI_LOGS_KEY};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::io::BufRead;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub key: Option<String>,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI chat endpoint is not configured")]
    NotConfigured,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("{0}")]
    Request(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AiError {
    pub fn code(&self) -> &'static str {
        match self {
            AiError::NotConfigured => "ai_not_configured",
            AiError::EmptyMessage => "bad_params",
            AiError::Request(_) => "ai_request_failed",
            AiError::Storage(_) => "db_update_failed",
        }
    }
}

pub fn load_transcript(conn: &Connection, account_id: &str) -> anyhow::Result<Vec<AiMessage>> {
    store::load_key(conn, &store::ai_transcript_key(account_id))
}

pub fn clear_transcript(conn: &Connection, account_id: &str) -> anyhow::Result<bool> {
    db::kv_remove(conn, &store::ai_transcript_key(account_id))
}

pub fn load_logs(conn: &Connection) -> anyhow::Result<Vec<AiChatLog>> {
    store::load_key(conn, AI_LOGS_KEY)
}

/// Saves the transcript and mirrors it into the audit log, which keeps only
/// the latest entry per student.
pub fn persist(conn: &Connection, student: &Account, messages: &[AiMessage]) -> anyhow::Result<()> {
    store::save_key(conn, &store::ai_transcript_key(&student.id), messages)?;

    let entry = AiChatLog {
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        grade: student.grade_or_empty().to_string(),
        messages: messages.to_vec(),
        updated_at: store::now_iso(),
    };
    let mut logs = load_logs(conn)?;
    match logs.iter_mut().find(|l| l.student_id == entry.student_id) {
        Some(slot) => *slot = entry,
        None => logs.push(entry),
    }
    store::save_key(conn, AI_LOGS_KEY, &logs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Skip,
    Delta(String),
    Done,
}

/// Decodes one line of the `data:` event stream.
pub fn decode_line(line: &str) -> StreamLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.starts_with(':') || line.trim().is_empty() {
        return StreamLine::Skip;
    }
    let Some(payload) = line.strip_prefix("data: ") else {
        return StreamLine::Skip;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return StreamLine::Done;
    }
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable stream chunk");
            return StreamLine::Skip;
        }
    };
    match parsed
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
    {
        Some(text) if !text.is_empty() => StreamLine::Delta(text.to_string()),
        _ => StreamLine::Skip,
    }
}

/// Appends every delta to `reply` until `[DONE]` or end of input. Text read
/// before a transport error stays in `reply`.
pub fn collect_stream<R: BufRead>(reader: R, reply: &mut String) -> std::io::Result<()> {
    for line in reader.lines() {
        match decode_line(&line?) {
            StreamLine::Skip => {}
            StreamLine::Delta(text) => reply.push_str(&text),
            StreamLine::Done => break,
        }
    }
    Ok(())
}

fn request_body(student: &Account, messages: &[AiMessage]) -> Value {
    let history: Vec<Value> = messages
        .iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect();
    json!({
        "messages": history,
        "studentName": student.name,
        "studentId": student.id,
    })
}

fn post(endpoint: &Endpoint, body: &Value, reply: &mut String) -> Result<(), String> {
    let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
    let mut req = agent
        .post(&endpoint.url)
        .set("Content-Type", "application/json");
    if let Some(key) = endpoint.key.as_deref() {
        req = req.set("Authorization", &format!("Bearer {}", key));
    }
    let resp = match req.send_string(&body.to_string()) {
        Ok(resp) => resp,
        Err(ureq::Error::Status(status, resp)) => {
            let detail = resp
                .into_string()
                .ok()
                .and_then(|s| serde_json::from_str::<Value>(&s).ok())
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));
            return Err(detail.unwrap_or_else(|| format!("AI endpoint answered {}", status)));
        }
        Err(e) => return Err(format!("AI endpoint unreachable: {}", e)),
    };
    let reader = std::io::BufReader::new(resp.into_reader());
    collect_stream(reader, reply).map_err(|e| format!("AI stream interrupted: {}", e))
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub reply: String,
    pub messages: Vec<AiMessage>,
}

/// Sends `text` with the stored history and records the answer. On failure
/// the user message and any partial answer are still persisted.
pub fn exchange(
    conn: &Connection,
    endpoint: Option<&Endpoint>,
    student: &Account,
    text: &str,
) -> Result<Exchange, AiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AiError::EmptyMessage);
    }
    let mut messages = load_transcript(conn, &student.id)?;
    messages.push(AiMessage {
        id: store::generate_id(),
        role: AiRole::User,
        content: text.to_string(),
    });

    let Some(endpoint) = endpoint else {
        persist(conn, student, &messages)?;
        return Err(AiError::NotConfigured);
    };

    let mut reply = String::new();
    let outcome = post(endpoint, &request_body(student, &messages), &mut reply);
    if !reply.is_empty() {
        messages.push(AiMessage {
            id: store::generate_id(),
            role: AiRole::Assistant,
            content: reply.clone(),
        });
    }
    persist(conn, student, &messages)?;

    match outcome {
        Ok(()) => {
            tracing::info!(student_id = %student.id, reply_len = reply.len(), "ai exchange");
            Ok(Exchange { reply, messages })
        }
        Err(msg) => {
            tracing::warn!(student_id = %student.id, error = %msg, "ai exchange failed");
            Err(AiError::Request(msg))
        }
    }
}
