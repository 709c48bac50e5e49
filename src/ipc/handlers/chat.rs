use crate::chat::{self, ChatError, Outgoing};
use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, parse_param, require_role, respond, save, to_json,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, ChatGroup, ChatMessage, MessageType, Role};
use crate::store;
use serde::Deserialize;
use serde_json::{json, Value};

fn group_view(user: &Account, group: &ChatGroup) -> Result<Value, HandlerErr> {
    let mut v = to_json(group)?;
    v["canSend"] = json!(chat::can_send(user, group));
    v["canModerate"] = json!(chat::can_moderate(user, group));
    Ok(v)
}

fn find_group<'a>(groups: &'a [ChatGroup], id: &str) -> Result<&'a ChatGroup, HandlerErr> {
    store::find_by_id(groups, id).ok_or_else(|| ChatError::GroupNotFound(id.to_string()).into())
}

fn chat_groups(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let groups: Vec<ChatGroup> = load(conn)?;
    let rows = chat::visible_groups(user, &groups)
        .into_iter()
        .map(|g| group_view(user, g))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "groups": rows }))
}

fn chat_messages(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let group_id = get_required_str(params, "groupId")?;
    let groups: Vec<ChatGroup> = load(conn)?;
    let group = find_group(&groups, &group_id)?;
    if !chat::can_see(user, group) {
        return Err(ChatError::NotVisible.into());
    }
    let messages: Vec<ChatMessage> = load(conn)?;
    let rows = chat::visible_messages(&group.id, &messages);
    Ok(json!({ "group": group_view(user, group)?, "messages": to_json(&rows)? }))
}

fn chat_send(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let group_id = get_required_str(params, "groupId")?;
    let kind: MessageType = match params.get("type") {
        Some(_) => parse_param(params, "type")?,
        None => MessageType::Text,
    };
    let content = params.get("content").and_then(|v| v.as_str()).unwrap_or("");
    let file_url = get_opt_str(params, "fileUrl");

    let groups: Vec<ChatGroup> = load(conn)?;
    let group = find_group(&groups, &group_id)?;
    let mut messages: Vec<ChatMessage> = load(conn)?;
    let msg = chat::send(
        &mut messages,
        user,
        group,
        Outgoing {
            content,
            kind,
            file_url: file_url.as_deref(),
        },
    )?;
    save(conn, &messages)?;
    Ok(json!({ "message": to_json(&msg)? }))
}

fn chat_delete(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let message_id = get_required_str(params, "messageId")?;
    let groups: Vec<ChatGroup> = load(conn)?;
    let mut messages: Vec<ChatMessage> = load(conn)?;
    chat::soft_delete(&mut messages, &groups, user, &message_id)?;
    save(conn, &messages)?;
    Ok(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    grade: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    admin_ids: Vec<String>,
    #[serde(default)]
    students_can_send: bool,
}

impl GroupForm {
    fn apply(self, group: &mut ChatGroup) {
        group.name = self.name.trim().to_string();
        group.grade = self.grade.trim().to_string();
        group.members = dedup(self.members);
        group.admin_ids = dedup(self.admin_ids);
        group.students_can_send = self.students_can_send;
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn chat_create_group(state: &AppState, params: &Value) -> HandlerResult {
    let admin = require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: GroupForm = parse_param(params, "group")?;
    let mut group = ChatGroup {
        id: store::generate_id(),
        name: String::new(),
        grade: String::new(),
        members: Vec::new(),
        admin_ids: Vec::new(),
        students_can_send: false,
        created_at: store::now_iso(),
    };
    form.apply(&mut group);
    chat::validate_group(&group)?;

    let mut groups: Vec<ChatGroup> = load(conn)?;
    groups.push(group.clone());
    save(conn, &groups)?;
    Ok(json!({ "group": group_view(admin, &group)? }))
}

fn chat_update_group(state: &AppState, params: &Value) -> HandlerResult {
    let admin = require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let form: GroupForm = parse_param(params, "group")?;

    let mut groups: Vec<ChatGroup> = load(conn)?;
    let Some(existing) = store::find_by_id(&groups, &id) else {
        return Err(ChatError::GroupNotFound(id).into());
    };
    let mut group = existing.clone();
    form.apply(&mut group);
    chat::validate_group(&group)?;
    store::replace_by_id(&mut groups, group.clone());
    save(conn, &groups)?;
    Ok(json!({ "group": group_view(admin, &group)? }))
}

/// Messages of a deleted group stay in the message collection.
fn chat_delete_group(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut groups: Vec<ChatGroup> = load(conn)?;
    if !store::remove_by_id(&mut groups, &id) {
        return Err(ChatError::GroupNotFound(id).into());
    }
    save(conn, &groups)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "chat.groups" => chat_groups(state),
        "chat.messages" => chat_messages(state, &req.params),
        "chat.send" => chat_send(state, &req.params),
        "chat.delete" => chat_delete(state, &req.params),
        "chat.createGroup" => chat_create_group(state, &req.params),
        "chat.updateGroup" => chat_update_group(state, &req.params),
        "chat.deleteGroup" => chat_delete_group(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
