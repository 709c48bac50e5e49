use crate::ipc::helpers::{
    conn, get_required_str, load, parse_param, require_role, respond, save, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Announcement, Priority, Role, TARGET_ALL};
use crate::store;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnnouncementForm {
    title: String,
    content: String,
    priority: Option<Priority>,
    target_grade: Option<String>,
    expires_at: Option<String>,
}

impl AnnouncementForm {
    fn validate(&self) -> Result<(), HandlerErr> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(HandlerErr::bad_params("title and content are required"));
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.target_grade
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(TARGET_ALL)
            .to_string()
    }
}

/// Students only see announcements for everyone or for their class level.
pub fn visible_to(user: &Account, a: &Announcement) -> bool {
    user.role != Role::Student
        || a.target_grade == TARGET_ALL
        || Some(a.target_grade.as_str()) == user.grade.as_deref()
}

fn announcements_list(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let items: Vec<Announcement> = load(conn)?;
    let mut rows: Vec<&Announcement> = items.iter().filter(|a| visible_to(user, a)).collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(json!({ "announcements": to_json(&rows)? }))
}

fn announcements_create(state: &AppState, params: &Value) -> HandlerResult {
    let admin = require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: AnnouncementForm = parse_param(params, "announcement")?;
    form.validate()?;
    let target_grade = form.target();
    let item = Announcement {
        id: store::generate_id(),
        title: form.title.trim().to_string(),
        content: form.content.trim().to_string(),
        priority: form.priority.unwrap_or_default(),
        target_grade,
        created_by: admin.name.clone(),
        created_at: store::now_iso(),
        expires_at: form.expires_at,
    };
    let mut items: Vec<Announcement> = load(conn)?;
    items.push(item.clone());
    save(conn, &items)?;
    Ok(json!({ "announcement": to_json(&item)? }))
}

fn announcements_update(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let form: AnnouncementForm = parse_param(params, "announcement")?;
    form.validate()?;

    let mut items: Vec<Announcement> = load(conn)?;
    let Some(item) = items.iter_mut().find(|a| a.id == id) else {
        return Err(HandlerErr::not_found("announcement not found"));
    };
    item.target_grade = form.target();
    item.title = form.title.trim().to_string();
    item.content = form.content.trim().to_string();
    item.priority = form.priority.unwrap_or_default();
    item.expires_at = form.expires_at;
    let updated = item.clone();
    save(conn, &items)?;
    Ok(json!({ "announcement": to_json(&updated)? }))
}

fn announcements_delete(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut items: Vec<Announcement> = load(conn)?;
    if !store::remove_by_id(&mut items, &id) {
        return Err(HandlerErr::not_found("announcement not found"));
    }
    save(conn, &items)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "announcements.list" => announcements_list(state),
        "announcements.create" => announcements_create(state, &req.params),
        "announcements.update" => announcements_update(state, &req.params),
        "announcements.delete" => announcements_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
