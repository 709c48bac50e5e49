use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, require_role, respond, save, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Homework, HomeworkStatus, Role};
use crate::store;
use crate::workflow::{self, Decision};
use serde_json::{json, Value};

/// Which records a role sees on its homework screen.
fn visible_to(user: &Account, hw: &Homework) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Assistant => Some(hw.grade.as_str()) == user.grade.as_deref(),
        Role::Teacher => hw.teacher_id == user.id,
        Role::Student => {
            hw.status == HomeworkStatus::ApprovedAdmin && Some(hw.grade.as_str()) == user.grade.as_deref()
        }
    }
}

fn homework_list(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let status = match get_opt_str(params, "status") {
        Some(s) => Some(
            HomeworkStatus::parse(&s)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", s)))?,
        ),
        None => None,
    };
    let items: Vec<Homework> = load(conn)?;
    let rows: Vec<&Homework> = items
        .iter()
        .filter(|hw| visible_to(user, hw))
        .filter(|hw| status.map_or(true, |s| hw.status == s))
        .collect();
    Ok(json!({ "homework": to_json(&rows)? }))
}

fn homework_create(state: &AppState, params: &Value) -> HandlerResult {
    let teacher = require_role(state, &[Role::Teacher])?;
    let conn = conn(state)?;
    let title = get_required_str(params, "title")?;
    let subject = get_required_str(params, "subject")?;
    let grade = get_required_str(params, "grade")?;
    let due_date = get_required_str(params, "dueDate")?;
    let description = get_opt_str(params, "description").unwrap_or_default();

    let hw = workflow::new_homework(teacher, &title, &description, &subject, &grade, &due_date);
    let mut items: Vec<Homework> = load(conn)?;
    items.push(hw.clone());
    save(conn, &items)?;
    tracing::info!(homework_id = %hw.id, teacher_id = %teacher.id, grade = %hw.grade, "homework created");
    Ok(json!({ "homework": to_json(&hw)? }))
}

fn homework_decide(state: &AppState, params: &Value, decision: Decision) -> HandlerResult {
    let actor = require_role(state, &[Role::Admin, Role::Assistant])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut items: Vec<Homework> = load(conn)?;
    let hw = workflow::decide_homework(&mut items, &id, actor, decision)?;
    save(conn, &items)?;
    Ok(json!({ "homework": to_json(&hw)? }))
}

/// Teachers may withdraw their own homework while it is still pending.
fn homework_delete(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &[Role::Admin, Role::Teacher])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut items: Vec<Homework> = load(conn)?;
    let Some(hw) = store::find_by_id(&items, &id) else {
        return Err(HandlerErr::not_found("homework not found"));
    };
    if user.role == Role::Teacher
        && (hw.teacher_id != user.id || hw.status != HomeworkStatus::Pending)
    {
        return Err(HandlerErr::new("forbidden", "only your own pending homework can be deleted"));
    }
    store::remove_by_id(&mut items, &id);
    save(conn, &items)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "homework.list" => homework_list(state, &req.params),
        "homework.create" => homework_create(state, &req.params),
        "homework.approve" => homework_decide(state, &req.params, Decision::Approve),
        "homework.reject" => homework_decide(state, &req.params, Decision::Reject),
        "homework.delete" => homework_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
