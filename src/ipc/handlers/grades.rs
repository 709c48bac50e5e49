use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, require_role, respond, save, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Grade, GradeStatus, Role, Student};
use crate::store;
use serde_json::{json, Value};

pub const MAX_SCORE: f64 = 20.0;

/// Student records that belong to a student account.
pub fn linked_student_ids(account: &Account, students: &[Student]) -> Vec<String> {
    students
        .iter()
        .filter(|s| {
            s.account_id.as_deref() == Some(account.id.as_str())
                || account.national_id.as_deref() == Some(s.national_id.as_str())
        })
        .map(|s| s.id.clone())
        .collect()
}

fn parse_score(params: &Value) -> Result<f64, HandlerErr> {
    let score = params
        .get("score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params("missing score"))?;
    if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
        return Err(HandlerErr::bad_params("score must be between 0 and 20"));
    }
    Ok(score)
}

fn grades_list(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let student_filter = get_opt_str(params, "studentId");
    let grades: Vec<Grade> = load(conn)?;

    let own_students = if user.role == Role::Student {
        let students: Vec<Student> = load(conn)?;
        linked_student_ids(user, &students)
    } else {
        Vec::new()
    };
    let visible = |g: &&Grade| match user.role {
        Role::Admin => true,
        Role::Assistant => Some(g.grade.as_str()) == user.grade.as_deref(),
        Role::Teacher => g.teacher_id == user.id,
        Role::Student => g.status == GradeStatus::Approved && own_students.contains(&g.student_id),
    };
    let rows: Vec<&Grade> = grades
        .iter()
        .filter(visible)
        .filter(|g| student_filter.as_deref().map_or(true, |s| g.student_id == s))
        .collect();
    Ok(json!({ "grades": to_json(&rows)? }))
}

/// A score for an unknown student id is stored with empty snapshot names.
fn grades_create(state: &AppState, params: &Value) -> HandlerResult {
    let teacher = require_role(state, &[Role::Teacher])?;
    let conn = conn(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let subject = get_required_str(params, "subject")?;
    let score = parse_score(params)?;

    let students: Vec<Student> = load(conn)?;
    let student = store::find_by_id(&students, &student_id);
    let grade = Grade {
        id: store::generate_id(),
        student_id: student_id.clone(),
        student_name: student.map(|s| s.name.clone()).unwrap_or_default(),
        subject,
        grade: get_opt_str(params, "grade")
            .or_else(|| student.map(|s| s.grade.clone()))
            .unwrap_or_default(),
        score,
        teacher_id: teacher.id.clone(),
        teacher_name: teacher.name.clone(),
        status: GradeStatus::Pending,
        created_at: store::now_iso(),
        description: get_opt_str(params, "description"),
    };
    if student.is_none() {
        tracing::warn!(student_id = %student_id, "score recorded for unknown student");
    }

    let mut grades: Vec<Grade> = load(conn)?;
    grades.push(grade.clone());
    save(conn, &grades)?;
    Ok(json!({ "grade": to_json(&grade)? }))
}

fn grades_delete(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &[Role::Admin, Role::Teacher])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut grades: Vec<Grade> = load(conn)?;
    let Some(g) = store::find_by_id(&grades, &id) else {
        return Err(HandlerErr::not_found("grade not found"));
    };
    if user.role == Role::Teacher && (g.teacher_id != user.id || g.status != GradeStatus::Pending) {
        return Err(HandlerErr::new("forbidden", "only your own pending scores can be deleted"));
    }
    store::remove_by_id(&mut grades, &id);
    save(conn, &grades)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "grades.list" => grades_list(state, &req.params),
        "grades.create" => grades_create(state, &req.params),
        "grades.delete" => grades_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
