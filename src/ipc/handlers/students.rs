use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, parse_param, require_role, respond, save, to_json,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, Student};
use crate::store;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StudentForm {
    name: String,
    national_id: String,
    grade: String,
    parent_name: String,
    phone: String,
    address: String,
    account_id: Option<String>,
}

impl StudentForm {
    fn into_student(self, id: String) -> Result<Student, HandlerErr> {
        let name = self.name.trim().to_string();
        let national_id = self.national_id.trim().to_string();
        let grade = self.grade.trim().to_string();
        if name.is_empty() || national_id.is_empty() || grade.is_empty() {
            return Err(HandlerErr::bad_params("name, nationalId and grade are required"));
        }
        Ok(Student {
            id,
            name,
            national_id,
            grade,
            parent_name: self.parent_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            account_id: self.account_id.filter(|a| !a.trim().is_empty()),
        })
    }
}

fn matches_search(s: &Student, needle: &str) -> bool {
    s.name.to_lowercase().contains(needle) || s.national_id.contains(needle)
}

/// Admins and teachers see every class level; assistants only their own.
fn students_list(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &[Role::Admin, Role::Assistant, Role::Teacher])?;
    let conn = conn(state)?;
    let search = get_opt_str(params, "search").map(|s| s.to_lowercase());
    let grade = match user.role {
        Role::Assistant => Some(user.grade_or_empty().to_string()),
        _ => get_opt_str(params, "grade"),
    };

    let students: Vec<Student> = load(conn)?;
    let rows: Vec<&Student> = students
        .iter()
        .filter(|s| grade.as_deref().map_or(true, |g| s.grade == g))
        .filter(|s| search.as_deref().map_or(true, |q| matches_search(s, q)))
        .collect();
    Ok(json!({ "students": to_json(&rows)? }))
}

fn students_create(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: StudentForm = parse_param(params, "student")?;
    let student = form.into_student(store::generate_id())?;

    let mut students: Vec<Student> = load(conn)?;
    students.push(student.clone());
    save(conn, &students)?;
    tracing::info!(student_id = %student.id, grade = %student.grade, "student created");
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_update(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let form: StudentForm = parse_param(params, "student")?;
    let student = form.into_student(id)?;

    let mut students: Vec<Student> = load(conn)?;
    if !store::replace_by_id(&mut students, student.clone()) {
        return Err(HandlerErr::not_found("student not found"));
    }
    save(conn, &students)?;
    Ok(json!({ "student": to_json(&student)? }))
}

/// Score records and report cards that point at the student are kept.
fn students_delete(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut students: Vec<Student> = load(conn)?;
    if !store::remove_by_id(&mut students, &id) {
        return Err(HandlerErr::not_found("student not found"));
    }
    save(conn, &students)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
