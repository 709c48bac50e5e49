use crate::ai;
use crate::ipc::handlers::announcements;
use crate::ipc::handlers::grades::linked_student_ids;
use crate::ipc::helpers::{conn, load, require_role, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    Account, Announcement, CustomPage, Grade, GradeStatus, Homework, HomeworkStatus, Role, Student,
};
use rusqlite::Connection;
use serde_json::{json, Value};

fn same_grade(user: &Account, grade: &str) -> bool {
    user.grade.as_deref() == Some(grade)
}

fn admin_stats(conn: &Connection) -> HandlerResult {
    let students: Vec<Student> = load(conn)?;
    let accounts: Vec<Account> = load(conn)?;
    let pages: Vec<CustomPage> = load(conn)?;
    let ai_logs = ai::load_logs(conn).map_err(HandlerErr::query_failed)?;
    Ok(json!({
        "students": students.len(),
        "accounts": accounts.len(),
        "customPages": pages.len(),
        "aiConversations": ai_logs.len(),
    }))
}

fn assistant_stats(conn: &Connection, user: &Account) -> HandlerResult {
    let students: Vec<Student> = load(conn)?;
    let homework: Vec<Homework> = load(conn)?;
    let grades: Vec<Grade> = load(conn)?;
    let own_hw: Vec<&Homework> = homework.iter().filter(|h| same_grade(user, &h.grade)).collect();
    Ok(json!({
        "students": students.iter().filter(|s| same_grade(user, &s.grade)).count(),
        "pendingHomework": own_hw.iter().filter(|h| h.status == HomeworkStatus::Pending).count(),
        "homework": own_hw.len(),
        "grades": grades.iter().filter(|g| same_grade(user, &g.grade)).count(),
    }))
}

fn teacher_stats(conn: &Connection, user: &Account) -> HandlerResult {
    let homework: Vec<Homework> = load(conn)?;
    let grades: Vec<Grade> = load(conn)?;
    let own_hw: Vec<&Homework> = homework.iter().filter(|h| h.teacher_id == user.id).collect();
    Ok(json!({
        "homework": own_hw.len(),
        "pendingHomework": own_hw.iter().filter(|h| h.status == HomeworkStatus::Pending).count(),
        "approvedHomework": own_hw.iter().filter(|h| h.status == HomeworkStatus::ApprovedAdmin).count(),
        "grades": grades.iter().filter(|g| g.teacher_id == user.id).count(),
    }))
}

fn student_stats(conn: &Connection, user: &Account) -> HandlerResult {
    let items: Vec<Announcement> = load(conn)?;
    let homework: Vec<Homework> = load(conn)?;
    let grades: Vec<Grade> = load(conn)?;
    let students: Vec<Student> = load(conn)?;
    let own = linked_student_ids(user, &students);
    Ok(json!({
        "announcements": items.iter().filter(|a| announcements::visible_to(user, a)).count(),
        "homework": homework
            .iter()
            .filter(|h| h.status == HomeworkStatus::ApprovedAdmin && same_grade(user, &h.grade))
            .count(),
        "grades": grades
            .iter()
            .filter(|g| g.status == GradeStatus::Approved && own.contains(&g.student_id))
            .count(),
    }))
}

fn dashboard_stats(state: &AppState) -> HandlerResult {
    let user = require_role(state, &Role::ALL)?;
    let conn = conn(state)?;
    let stats = match user.role {
        Role::Admin => admin_stats(conn)?,
        Role::Assistant => assistant_stats(conn, user)?,
        Role::Teacher => teacher_stats(conn, user)?,
        Role::Student => student_stats(conn, user)?,
    };
    Ok(json!({ "role": user.role.as_str(), "stats": stats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.stats" => Some(respond(req, dashboard_stats(state))),
        _ => None,
    }
}
