use crate::ipc::handlers::grades::linked_student_ids;
use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, require_role, respond, save, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Grade, ReportCard, ReportCardStatus, Role, Student};
use crate::reports::{self, Upsert};
use crate::store;
use crate::workflow::{self, WorkflowError};
use serde_json::{json, Value};

fn card_view(card: &ReportCard) -> Result<Value, HandlerErr> {
    let mut v = to_json(card)?;
    v["average"] = json!(reports::average(card));
    Ok(v)
}

fn report_cards_list(state: &AppState, params: &Value) -> HandlerResult {
    let user = require_role(state, &[Role::Admin, Role::Assistant, Role::Student])?;
    let conn = conn(state)?;
    let cards: Vec<ReportCard> = load(conn)?;
    let own_students = if user.role == Role::Student {
        let students: Vec<Student> = load(conn)?;
        linked_student_ids(user, &students)
    } else {
        Vec::new()
    };
    let student_filter = get_opt_str(params, "studentId");

    let mut rows = Vec::new();
    for card in cards.iter().filter(|c| match user.role {
        Role::Admin => true,
        Role::Assistant => workflow::scope_matches(user, &c.grade),
        Role::Student => {
            c.status == ReportCardStatus::ApprovedAdmin && own_students.contains(&c.student_id)
        }
        Role::Teacher => false,
    }) {
        if student_filter.as_deref().map_or(true, |s| card.student_id == s) {
            rows.push(card_view(card)?);
        }
    }
    Ok(json!({ "reportCards": rows }))
}

/// Builds a draft from approved scores. Semester and year default to the
/// current values in system settings.
fn report_cards_assemble(state: &AppState, params: &Value) -> HandlerResult {
    let actor = require_role(state, &[Role::Admin, Role::Assistant])?;
    let conn = conn(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let settings = store::load_settings(conn).map_err(HandlerErr::query_failed)?;
    let semester = get_opt_str(params, "semester").unwrap_or(settings.current_semester);
    let year = get_opt_str(params, "year").unwrap_or(settings.current_year);
    if semester.is_empty() || year.is_empty() {
        return Err(HandlerErr::bad_params("semester and year are required"));
    }

    let students: Vec<Student> = load(conn)?;
    let Some(student) = store::find_by_id(&students, &student_id) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    if !workflow::scope_matches(actor, &student.grade) {
        return Err(WorkflowError::OutOfScope.into());
    }

    let grades: Vec<Grade> = load(conn)?;
    let assistant_id = (actor.role == Role::Assistant).then_some(actor.id.as_str());
    let card = reports::assemble(student, &semester, &year, &grades, assistant_id);

    let mut cards: Vec<ReportCard> = load(conn)?;
    let outcome = reports::upsert_draft(&mut cards, card);
    if outcome == Upsert::Locked {
        return Err(HandlerErr::new(
            "terminal_state",
            "an approved report card already exists for this period",
        ));
    }
    save(conn, &cards)?;

    let Some(stored) = cards.iter().find(|c| {
        c.student_id == student_id && c.semester == semester && c.year == year
    }) else {
        return Err(HandlerErr::not_found("report card not stored"));
    };
    tracing::info!(
        report_card_id = %stored.id,
        student_id = %student_id,
        replaced = outcome == Upsert::ReplacedDraft,
        "report card assembled"
    );
    Ok(json!({
        "reportCard": card_view(stored)?,
        "replaced": outcome == Upsert::ReplacedDraft,
    }))
}

fn report_cards_approve(state: &AppState, params: &Value) -> HandlerResult {
    let actor = require_role(state, &[Role::Admin, Role::Assistant])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let mut cards: Vec<ReportCard> = load(conn)?;
    let card = workflow::approve_report_card(&mut cards, &id, actor)?;
    save(conn, &cards)?;
    Ok(json!({ "reportCard": card_view(&card)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reportCards.list" => report_cards_list(state, &req.params),
        "reportCards.assemble" => report_cards_assemble(state, &req.params),
        "reportCards.approve" => report_cards_approve(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
