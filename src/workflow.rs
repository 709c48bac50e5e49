//! Approval state machines for homework, score records and report cards.
//!
//! Transitions are pure: they take the current status, the actor's role and
//! whether the record falls inside the actor's scope, and return the next
//! status or the reason the move is refused. Persisting the result is the
//! caller's job. Nothing records who moved a record or when.
//!
//! Homework:    pending -> approved_assistant -> approved_admin
//!              pending | approved_assistant -> rejected
//! Score:       pending -> approved | rejected
//! Report card: draft -> approved_assistant -> approved_admin

use crate::model::{
    Account, GradeStatus, Homework, HomeworkStatus, ReportCard, ReportCardStatus, Role,
};
use crate::store;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{role} cannot {action} records")]
    NotPermitted { role: &'static str, action: &'static str },
    #[error("record belongs to another class level")]
    OutOfScope,
    #[error("record is already {status}")]
    TerminalState { status: &'static str },
    #[error("{role} cannot {action} a record that is {status}")]
    InvalidTransition {
        role: &'static str,
        action: &'static str,
        status: &'static str,
    },
    #[error("record not found: {id}")]
    NotFound { id: String },
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotPermitted { .. } => "not_permitted",
            WorkflowError::OutOfScope => "out_of_scope",
            WorkflowError::TerminalState { .. } => "terminal_state",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::NotFound { .. } => "not_found",
        }
    }
}

/// Admins act globally; assistants only on their own class level.
pub fn scope_matches(actor: &Account, record_grade: &str) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Assistant => actor.grade.as_deref() == Some(record_grade),
        Role::Teacher | Role::Student => false,
    }
}

pub fn homework_transition(
    current: HomeworkStatus,
    role: Role,
    in_scope: bool,
    decision: Decision,
) -> Result<HomeworkStatus, WorkflowError> {
    use HomeworkStatus::*;

    if current.is_terminal() {
        return Err(WorkflowError::TerminalState {
            status: current.as_str(),
        });
    }
    let refused = || WorkflowError::InvalidTransition {
        role: role.as_str(),
        action: decision.as_str(),
        status: current.as_str(),
    };
    match role {
        Role::Teacher | Role::Student => Err(WorkflowError::NotPermitted {
            role: role.as_str(),
            action: decision.as_str(),
        }),
        Role::Assistant if !in_scope => Err(WorkflowError::OutOfScope),
        Role::Assistant => match (current, decision) {
            (Pending, Decision::Approve) => Ok(ApprovedAssistant),
            (Pending, Decision::Reject) => Ok(Rejected),
            _ => Err(refused()),
        },
        Role::Admin => match decision {
            Decision::Approve => Ok(ApprovedAdmin),
            Decision::Reject => Ok(Rejected),
        },
    }
}

/// Pure rule for score records. No IPC method drives it yet; score records
/// stay `pending` until a review step exists.
#[cfg_attr(not(test), allow(dead_code))]
pub fn grade_transition(
    current: GradeStatus,
    role: Role,
    in_scope: bool,
    decision: Decision,
) -> Result<GradeStatus, WorkflowError> {
    if current.is_terminal() {
        return Err(WorkflowError::TerminalState {
            status: current.as_str(),
        });
    }
    match role {
        Role::Teacher | Role::Student => Err(WorkflowError::NotPermitted {
            role: role.as_str(),
            action: decision.as_str(),
        }),
        Role::Assistant if !in_scope => Err(WorkflowError::OutOfScope),
        Role::Admin | Role::Assistant => Ok(match decision {
            Decision::Approve => GradeStatus::Approved,
            Decision::Reject => GradeStatus::Rejected,
        }),
    }
}

pub fn report_card_transition(
    current: ReportCardStatus,
    role: Role,
    in_scope: bool,
) -> Result<ReportCardStatus, WorkflowError> {
    use ReportCardStatus::*;

    if current.is_terminal() {
        return Err(WorkflowError::TerminalState {
            status: current.as_str(),
        });
    }
    match role {
        Role::Teacher | Role::Student => Err(WorkflowError::NotPermitted {
            role: role.as_str(),
            action: Decision::Approve.as_str(),
        }),
        Role::Assistant if !in_scope => Err(WorkflowError::OutOfScope),
        Role::Assistant => match current {
            Draft => Ok(ApprovedAssistant),
            _ => Err(WorkflowError::InvalidTransition {
                role: role.as_str(),
                action: Decision::Approve.as_str(),
                status: current.as_str(),
            }),
        },
        Role::Admin => Ok(ApprovedAdmin),
    }
}

/// Applies `decision` to homework `id` inside the full collection.
pub fn decide_homework(
    items: &mut [Homework],
    id: &str,
    actor: &Account,
    decision: Decision,
) -> Result<Homework, WorkflowError> {
    let Some(hw) = items.iter_mut().find(|h| h.id == id) else {
        return Err(WorkflowError::NotFound { id: id.to_string() });
    };
    let next = homework_transition(
        hw.status,
        actor.role,
        scope_matches(actor, &hw.grade),
        decision,
    )?;
    tracing::info!(
        homework_id = %hw.id,
        actor_id = %actor.id,
        from = hw.status.as_str(),
        to = next.as_str(),
        "homework status changed"
    );
    hw.status = next;
    Ok(hw.clone())
}

pub fn approve_report_card(
    items: &mut [ReportCard],
    id: &str,
    actor: &Account,
) -> Result<ReportCard, WorkflowError> {
    let Some(card) = items.iter_mut().find(|c| c.id == id) else {
        return Err(WorkflowError::NotFound { id: id.to_string() });
    };
    let next = report_card_transition(card.status, actor.role, scope_matches(actor, &card.grade))?;
    tracing::info!(
        report_card_id = %card.id,
        actor_id = %actor.id,
        from = card.status.as_str(),
        to = next.as_str(),
        "report card status changed"
    );
    card.status = next;
    if actor.role == Role::Assistant && card.assistant_id.is_none() {
        card.assistant_id = Some(actor.id.clone());
    }
    Ok(card.clone())
}

/// Builds a fresh `pending` homework record from a teacher's form.
pub fn new_homework(
    teacher: &Account,
    title: &str,
    description: &str,
    subject: &str,
    grade: &str,
    due_date: &str,
) -> Homework {
    Homework {
        id: store::generate_id(),
        title: title.to_string(),
        description: description.to_string(),
        subject: subject.to_string(),
        grade: grade.to_string(),
        teacher_id: teacher.id.clone(),
        teacher_name: teacher.name.clone(),
        due_date: due_date.to_string(),
        status: HomeworkStatus::Pending,
        created_at: store::now_iso(),
        rejection_reason: None,
    }
}
