use crate::model::{Grade, GradeStatus, ReportCard, ReportCardRow, ReportCardStatus, Student};
use crate::store;

/// Draft report card from the student's approved score records.
///
/// One row per subject, in the order subjects first appear; a later record
/// for the same subject replaces the earlier score.
pub fn assemble(
    student: &Student,
    semester: &str,
    year: &str,
    grades: &[Grade],
    assistant_id: Option<&str>,
) -> ReportCard {
    let mut rows: Vec<ReportCardRow> = Vec::new();
    for g in grades
        .iter()
        .filter(|g| g.student_id == student.id && g.status == GradeStatus::Approved)
    {
        match rows.iter_mut().find(|r| r.subject == g.subject) {
            Some(row) => {
                row.score = g.score;
                row.teacher = g.teacher_name.clone();
            }
            None => rows.push(ReportCardRow {
                subject: g.subject.clone(),
                score: g.score,
                teacher: g.teacher_name.clone(),
            }),
        }
    }

    ReportCard {
        id: store::generate_id(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        grade: student.grade.clone(),
        semester: semester.to_string(),
        year: year.to_string(),
        grades: rows,
        status: ReportCardStatus::Draft,
        created_at: store::now_iso(),
        assistant_id: assistant_id.map(str::to_string),
    }
}

pub fn average(card: &ReportCard) -> Option<f64> {
    if card.grades.is_empty() {
        return None;
    }
    let sum: f64 = card.grades.iter().map(|r| r.score).sum();
    Some(round_2(sum / card.grades.len() as f64))
}

fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Outcome of storing a freshly assembled card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    ReplacedDraft,
    /// An approved card already exists for the same period.
    Locked,
}

/// Inserts `card`, replacing a draft for the same student and period.
pub fn upsert_draft(cards: &mut Vec<ReportCard>, card: ReportCard) -> Upsert {
    let same_period = |c: &ReportCard| {
        c.student_id == card.student_id && c.semester == card.semester && c.year == card.year
    };
    match cards.iter().position(same_period) {
        Some(idx) if cards[idx].status != ReportCardStatus::Draft => Upsert::Locked,
        Some(idx) => {
            let mut card = card;
            card.id = cards[idx].id.clone();
            cards[idx] = card;
            Upsert::ReplacedDraft
        }
        None => {
            cards.push(card);
            Upsert::Inserted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn score(student_id: &str, subject: &str, value: f64, status: GradeStatus) -> Grade {
        Grade {
            id: store::generate_id(),
            student_id: student_id.into(),
            student_name: String::new(),
            subject: subject.into(),
            grade: "seventh".into(),
            score: value,
            teacher_id: "2".into(),
            teacher_name: "Mr. Ahmadi".into(),
            status,
            created_at: String::new(),
            description: None,
        }
    }

    #[test]
    fn only_approved_scores_reach_the_card() {
        let student = seed::default_students().remove(0);
        let grades = vec![
            score("s1", "math", 18.5, GradeStatus::Approved),
            score("s1", "physics", 12.0, GradeStatus::Pending),
            score("s1", "art", 9.0, GradeStatus::Rejected),
            score("s2", "math", 20.0, GradeStatus::Approved),
            score("s1", "science", 15.0, GradeStatus::Approved),
        ];
        let card = assemble(&student, "first", "1403", &grades, Some("4"));
        let subjects: Vec<_> = card.grades.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["math", "science"]);
        assert_eq!(card.status, ReportCardStatus::Draft);
        assert_eq!(card.assistant_id.as_deref(), Some("4"));
        assert_eq!(average(&card), Some(16.75));
    }

    #[test]
    fn later_score_for_same_subject_wins() {
        let student = seed::default_students().remove(0);
        let grades = vec![
            score("s1", "math", 10.0, GradeStatus::Approved),
            score("s1", "math", 14.0, GradeStatus::Approved),
        ];
        let card = assemble(&student, "first", "1403", &grades, None);
        assert_eq!(card.grades.len(), 1);
        assert_eq!(card.grades[0].score, 14.0);
    }

    #[test]
    fn empty_card_has_no_average() {
        let student = seed::default_students().remove(2);
        let card = assemble(&student, "first", "1403", &[], None);
        assert_eq!(average(&card), None);
    }

    #[test]
    fn drafts_are_replaced_but_approved_cards_are_locked() {
        let student = seed::default_students().remove(0);
        let mut cards = Vec::new();
        let first = assemble(&student, "first", "1403", &[], None);
        let first_id = first.id.clone();
        assert_eq!(upsert_draft(&mut cards, first), Upsert::Inserted);

        let again = assemble(&student, "first", "1403", &[], None);
        assert_eq!(upsert_draft(&mut cards, again), Upsert::ReplacedDraft);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, first_id);

        cards[0].status = ReportCardStatus::ApprovedAssistant;
        let locked = assemble(&student, "first", "1403", &[], None);
        assert_eq!(upsert_draft(&mut cards, locked), Upsert::Locked);

        let other_term = assemble(&student, "second", "1403", &[], None);
        assert_eq!(upsert_draft(&mut cards, other_term), Upsert::Inserted);
        assert_eq!(cards.len(), 2);
    }
}
