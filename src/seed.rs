//! First-run dataset.
//!
//! Each collection is seeded only when its key is absent. Seeding is not
//! transactional: an interrupted run can leave some collections seeded and
//! others missing, and the next run fills in only the missing ones.

use crate::db;
use crate::model::{
    Account, Announcement, BlockType, ChatGroup, ChatMessage, CustomBlock, Grade, GradeStatus,
    Homework, HomeworkStatus, MessageType, Priority, Role, SliderImage, Student, SystemSettings,
    TARGET_ALL,
};
use crate::store::{self, now_iso, Collection};
use rusqlite::Connection;

#[derive(Debug, Default, Clone)]
pub struct SeedSummary {
    pub seeded: Vec<&'static str>,
}

pub fn initialize(conn: &Connection) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    seed_collection(conn, &mut summary, default_accounts)?;
    seed_collection(conn, &mut summary, default_students)?;
    seed_collection(conn, &mut summary, default_homework)?;
    seed_collection(conn, &mut summary, default_grades)?;
    seed_collection(conn, &mut summary, default_announcements)?;
    seed_collection(conn, &mut summary, default_chat_groups)?;
    seed_collection(conn, &mut summary, default_chat_messages)?;
    if !db::kv_exists(conn, store::SETTINGS_KEY)? {
        store::save_settings(conn, &default_settings())?;
        summary.seeded.push(store::SETTINGS_KEY);
    }
    seed_collection(conn, &mut summary, default_sliders)?;
    seed_collection(conn, &mut summary, default_blocks)?;

    if !summary.seeded.is_empty() {
        tracing::info!(collections = ?summary.seeded, "seeded default data");
    }
    Ok(summary)
}

fn seed_collection<T: Collection>(
    conn: &Connection,
    summary: &mut SeedSummary,
    build: fn() -> Vec<T>,
) -> anyhow::Result<()> {
    if db::kv_exists(conn, T::KEY)? {
        return Ok(());
    }
    store::save(conn, &build())?;
    summary.seeded.push(T::KEY);
    Ok(())
}

fn account(
    id: &str,
    username: &str,
    password: &str,
    role: Role,
    name: &str,
    grade: Option<&str>,
) -> Account {
    Account {
        id: id.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        role,
        name: name.to_string(),
        grade: grade.map(str::to_string),
        subjects: None,
        national_id: None,
        created_at: now_iso(),
    }
}

pub fn default_accounts() -> Vec<Account> {
    let mut teacher1 = account("2", "teacher1", "123456", Role::Teacher, "Mr. Ahmadi", None);
    teacher1.subjects = Some(vec!["math".into(), "statistics".into()]);
    let mut teacher2 = account("3", "teacher2", "123456", Role::Teacher, "Mr. Rezaei", None);
    teacher2.subjects = Some(vec!["physics".into(), "chemistry".into()]);
    let mut ali = account(
        "6",
        "0012345678",
        "123456",
        Role::Student,
        "Ali Mohammadi",
        Some("seventh"),
    );
    ali.national_id = Some("0012345678".into());
    let mut sara = account(
        "7",
        "0098765432",
        "123456",
        Role::Student,
        "Sara Karimi",
        Some("seventh"),
    );
    sara.national_id = Some("0098765432".into());

    vec![
        account("1", "admin", "admin123", Role::Admin, "System Administrator", None),
        teacher1,
        teacher2,
        account(
            "4",
            "assistant7",
            "123456",
            Role::Assistant,
            "Seventh Grade Assistant",
            Some("seventh"),
        ),
        account(
            "5",
            "assistant8",
            "123456",
            Role::Assistant,
            "Eighth Grade Assistant",
            Some("eighth"),
        ),
        ali,
        sara,
    ]
}

#[allow(clippy::too_many_arguments)]
fn student(
    id: &str,
    name: &str,
    national_id: &str,
    grade: &str,
    parent: &str,
    phone: &str,
    address: &str,
    account_id: Option<&str>,
) -> Student {
    Student {
        id: id.to_string(),
        name: name.to_string(),
        national_id: national_id.to_string(),
        grade: grade.to_string(),
        parent_name: parent.to_string(),
        phone: phone.to_string(),
        address: address.to_string(),
        account_id: account_id.map(str::to_string),
    }
}

pub fn default_students() -> Vec<Student> {
    vec![
        student(
            "s1",
            "Ali Mohammadi",
            "0012345678",
            "seventh",
            "Hassan Mohammadi",
            "09121234567",
            "Tehran, Valiasr St",
            Some("6"),
        ),
        student(
            "s2",
            "Sara Karimi",
            "0098765432",
            "seventh",
            "Mohammad Karimi",
            "09129876543",
            "Tehran, Enghelab St",
            Some("7"),
        ),
        student(
            "s3",
            "Reza Ahmadi",
            "0011122333",
            "eighth",
            "Ali Ahmadi",
            "09131112233",
            "Tehran, Saadat Abad",
            None,
        ),
        student(
            "s4",
            "Negar Hosseini",
            "0044455566",
            "eighth",
            "Mahdi Hosseini",
            "09144455566",
            "Tehran, Tajrish",
            None,
        ),
    ]
}

pub fn default_homework() -> Vec<Homework> {
    vec![
        Homework {
            id: "hw1".into(),
            title: "Algebra exercises, chapter 3".into(),
            description: "Solve problems 1 to 20 on page 85".into(),
            subject: "math".into(),
            grade: "seventh".into(),
            teacher_id: "2".into(),
            teacher_name: "Mr. Ahmadi".into(),
            due_date: "1403/09/20".into(),
            status: HomeworkStatus::Pending,
            created_at: now_iso(),
            rejection_reason: None,
        },
        Homework {
            id: "hw2".into(),
            title: "Friction experiment report".into(),
            description: "Write up the experiment on A4".into(),
            subject: "physics".into(),
            grade: "eighth".into(),
            teacher_id: "3".into(),
            teacher_name: "Mr. Rezaei".into(),
            due_date: "1403/09/22".into(),
            status: HomeworkStatus::ApprovedAssistant,
            created_at: now_iso(),
            rejection_reason: None,
        },
    ]
}

pub fn default_grades() -> Vec<Grade> {
    vec![
        Grade {
            id: "g1".into(),
            student_id: "s1".into(),
            student_name: "Ali Mohammadi".into(),
            subject: "math".into(),
            grade: "seventh".into(),
            score: 18.5,
            teacher_id: "2".into(),
            teacher_name: "Mr. Ahmadi".into(),
            status: GradeStatus::Approved,
            created_at: now_iso(),
            description: Some("Midterm exam".into()),
        },
        Grade {
            id: "g2".into(),
            student_id: "s2".into(),
            student_name: "Sara Karimi".into(),
            subject: "math".into(),
            grade: "seventh".into(),
            score: 17.0,
            teacher_id: "2".into(),
            teacher_name: "Mr. Ahmadi".into(),
            status: GradeStatus::Pending,
            created_at: now_iso(),
            description: Some("Midterm exam".into()),
        },
    ]
}

pub fn default_announcements() -> Vec<Announcement> {
    vec![
        Announcement {
            id: "a1".into(),
            title: "First semester exam schedule".into(),
            content: "The first semester exam schedule has been published.".into(),
            priority: Priority::High,
            target_grade: TARGET_ALL.into(),
            created_by: "System Administrator".into(),
            created_at: now_iso(),
            expires_at: None,
        },
        Announcement {
            id: "a2".into(),
            title: "Parent-teacher meeting".into(),
            content: "The parent-teacher meeting is on Thursday at 10 am.".into(),
            priority: Priority::Medium,
            target_grade: "seventh".into(),
            created_by: "Seventh Grade Assistant".into(),
            created_at: now_iso(),
            expires_at: None,
        },
    ]
}

pub fn default_chat_groups() -> Vec<ChatGroup> {
    let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        ChatGroup {
            id: "cg1".into(),
            name: "Seventh grade group".into(),
            grade: "seventh".into(),
            members: ids(&["1", "2", "3", "4", "6", "7"]),
            admin_ids: ids(&["1", "4"]),
            students_can_send: true,
            created_at: now_iso(),
        },
        ChatGroup {
            id: "cg2".into(),
            name: "Eighth grade group".into(),
            grade: "eighth".into(),
            members: ids(&["1", "3", "5"]),
            admin_ids: ids(&["1", "5"]),
            students_can_send: false,
            created_at: now_iso(),
        },
    ]
}

pub fn default_chat_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            id: "cm1".into(),
            group_id: "cg1".into(),
            sender_id: "4".into(),
            sender_name: "Seventh Grade Assistant".into(),
            sender_role: Role::Assistant,
            content: "Dear students, the math exam is tomorrow. Please be prepared.".into(),
            kind: MessageType::Text,
            file_url: None,
            created_at: now_iso(),
            deleted: None,
        },
        ChatMessage {
            id: "cm2".into(),
            group_id: "cg1".into(),
            sender_id: "6".into(),
            sender_name: "Ali Mohammadi".into(),
            sender_role: Role::Student,
            content: "Thanks for letting us know".into(),
            kind: MessageType::Text,
            file_url: None,
            created_at: now_iso(),
            deleted: None,
        },
    ]
}

pub fn default_settings() -> SystemSettings {
    SystemSettings {
        school_name: "Shahid Rajaei Model High School".into(),
        school_logo: None,
        contact_phone: "021-12345678".into(),
        contact_email: "info@school.edu.ir".into(),
        address: "Tehran, Azadi St, No. 123".into(),
        current_year: "1403-1404".into(),
        current_semester: "First semester".into(),
    }
}

pub fn default_sliders() -> Vec<SliderImage> {
    vec![
        SliderImage {
            id: "sl1".into(),
            title: "Welcome".into(),
            image_url: "https://images.unsplash.com/photo-1580582932707-520aed937b7b?w=1200&h=400&fit=crop".into(),
            link: None,
            order: 1,
            active: true,
        },
        SliderImage {
            id: "sl2".into(),
            title: "New school year".into(),
            image_url: "https://images.unsplash.com/photo-1509062522246-3755977927d7?w=1200&h=400&fit=crop".into(),
            link: None,
            order: 2,
            active: true,
        },
    ]
}

pub fn default_blocks() -> Vec<CustomBlock> {
    vec![CustomBlock {
        id: "cb1".into(),
        title: "School news".into(),
        kind: BlockType::Text,
        content: "Welcome to the school portal. Follow this section for the latest news.".into(),
        order: 1,
        active: true,
        target_grade: TARGET_ALL.into(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load;

    #[test]
    fn initialize_seeds_every_collection_once() {
        let conn = db::open_memory();
        let first = initialize(&conn).expect("seed");
        assert_eq!(first.seeded.len(), 10);
        let second = initialize(&conn).expect("seed again");
        assert!(second.seeded.is_empty());
    }

    #[test]
    fn initialize_leaves_existing_collection_untouched() {
        let conn = db::open_memory();
        store::save::<Account>(&conn, &[]).expect("save empty accounts");
        let before = db::kv_get_json(&conn, "accounts").expect("get");

        let summary = initialize(&conn).expect("seed");
        assert!(!summary.seeded.contains(&"accounts"));
        assert_eq!(db::kv_get_json(&conn, "accounts").expect("get"), before);
        assert_eq!(load::<Student>(&conn).expect("students").len(), 4);
    }

    #[test]
    fn reseeding_fresh_storage_reproduces_admin_account() {
        let conn = db::open_memory();
        initialize(&conn).expect("seed");
        let admin_before = load::<Account>(&conn)
            .expect("accounts")
            .into_iter()
            .find(|a| a.username == "admin")
            .expect("admin");

        db::kv_remove(&conn, "accounts").expect("remove");
        initialize(&conn).expect("reseed");
        let admin_after = load::<Account>(&conn)
            .expect("accounts")
            .into_iter()
            .find(|a| a.username == "admin")
            .expect("admin");

        assert_eq!(admin_after.username, admin_before.username);
        assert_eq!(admin_after.password, "admin123");
        assert_eq!(admin_after.role, Role::Admin);
    }

    #[test]
    fn partial_store_only_fills_missing_collections() {
        let conn = db::open_memory();
        initialize(&conn).expect("seed");
        db::kv_remove(&conn, "students").expect("remove");
        let summary = initialize(&conn).expect("repair");
        assert_eq!(summary.seeded, vec!["students"]);
    }

    #[test]
    fn seeded_groups_keep_admins_within_members() {
        for g in default_chat_groups() {
            assert!(g.admin_ids.iter().all(|a| g.members.contains(a)));
        }
    }
}
