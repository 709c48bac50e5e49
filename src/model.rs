//! Persisted record types.
//!
//! Field names follow the stored JSON layout (camelCase), enum values are
//! snake_case strings. Name fields copied from other records (`teacherName`,
//! `studentName`, `senderName`, `senderRole`, `createdBy`) are snapshots taken
//! when the record was written; they are not refreshed afterwards.

use serde::{Deserialize, Serialize};

pub const GRADE_LEVELS: [&str; 3] = ["seventh", "eighth", "ninth"];

pub const SUBJECTS: [&str; 12] = [
    "math",
    "physics",
    "chemistry",
    "literature",
    "arabic",
    "religion",
    "history",
    "geography",
    "science",
    "english",
    "physical education",
    "art",
];

/// Announcement / block target meaning "every class level".
pub const TARGET_ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Assistant,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Assistant, Role::Teacher, Role::Student];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "assistant" => Some(Self::Assistant),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Assistant => "assistant",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub fn has_grade(self) -> bool {
        matches!(self, Self::Assistant | Self::Student)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    pub created_at: String,
}

impl Account {
    /// Drops optional fields that carry no meaning for the account's role.
    pub fn normalize_role_fields(&mut self) {
        if !self.role.has_grade() {
            self.grade = None;
        }
        if self.role != Role::Teacher {
            self.subjects = None;
        }
        if self.role != Role::Student {
            self.national_id = None;
        }
        if self.grade.as_deref().is_some_and(str::is_empty) {
            self.grade = None;
        }
        if self.subjects.as_ref().is_some_and(Vec::is_empty) {
            self.subjects = None;
        }
    }

    pub fn grade_or_empty(&self) -> &str {
        self.grade.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub national_id: String,
    pub grade: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeworkStatus {
    Pending,
    ApprovedAssistant,
    ApprovedAdmin,
    Rejected,
}

impl HomeworkStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved_assistant" => Some(Self::ApprovedAssistant),
            "approved_admin" => Some(Self::ApprovedAdmin),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ApprovedAssistant => "approved_assistant",
            Self::ApprovedAdmin => "approved_admin",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ApprovedAdmin | Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject: String,
    pub grade: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub due_date: String,
    pub status: HomeworkStatus,
    pub created_at: String,
    /// Reserved. No operation writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
    Pending,
    Approved,
    Rejected,
}

impl GradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A score record (0 to 20). `grade` here is the class level of the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub grade: String,
    pub score: f64,
    pub teacher_id: String,
    pub teacher_name: String,
    pub status: GradeStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCardStatus {
    Draft,
    ApprovedAssistant,
    ApprovedAdmin,
}

impl ReportCardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::ApprovedAssistant => "approved_assistant",
            Self::ApprovedAdmin => "approved_admin",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ApprovedAdmin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCardRow {
    pub subject: String,
    pub score: f64,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub grade: String,
    pub semester: String,
    pub year: String,
    pub grades: Vec<ReportCardRow>,
    pub status: ReportCardStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub target_grade: String,
    pub created_by: String,
    pub created_at: String,
    /// Reserved. Listings do not filter on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatGroup {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub members: Vec<String>,
    pub admin_ids: Vec<String>,
    pub students_can_send: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl ChatMessage {
    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliderImage {
    pub id: String,
    pub title: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub order: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Text,
    Image,
    Video,
    Html,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomBlock {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub content: String,
    pub order: i64,
    pub active: bool,
    pub target_grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    #[default]
    Image,
    Pdf,
    File,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPageSection {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SectionType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPage {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub color: String,
    pub active: bool,
    pub order: i64,
    #[serde(default)]
    pub sections: Vec<CustomPageSection>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    pub school_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_logo: Option<String>,
    pub contact_phone: String,
    pub contact_email: String,
    pub address: String,
    pub current_year: String,
    pub current_semester: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub id: String,
    pub role: AiRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiChatLog {
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub grade: String,
    pub messages: Vec<AiMessage>,
    pub updated_at: String,
}
