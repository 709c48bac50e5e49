pub mod accounts;
pub mod ai;
pub mod announcements;
pub mod auth;
pub mod backup;
pub mod chat;
pub mod content;
pub mod core;
pub mod dashboard;
pub mod grades;
pub mod homework;
pub mod report_cards;
pub mod settings;
pub mod students;
