//! Typed collections over the key-value table.
//!
//! A collection is read and written as a whole. A missing key reads as an
//! empty collection, and so does a stored value that no longer matches the
//! record schema. Writers must read-modify-write the full array; there is no
//! patch or merge, so two processes sharing a workspace race last-write-wins.

use crate::db;
use crate::model::{
    Account, Announcement, ChatGroup, ChatMessage, CustomBlock, CustomPage, Grade, Homework,
    ReportCard, SliderImage, Student, SystemSettings,
};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const SETTINGS_KEY: &str = "systemSettings";
pub const CURRENT_USER_KEY: &str = "currentUser";
pub const AI_LOGS_KEY: &str = "ai_chat_logs";

pub fn ai_transcript_key(account_id: &str) -> String {
    format!("ai_messages_{}", account_id)
}

/// A record type stored as one JSON array under a fixed key.
pub trait Collection: Serialize + DeserializeOwned {
    const KEY: &'static str;

    fn id(&self) -> &str;
}

macro_rules! collection {
    ($ty:ty, $key:literal) => {
        impl Collection for $ty {
            const KEY: &'static str = $key;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

collection!(Account, "accounts");
collection!(Student, "students");
collection!(Homework, "homework");
collection!(Grade, "grades");
collection!(ReportCard, "reportCards");
collection!(Announcement, "announcements");
collection!(ChatGroup, "chatGroups");
collection!(ChatMessage, "chatMessages");
collection!(SliderImage, "sliderImages");
collection!(CustomBlock, "customBlocks");
collection!(CustomPage, "customPages");

pub fn load<T: Collection>(conn: &Connection) -> anyhow::Result<Vec<T>> {
    load_key(conn, T::KEY)
}

pub fn save<T: Collection>(conn: &Connection, items: &[T]) -> anyhow::Result<()> {
    save_key(conn, T::KEY, items)
}

/// Reads any JSON array under `key`; absent or mismatched values read as empty.
pub fn load_key<T: DeserializeOwned>(conn: &Connection, key: &str) -> anyhow::Result<Vec<T>> {
    let Some(value) = db::kv_get_json(conn, key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_value(value) {
        Ok(items) => Ok(items),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored collection does not match schema; reading as empty");
            Ok(Vec::new())
        }
    }
}

pub fn save_key<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> anyhow::Result<()> {
    let v = serde_json::to_value(value)?;
    db::kv_set_json(conn, key, &v)
}

pub fn load_settings(conn: &Connection) -> anyhow::Result<SystemSettings> {
    let Some(value) = db::kv_get_json(conn, SETTINGS_KEY)? else {
        return Ok(SystemSettings::default());
    };
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored settings do not match schema; using defaults");
        SystemSettings::default()
    }))
}

pub fn save_settings(conn: &Connection, settings: &SystemSettings) -> anyhow::Result<()> {
    save_key(conn, SETTINGS_KEY, settings)
}

pub fn find_by_id<'a, T: Collection>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|it| it.id() == id)
}

/// Replaces the record with the same id. Returns false when no record matched.
pub fn replace_by_id<T: Collection>(items: &mut [T], record: T) -> bool {
    match items.iter_mut().find(|it| it.id() == record.id()) {
        Some(slot) => {
            *slot = record;
            true
        }
        None => false,
    }
}

/// Removes the record with `id`. Returns false when nothing was removed.
pub fn remove_by_id<T: Collection>(items: &mut Vec<T>, id: &str) -> bool {
    let before = items.len();
    items.retain(|it| it.id() != id);
    items.len() != before
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Random base-36 fragment followed by the base-36 millisecond clock.
/// Collisions are improbable, not impossible.
pub fn generate_id() -> String {
    let random = to_base36(uuid::Uuid::new_v4().as_u128());
    let fragment: String = random.chars().rev().take(9).collect();
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u128;
    format!("{}{}", fragment, to_base36(millis))
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
