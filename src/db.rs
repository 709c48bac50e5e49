use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "school.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    // One JSON document per key. Writes replace the whole value.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    Ok(())
}

pub fn kv_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            // Unreadable values behave like missing ones.
            tracing::warn!(key, error = %e, "stored value is not valid JSON");
            Ok(None)
        }
    }
}

pub fn kv_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO kv(key, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, &raw, chrono::Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

pub fn kv_remove(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
    Ok(n > 0)
}

pub fn kv_exists(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM kv WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn kv_keys(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

#[cfg(test)]
pub fn open_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    ensure_schema(&conn).expect("schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_reads_as_none() {
        let conn = open_memory();
        assert!(kv_get_json(&conn, "accounts").expect("get").is_none());
        assert!(!kv_exists(&conn, "accounts").expect("exists"));
    }

    #[test]
    fn set_replaces_whole_value() {
        let conn = open_memory();
        kv_set_json(&conn, "homework", &json!([{ "id": "a" }, { "id": "b" }])).expect("set");
        kv_set_json(&conn, "homework", &json!([{ "id": "c" }])).expect("set again");
        let v = kv_get_json(&conn, "homework").expect("get").expect("present");
        assert_eq!(v, json!([{ "id": "c" }]));
        assert_eq!(kv_keys(&conn).expect("keys"), vec!["homework".to_string()]);
    }

    #[test]
    fn corrupt_value_reads_as_none() {
        let conn = open_memory();
        conn.execute(
            "INSERT INTO kv(key, value) VALUES('grades', '{not json')",
            [],
        )
        .expect("insert raw");
        assert!(kv_get_json(&conn, "grades").expect("get").is_none());
        assert!(kv_exists(&conn, "grades").expect("exists"));
    }

    #[test]
    fn remove_reports_whether_key_existed() {
        let conn = open_memory();
        kv_set_json(&conn, "currentUser", &json!({ "id": "1" })).expect("set");
        assert!(kv_remove(&conn, "currentUser").expect("remove"));
        assert!(!kv_remove(&conn, "currentUser").expect("remove again"));
    }
}
