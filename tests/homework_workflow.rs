use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .env_remove("SCHOOLD_AI_CHAT_URL")
        .env_remove("SCHOOLD_AI_CHAT_KEY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or(Value::Null)
}

fn login(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, username: &str, password: &str) {
    let res = request_ok(
        stdin,
        reader,
        &format!("login-{}", username),
        "auth.login",
        json!({ "username": username, "password": password }),
    );
    assert_eq!(res["ok"], json!(true), "login {} failed: {}", username, res);
}

fn open(prefix: &str) -> (PathBuf, Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "select",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    (workspace, child, stdin, reader)
}

fn switch_to(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, username: &str, password: &str) {
    request_ok(stdin, reader, "logout", "auth.logout", json!({}));
    login(stdin, reader, username, password);
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn homework_moves_through_assistant_then_admin_approval() {
    let (workspace, mut child, mut stdin, mut reader) = open("schoold-homework");
    login(&mut stdin, &mut reader, "teacher1", "123456");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "homework.create",
        json!({
            "title": "Fractions worksheet",
            "description": "Exercises 1 to 10",
            "subject": "math",
            "grade": "seventh",
            "dueDate": "2026-11-01"
        }),
    );
    let hw_id = created["homework"]["id"].as_str().expect("homework id").to_string();
    assert_eq!(created["homework"]["status"], json!("pending"));
    assert_eq!(created["homework"]["teacherId"], json!("2"));

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "homework.create",
        json!({ "title": "No grade", "subject": "math", "dueDate": "2026-11-01" }),
    );
    assert_eq!(missing["code"], json!("bad_params"));

    let own = request_ok(&mut stdin, &mut reader, "3", "homework.list", json!({}));
    for hw in own["homework"].as_array().expect("homework array") {
        assert_eq!(hw["teacherId"], json!("2"));
    }

    let teacher_try = request_err(&mut stdin, &mut reader, "4", "homework.approve", json!({ "id": hw_id }));
    assert_eq!(teacher_try["code"], json!("forbidden"));

    switch_to(&mut stdin, &mut reader, "assistant8", "123456");
    let other_grade = request_err(&mut stdin, &mut reader, "5", "homework.approve", json!({ "id": hw_id }));
    assert_eq!(other_grade["code"], json!("out_of_scope"));

    switch_to(&mut stdin, &mut reader, "assistant7", "123456");
    let first = request_ok(&mut stdin, &mut reader, "6", "homework.approve", json!({ "id": hw_id }));
    assert_eq!(first["homework"]["status"], json!("approved_assistant"));
    let again = request_err(&mut stdin, &mut reader, "7", "homework.approve", json!({ "id": hw_id }));
    assert_eq!(again["code"], json!("invalid_transition"));

    switch_to(&mut stdin, &mut reader, "0012345678", "123456");
    let before = request_ok(&mut stdin, &mut reader, "8", "homework.list", json!({}));
    assert!(!ids(&before["homework"]).contains(&hw_id));

    switch_to(&mut stdin, &mut reader, "admin", "admin123");
    let published = request_ok(&mut stdin, &mut reader, "9", "homework.approve", json!({ "id": hw_id }));
    assert_eq!(published["homework"]["status"], json!("approved_admin"));
    let late_reject = request_err(&mut stdin, &mut reader, "10", "homework.reject", json!({ "id": hw_id }));
    assert_eq!(late_reject["code"], json!("terminal_state"));
    let unknown = request_err(&mut stdin, &mut reader, "11", "homework.approve", json!({ "id": "nope" }));
    assert_eq!(unknown["code"], json!("not_found"));

    switch_to(&mut stdin, &mut reader, "0012345678", "123456");
    let after = request_ok(&mut stdin, &mut reader, "12", "homework.list", json!({}));
    assert!(ids(&after["homework"]).contains(&hw_id));
    for hw in after["homework"].as_array().expect("homework array") {
        assert_eq!(hw["status"], json!("approved_admin"));
        assert_eq!(hw["grade"], json!("seventh"));
    }

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rejected_homework_is_final_and_teacher_can_withdraw_pending() {
    let (workspace, mut child, mut stdin, mut reader) = open("schoold-homework-reject");
    login(&mut stdin, &mut reader, "teacher1", "123456");

    let mut create = |id: &str, title: &str| -> String {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "homework.create",
            json!({ "title": title, "subject": "science", "grade": "seventh", "dueDate": "2026-12-01" }),
        );
        res["homework"]["id"].as_str().expect("homework id").to_string()
    };
    let rejected_id = create("1", "Plants");
    let withdrawn_id = create("2", "Cells");

    request_ok(&mut stdin, &mut reader, "3", "homework.delete", json!({ "id": withdrawn_id }));

    switch_to(&mut stdin, &mut reader, "assistant7", "123456");
    let rejected = request_ok(&mut stdin, &mut reader, "4", "homework.reject", json!({ "id": rejected_id }));
    assert_eq!(rejected["homework"]["status"], json!("rejected"));
    let pending = request_ok(&mut stdin, &mut reader, "5", "homework.list", json!({ "status": "pending" }));
    assert!(!ids(&pending["homework"]).contains(&rejected_id));
    assert!(!ids(&pending["homework"]).contains(&withdrawn_id));

    switch_to(&mut stdin, &mut reader, "admin", "admin123");
    let revive = request_err(&mut stdin, &mut reader, "6", "homework.approve", json!({ "id": rejected_id }));
    assert_eq!(revive["code"], json!("terminal_state"));

    switch_to(&mut stdin, &mut reader, "teacher1", "123456");
    let locked = request_err(&mut stdin, &mut reader, "7", "homework.delete", json!({ "id": rejected_id }));
    assert_eq!(locked["code"], json!("forbidden"));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn scores_are_range_checked_and_scoped_per_role() {
    let (workspace, mut child, mut stdin, mut reader) = open("schoold-grades");
    login(&mut stdin, &mut reader, "teacher1", "123456");

    let too_high = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "grades.create",
        json!({ "studentId": "s1", "subject": "math", "score": 25 }),
    );
    assert_eq!(too_high["code"], json!("bad_params"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.create",
        json!({ "studentId": "s1", "subject": "math", "score": 18.5 }),
    );
    assert_eq!(created["grade"]["status"], json!("pending"));
    assert_eq!(created["grade"]["studentName"], json!("Ali Mohammadi"));
    assert_eq!(created["grade"]["grade"], json!("seventh"));
    let new_id = created["grade"]["id"].as_str().expect("grade id").to_string();

    let orphan = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.create",
        json!({ "studentId": "ghost", "subject": "math", "score": 10 }),
    );
    assert_eq!(orphan["grade"]["studentName"], json!(""));

    // Students only see approved scores of their own record.
    switch_to(&mut stdin, &mut reader, "0012345678", "123456");
    let mine = request_ok(&mut stdin, &mut reader, "4", "grades.list", json!({}));
    let rows = mine["grades"].as_array().expect("grades array");
    assert!(!rows.is_empty());
    for g in rows {
        assert_eq!(g["studentId"], json!("s1"));
        assert_eq!(g["status"], json!("approved"));
    }
    assert!(!ids(&mine["grades"]).contains(&new_id));

    switch_to(&mut stdin, &mut reader, "assistant8", "123456");
    let eighth = request_ok(&mut stdin, &mut reader, "5", "grades.list", json!({}));
    assert!(!ids(&eighth["grades"]).contains(&new_id));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grade_seven_scenario_with_fresh_assistant() {
    let (workspace, mut child, mut stdin, mut reader) = open("schoold-homework-g7");
    login(&mut stdin, &mut reader, "admin", "admin123");
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "accounts.create",
        json!({ "account": {
            "name": "Grade Seven Assistant",
            "username": "assistant-g7",
            "password": "123456",
            "role": "assistant",
            "grade": "7"
        }}),
    );

    switch_to(&mut stdin, &mut reader, "teacher2", "123456");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "homework.create",
        json!({ "title": "X", "subject": "Math", "grade": "7", "dueDate": "2024-01-01" }),
    );
    assert_eq!(created["homework"]["status"], json!("pending"));
    let id = created["homework"]["id"].as_str().expect("homework id").to_string();

    switch_to(&mut stdin, &mut reader, "assistant7", "123456");
    let wrong_scope = request_err(&mut stdin, &mut reader, "3", "homework.approve", json!({ "id": id }));
    assert_eq!(wrong_scope["code"], json!("out_of_scope"));

    switch_to(&mut stdin, &mut reader, "assistant-g7", "123456");
    let step = request_ok(&mut stdin, &mut reader, "4", "homework.approve", json!({ "id": id }));
    assert_eq!(step["homework"]["status"], json!("approved_assistant"));

    switch_to(&mut stdin, &mut reader, "admin", "admin123");
    let fin = request_ok(&mut stdin, &mut reader, "5", "homework.approve", json!({ "id": id }));
    assert_eq!(fin["homework"]["status"], json!("approved_admin"));
    let reject = request_err(&mut stdin, &mut reader, "6", "homework.reject", json!({ "id": id }));
    assert_eq!(reject["code"], json!("terminal_state"));

    let all = request_ok(&mut stdin, &mut reader, "7", "homework.list", json!({ "status": "approved_admin" }));
    assert!(ids(&all["homework"]).contains(&id));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
