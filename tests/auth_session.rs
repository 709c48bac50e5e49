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

#[test]
fn login_gate_and_session_resume() {
    let workspace = temp_dir("schoold-auth");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let landing = request_ok(&mut stdin, &mut reader, "2", "auth.gate", json!({ "path": "/" }));
    assert_eq!(landing["allow"], json!(true));
    assert_eq!(landing["route"], json!("/auth"));
    let anon = request_ok(&mut stdin, &mut reader, "3", "auth.gate", json!({ "path": "/teacher" }));
    assert_eq!(anon["redirect"], json!("/auth"));

    let bad = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "username": "teacher1", "password": "nope" }),
    );
    assert_eq!(bad["ok"], json!(false));
    assert!(bad.get("user").is_none());

    login(&mut stdin, &mut reader, "teacher1", "123456");
    let session = request_ok(&mut stdin, &mut reader, "5", "auth.session", json!({}));
    assert_eq!(session["user"]["username"], json!("teacher1"));
    assert_eq!(session["home"], json!("/teacher"));
    assert!(session["user"].get("password").is_none());

    let admin_route = request_ok(&mut stdin, &mut reader, "6", "auth.gate", json!({ "path": "/admin/accounts" }));
    assert_eq!(admin_route["allow"], json!(false));
    assert_eq!(admin_route["redirect"], json!("/teacher"));

    let denied = request_err(&mut stdin, &mut reader, "7", "accounts.list", json!({}));
    assert_eq!(denied["code"], json!("forbidden"));
    assert_eq!(denied["details"]["redirect"], json!("/teacher"));

    let nav = request_ok(&mut stdin, &mut reader, "8", "auth.nav", json!({}));
    assert_eq!(nav["items"][0]["path"], json!("/teacher"));

    drop(stdin);
    let _ = child.wait();

    // A fresh process on the same workspace resumes the persisted user.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let resumed = request_ok(&mut stdin, &mut reader, "10", "auth.session", json!({}));
    assert_eq!(resumed["user"]["username"], json!("teacher1"));

    let out = request_ok(&mut stdin, &mut reader, "11", "auth.logout", json!({}));
    assert_eq!(out["home"], json!("/auth"));
    let after = request_ok(&mut stdin, &mut reader, "12", "auth.session", json!({}));
    assert_eq!(after["user"], Value::Null);
    let err = request_err(&mut stdin, &mut reader, "13", "homework.list", json!({}));
    assert_eq!(err["code"], json!("unauthenticated"));
    assert_eq!(err["details"]["redirect"], json!("/auth"));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn admin_account_crud_and_profile_update() {
    let workspace = temp_dir("schoold-accounts");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    login(&mut stdin, &mut reader, "admin", "admin123");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.create",
        json!({ "account": {
            "name": "New Teacher",
            "username": "teacher3",
            "password": "secret1",
            "role": "teacher",
            "grade": "ninth",
            "subjects": ["art"]
        }}),
    );
    let new_id = created["account"]["id"].as_str().expect("id").to_string();
    assert!(created["account"].get("grade").is_none());
    assert_eq!(created["account"]["subjects"], json!(["art"]));

    let dup = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "accounts.create",
        json!({ "account": { "name": "X", "username": "teacher3", "password": "p", "role": "teacher" }}),
    );
    assert_eq!(dup["code"], json!("conflict"));

    let missing_grade = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "accounts.create",
        json!({ "account": { "name": "S", "username": "s9", "password": "p", "role": "student" }}),
    );
    assert_eq!(missing_grade["code"], json!("bad_params"));

    let teachers = request_ok(&mut stdin, &mut reader, "5", "accounts.list", json!({ "role": "teacher" }));
    assert_eq!(teachers["accounts"].as_array().map(|a| a.len()), Some(3));

    let self_delete = request_err(&mut stdin, &mut reader, "6", "accounts.delete", json!({ "id": "1" }));
    assert_eq!(self_delete["code"], json!("bad_params"));

    request_ok(&mut stdin, &mut reader, "7", "auth.logout", json!({}));
    login(&mut stdin, &mut reader, "teacher3", "secret1");

    let wrong = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "profile.update",
        json!({
            "name": "New Teacher",
            "username": "teacher3",
            "currentPassword": "bad",
            "newPassword": "secret2",
            "confirmPassword": "secret2"
        }),
    );
    assert_eq!(wrong["code"], json!("bad_params"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "profile.update",
        json!({
            "name": "Renamed Teacher",
            "username": "teacher3",
            "currentPassword": "secret1",
            "newPassword": "secret2",
            "confirmPassword": "secret2"
        }),
    );
    assert_eq!(updated["user"]["name"], json!("Renamed Teacher"));

    request_ok(&mut stdin, &mut reader, "10", "auth.logout", json!({}));
    login(&mut stdin, &mut reader, "teacher3", "secret2");
    request_ok(&mut stdin, &mut reader, "11", "auth.logout", json!({}));
    login(&mut stdin, &mut reader, "admin", "admin123");
    request_ok(&mut stdin, &mut reader, "12", "accounts.delete", json!({ "id": new_id }));
    let gone = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "auth.login",
        json!({ "username": "teacher3", "password": "secret2" }),
    );
    assert_eq!(gone["ok"], json!(false));

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
