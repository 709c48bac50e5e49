use crate::ipc::helpers::{
    conn, get_opt_str, get_required_str, load, parse_param, require_role, respond, save, to_json,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Account, Role};
use crate::store;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    grade: Option<String>,
    subjects: Option<Vec<String>>,
    national_id: Option<String>,
}

impl AccountForm {
    fn validate(&self) -> Result<Role, HandlerErr> {
        for (key, value) in [
            ("name", &self.name),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(HandlerErr::bad_params(format!("missing {}", key)));
            }
        }
        let role = Role::parse(self.role.trim())
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", self.role)))?;
        if role.has_grade() && self.grade.as_deref().map_or(true, |g| g.trim().is_empty()) {
            return Err(HandlerErr::bad_params(format!("{} accounts need a grade", role.as_str())));
        }
        Ok(role)
    }

    fn apply(self, role: Role, account: &mut Account) {
        account.name = self.name.trim().to_string();
        account.username = self.username.trim().to_string();
        account.password = self.password;
        account.role = role;
        account.grade = self.grade.map(|g| g.trim().to_string());
        account.subjects = self.subjects;
        account.national_id = self.national_id.map(|n| n.trim().to_string());
        account.normalize_role_fields();
    }
}

fn ensure_unique_username(accounts: &[Account], username: &str, except_id: &str) -> Result<(), HandlerErr> {
    if accounts
        .iter()
        .any(|a| a.id != except_id && a.username == username)
    {
        return Err(HandlerErr::new("conflict", format!("username already in use: {}", username)));
    }
    Ok(())
}

fn accounts_list(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let role_filter = match get_opt_str(params, "role") {
        Some(r) => Some(Role::parse(&r).ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", r)))?),
        None => None,
    };
    let accounts: Vec<Account> = load(conn)?;
    let rows: Vec<&Account> = accounts
        .iter()
        .filter(|a| role_filter.map_or(true, |r| a.role == r))
        .collect();
    Ok(json!({ "accounts": to_json(&rows)? }))
}

fn accounts_create(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let form: AccountForm = parse_param(params, "account")?;
    let role = form.validate()?;

    let mut accounts: Vec<Account> = load(conn)?;
    ensure_unique_username(&accounts, form.username.trim(), "")?;

    let mut account = Account {
        id: store::generate_id(),
        username: String::new(),
        password: String::new(),
        role,
        name: String::new(),
        grade: None,
        subjects: None,
        national_id: None,
        created_at: store::now_iso(),
    };
    form.apply(role, &mut account);
    accounts.push(account.clone());
    save(conn, &accounts)?;
    tracing::info!(account_id = %account.id, role = role.as_str(), "account created");
    Ok(json!({ "account": to_json(&account)? }))
}

fn accounts_update(state: &AppState, params: &Value) -> HandlerResult {
    require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    let form: AccountForm = parse_param(params, "account")?;
    let role = form.validate()?;

    let mut accounts: Vec<Account> = load(conn)?;
    ensure_unique_username(&accounts, form.username.trim(), &id)?;
    let Some(existing) = accounts.iter_mut().find(|a| a.id == id) else {
        return Err(HandlerErr::not_found("account not found"));
    };
    form.apply(role, existing);
    let account = existing.clone();
    save(conn, &accounts)?;
    Ok(json!({ "account": to_json(&account)? }))
}

fn accounts_delete(state: &AppState, params: &Value) -> HandlerResult {
    let me = require_role(state, &[Role::Admin])?;
    let conn = conn(state)?;
    let id = get_required_str(params, "id")?;
    if id == me.id {
        return Err(HandlerErr::bad_params("cannot delete the signed-in account"));
    }
    let mut accounts: Vec<Account> = load(conn)?;
    if !store::remove_by_id(&mut accounts, &id) {
        return Err(HandlerErr::not_found("account not found"));
    }
    save(conn, &accounts)?;
    tracing::info!(account_id = %id, "account deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "accounts.list" => accounts_list(state, &req.params),
        "accounts.create" => accounts_create(state, &req.params),
        "accounts.update" => accounts_update(state, &req.params),
        "accounts.delete" => accounts_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
