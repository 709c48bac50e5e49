//! Signed-in user context.
//!
//! The session is a value owned by the request loop, passed explicitly to
//! everything that needs the caller's identity. It is persisted under
//! `currentUser` so a restarted sidecar resumes the same user.

use crate::db;
use crate::model::{Account, Role};
use crate::store::{self, CURRENT_USER_KEY};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Clone)]
pub struct Session {
    user: Option<Account>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the persisted snapshot. A missing or unreadable snapshot means
    /// nobody is signed in.
    pub fn restore(conn: &Connection) -> anyhow::Result<Self> {
        let user = db::kv_get_json(conn, CURRENT_USER_KEY)?
            .and_then(|v| serde_json::from_value::<Account>(v).ok());
        Ok(Self { user })
    }

    pub fn user(&self) -> Option<&Account> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    /// Exact match on username and password. On failure the session is left
    /// as it was and the caller learns nothing about which field was wrong.
    pub fn login(&mut self, conn: &Connection, username: &str, password: &str) -> anyhow::Result<bool> {
        let accounts: Vec<Account> = store::load(conn)?;
        let Some(account) = accounts
            .into_iter()
            .find(|a| a.username == username && a.password == password)
        else {
            tracing::info!("login rejected");
            return Ok(false);
        };
        tracing::info!(account_id = %account.id, role = account.role.as_str(), "login");
        self.update_current_user(conn, account)?;
        Ok(true)
    }

    pub fn logout(&mut self, conn: &Connection) -> anyhow::Result<()> {
        if let Some(u) = self.user.take() {
            tracing::info!(account_id = %u.id, "logout");
        }
        db::kv_remove(conn, CURRENT_USER_KEY)?;
        Ok(())
    }

    /// Overwrites the snapshot. Not re-checked against `accounts`, so the
    /// two can drift if the account is edited elsewhere.
    pub fn update_current_user(&mut self, conn: &Connection, account: Account) -> anyhow::Result<()> {
        store::save_key(conn, CURRENT_USER_KEY, &account)?;
        self.user = Some(account);
        Ok(())
    }

    pub fn update_profile(
        &mut self,
        conn: &Connection,
        form: &ProfileUpdate,
    ) -> Result<Account, ProfileError> {
        let Some(current) = self.user.as_ref() else {
            return Err(ProfileError::NotSignedIn);
        };
        let name = form.name.trim();
        let username = form.username.trim();
        if name.is_empty() || username.is_empty() {
            return Err(ProfileError::MissingField);
        }

        let mut accounts: Vec<Account> = store::load(conn)?;
        let Some(existing) = store::find_by_id(&accounts, &current.id).cloned() else {
            return Err(ProfileError::AccountMissing);
        };
        if username != existing.username
            && accounts
                .iter()
                .any(|a| a.id != existing.id && a.username == username)
        {
            return Err(ProfileError::UsernameTaken);
        }

        let changing_password = !form.current_password.is_empty() || !form.new_password.is_empty();
        if changing_password {
            if form.current_password != existing.password {
                return Err(ProfileError::WrongPassword);
            }
            if form.new_password.chars().count() < MIN_PASSWORD_LEN {
                return Err(ProfileError::PasswordTooShort);
            }
            if form.new_password != form.confirm_password {
                return Err(ProfileError::PasswordMismatch);
            }
        }

        let updated = Account {
            name: name.to_string(),
            username: username.to_string(),
            password: if changing_password {
                form.new_password.clone()
            } else {
                existing.password.clone()
            },
            ..existing
        };
        store::replace_by_id(&mut accounts, updated.clone());
        store::save(conn, &accounts)?;
        self.update_current_user(conn, updated.clone())?;
        Ok(updated)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: String,
    pub username: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("name and username are required")]
    MissingField,
    #[error("signed-in account no longer exists")]
    AccountMissing,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("new password must be at least 6 characters")]
    PasswordTooShort,
    #[error("password confirmation does not match")]
    PasswordMismatch,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ProfileError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotSignedIn => "unauthenticated",
            Self::AccountMissing => "not_found",
            Self::UsernameTaken => "conflict",
            Self::Storage(_) => "db_update_failed",
            Self::MissingField
            | Self::WrongPassword
            | Self::PasswordTooShort
            | Self::PasswordMismatch => "bad_params",
        }
    }
}
