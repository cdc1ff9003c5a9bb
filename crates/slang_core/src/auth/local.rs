//! In-memory development auth provider.
//!
//! Accounts live only for the process lifetime. Used by the CLI probe and
//! tests; production builds bind the managed provider at the FFI edge.
//! Passwords are held in plaintext in memory, so this backend is not for
//! production use.

use super::{AuthError, AuthProvider, AuthResult};
use crate::model::user::UserId;
use async_trait::async_trait;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

/// Minimum password length accepted by the managed provider.
pub const MIN_PASSWORD_CHARS: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

struct Account {
    user_id: UserId,
    password: String,
}

#[derive(Default)]
struct LocalState {
    accounts: HashMap<String, Account>,
    current: Option<UserId>,
}

#[derive(Default)]
pub struct LocalAuthProvider {
    state: Mutex<LocalState>,
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LocalState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

/// Lowercases and trims an email, rejecting malformed addresses.
pub fn normalize_email(email: &str) -> AuthResult<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(AuthError::InvalidEmail(email.trim().to_string()));
    }
    Ok(normalized)
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn current_user_id(&self) -> Option<UserId> {
        self.with_state(|state| state.current.clone())
    }

    async fn create_account(&self, email: &str, password: &str) -> AuthResult<UserId> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }

        let user_id = self.with_state(|state| {
            if state.accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse(email.clone()));
            }
            let user_id = uuid::Uuid::new_v4().to_string();
            state.accounts.insert(
                email.clone(),
                Account {
                    user_id: user_id.clone(),
                    password: password.to_string(),
                },
            );
            state.current = Some(user_id.clone());
            Ok(user_id)
        })?;

        info!("event=account_create module=auth status=ok user_id={user_id}");
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<UserId> {
        let email = normalize_email(email)?;
        self.with_state(|state| {
            let user_id = match state.accounts.get(&email) {
                Some(account) if account.password == password => account.user_id.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            };
            state.current = Some(user_id.clone());
            Ok(user_id)
        })
    }

    async fn sign_out(&self) {
        self.with_state(|state| state.current = None);
    }
}
