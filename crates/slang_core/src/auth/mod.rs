//! Auth provider contract and identity handoff.
//!
//! # Responsibility
//! - Define the account operations the presentation layer drives.
//! - Resolve an [`Identity`] that is handed to the feed controller.
//!
//! # Invariants
//! - The feed controller never calls an [`AuthProvider`] directly.
//! - A `users` document exists for every identity produced by [`sign_up`].

use crate::model::user::{User, UserId};
use crate::store::{StoreError, WordStore};
use async_trait::async_trait;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod local;

pub use local::LocalAuthProvider;

pub type AuthResult<T> = Result<T, AuthError>;

/// Resolved user identity supplied to the feed controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidEmail(String),
    WeakPassword,
    EmailInUse(String),
    InvalidCredentials,
    /// User record could not be written after account creation.
    Store(StoreError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::WeakPassword => write!(f, "password is too short"),
            Self::EmailInUse(value) => write!(f, "email already registered: `{value}`"),
            Self::InvalidCredentials => write!(f, "email or password is incorrect"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Account operations of the managed auth backend.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// Signed-in user, if any.
    async fn current_user_id(&self) -> Option<UserId>;
    /// Registers and signs in a new account.
    async fn create_account(&self, email: &str, password: &str) -> AuthResult<UserId>;
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<UserId>;
    async fn sign_out(&self);
}

/// Creates an account and its `users` document.
///
/// `display_name` defaults to the local part of `email` when blank.
pub async fn sign_up<A, S>(
    auth: &A,
    store: &S,
    email: &str,
    password: &str,
    display_name: &str,
) -> AuthResult<Identity>
where
    A: AuthProvider + ?Sized,
    S: WordStore + ?Sized,
{
    let user_id = auth.create_account(email, password).await?;
    let name = resolve_display_name(display_name, email);
    let identity = Identity::new(user_id, name);

    if let Err(err) = store
        .create_user(&User::new(identity.user_id.clone(), identity.display_name.clone()))
        .await
    {
        warn!(
            "event=user_create module=auth status=error error_code=store_write_failed error={err}"
        );
        return Err(err.into());
    }

    info!(
        "event=sign_up module=auth status=ok user_id={}",
        identity.user_id
    );
    Ok(identity)
}

fn resolve_display_name(display_name: &str, email: &str) -> String {
    let trimmed = display_name.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or("user")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::resolve_display_name;

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        assert_eq!(resolve_display_name("  ", "slay@example.com"), "slay");
        assert_eq!(resolve_display_name(" Rizzler ", "a@b.co"), "Rizzler");
    }
}
