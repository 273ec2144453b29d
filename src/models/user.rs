use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::utils::verify_password;

/// Access role. Immutable after registration; the Admin role unlocks the
/// whole-team dashboard scope, approvals, CSV export and user management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub password_hash: String,
}

/// Wire representation of a `users` row.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            // Rows are only ever written through registration, which stores
            // a valid role string; treat anything else as a plain user.
            role: Role::from_str(&self.role).unwrap_or(Role::User),
            is_active: self.is_active,
            password_hash: self.password_hash,
        }
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// Credential check for a matched account. The password is verified first;
/// the disabled-account check only applies once the credentials are known
/// to be good, so a disabled user with a wrong password still sees
/// `InvalidCredentials`.
pub fn check_login(user: &User, password: &str) -> Result<(), AppError> {
    if !verify_password(password, &user.password_hash).unwrap_or(false) {
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AppError::AccountDisabled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: Some("alice@example.com".to_string()),
            name: "Alice".to_string(),
            role: Role::User,
            // low cost keeps the test fast
            password_hash: bcrypt::hash("secret123", 4).unwrap(),
            is_active,
        }
    }

    #[test]
    fn role_round_trip() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("SUPERUSER"), None);
    }

    #[test]
    fn login_succeeds_with_correct_password() {
        let user = sample_user(true);
        assert!(check_login(&user, "secret123").is_ok());
    }

    #[test]
    fn login_rejects_wrong_password() {
        let user = sample_user(true);
        assert!(matches!(
            check_login(&user, "wrong"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn disabled_account_fails_after_credential_match() {
        let user = sample_user(false);
        assert!(matches!(
            check_login(&user, "secret123"),
            Err(AppError::AccountDisabled)
        ));
        // Wrong password on a disabled account still reads as bad credentials.
        assert!(matches!(
            check_login(&user, "wrong"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn unknown_role_string_falls_back_to_user() {
        let row = UserRow {
            id: Uuid::new_v4(),
            email: None,
            name: "Bob".to_string(),
            password_hash: String::new(),
            role: "MANAGER".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(row.into_user().role, Role::User);
    }
}
