use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    models::{Role, UserRow},
    utils::verify_token,
};

/// The authenticated user for the current request, resolved from the
/// session cookie. Re-read from the database on every request so a
/// disabled account is locked out immediately and a token that outlives
/// its account resolves to nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    // Helper property for templates
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn from_user(user: crate::models::User) -> Self {
        let is_admin = user.role == Role::Admin;
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_admin,
        }
    }

    pub fn role_label(&self) -> &'static str {
        self.role.as_str()
    }
}

pub async fn get_current_user(cookies: &Cookies, db: &Database) -> Option<CurrentUser> {
    let token = cookies.get("auth_token")?.value().to_string();
    let claims = verify_token(&token).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(user_id)
        .fetch_optional(db)
        .await
        .ok()??;

    Some(CurrentUser::from_user(row.into_user()))
}
