use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    middleware::{get_current_user, CurrentUser},
};

use super::fetch_users;

#[derive(Template)]
#[template(path = "users/users.html")]
struct UsersTemplate {
    current_user: CurrentUser,
    rows: Vec<UserListRow>,
    search: String,
}

struct UserListRow {
    name: String,
    email: String,
    role: &'static str,
    is_admin_role: bool,
    is_active: bool,
    is_self: bool,
    toggle_href: String,
    delete_href: String,
}

#[derive(Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    search: String,
}

pub async fn users_list(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<UsersQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;
    if !current_user.is_admin {
        return Err(AppError::Forbidden);
    }

    let search = query.search.trim().to_lowercase();
    let rows = fetch_users(&db)
        .await?
        .into_iter()
        .filter(|u| {
            search.is_empty()
                || u.name.to_lowercase().contains(&search)
                || u.email
                    .as_deref()
                    .map_or(false, |e| e.to_lowercase().contains(&search))
        })
        .map(|u| UserListRow {
            email: u.email.clone().unwrap_or_default(),
            role: u.role.as_str(),
            is_admin_role: u.role == crate::models::Role::Admin,
            is_active: u.is_active,
            is_self: u.id == current_user.id,
            toggle_href: format!("/users/{}/toggle", u.id),
            delete_href: format!("/users/{}/delete", u.id),
            name: u.name,
        })
        .collect();

    let template = UsersTemplate {
        current_user,
        rows,
        search: query.search.trim().to_string(),
    };
    Ok(Html(template.render()?))
}

/// Flip the active flag. A disabled account fails its next login (and its
/// next request, since the session gate re-reads the row).
pub async fn toggle_user(
    cookies: Cookies,
    State(db): State<Database>,
    Path(user_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;
    if !current_user.is_admin {
        return Err(AppError::Forbidden);
    }
    if user_id == current_user.id {
        return Err(AppError::validation("You cannot disable your own account"));
    }

    let result = sqlx::query("UPDATE users SET is_active = NOT is_active WHERE id = $1")
        .bind(user_id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    log::info!("user {} toggled by {}", user_id, current_user.name);
    Ok(Redirect::to("/users"))
}

/// Remove the account entirely. Existing claims keep their stamped
/// user_id/user_name and stay visible to admins.
pub async fn delete_user(
    cookies: Cookies,
    State(db): State<Database>,
    Path(user_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;
    if !current_user.is_admin {
        return Err(AppError::Forbidden);
    }
    if user_id == current_user.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    log::info!("user {} deleted by {}", user_id, current_user.name);
    Ok(Redirect::to("/users"))
}
