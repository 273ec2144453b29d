use askama::Template;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies};

use crate::{
    database::Database,
    error::AppError,
    models::{check_login, NewUser, Role, UserRow},
    utils::{create_token, hash_password},
};

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    identifier: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    name: String,
    #[serde(default)]
    email: String,
    password: String,
    role: String,
}

pub async fn login_page() -> Result<Html<String>, AppError> {
    let template = LoginTemplate {
        error: String::new(),
    };
    Ok(Html(template.render()?))
}

pub async fn register_page() -> Result<Html<String>, AppError> {
    let template = RegisterTemplate {
        error: String::new(),
    };
    Ok(Html(template.render()?))
}

pub async fn login(
    State(db): State<Database>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    match authenticate_user(&db, form.identifier.trim(), form.password.trim()).await {
        Ok(user) => {
            start_session(&cookies, user.id, user.name.clone(), user.role).map_err(|_| {
                login_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication failed".to_string(),
                )
            })?;
            Ok(Redirect::to("/dashboard"))
        }
        Err(err) => {
            let status = match err {
                AppError::InvalidCredentials | AppError::AccountDisabled => {
                    StatusCode::UNAUTHORIZED
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(login_error(status, err.to_string()))
        }
    }
}

pub async fn register(
    State(db): State<Database>,
    cookies: Cookies,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    let name = form.name.trim().to_string();
    let email = form.email.trim().to_lowercase();
    let email = (!email.is_empty()).then_some(email);
    let password = form.password.trim();
    let role = Role::from_str(&form.role).unwrap_or(Role::User);

    if name.is_empty() || password.is_empty() {
        return Err(register_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Name and password are required".to_string(),
        ));
    }

    let password_hash = hash_password(password).map_err(|_| {
        register_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process password".to_string(),
        )
    })?;

    let new_user = NewUser {
        name,
        email,
        password_hash,
        role,
    };

    match create_user_in_db(&db, &new_user).await.map_err(AppError::from_db) {
        Ok(row) => {
            let user = row.into_user();
            log::info!("registered account {}", user.name);
            // New accounts are signed in straight away.
            start_session(&cookies, user.id, user.name, user.role).map_err(|_| {
                register_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Registration failed".to_string(),
                )
            })?;
            Ok(Redirect::to("/dashboard"))
        }
        Err(AppError::DuplicateIdentity) => Err(register_error(
            StatusCode::CONFLICT,
            AppError::DuplicateIdentity.to_string(),
        )),
        Err(err) => {
            log::error!("registration failed: {}", err);
            Err(register_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            ))
        }
    }
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::from("auth_token"));
    Redirect::to("/login")
}

/// Match the identifier against email OR name, case-insensitively, then
/// verify the password and only afterwards the active flag (see
/// `models::check_login`).
async fn authenticate_user(
    db: &Database,
    identifier: &str,
    password: &str,
) -> Result<crate::models::User, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE LOWER(name) = LOWER($1) OR LOWER(email) = LOWER($1)",
    )
    .bind(identifier)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    let user = row.into_user();
    check_login(&user, password)?;
    Ok(user)
}

async fn create_user_in_db(db: &Database, user_data: &NewUser) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (name, email, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, true)
        RETURNING *
        "#,
    )
    .bind(&user_data.name)
    .bind(&user_data.email)
    .bind(&user_data.password_hash)
    .bind(user_data.role.as_str())
    .fetch_one(db)
    .await
}

fn start_session(
    cookies: &Cookies,
    user_id: uuid::Uuid,
    name: String,
    role: Role,
) -> Result<(), jsonwebtoken::errors::Error> {
    let token = create_token(user_id, name, role)?;

    // HTTP-only cookie carrying the JWT; reload restores the session
    // without re-authenticating.
    let cookie = Cookie::build(("auth_token", token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(24))
        .build();

    cookies.add(cookie);
    Ok(())
}

fn login_error(status: StatusCode, message: String) -> (StatusCode, Html<String>) {
    let template = LoginTemplate { error: message };
    (status, Html(template.render().unwrap_or_default()))
}

fn register_error(status: StatusCode, message: String) -> (StatusCode, Html<String>) {
    let template = RegisterTemplate { error: message };
    (status, Html(template.render().unwrap_or_default()))
}
