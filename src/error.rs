use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Application-level error taxonomy. Everything a handler can fail with
/// ends up here and is rendered as a blocking error page (auth forms
/// re-render inline instead, see handlers::auth).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Your account has been disabled. Please contact the administrator.")]
    AccountDisabled,

    #[error("Email or Username already exists")]
    DuplicateIdentity,

    #[error("No record found or permission denied")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Persistence(sqlx::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    // Session gate: not part of the user-facing taxonomy, maps to a
    // redirect back to the login page.
    #[error("Authentication required")]
    Unauthenticated,

    #[error("You do not have permission to do that")]
    Forbidden,
}

impl AppError {
    /// Classify a sqlx error, promoting unique-constraint violations
    /// (SQLSTATE 23505) to `DuplicateIdentity`.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::DuplicateIdentity;
            }
        }
        AppError::Persistence(err)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::AccountDisabled => StatusCode::UNAUTHORIZED,
            AppError::DuplicateIdentity => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::SEE_OTHER,
            AppError::Persistence(_) | AppError::Template(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::from_db(err)
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Unauthenticated) {
            return Redirect::to("/login").into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        let message = self.to_string();
        let body = ErrorTemplate {
            message: message.clone(),
        }
        .render()
        .unwrap_or(message);

        (status, Html(body)).into_response()
    }
}
