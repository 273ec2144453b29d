pub mod database;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use database::Database;

pub fn create_router(db: Database) -> Router {
    Router::new()
        // Public routes (no authentication required)
        .route("/", get(|| async { Redirect::permanent("/login") }))
        .route("/login", get(handlers::auth::login_page))
        .route("/login", post(handlers::auth::login))
        .route("/register", get(handlers::auth::register_page))
        .route("/register", post(handlers::auth::register))
        .route("/logout", post(handlers::auth::logout))
        // Dashboard
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route("/dashboard/insights", post(handlers::dashboard::generate_insights))
        // Expense submission and history
        .route("/expenses/new", get(handlers::expenses::expense_form))
        .route("/expenses", post(handlers::expenses::create_expense))
        .route("/expenses/:id/delete", get(handlers::expenses::delete_expense))
        .route("/history", get(handlers::expenses::history))
        .route("/history/export", get(handlers::reports::export_csv))
        // Claim status and approvals
        .route("/status", get(handlers::status::status_view))
        .route("/status/:id", get(handlers::status::expense_detail))
        .route("/status/:id/approve", get(handlers::status::approve_expense))
        .route("/status/:id/reject", get(handlers::status::reject_expense))
        // User management
        .route("/users", get(handlers::users::users_list))
        .route("/users/:id/toggle", get(handlers::users::toggle_user))
        .route("/users/:id/delete", get(handlers::users::delete_user))
        // Static files (receipt uploads land under static/receipts)
        .nest_service("/static", ServeDir::new("static"))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)), // 10MB
        )
        .with_state(db)
}
