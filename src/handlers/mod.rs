pub mod auth;
pub mod dashboard;
pub mod expenses;
pub mod reports;
pub mod status;
pub mod users;

use crate::{
    database::Database,
    error::AppError,
    middleware::CurrentUser,
    models::{Expense, ExpenseRow, User, UserRow},
};

/// Fetch the expense list the current user is allowed to see: their own
/// claims, or everything for an admin. Ordered newest first.
pub(crate) async fn fetch_scoped_expenses(
    db: &Database,
    current_user: &CurrentUser,
) -> Result<Vec<Expense>, AppError> {
    let rows = if current_user.is_admin {
        sqlx::query_as::<_, ExpenseRow>("SELECT * FROM expenses ORDER BY date DESC")
            .fetch_all(db)
            .await?
    } else {
        sqlx::query_as::<_, ExpenseRow>(
            "SELECT * FROM expenses WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(current_user.id)
        .fetch_all(db)
        .await?
    };

    Ok(rows.into_iter().map(ExpenseRow::into_expense).collect())
}

/// Full account list for admin views, ordered by name.
pub(crate) async fn fetch_users(db: &Database) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(UserRow::into_user).collect())
}
