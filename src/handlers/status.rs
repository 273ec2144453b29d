use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    filters,
    middleware::{get_current_user, CurrentUser},
    models::{stats, Expense, ExpenseRow, ExpenseStatus},
};

use super::fetch_scoped_expenses;

#[derive(Template)]
#[template(path = "status/status.html")]
struct StatusTemplate {
    current_user: CurrentUser,
    active_tab: &'static str,
    search: String,
    tabs: Vec<TabItem>,
    rows: Vec<StatusRow>,
}

struct TabItem {
    name: &'static str,
    count: usize,
    href: String,
    active: bool,
}

struct StatusRow {
    href: String,
    description: String,
    doc_number: String,
    project: String,
    user_name: String,
    amount: Decimal,
}

#[derive(Template)]
#[template(path = "status/detail.html")]
struct DetailTemplate {
    current_user: CurrentUser,
    status: &'static str,
    description: String,
    note: String,
    amount: Decimal,
    items: Vec<DetailItem>,
    meals: Vec<&'static str>,
    receipt_url: String,
    doc_number: String,
    can_review: bool,
    approve_href: String,
    reject_href: String,
}

struct DetailItem {
    label: &'static str,
    value: String,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    tab: String,
    #[serde(default)]
    search: String,
}

pub async fn status_view(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<StatusQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let expenses = fetch_scoped_expenses(&db, &current_user).await?;
    let active = ExpenseStatus::from_str(query.tab.trim()).unwrap_or(ExpenseStatus::Pending);
    let search = query.search.trim();

    // Tab counts cover the whole role-scoped set; the search box only
    // narrows the visible rows.
    let counts = stats::status_counts(&expenses);

    let tabs = [
        (ExpenseStatus::Pending, counts.pending),
        (ExpenseStatus::Approved, counts.approved),
        (ExpenseStatus::Rejected, counts.rejected),
    ]
    .into_iter()
    .map(|(status, count)| TabItem {
        name: status.as_str(),
        count,
        href: format!(
            "/status?tab={}&search={}",
            status.as_str(),
            urlencoding::encode(search)
        ),
        active: status == active,
    })
    .collect();

    let rows = expenses
        .iter()
        .filter(|e| e.status == active)
        .filter(|e| e.matches_status_search(search))
        .map(|e| StatusRow {
            href: format!("/status/{}", e.id),
            description: e.description.clone(),
            doc_number: e.doc_number.clone(),
            project: e.project.clone(),
            user_name: e.user_name.clone(),
            amount: e.amount,
        })
        .collect();

    let template = StatusTemplate {
        current_user,
        active_tab: active.as_str(),
        search: search.to_string(),
        tabs,
        rows,
    };
    Ok(Html(template.render()?))
}

pub async fn expense_detail(
    cookies: Cookies,
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let expense = fetch_visible_expense(&db, &current_user, expense_id).await?;

    let can_review = current_user.is_admin && expense.status == ExpenseStatus::Pending;
    let template = DetailTemplate {
        status: expense.status.as_str(),
        description: expense.description.clone(),
        note: expense.note.clone().unwrap_or_default(),
        amount: expense.amount,
        items: detail_items(&expense),
        meals: meal_chips(&expense),
        receipt_url: expense.receipt_url.clone().unwrap_or_default(),
        doc_number: expense.doc_number.clone(),
        can_review,
        approve_href: format!("/status/{}/approve", expense.id),
        reject_href: format!("/status/{}/reject", expense.id),
        current_user,
    };
    Ok(Html(template.render()?))
}

pub async fn approve_expense(
    cookies: Cookies,
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    update_status(&cookies, &db, expense_id, ExpenseStatus::Approved).await
}

pub async fn reject_expense(
    cookies: Cookies,
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    update_status(&cookies, &db, expense_id, ExpenseStatus::Rejected).await
}

/// One-shot transition out of Pending. The status guard in the WHERE
/// clause makes re-approval (or flipping a terminal state) report
/// `NotFound` instead of silently rewriting history.
async fn update_status(
    cookies: &Cookies,
    db: &Database,
    expense_id: Uuid,
    status: ExpenseStatus,
) -> Result<Redirect, AppError> {
    let current_user = get_current_user(cookies, db)
        .await
        .ok_or(AppError::Unauthenticated)?;
    if !current_user.is_admin {
        return Err(AppError::Forbidden);
    }

    let result = sqlx::query("UPDATE expenses SET status = $1 WHERE id = $2 AND status = 'Pending'")
        .bind(status.as_str())
        .bind(expense_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    log::info!(
        "expense {} set to {} by {}",
        expense_id,
        status.as_str(),
        current_user.name
    );
    Ok(Redirect::to("/status"))
}

async fn fetch_visible_expense(
    db: &Database,
    current_user: &CurrentUser,
    expense_id: Uuid,
) -> Result<Expense, AppError> {
    let row = if current_user.is_admin {
        sqlx::query_as::<_, ExpenseRow>("SELECT * FROM expenses WHERE id = $1")
            .bind(expense_id)
            .fetch_optional(db)
            .await?
    } else {
        sqlx::query_as::<_, ExpenseRow>("SELECT * FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(expense_id)
            .bind(current_user.id)
            .fetch_optional(db)
            .await?
    };

    Ok(row.ok_or(AppError::NotFound)?.into_expense())
}

/// Label/value pairs for the detail view; absent fields are skipped.
fn detail_items(expense: &Expense) -> Vec<DetailItem> {
    let details = &expense.details;
    let mut items = vec![
        DetailItem {
            label: "User Name",
            value: expense.user_name.clone(),
        },
        DetailItem {
            label: "Project",
            value: expense.project.clone(),
        },
        DetailItem {
            label: "Category",
            value: expense.category().as_str().to_string(),
        },
        DetailItem {
            label: "Date",
            value: expense.date.format("%d %b %Y").to_string(),
        },
        DetailItem {
            label: "Doc Number",
            value: expense.doc_number.clone(),
        },
    ];

    let mut push = |label: &'static str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            items.push(DetailItem { label, value });
        }
    };

    push("Travel Mode", details.travel_mode().map(str::to_string));
    push("From", details.from_location().map(str::to_string));
    push("To", details.to_location().map(str::to_string));
    push("Approx KM", details.approx_km().map(|km| km.to_string()));
    push("Car Type", details.car_type().map(str::to_string));
    push("Stay Location", details.stay_location().map(str::to_string));
    if let (Some(from), Some(to)) = (details.stay_from(), details.stay_to()) {
        push(
            "Stay Period",
            Some(format!(
                "{} to {}",
                from.format("%d %b %Y"),
                to.format("%d %b %Y")
            )),
        );
    }
    push("Purpose", details.purpose().map(str::to_string));
    push("Client Name", details.client_name().map(str::to_string));
    push("Persons", details.person_count().map(|n| n.to_string()));
    push("Person List", details.person_list().map(str::to_string));
    push("Hotel Name", details.hotel_name().map(str::to_string));
    push(
        "Advance To",
        details.advance_recipient().map(str::to_string),
    );

    items
}

fn meal_chips(expense: &Expense) -> Vec<&'static str> {
    let details = &expense.details;
    [
        ("BREAKFAST", details.is_breakfast()),
        ("LUNCH", details.is_lunch()),
        ("DINNER", details.is_dinner()),
    ]
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect()
}
