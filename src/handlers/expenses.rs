use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    filters,
    middleware::{get_current_user, CurrentUser},
    models::{CarType, Category, Expense, ExpenseDraft, ExpenseRow, NewExpense, TravelMode},
};

use super::fetch_scoped_expenses;

const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Template)]
#[template(path = "expenses/expense_form.html")]
struct ExpenseFormTemplate {
    current_user: CurrentUser,
    draft: ExpenseDraft,
    error: String,
    categories: Vec<OptionItem>,
    travel_modes: Vec<OptionItem>,
    car_types: Vec<OptionItem>,
}

#[derive(Template)]
#[template(path = "expenses/history.html")]
struct HistoryTemplate {
    current_user: CurrentUser,
    rows: Vec<HistoryRow>,
    search: String,
    categories: Vec<OptionItem>,
    export_href: String,
}

struct OptionItem {
    value: &'static str,
    selected: bool,
}

struct HistoryRow {
    description: String,
    user_name: String,
    project: String,
    doc_number: String,
    date: String,
    category: &'static str,
    amount: Decimal,
    sub_text: String,
    delete_href: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    search: String,
    #[serde(default)]
    category: String,
}

fn form_template(
    current_user: CurrentUser,
    draft: ExpenseDraft,
    error: String,
) -> ExpenseFormTemplate {
    let categories = Category::ALL
        .iter()
        .map(|c| OptionItem {
            value: c.as_str(),
            selected: draft.category == c.as_str(),
        })
        .collect();
    let travel_modes = TravelMode::ALL
        .iter()
        .map(|m| OptionItem {
            value: m.as_str(),
            selected: draft.travel_mode == m.as_str(),
        })
        .collect();
    let car_types = CarType::ALL
        .iter()
        .map(|c| OptionItem {
            value: c.as_str(),
            selected: draft.car_type == c.as_str(),
        })
        .collect();

    ExpenseFormTemplate {
        current_user,
        draft,
        error,
        categories,
        travel_modes,
        car_types,
    }
}

pub async fn expense_form(
    cookies: Cookies,
    State(db): State<Database>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let draft = ExpenseDraft {
        category: Category::Travel.as_str().to_string(),
        date: today.clone(),
        stay_from: today.clone(),
        stay_to: today,
        travel_mode: TravelMode::Bus.as_str().to_string(),
        car_type: CarType::OwnCar.as_str().to_string(),
        ..ExpenseDraft::default()
    };

    let template = form_template(current_user, draft, String::new());
    Ok(Html(template.render()?))
}

pub async fn create_expense(
    cookies: Cookies,
    State(db): State<Database>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let (draft, receipt) = parse_expense_multipart(multipart).await?;

    // Validation blocks the insert entirely; the form is re-rendered with
    // every typed value intact.
    let new_expense = match draft.validate() {
        Ok(new_expense) => new_expense,
        Err(AppError::Validation(message)) => {
            let template = form_template(current_user, draft, message);
            return Ok(Html(template.render()?).into_response());
        }
        Err(err) => return Err(err),
    };

    let receipt_url = save_receipt(receipt).await?;
    let row = insert_expense(&db, &current_user, &new_expense, receipt_url).await?;
    log::info!(
        "expense {} created by {} ({})",
        row.id,
        current_user.name,
        row.category
    );

    Ok(Redirect::to("/history").into_response())
}

async fn insert_expense(
    db: &Database,
    current_user: &CurrentUser,
    new_expense: &NewExpense,
    receipt_url: Option<String>,
) -> Result<ExpenseRow, AppError> {
    let details = &new_expense.details;
    let row = sqlx::query_as::<_, ExpenseRow>(
        r#"
        INSERT INTO expenses (
            user_id, user_name, amount, category, date, description, project,
            doc_number, receipt_url, note, status, travel_mode, from_location,
            to_location, approx_km, car_type, purpose, stay_location,
            stay_from, stay_to, client_name, person_count, person_list,
            hotel_name, advance_recipient, is_breakfast, is_lunch, is_dinner
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
            $27, $28
        )
        RETURNING *
        "#,
    )
    .bind(current_user.id)
    .bind(&current_user.name)
    .bind(new_expense.amount)
    .bind(details.category().as_str())
    .bind(new_expense.date)
    .bind(&new_expense.description)
    .bind(&new_expense.project)
    .bind(&new_expense.doc_number)
    .bind(receipt_url)
    .bind(&new_expense.note)
    .bind("Pending")
    .bind(details.travel_mode())
    .bind(details.from_location())
    .bind(details.to_location())
    .bind(details.approx_km())
    .bind(details.car_type())
    .bind(details.purpose())
    .bind(details.stay_location())
    .bind(details.stay_from())
    .bind(details.stay_to())
    .bind(details.client_name())
    .bind(details.person_count())
    .bind(details.person_list())
    .bind(details.hotel_name())
    .bind(details.advance_recipient())
    .bind(details.is_breakfast())
    .bind(details.is_lunch())
    .bind(details.is_dinner())
    .fetch_one(db)
    .await?;

    Ok(row)
}

pub async fn history(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<HistoryQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let expenses = fetch_scoped_expenses(&db, &current_user).await?;
    let category_filter = Category::from_str(query.category.trim());
    let search = query.search.trim();

    let rows = expenses
        .iter()
        .filter(|e| e.matches_search(search))
        .filter(|e| category_filter.map_or(true, |c| e.category() == c))
        .map(history_row)
        .collect();

    let categories = Category::ALL
        .iter()
        .map(|c| OptionItem {
            value: c.as_str(),
            selected: category_filter == Some(*c),
        })
        .collect();

    let export_href = format!(
        "/history/export?search={}&category={}",
        urlencoding::encode(search),
        urlencoding::encode(query.category.trim())
    );

    let template = HistoryTemplate {
        current_user,
        rows,
        search: search.to_string(),
        categories,
        export_href,
    };
    Ok(Html(template.render()?))
}

fn history_row(expense: &Expense) -> HistoryRow {
    HistoryRow {
        description: expense.description.clone(),
        user_name: expense.user_name.clone(),
        project: expense.project.clone(),
        doc_number: expense.doc_number.clone(),
        date: expense.date.format("%d %b %Y").to_string(),
        category: expense.category().as_str(),
        amount: expense.amount,
        sub_text: sub_text(expense),
        delete_href: format!("/expenses/{}/delete", expense.id),
    }
}

/// One-line summary of the category metadata, shown under the description.
fn sub_text(expense: &Expense) -> String {
    let details = &expense.details;
    let mut parts: Vec<String> = Vec::new();

    if details.from_location().is_some() || details.to_location().is_some() {
        parts.push(format!(
            "{} -> {}",
            details.from_location().unwrap_or("?"),
            details.to_location().unwrap_or("?")
        ));
    }
    if let Some(mode) = details.travel_mode() {
        parts.push(format!("Mode: {}", mode));
    }
    if let Some(km) = details.approx_km() {
        parts.push(format!("{}KM", km));
    }
    if let Some(car_type) = details.car_type() {
        parts.push(car_type.to_string());
    }
    if let Some(location) = details.stay_location() {
        parts.push(format!("At: {}", location));
    }
    if let Some(purpose) = details.purpose() {
        parts.push(format!("Ref: {}", purpose));
    }
    if let Some(client) = details.client_name() {
        parts.push(format!("Client: {}", client));
    }
    if let Some(recipient) = details.advance_recipient() {
        parts.push(format!("To: {}", recipient));
    }

    let meals: Vec<&str> = [
        ("Breakfast", details.is_breakfast()),
        ("Lunch", details.is_lunch()),
        ("Dinner", details.is_dinner()),
    ]
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();
    if !meals.is_empty() {
        parts.push(format!("Meals: {}", meals.join(", ")));
    }

    parts.join(" | ")
}

pub async fn delete_expense(
    cookies: Cookies,
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    // Non-admins can only delete their own claims; an id outside the
    // caller's scope reads the same as a missing one.
    let result = if current_user.is_admin {
        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(expense_id)
            .execute(&db)
            .await?
    } else {
        sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(expense_id)
            .bind(current_user.id)
            .execute(&db)
            .await?
    };

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    log::info!("expense {} deleted by {}", expense_id, current_user.name);
    Ok(Redirect::to("/history"))
}

struct ReceiptData {
    filename: String,
    data: axum::body::Bytes,
}

async fn parse_expense_multipart(
    mut multipart: Multipart,
) -> Result<(ExpenseDraft, Option<ReceiptData>), AppError> {
    let mut draft = ExpenseDraft::default();
    let mut receipt_data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::validation("Invalid form submission"))?
    {
        let name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        if name == "receipt" {
            let filename = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::validation("Invalid form submission"))?;
            if data.len() > MAX_RECEIPT_BYTES {
                return Err(AppError::validation(
                    "File size too large. Please select an image under 5MB.",
                ));
            }
            if let Some(filename) = filename {
                if !data.is_empty() {
                    receipt_data = Some(ReceiptData { filename, data });
                }
            }
        } else {
            let text_value = String::from_utf8(
                field
                    .bytes()
                    .await
                    .map_err(|_| AppError::validation("Invalid form submission"))?
                    .to_vec(),
            )
            .map_err(|_| AppError::validation("Invalid form submission"))?;

            // Several sub-sections share a field name (purpose, locations,
            // stay_location); an empty duplicate from a hidden section must
            // not clobber the value the user typed.
            if text_value.is_empty() {
                continue;
            }

            match name.as_str() {
                "amount" => draft.amount = text_value,
                "category" => draft.category = text_value,
                "date" => draft.date = text_value,
                "description" => draft.description = text_value,
                "project" => draft.project = text_value,
                "doc_number" => draft.doc_number = text_value,
                "note" => draft.note = text_value,
                "travel_mode" => draft.travel_mode = text_value,
                "from_location" => draft.from_location = text_value,
                "to_location" => draft.to_location = text_value,
                "approx_km" => draft.approx_km = text_value,
                "car_type" => draft.car_type = text_value,
                "purpose" => draft.purpose = text_value,
                "stay_location" => draft.stay_location = text_value,
                "stay_from" => draft.stay_from = text_value,
                "stay_to" => draft.stay_to = text_value,
                "client_name" => draft.client_name = text_value,
                "person_count" => draft.person_count = text_value,
                "person_list" => draft.person_list = text_value,
                "hotel_name" => draft.hotel_name = text_value,
                "advance_recipient" => draft.advance_recipient = text_value,
                "is_breakfast" => draft.is_breakfast = true,
                "is_lunch" => draft.is_lunch = true,
                "is_dinner" => draft.is_dinner = true,
                _ => (),
            }
        }
    }
    Ok((draft, receipt_data))
}

async fn save_receipt(receipt_data: Option<ReceiptData>) -> Result<Option<String>, AppError> {
    if let Some(receipt) = receipt_data {
        let receipts_dir = PathBuf::from("static/receipts");
        if !receipts_dir.exists() {
            fs::create_dir_all(&receipts_dir).await?;
        }
        let extension = PathBuf::from(&receipt.filename)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ["png", "jpg", "jpeg"].contains(&extension.as_str()) {
            let new_file_name = format!("{}.{}", Uuid::new_v4(), extension);
            let file_path = receipts_dir.join(&new_file_name);
            fs::write(&file_path, &receipt.data).await?;
            return Ok(Some(format!("/static/receipts/{}", new_file_name)));
        }
    }
    Ok(None)
}
