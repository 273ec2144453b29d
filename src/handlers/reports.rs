use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    database::Database,
    error::AppError,
    middleware::get_current_user,
    models::{Category, Expense},
};

use super::fetch_scoped_expenses;

/// Fixed export schema: one row per claim, every category sub-field in a
/// dedicated column so the sheet needs no post-processing.
const CSV_HEADERS: [&str; 23] = [
    "Date",
    "User Name",
    "Project",
    "Doc Number",
    "Category",
    "Amount",
    "Description",
    "Travel Mode",
    "From",
    "To",
    "KM",
    "Car Type",
    "Stay Location",
    "Purpose/Detail",
    "Client Name",
    "No Persons",
    "Person List",
    "Hotel Name",
    "Recipient",
    "Breakfast",
    "Lunch",
    "Dinner",
    "Notes",
];

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    search: String,
    #[serde(default)]
    category: String,
}

/// Admin-only download of the currently filtered history as CSV.
pub async fn export_csv(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;
    if !current_user.is_admin {
        return Err(AppError::Forbidden);
    }

    let expenses = fetch_scoped_expenses(&db, &current_user).await?;
    let category_filter = Category::from_str(query.category.trim());
    let search = query.search.trim();

    let filtered: Vec<&Expense> = expenses
        .iter()
        .filter(|e| e.matches_search(search))
        .filter(|e| category_filter.map_or(true, |c| e.category() == c))
        .collect();

    let csv = build_csv(&filtered);
    let filename = format!(
        "Allowance_Full_Report_{}.csv",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    log::info!(
        "{} exported {} rows to {}",
        current_user.name,
        filtered.len(),
        filename
    );

    let headers = [
        (
            header::CONTENT_TYPE,
            "text/csv; charset=utf-8".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, csv).into_response())
}

fn csv_escape(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn csv_row(expense: &Expense) -> String {
    let details = &expense.details;
    [
        expense.date.format("%Y-%m-%d").to_string(),
        csv_escape(&expense.user_name),
        csv_escape(&expense.project),
        csv_escape(&expense.doc_number),
        expense.category().as_str().to_string(),
        format!("{:.2}", expense.amount),
        csv_escape(&expense.description),
        details.travel_mode().unwrap_or("").to_string(),
        csv_escape(details.from_location().unwrap_or("")),
        csv_escape(details.to_location().unwrap_or("")),
        details
            .approx_km()
            .map(|km| km.to_string())
            .unwrap_or_default(),
        details.car_type().unwrap_or("").to_string(),
        csv_escape(details.stay_location().unwrap_or("")),
        csv_escape(details.purpose().unwrap_or("")),
        csv_escape(details.client_name().unwrap_or("")),
        details
            .person_count()
            .map(|n| n.to_string())
            .unwrap_or_default(),
        csv_escape(details.person_list().unwrap_or("")),
        csv_escape(details.hotel_name().unwrap_or("")),
        csv_escape(details.advance_recipient().unwrap_or("")),
        yes_no(details.is_breakfast()).to_string(),
        yes_no(details.is_lunch()).to_string(),
        yes_no(details.is_dinner()).to_string(),
        csv_escape(expense.note.as_deref().unwrap_or("")),
    ]
    .join(",")
}

/// Header line plus one line per expense, in list order.
pub fn build_csv(expenses: &[&Expense]) -> String {
    let mut lines = Vec::with_capacity(expenses.len() + 1);
    lines.push(CSV_HEADERS.join(","));
    lines.extend(expenses.iter().map(|e| csv_row(e)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryDetails, ExpenseDraft, ExpenseStatus, TravelMode};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn expense(amount: &str, details: CategoryDetails, note: Option<&str>) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Alice \"Ace\" Doe".to_string(),
            amount: amount.parse().unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 7, 3).unwrap(),
            description: "Taxi airport run".to_string(),
            project: "Phoenix".to_string(),
            doc_number: "D-77".to_string(),
            receipt_url: None,
            note: note.map(str::to_string),
            status: ExpenseStatus::Pending,
            details,
        }
    }

    fn travel() -> CategoryDetails {
        CategoryDetails::Travel {
            travel_mode: TravelMode::Car,
            from_location: "Office".to_string(),
            to_location: "Airport".to_string(),
            approx_km: Decimal::from(15),
        }
    }

    #[test]
    fn header_plus_one_line_per_expense() {
        let a = expense("100.5", travel(), None);
        let b = expense(
            "20",
            CategoryDetails::FoodAllowance {
                breakfast: false,
                lunch: true,
                dinner: false,
            },
            Some("client visit"),
        );
        let csv = build_csv(&[&a, &b]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(',').count(), 23);
        assert!(lines[0].starts_with("Date,User Name,Project"));
    }

    #[test]
    fn amounts_round_trip_at_two_decimals() {
        let a = expense("100.5", travel(), None);
        let csv = build_csv(&[&a]);
        let row = csv.lines().nth(1).unwrap();
        let amount_col: &str = row.split(',').nth(5).unwrap();
        assert_eq!(amount_col, "100.50");
        assert_eq!(amount_col.parse::<f64>().unwrap(), 100.5);
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let a = expense("10", travel(), None);
        let csv = build_csv(&[&a]);
        assert!(csv.contains("\"Alice \"\"Ace\"\" Doe\""));
    }

    #[test]
    fn meal_flags_render_yes_no() {
        let lunch_only = expense(
            "20",
            CategoryDetails::FoodAllowance {
                breakfast: false,
                lunch: true,
                dinner: false,
            },
            None,
        );
        let csv = build_csv(&[&lunch_only]);
        let row = csv.lines().nth(1).unwrap();
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(&cols[19..22], &["No", "Yes", "No"]);
    }

    #[test]
    fn subfields_land_in_their_columns() {
        let draft = ExpenseDraft {
            amount: "75".to_string(),
            category: "Advance Payment".to_string(),
            date: "2026-07-09".to_string(),
            description: "site advance".to_string(),
            project: "Atlas".to_string(),
            doc_number: "D-9".to_string(),
            advance_recipient: "Site Team".to_string(),
            purpose: "Materials".to_string(),
            ..ExpenseDraft::default()
        };
        let new = draft.validate().unwrap();
        let e = expense("75", new.details, None);
        let csv = build_csv(&[&e]);
        let row = csv.lines().nth(1).unwrap();
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols[13], "\"Materials\"");
        assert_eq!(cols[18], "\"Site Team\"");
        // Travel columns stay empty for a non-travel claim.
        assert_eq!(cols[7], "");
        assert_eq!(cols[10], "");
    }
}
