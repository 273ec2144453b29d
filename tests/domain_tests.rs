//! End-to-end checks of the domain layer: the category validator table,
//! the dashboard aggregates and the row/record mapping, exercised through
//! the crate's public API.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use allowancepro::error::AppError;
use allowancepro::models::{
    stats, Category, CategoryDetails, Expense, ExpenseDraft, ExpenseRow, ExpenseStatus,
};

fn base_draft(category: &str) -> ExpenseDraft {
    ExpenseDraft {
        amount: "100.00".to_string(),
        category: category.to_string(),
        date: "2026-07-10".to_string(),
        description: "entry".to_string(),
        project: "Phoenix".to_string(),
        doc_number: "D-1".to_string(),
        ..ExpenseDraft::default()
    }
}

/// Every category rejects a draft that satisfies only the common fields
/// unless the category requires nothing beyond them.
#[test]
fn validator_table_matches_category_requirements() {
    let needs_more = [
        "Travel",
        "Accommodation",
        "Daily Allowance",
        "Food Allowance",
        "Warehouse Operation",
        "Advance Payment",
        "Client Engagement",
        "Ticket Booking",
    ];
    for category in needs_more {
        let draft = base_draft(category);
        assert!(
            matches!(draft.validate(), Err(AppError::Validation(_))),
            "{} should demand its sub-fields",
            category
        );
    }

    // Car Maintenance is satisfied by the form's default radio selection.
    let mut draft = base_draft("Car Maintenance");
    draft.car_type = "Own Car".to_string();
    assert!(draft.validate().is_ok());

    for category in ["Bike Maintenance", "Repair", "Consumables", "Other"] {
        assert!(
            base_draft(category).validate().is_ok(),
            "{} needs only the common fields",
            category
        );
    }
}

#[test]
fn ticket_booking_accepts_both_locations() {
    let mut draft = base_draft("Ticket Booking");
    draft.from_location = "Pune".to_string();
    assert!(draft.validate().is_err());
    draft.to_location = "Delhi".to_string();

    let new = draft.validate().unwrap();
    assert_eq!(new.details.category(), Category::TicketBooking);
    // Ticket bookings carry no travel mode or distance.
    assert_eq!(new.details.travel_mode(), None);
    assert_eq!(new.details.approx_km(), None);
}

fn stored_expense(new: allowancepro::models::NewExpense, user: Uuid, name: &str) -> Expense {
    let details = &new.details;
    ExpenseRow {
        id: Uuid::new_v4(),
        user_id: user,
        user_name: name.to_string(),
        amount: new.amount,
        category: details.category().as_str().to_string(),
        date: new.date,
        description: new.description.clone(),
        project: new.project.clone(),
        doc_number: new.doc_number.clone(),
        receipt_url: None,
        note: new.note.clone(),
        status: Some("Pending".to_string()),
        travel_mode: details.travel_mode().map(str::to_string),
        from_location: details.from_location().map(str::to_string),
        to_location: details.to_location().map(str::to_string),
        approx_km: details.approx_km(),
        car_type: details.car_type().map(str::to_string),
        purpose: details.purpose().map(str::to_string),
        stay_location: details.stay_location().map(str::to_string),
        stay_from: details.stay_from(),
        stay_to: details.stay_to(),
        client_name: details.client_name().map(str::to_string),
        person_count: details.person_count(),
        person_list: details.person_list().map(str::to_string),
        hotel_name: details.hotel_name().map(str::to_string),
        advance_recipient: details.advance_recipient().map(str::to_string),
        is_breakfast: details.is_breakfast(),
        is_lunch: details.is_lunch(),
        is_dinner: details.is_dinner(),
        created_at: Utc::now(),
    }
    .into_expense()
}

/// Draft -> validated record -> flat row -> domain record keeps the
/// category payload intact.
#[test]
fn wire_round_trip_preserves_details() {
    let mut draft = base_draft("Travel");
    draft.travel_mode = "Flight".to_string();
    draft.from_location = "BOM".to_string();
    draft.to_location = "DEL".to_string();
    draft.approx_km = "1400".to_string();
    let new = draft.validate().unwrap();
    let expected = new.details.clone();

    let stored = stored_expense(new, Uuid::new_v4(), "Alice");
    assert_eq!(stored.details, expected);
    assert_eq!(stored.status, ExpenseStatus::Pending);
    assert_eq!(stored.category(), Category::Travel);
}

#[test]
fn aggregates_over_mixed_fixture() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut expenses = Vec::new();
    for (user, name, amount, date, project) in [
        (alice, "Alice", "120.00", "2026-07-01", "Phoenix"),
        (alice, "Alice", "80.00", "2026-07-15", "Atlas"),
        (bob, "Bob", "300.00", "2026-07-20", "Phoenix"),
        (bob, "Bob", "45.00", "2026-08-02", "Phoenix"),
    ] {
        let mut draft = base_draft("Other");
        draft.amount = amount.to_string();
        draft.date = date.to_string();
        draft.project = project.to_string();
        let new = draft.validate().unwrap();
        expenses.push(stored_expense(new, user, name));
    }

    let filter = stats::DashboardFilter {
        month: "2026-07",
        user: None,
        project: Some("Phoenix"),
    };
    let filtered = stats::filter_expenses(&expenses, &filter);
    assert_eq!(filtered.len(), 2);
    assert_eq!(stats::total_spent(&filtered).to_string(), "420.00");

    let breakdown = stats::per_user_breakdown(&expenses, "2026-07");
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0].name, "Bob");
    assert_eq!(breakdown[0].total.to_string(), "300.00");
    assert_eq!(breakdown[1].total.to_string(), "200.00");

    // The August record is outside the month scope entirely.
    assert!(!stats::filter_expenses(
        &expenses,
        &stats::DashboardFilter {
            month: "2026-07",
            user: None,
            project: None,
        }
    )
    .iter()
    .any(|e| e.date == NaiveDate::from_ymd_opt(2026, 8, 2).unwrap()));
}

#[test]
fn stale_subfields_do_not_survive_persistence() {
    // Type travel fields, then submit as Daily Allowance: the stored row
    // carries only the purpose.
    let mut draft = base_draft("Travel");
    draft.from_location = "A".to_string();
    draft.to_location = "B".to_string();
    draft.approx_km = "10".to_string();
    draft.category = "Daily Allowance".to_string();
    draft.purpose = "Field visit".to_string();

    let new = draft.validate().unwrap();
    let stored = stored_expense(new, Uuid::new_v4(), "Alice");
    assert_eq!(stored.details.purpose(), Some("Field visit"));
    assert_eq!(stored.details.from_location(), None);
    assert_eq!(stored.details.to_location(), None);
}

#[test]
fn category_details_expose_only_their_fields() {
    let details = CategoryDetails::AdvancePayment {
        advance_recipient: "Site Team".to_string(),
        purpose: "Materials".to_string(),
    };
    assert_eq!(details.advance_recipient(), Some("Site Team"));
    assert_eq!(details.purpose(), Some("Materials"));
    assert_eq!(details.client_name(), None);
    assert_eq!(details.stay_location(), None);
    assert!(!details.is_breakfast());
}
