//! In-memory aggregation over a role-scoped expense list: the dashboard
//! totals, category sums and team breakdown, plus the status-tab counts.
//! Everything here is pure so it can be exercised without a database.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::expense::{Category, Expense, ExpenseStatus};

/// Dashboard selection. The expense list is already role-scoped by the
/// fetch, so only the month token, the admin's user selection and the
/// project selection apply here.
#[derive(Debug, Default)]
pub struct DashboardFilter<'a> {
    pub month: &'a str,
    pub user: Option<Uuid>,
    pub project: Option<&'a str>,
}

fn in_month(expense: &Expense, month: &str) -> bool {
    expense
        .date
        .format("%Y-%m-%d")
        .to_string()
        .starts_with(month)
}

pub fn filter_expenses<'a>(expenses: &'a [Expense], filter: &DashboardFilter) -> Vec<&'a Expense> {
    expenses
        .iter()
        .filter(|e| {
            in_month(e, filter.month)
                && filter.user.map_or(true, |u| e.user_id == u)
                && filter.project.map_or(true, |p| e.project == p)
        })
        .collect()
}

pub fn total_spent(expenses: &[&Expense]) -> Decimal {
    expenses.iter().map(|e| e.amount).sum()
}

#[derive(Debug, PartialEq)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: Decimal,
}

/// Per-category sums over the filtered set, zero-valued categories
/// excluded, largest first.
pub fn by_category(expenses: &[&Expense]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for expense in expenses {
        let category = expense.category();
        match totals.iter_mut().find(|t| t.category == category) {
            Some(entry) => entry.total += expense.amount,
            None => totals.push(CategoryTotal {
                category,
                total: expense.amount,
            }),
        }
    }
    totals.retain(|t| t.total > Decimal::ZERO);
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSpending {
    pub id: Uuid,
    pub name: String,
    pub total: Decimal,
    pub count: usize,
}

/// Admin team breakdown: month-scoped but ignoring the user selection, so
/// the table always shows the whole team. Sorted by total descending.
pub fn per_user_breakdown(expenses: &[Expense], month: &str) -> Vec<UserSpending> {
    let mut rows: Vec<UserSpending> = Vec::new();
    for expense in expenses.iter().filter(|e| in_month(e, month)) {
        match rows.iter_mut().find(|r| r.id == expense.user_id) {
            Some(row) => {
                row.total += expense.amount;
                row.count += 1;
            }
            None => rows.push(UserSpending {
                id: expense.user_id,
                name: expense.user_name.clone(),
                total: expense.amount,
                count: 1,
            }),
        }
    }
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

pub fn distinct_users(expenses: &[&Expense]) -> usize {
    let mut ids: Vec<Uuid> = expenses.iter().map(|e| e.user_id).collect();
    ids.sort();
    ids.dedup();
    ids.len()
}

/// Distinct non-empty project names, sorted, for the filter dropdown.
pub fn distinct_projects(expenses: &[Expense]) -> Vec<String> {
    let mut projects: Vec<String> = expenses
        .iter()
        .map(|e| e.project.clone())
        .filter(|p| !p.is_empty())
        .collect();
    projects.sort();
    projects.dedup();
    projects
}

#[derive(Debug, Default, PartialEq)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

/// Per-tab counts over the role-scoped set, independent of the search box.
pub fn status_counts(expenses: &[Expense]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for expense in expenses {
        match expense.status {
            ExpenseStatus::Pending => counts.pending += 1,
            ExpenseStatus::Approved => counts.approved += 1,
            ExpenseStatus::Rejected => counts.rejected += 1,
        }
    }
    counts
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn parse_month(token: &str) -> Option<(i32, u32)> {
    let (year, month) = token.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Whether a string is a well-formed `YYYY-MM` month token.
pub fn valid_month(token: &str) -> bool {
    parse_month(token).is_some()
}

/// Move a `YYYY-MM` token by `offset` months, crossing year boundaries.
/// An unparseable token is returned unchanged.
pub fn shift_month(token: &str, offset: i32) -> String {
    match parse_month(token) {
        Some((year, month)) => {
            let index = year * 12 + month as i32 - 1 + offset;
            format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
        }
        None => token.to_string(),
    }
}

/// Human label for a `YYYY-MM` token, e.g. "August 2026".
pub fn month_label(token: &str) -> String {
    match parse_month(token) {
        Some((year, month)) => format!("{} {}", MONTH_NAMES[month as usize - 1], year),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::expense::CategoryDetails;
    use chrono::NaiveDate;

    fn expense(
        user: Uuid,
        name: &str,
        amount: &str,
        date: &str,
        project: &str,
        details: CategoryDetails,
        status: ExpenseStatus,
    ) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: user,
            user_name: name.to_string(),
            amount: amount.parse().unwrap(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: "entry".to_string(),
            project: project.to_string(),
            doc_number: "D-1".to_string(),
            receipt_url: None,
            note: None,
            status,
            details,
        }
    }

    fn fixture() -> (Uuid, Uuid, Vec<Expense>) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let expenses = vec![
            expense(
                alice,
                "Alice",
                "100.25",
                "2026-07-03",
                "Phoenix",
                CategoryDetails::Consumables,
                ExpenseStatus::Pending,
            ),
            expense(
                alice,
                "Alice",
                "50.00",
                "2026-07-20",
                "Atlas",
                CategoryDetails::Repair,
                ExpenseStatus::Approved,
            ),
            expense(
                bob,
                "Bob",
                "200.00",
                "2026-07-11",
                "Phoenix",
                CategoryDetails::Consumables,
                ExpenseStatus::Rejected,
            ),
            // Different month, must never leak into July aggregates.
            expense(
                bob,
                "Bob",
                "999.99",
                "2026-06-30",
                "Phoenix",
                CategoryDetails::Other,
                ExpenseStatus::Pending,
            ),
        ];
        (alice, bob, expenses)
    }

    #[test]
    fn total_spent_matches_exact_subset() {
        let (alice, _, expenses) = fixture();

        let all_july = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: None,
                project: None,
            },
        );
        assert_eq!(all_july.len(), 3);
        assert_eq!(total_spent(&all_july).to_string(), "350.25");

        let alice_july = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: Some(alice),
                project: None,
            },
        );
        assert_eq!(total_spent(&alice_july).to_string(), "150.25");

        let phoenix_july = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: None,
                project: Some("Phoenix"),
            },
        );
        assert_eq!(total_spent(&phoenix_july).to_string(), "300.25");

        let alice_atlas = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: Some(alice),
                project: Some("Atlas"),
            },
        );
        assert_eq!(total_spent(&alice_atlas).to_string(), "50.00");
    }

    #[test]
    fn by_category_groups_and_sorts() {
        let (_, _, expenses) = fixture();
        let july = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: None,
                project: None,
            },
        );
        let totals = by_category(&july);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].category, Category::Consumables);
        assert_eq!(totals[0].total.to_string(), "300.25");
        assert_eq!(totals[1].category, Category::Repair);
        // Unused categories are absent rather than zero-valued.
        assert!(!totals.iter().any(|t| t.category == Category::Travel));
    }

    #[test]
    fn breakdown_ignores_user_filter_and_sorts_by_total() {
        let (alice, bob, expenses) = fixture();
        let rows = per_user_breakdown(&expenses, "2026-07");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, bob);
        assert_eq!(rows[0].total.to_string(), "200.00");
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[1].id, alice);
        assert_eq!(rows[1].count, 2);
    }

    #[test]
    fn status_counts_cover_all_tabs() {
        let (_, _, expenses) = fixture();
        let counts = status_counts(&expenses);
        assert_eq!(
            counts,
            StatusCounts {
                pending: 2,
                approved: 1,
                rejected: 1,
            }
        );
    }

    #[test]
    fn distinct_projects_sorted_unique() {
        let (_, _, expenses) = fixture();
        assert_eq!(distinct_projects(&expenses), vec!["Atlas", "Phoenix"]);
    }

    #[test]
    fn distinct_users_in_view() {
        let (_, _, expenses) = fixture();
        let july = filter_expenses(
            &expenses,
            &DashboardFilter {
                month: "2026-07",
                user: None,
                project: None,
            },
        );
        assert_eq!(distinct_users(&july), 2);
    }

    #[test]
    fn shift_month_crosses_year_boundaries() {
        assert_eq!(shift_month("2026-07", 1), "2026-08");
        assert_eq!(shift_month("2026-12", 1), "2027-01");
        assert_eq!(shift_month("2026-01", -1), "2025-12");
        assert_eq!(shift_month("2026-01", -13), "2024-12");
        assert_eq!(shift_month("garbage", 1), "garbage");
    }

    #[test]
    fn month_label_formats() {
        assert_eq!(month_label("2026-08"), "August 2026");
        assert_eq!(month_label("2025-01"), "January 2025");
        assert_eq!(month_label("??"), "??");
    }
}
