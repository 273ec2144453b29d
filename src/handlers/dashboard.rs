use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::Html,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    llm::InsightsClient,
    middleware::{get_current_user, CurrentUser},
    models::{stats, Expense},
};

use super::{fetch_scoped_expenses, fetch_users};

#[derive(Deserialize)]
pub struct DashboardQuery {
    month: Option<String>,
    user: Option<String>,
    project: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    current_user: CurrentUser,
    month: String,
    month_label: String,
    prev_href: String,
    next_href: String,
    projects: Vec<SelectOption>,
    selected_project: String,
    users: Vec<SelectOption>,
    selected_user: String,
    selected_user_name: String,
    clear_filter_href: String,
    total_spent: String,
    record_count: usize,
    stat_label: String,
    stat_value: String,
    category_bars: Vec<CategoryBar>,
    breakdown: Vec<BreakdownRow>,
    show_breakdown: bool,
    insight: String,
    has_insight: bool,
    can_generate: bool,
}

struct SelectOption {
    value: String,
    label: String,
    selected: bool,
}

struct CategoryBar {
    name: &'static str,
    amount: String,
    // Bar width relative to the largest category, 0-100.
    width: u32,
}

struct BreakdownRow {
    href: String,
    name: String,
    count: usize,
    total: String,
    share: String,
}

pub async fn dashboard(
    cookies: Cookies,
    State(db): State<Database>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let template = build_dashboard(&db, current_user, &query, None).await?;
    Ok(Html(template.render()?))
}

/// Explicit insight generation for the current filter selection. Any
/// change to the selection routes through the plain GET handler, which
/// renders without insight text.
pub async fn generate_insights(
    cookies: Cookies,
    State(db): State<Database>,
    Form(query): Form<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let current_user = get_current_user(&cookies, &db)
        .await
        .ok_or(AppError::Unauthenticated)?;

    let scoped = fetch_scoped_expenses(&db, &current_user).await?;
    let selection = resolve_selection(&current_user, &query);
    let snapshot: Vec<Expense> = stats::filter_expenses(&scoped, &selection.as_filter())
        .into_iter()
        .cloned()
        .collect();

    let insight = if snapshot.is_empty() {
        "No data available to analyze for this selection.".to_string()
    } else {
        match InsightsClient::from_env() {
            Some(client) => {
                // ureq blocks on the round trip; keep it off the async workers.
                tokio::task::spawn_blocking(move || client.generate(&snapshot))
                    .await
                    .unwrap_or_else(|_| crate::llm::INSIGHTS_FALLBACK.to_string())
            }
            None => "Insights are not configured. Set INSIGHTS_API_KEY to enable them.".to_string(),
        }
    };

    let template = build_dashboard(&db, current_user, &query, Some(insight)).await?;
    Ok(Html(template.render()?))
}

struct Selection {
    month: String,
    user: Option<Uuid>,
    project: Option<String>,
}

impl Selection {
    fn as_filter(&self) -> stats::DashboardFilter<'_> {
        stats::DashboardFilter {
            month: &self.month,
            user: self.user,
            project: self.project.as_deref(),
        }
    }
}

fn resolve_selection(current_user: &CurrentUser, query: &DashboardQuery) -> Selection {
    let month = query
        .month
        .as_deref()
        .filter(|m| stats::valid_month(m))
        .map(str::to_string)
        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m").to_string());

    // The user filter is an admin-only refinement; non-admins are already
    // scoped to their own claims by the fetch.
    let user = if current_user.is_admin {
        query.user.as_deref().and_then(|u| Uuid::parse_str(u).ok())
    } else {
        None
    };

    let project = query
        .project
        .as_deref()
        .filter(|p| !p.is_empty() && *p != "all")
        .map(str::to_string);

    Selection {
        month,
        user,
        project,
    }
}

fn dashboard_href(month: &str, user: Option<Uuid>, project: Option<&str>) -> String {
    let mut href = format!("/dashboard?month={}", month);
    if let Some(user) = user {
        href.push_str(&format!("&user={}", user));
    }
    if let Some(project) = project {
        href.push_str(&format!("&project={}", urlencoding::encode(project)));
    }
    href
}

async fn build_dashboard(
    db: &Database,
    current_user: CurrentUser,
    query: &DashboardQuery,
    insight: Option<String>,
) -> Result<DashboardTemplate, AppError> {
    let scoped = fetch_scoped_expenses(db, &current_user).await?;
    let users = if current_user.is_admin {
        fetch_users(db).await?
    } else {
        Vec::new()
    };

    let selection = resolve_selection(&current_user, query);
    let filtered = stats::filter_expenses(&scoped, &selection.as_filter());

    let total = stats::total_spent(&filtered);
    let category_totals = stats::by_category(&filtered);
    let max_category = category_totals
        .first()
        .map(|t| t.total)
        .unwrap_or(Decimal::ZERO);

    let category_bars = category_totals
        .iter()
        .map(|t| CategoryBar {
            name: t.category.as_str(),
            amount: format!("{:.2}", t.total),
            width: bar_width(t.total, max_category),
        })
        .collect();

    let show_breakdown = current_user.is_admin && selection.user.is_none();
    let breakdown = if show_breakdown {
        stats::per_user_breakdown(&scoped, &selection.month)
            .into_iter()
            .map(|row| BreakdownRow {
                href: dashboard_href(&selection.month, Some(row.id), selection.project.as_deref()),
                name: row.name,
                count: row.count,
                total: format!("{:.2}", row.total),
                share: share_of(row.total, total),
            })
            .collect()
    } else {
        Vec::new()
    };

    let (stat_label, stat_value) = if current_user.is_admin && selection.user.is_none() {
        (
            "Team Members".to_string(),
            stats::distinct_users(&filtered).to_string(),
        )
    } else {
        (
            "Categories".to_string(),
            category_totals.len().to_string(),
        )
    };

    let selected_user_name = selection
        .user
        .and_then(|id| users.iter().find(|u| u.id == id))
        .map(|u| u.name.clone())
        .unwrap_or_else(|| "All Users".to_string());

    let projects = stats::distinct_projects(&scoped)
        .into_iter()
        .map(|name| SelectOption {
            selected: selection.project.as_deref() == Some(name.as_str()),
            value: name.clone(),
            label: name,
        })
        .collect();

    let user_options = users
        .iter()
        .map(|u| SelectOption {
            value: u.id.to_string(),
            label: u.name.clone(),
            selected: selection.user == Some(u.id),
        })
        .collect();

    let can_generate = !filtered.is_empty();
    let record_count = filtered.len();

    Ok(DashboardTemplate {
        month_label: stats::month_label(&selection.month),
        prev_href: dashboard_href(
            &stats::shift_month(&selection.month, -1),
            selection.user,
            selection.project.as_deref(),
        ),
        next_href: dashboard_href(
            &stats::shift_month(&selection.month, 1),
            selection.user,
            selection.project.as_deref(),
        ),
        clear_filter_href: dashboard_href(&selection.month, None, selection.project.as_deref()),
        projects,
        selected_project: selection.project.clone().unwrap_or_default(),
        users: user_options,
        selected_user: selection
            .user
            .map(|u| u.to_string())
            .unwrap_or_default(),
        selected_user_name,
        total_spent: format!("{:.2}", total),
        record_count,
        stat_label,
        stat_value,
        category_bars,
        breakdown,
        show_breakdown,
        has_insight: insight.is_some(),
        insight: insight.unwrap_or_default(),
        can_generate,
        month: selection.month,
        current_user,
    })
}

fn bar_width(value: Decimal, max: Decimal) -> u32 {
    if max <= Decimal::ZERO {
        return 0;
    }
    let ratio = value * Decimal::from(100) / max;
    ratio.round().to_u32().unwrap_or(100).min(100)
}

fn share_of(value: Decimal, total: Decimal) -> String {
    if total <= Decimal::ZERO {
        return "0%".to_string();
    }
    format!("{:.1}%", value * Decimal::from(100) / total)
}
