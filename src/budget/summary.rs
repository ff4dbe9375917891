use axum::{extract::State, Json};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{Datelike, Months, NaiveDate, Utc};
use diesel::sql_types::Numeric;
use diesel::QueryableByName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{EntryKind, TRANSACTIONS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::Statement;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_balance: f64,
    pub current_month_income: f64,
    pub current_month_expenses: f64,
}

/// Sign-insensitive sums per kind, as returned by [`summary_query`].
#[derive(Debug, Default, QueryableByName)]
struct Totals {
    #[diesel(sql_type = Numeric)]
    income: BigDecimal,
    #[diesel(sql_type = Numeric)]
    expenses: BigDecimal,
    #[diesel(sql_type = Numeric)]
    month_income: BigDecimal,
    #[diesel(sql_type = Numeric)]
    month_expenses: BigDecimal,
}

fn to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

impl From<Totals> for BudgetSummary {
    fn from(totals: Totals) -> Self {
        Self {
            total_income: to_f64(&totals.income),
            total_expenses: to_f64(&totals.expenses),
            net_balance: to_f64(&(&totals.income - &totals.expenses)),
            current_month_income: to_f64(&totals.month_income),
            current_month_expenses: to_f64(&totals.month_expenses),
        }
    }
}

/// First day of the month containing `today`, and of the month after it.
pub fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
    (start, end)
}

/// One-row aggregate of the caller's transactions, all-time and for the month
/// containing `today`.
fn summary_query(user_id: &str, today: NaiveDate) -> Statement {
    let (month_start, month_end) = month_bounds(today);
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let start = stmt.bind(month_start);
    let end = stmt.bind(month_end);

    let sum = |kind: EntryKind, this_month: bool| {
        let month = if this_month {
            format!(" AND transactions.date >= {start} AND transactions.date < {end}")
        } else {
            String::new()
        };
        format!(
            "COALESCE(SUM(ABS(transactions.amount)) FILTER (WHERE transactions.kind = '{}'{month}), 0)",
            kind.as_str()
        )
    };
    let sql = format!(
        "SELECT {} AS income, {} AS expenses, {} AS month_income, {} AS month_expenses \
         FROM transactions WHERE {}",
        sum(EntryKind::Income, false),
        sum(EntryKind::Expense, false),
        sum(EntryKind::Income, true),
        sum(EntryKind::Expense, true),
        TRANSACTIONS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<BudgetSummary>, ApiError> {
    let query = summary_query(&user.user_id, Utc::now().date_naive());
    let totals = with_conn(&state.conn, move |conn| {
        Ok(query.fetch_optional::<Totals>(conn)?.unwrap_or_default())
    })
    .await?;

    Ok(Json(totals.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::SqlValue;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_summary_arithmetic() {
        let summary = BudgetSummary::from(Totals {
            income: BigDecimal::from(150),
            expenses: BigDecimal::from(40),
            month_income: BigDecimal::from(100),
            month_expenses: BigDecimal::from(40),
        });
        assert_eq!(
            summary,
            BudgetSummary {
                total_income: 150.0,
                total_expenses: 40.0,
                net_balance: 110.0,
                current_month_income: 100.0,
                current_month_expenses: 40.0,
            }
        );
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let summary = BudgetSummary::from(Totals::default());
        assert_eq!(summary.total_income, 0.0);
        assert_eq!(summary.net_balance, 0.0);
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(day(2024, 6, 15)), (day(2024, 6, 1), day(2024, 7, 1)));
        assert_eq!(month_bounds(day(2024, 12, 31)), (day(2024, 12, 1), day(2025, 1, 1)));
        assert_eq!(month_bounds(day(2024, 2, 1)), (day(2024, 2, 1), day(2024, 3, 1)));
    }

    #[test]
    fn test_summary_is_one_aggregate_over_own_rows() {
        let stmt = summary_query("u", day(2024, 6, 15));
        assert!(stmt.sql().starts_with(
            "SELECT COALESCE(SUM(ABS(transactions.amount)) FILTER (WHERE transactions.kind = 'income'), 0) AS income"
        ));
        assert!(stmt.sql().contains(
            "FILTER (WHERE transactions.kind = 'expense' AND transactions.date >= $2 AND transactions.date < $3), 0) AS month_expenses"
        ));
        assert!(stmt.sql().ends_with("FROM transactions WHERE transactions.user_id = $1"));
        assert!(!stmt.sql().contains("GROUP BY"));
        assert_eq!(
            stmt.binds(),
            &[
                SqlValue::Text("u".into()),
                SqlValue::Date(day(2024, 6, 1)),
                SqlValue::Date(day(2024, 7, 1)),
            ]
        );
    }
}
