use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Date, Int8, Nullable, Numeric, Text, Timestamptz};
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use super::{EntryKind, CATEGORIES, TRANSACTIONS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Patch, Statement};
use crate::core::shared::schema::transactions;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};

/// Largest magnitude a `NUMERIC(12,2)` amount can hold.
const MAX_AMOUNT: f64 = 9_999_999_999.99;

#[derive(Debug, Clone, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = transactions)]
pub struct TransactionRecord {
    pub id: i64,
    pub description: String,
    pub amount: BigDecimal,
    pub kind: String,
    pub category_id: Option<i64>,
    pub date: NaiveDate,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transactions)]
struct NewTransaction {
    description: String,
    amount: BigDecimal,
    kind: String,
    category_id: Option<i64>,
    date: NaiveDate,
    user_id: String,
}

/// Transaction row joined with its category name.
#[derive(Debug, Clone, QueryableByName)]
pub struct TransactionRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub description: String,
    #[diesel(sql_type = Numeric)]
    pub amount: BigDecimal,
    #[diesel(sql_type = Text)]
    pub kind: String,
    #[diesel(sql_type = Nullable<Int8>)]
    pub category_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub category_name: Option<String>,
    #[diesel(sql_type = Date)]
    pub date: NaiveDate,
    #[diesel(sql_type = Text)]
    pub user_id: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub date: NaiveDate,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = ApiError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            description: row.description,
            amount: row.amount.to_f64().unwrap_or_default(),
            kind: EntryKind::parse(&row.kind)?,
            category_id: row.category_id,
            category_name: row.category_name,
            date: row.date,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTransactionRequest {
    pub description: Option<String>,
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<EntryKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    pub date: Option<NaiveDate>,
}

/// Converts a JSON amount into a two-decimal value that fits the column.
pub fn parse_amount(value: f64) -> Result<BigDecimal, ApiError> {
    if !value.is_finite() || value.abs() > MAX_AMOUNT {
        return Err(ApiError::invalid("amount is out of range"));
    }
    let amount = BigDecimal::from_str(&value.to_string())
        .map_err(|_| ApiError::invalid("amount is not a number"))?
        .round(2);
    if amount.is_zero() {
        return Err(ApiError::invalid("amount must not be zero"));
    }
    Ok(amount)
}

fn joined_select(user_id: &str, transaction_id: Option<i64>) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let mut sql = format!(
        "SELECT transactions.*, c.name AS category_name FROM transactions \
         LEFT JOIN budget_categories c ON c.id = transactions.category_id \
         WHERE {}",
        TRANSACTIONS.predicate(&user),
    );
    match transaction_id {
        Some(id) => {
            let id = stmt.bind(id);
            sql.push_str(&format!(" AND transactions.id = {id}"));
        }
        None => sql.push_str(
            " ORDER BY transactions.date DESC, transactions.created_at DESC, transactions.id DESC",
        ),
    }
    stmt.push(&sql);
    stmt
}

fn ensure_category(
    conn: &mut PgConnection,
    user_id: &str,
    category_id: Option<i64>,
) -> Result<(), ApiError> {
    match category_id {
        Some(id) if !repo::owns(conn, &CATEGORIES, user_id, id)? => {
            Err(ApiError::not_found("category"))
        }
        _ => Ok(()),
    }
}

fn fetch_transaction(
    conn: &mut PgConnection,
    user_id: &str,
    transaction_id: i64,
) -> Result<Transaction, ApiError> {
    joined_select(user_id, Some(transaction_id))
        .fetch_optional::<TransactionRow>(conn)?
        .ok_or_else(|| ApiError::not_found("transaction"))
        .and_then(Transaction::try_from)
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let rows = with_conn(&state.conn, move |conn| {
        Ok(joined_select(&user.user_id, None).load::<TransactionRow>(conn)?)
    })
    .await?;

    rows.into_iter()
        .map(Transaction::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let new_transaction = NewTransaction {
        description: require_text("description", &req.description)?,
        amount: parse_amount(req.amount)?,
        kind: req.kind.as_str().to_string(),
        category_id: req.category_id,
        date: req.date,
        user_id: user.user_id.clone(),
    };

    let transaction = with_conn(&state.conn, move |conn| {
        ensure_category(conn, &user.user_id, new_transaction.category_id)?;
        let record: TransactionRecord = diesel::insert_into(transactions::table)
            .values(&new_transaction)
            .returning(TransactionRecord::as_returning())
            .get_result(conn)?;
        fetch_transaction(conn, &user.user_id, record.id)
    })
    .await?;

    info!(
        "Created transaction: {} {} ({})",
        transaction.kind.as_str(),
        transaction.amount,
        transaction.id
    );
    Ok(Json(transaction))
}

pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(transaction_id): Path<i64>,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let new_category = req.category_id.flatten();
    let patch = Patch::new(TRANSACTIONS)
        .set("description", require_text_opt("description", req.description)?)
        .set("amount", req.amount.map(parse_amount).transpose()?)
        .set("kind", req.kind.map(EntryKind::as_str))
        .set("category_id", req.category_id)
        .set("date", req.date);

    let transaction = with_conn(&state.conn, move |conn| {
        ensure_category(conn, &user.user_id, new_category)?;
        let record = patch
            .execute::<TransactionRecord>(conn, transaction_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("transaction"))?;
        fetch_transaction(conn, &user.user_id, record.id)
    })
    .await?;

    info!("Updated transaction: {}", transaction.id);
    Ok(Json(transaction))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(transaction_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &TRANSACTIONS, &user.user_id, transaction_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("transaction"))
        }
    })
    .await?;

    info!("Deleted transaction: {transaction_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::SqlValue;

    #[test]
    fn test_parse_amount_rounds_to_cents() {
        assert_eq!(parse_amount(12.346).unwrap().to_string(), "12.35");
        assert_eq!(parse_amount(-40.0).unwrap(), BigDecimal::from(-40));
    }

    #[test]
    fn test_parse_amount_rejects_bad_values() {
        assert!(parse_amount(0.0).is_err());
        assert!(parse_amount(0.001).is_err());
        assert!(parse_amount(f64::NAN).is_err());
        assert!(parse_amount(f64::INFINITY).is_err());
        assert!(parse_amount(1e12).is_err());
    }

    #[test]
    fn test_joined_select_scopes_and_orders() {
        let stmt = joined_select("u", None);
        assert!(stmt.sql().contains("WHERE transactions.user_id = $1 ORDER BY transactions.date DESC"));

        let stmt = joined_select("u", Some(8));
        assert!(stmt.sql().ends_with("AND transactions.id = $2"));
        assert_eq!(stmt.binds()[1], SqlValue::BigInt(8));
    }

    #[test]
    fn test_null_category_clears() {
        let req: UpdateTransactionRequest =
            serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        let stmt = Patch::new(TRANSACTIONS)
            .set("category_id", req.category_id)
            .into_statement(1, "u")
            .unwrap();
        assert_eq!(stmt.binds()[0], SqlValue::NullableBigInt(None));
    }
}
