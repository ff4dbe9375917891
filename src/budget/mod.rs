//! Budget Module
//!
//! Income/expense categories, transactions and the derived summary.

pub mod categories;
pub mod summary;
pub mod transactions;

use axum::{
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::ApiError;
use crate::core::repo::OwnershipPath;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub const CATEGORIES: OwnershipPath = OwnershipPath::direct("budget_categories");
pub const TRANSACTIONS: OwnershipPath = OwnershipPath::direct("transactions");

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(ApiError::Internal(format!("unknown budget kind: {other}"))),
        }
    }
}

pub fn configure_budget_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::BUDGET_CATEGORIES,
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            ApiUrls::BUDGET_CATEGORY_BY_ID,
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            ApiUrls::BUDGET_TRANSACTIONS,
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            ApiUrls::BUDGET_TRANSACTION_BY_ID,
            put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route(ApiUrls::BUDGET_SUMMARY, get(summary::get_summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(serde_json::to_value(EntryKind::Income).unwrap(), "income");
        let kind: EntryKind = serde_json::from_str("\"expense\"").unwrap();
        assert_eq!(kind, EntryKind::Expense);
        assert!(serde_json::from_str::<EntryKind>("\"refund\"").is_err());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(EntryKind::parse("income").unwrap(), EntryKind::Income);
        assert!(EntryKind::parse("bogus").is_err());
    }
}
