use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{SHOPPING_ITEMS, SHOPPING_LISTS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert, Patch, Statement};
use crate::core::shared::schema::shopping_items;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = shopping_items)]
pub struct ShoppingItem {
    pub id: i64,
    pub name: String,
    pub is_checked: bool,
    pub list_id: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub list_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub is_checked: Option<bool>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAddRequest {
    pub items: Vec<String>,
}

/// Trimmed, non-blank names in request order.
pub fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Appends `names` under one list in a single statement, numbering positions
/// after the current maximum in request order.
fn bulk_insert(list_id: i64, user_id: &str, names: Vec<String>) -> Statement {
    let mut stmt = Statement::new();
    let list = stmt.bind(list_id);
    let user = stmt.bind(user_id);
    let names = stmt.bind(names);
    let sql = format!(
        "INSERT INTO shopping_items (name, list_id, position) \
         SELECT n.name, {list}, (base.max_position + n.ord)::int \
         FROM unnest({names}::text[]) WITH ORDINALITY AS n(name, ord), \
         (SELECT COALESCE(MAX(position), 0) AS max_position FROM shopping_items \
         WHERE shopping_items.list_id = {list}) AS base \
         WHERE {owned} \
         RETURNING shopping_items.*",
        owned = SHOPPING_LISTS.exists_clause(&list, &user),
    );
    stmt.push(&sql);
    stmt
}

fn uncheck_statement(list_id: i64, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let list = stmt.bind(list_id);
    let user = stmt.bind(user_id);
    let sql = format!(
        "UPDATE shopping_items SET is_checked = FALSE, updated_at = NOW() \
         WHERE shopping_items.list_id = {list} AND shopping_items.is_checked AND {pred}",
        pred = SHOPPING_ITEMS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<ShoppingItem>, ApiError> {
    let insert = ChildInsert::new("shopping_items", "list_id", SHOPPING_LISTS)
        .value("name", require_text("name", &req.name)?)
        .at_end();

    let item = with_conn(&state.conn, move |conn| {
        insert
            .execute::<ShoppingItem>(conn, req.list_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("shopping list"))
    })
    .await?;

    info!("Created shopping item: {} ({})", item.name, item.id);
    Ok(Json(item))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ShoppingItem>, ApiError> {
    let patch = Patch::new(SHOPPING_ITEMS)
        .set("name", require_text_opt("name", req.name)?)
        .set("is_checked", req.is_checked)
        .set("position", req.position);

    let item = with_conn(&state.conn, move |conn| {
        patch
            .execute::<ShoppingItem>(conn, item_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("shopping item"))
    })
    .await?;

    info!("Updated shopping item: {} ({})", item.name, item.id);
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &SHOPPING_ITEMS, &user.user_id, item_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("shopping item"))
        }
    })
    .await?;

    info!("Deleted shopping item: {item_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn bulk_add_items(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
    Json(req): Json<BulkAddRequest>,
) -> Result<Json<Vec<ShoppingItem>>, ApiError> {
    let names = clean_names(req.items);
    if names.is_empty() {
        return Err(ApiError::invalid("items must contain at least one name"));
    }

    let mut items = with_conn(&state.conn, move |conn| {
        let items = bulk_insert(list_id, &user.user_id, names).load::<ShoppingItem>(conn)?;
        if items.is_empty() {
            return Err(ApiError::not_found("shopping list"));
        }
        Ok(items)
    })
    .await?;
    items.sort_by_key(|item| item.position);

    info!("Added {} item(s) to shopping list {}", items.len(), list_id);
    Ok(Json(items))
}

pub async fn uncheck_all(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = with_conn(&state.conn, move |conn| {
        if !repo::owns(conn, &SHOPPING_LISTS, &user.user_id, list_id)? {
            return Err(ApiError::not_found("shopping list"));
        }
        Ok(uncheck_statement(list_id, &user.user_id).execute(conn)?)
    })
    .await?;

    info!("Unchecked {updated} item(s) on shopping list {list_id}");
    Ok(Json(serde_json::json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::SqlValue;

    #[test]
    fn test_clean_names_drops_blanks_and_keeps_order() {
        let names = clean_names(vec![
            " Milk ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "Bread".to_string(),
        ]);
        assert_eq!(names, vec!["Milk", "Bread"]);
    }

    #[test]
    fn test_bulk_insert_is_one_scoped_statement() {
        let stmt = bulk_insert(4, "u", vec!["Milk".into(), "Bread".into()]);
        assert!(stmt.sql().starts_with("INSERT INTO shopping_items (name, list_id, position)"));
        assert!(stmt.sql().contains("unnest($3::text[]) WITH ORDINALITY"));
        assert!(stmt.sql().contains(
            "WHERE EXISTS (SELECT 1 FROM shopping_lists WHERE shopping_lists.id = $1 AND shopping_lists.user_id = $2)"
        ));
        assert_eq!(
            stmt.binds()[2],
            SqlValue::TextArray(vec!["Milk".into(), "Bread".into()])
        );
    }

    #[test]
    fn test_uncheck_only_touches_checked_items() {
        let stmt = uncheck_statement(4, "u");
        assert!(stmt.sql().contains("shopping_items.is_checked AND shopping_items.list_id IN"));
    }

    #[test]
    fn test_item_update_is_scoped_through_list() {
        let stmt = Patch::new(SHOPPING_ITEMS)
            .set("is_checked", Some(true))
            .into_statement(9, "u")
            .unwrap();
        assert!(stmt.sql().ends_with(
            "shopping_items.list_id IN (SELECT shopping_lists.id FROM shopping_lists \
             WHERE shopping_lists.user_id = $3) RETURNING shopping_items.*"
        ));
    }
}
