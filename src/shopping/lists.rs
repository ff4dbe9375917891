use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Int4, Int8, Nullable, Text, Timestamptz};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::items::ShoppingItem;
use super::SHOPPING_LISTS;
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Nest, Patch, Statement};
use crate::core::shared::schema::shopping_lists;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = shopping_lists)]
pub struct ShoppingList {
    pub id: i64,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shopping_lists)]
struct NewShoppingList {
    title: String,
    user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListWithItems {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub items: Vec<ShoppingItem>,
}

#[derive(Debug, QueryableByName)]
pub struct ListItemRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub user_id: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub item_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub item_name: Option<String>,
    #[diesel(sql_type = Nullable<Bool>)]
    pub item_is_checked: Option<bool>,
    #[diesel(sql_type = Nullable<Int4>)]
    pub item_position: Option<i32>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub item_created_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub item_updated_at: Option<DateTime<Utc>>,
}

impl ListItemRow {
    fn list(&self) -> ShoppingList {
        ShoppingList {
            id: self.id,
            title: self.title.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn item(&self) -> Option<ShoppingItem> {
        Some(ShoppingItem {
            id: self.item_id?,
            name: self.item_name.clone()?,
            is_checked: self.item_is_checked?,
            list_id: self.id,
            position: self.item_position?,
            created_at: self.item_created_at?,
            updated_at: self.item_updated_at?,
        })
    }
}

/// Folds the joined rows of one list; `None` when there are no rows at all.
pub fn assemble_list(rows: &[ListItemRow]) -> Option<ShoppingListWithItems> {
    let mut nest = Nest::new();
    for row in rows {
        let slot = nest.parent(row.id, || row.list());
        if let Some(item) = row.item() {
            nest.child(slot, item.id, || item);
        }
    }
    nest.finish()
        .into_iter()
        .next()
        .map(|(list, items)| ShoppingListWithItems { list, items })
}

fn list_with_items(list_id: i64, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let id = stmt.bind(list_id);
    let user = stmt.bind(user_id);
    let sql = format!(
        "SELECT shopping_lists.*, i.id AS item_id, i.name AS item_name, \
         i.is_checked AS item_is_checked, i.position AS item_position, \
         i.created_at AS item_created_at, i.updated_at AS item_updated_at \
         FROM shopping_lists \
         LEFT JOIN shopping_items i ON i.list_id = shopping_lists.id \
         WHERE shopping_lists.id = {id} AND {pred} \
         ORDER BY i.position ASC, i.id ASC",
        pred = SHOPPING_LISTS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListRequest {
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListRequest {
    pub title: Option<String>,
}

pub async fn list_lists(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ShoppingList>>, ApiError> {
    let lists = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<ShoppingList>(
            conn,
            &SHOPPING_LISTS,
            &user.user_id,
            "updated_at DESC, id DESC",
        )?)
    })
    .await?;

    Ok(Json(lists))
}

pub async fn create_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateListRequest>,
) -> Result<Json<ShoppingListWithItems>, ApiError> {
    let new_list = NewShoppingList {
        title: require_text("title", &req.title)?,
        user_id: user.user_id,
    };

    let list = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(shopping_lists::table)
            .values(&new_list)
            .returning(ShoppingList::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created shopping list: {} ({})", list.title, list.id);
    Ok(Json(ShoppingListWithItems {
        list,
        items: Vec::new(),
    }))
}

pub async fn get_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
) -> Result<Json<ShoppingListWithItems>, ApiError> {
    let rows = with_conn(&state.conn, move |conn| {
        Ok(list_with_items(list_id, &user.user_id).load::<ListItemRow>(conn)?)
    })
    .await?;

    assemble_list(&rows)
        .ok_or_else(|| ApiError::not_found("shopping list"))
        .map(Json)
}

pub async fn update_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
    Json(req): Json<UpdateListRequest>,
) -> Result<Json<ShoppingList>, ApiError> {
    let patch = Patch::new(SHOPPING_LISTS).set("title", require_text_opt("title", req.title)?);

    let list = with_conn(&state.conn, move |conn| {
        patch
            .execute::<ShoppingList>(conn, list_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("shopping list"))
    })
    .await?;

    info!("Updated shopping list: {} ({})", list.title, list.id);
    Ok(Json(list))
}

pub async fn delete_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &SHOPPING_LISTS, &user.user_id, list_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("shopping list"))
        }
    })
    .await?;

    info!("Deleted shopping list: {list_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(item: Option<(i64, &str, i32)>) -> ListItemRow {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ListItemRow {
            id: 7,
            title: "Groceries".to_string(),
            user_id: "u".to_string(),
            created_at: at,
            updated_at: at,
            item_id: item.map(|(id, _, _)| id),
            item_name: item.map(|(_, name, _)| name.to_string()),
            item_is_checked: item.map(|_| false),
            item_position: item.map(|(_, _, pos)| pos),
            item_created_at: item.map(|_| at),
            item_updated_at: item.map(|_| at),
        }
    }

    #[test]
    fn test_assemble_list_keeps_item_order() {
        let rows = vec![row(Some((1, "Milk", 1))), row(Some((2, "Eggs", 2)))];
        let list = assemble_list(&rows).unwrap();
        assert_eq!(list.list.id, 7);
        let names: Vec<_> = list.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Eggs"]);
        assert!(list.items.iter().all(|i| i.list_id == 7));
    }

    #[test]
    fn test_empty_list_is_not_missing() {
        let list = assemble_list(&[row(None)]).unwrap();
        assert!(list.items.is_empty());
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["items"], serde_json::json!([]));
        assert_eq!(json["title"], "Groceries");
    }

    #[test]
    fn test_no_rows_is_missing() {
        assert!(assemble_list(&[]).is_none());
    }

    #[test]
    fn test_joined_read_is_scoped() {
        let stmt = list_with_items(7, "u");
        assert!(stmt
            .sql()
            .contains("WHERE shopping_lists.id = $1 AND shopping_lists.user_id = $2"));
    }
}
