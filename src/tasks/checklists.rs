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

use super::{CARDS, CHECKLISTS, CHECKLIST_ITEMS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert, Nest, Patch, Statement};
use crate::core::shared::schema::{checklist_items, checklists};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = checklists)]
pub struct ChecklistRecord {
    pub id: i64,
    pub title: String,
    pub card_id: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = checklist_items)]
pub struct ChecklistItem {
    pub id: i64,
    pub title: String,
    pub checklist_id: i64,
    pub completed: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(flatten)]
    pub checklist: ChecklistRecord,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, QueryableByName)]
pub struct ChecklistRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Int8)]
    pub card_id: i64,
    #[diesel(sql_type = Int4)]
    pub position: i32,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub item_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub item_title: Option<String>,
    #[diesel(sql_type = Nullable<Bool>)]
    pub item_completed: Option<bool>,
    #[diesel(sql_type = Nullable<Int4>)]
    pub item_position: Option<i32>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub item_created_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub item_updated_at: Option<DateTime<Utc>>,
}

impl ChecklistRow {
    fn checklist(&self) -> ChecklistRecord {
        ChecklistRecord {
            id: self.id,
            title: self.title.clone(),
            card_id: self.card_id,
            position: self.position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn item(&self) -> Option<ChecklistItem> {
        Some(ChecklistItem {
            id: self.item_id?,
            title: self.item_title.clone()?,
            checklist_id: self.id,
            completed: self.item_completed?,
            position: self.item_position?,
            created_at: self.item_created_at?,
            updated_at: self.item_updated_at?,
        })
    }
}

pub fn assemble_checklists(rows: &[ChecklistRow]) -> Vec<Checklist> {
    let mut nest = Nest::new();
    for row in rows {
        let slot = nest.parent(row.id, || row.checklist());
        if let Some(item) = row.item() {
            nest.child(slot, item.id, || item);
        }
    }
    nest.finish()
        .into_iter()
        .map(|(checklist, items)| Checklist { checklist, items })
        .collect()
}

fn card_checklists(card_id: i64, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let card = stmt.bind(card_id);
    let sql = format!(
        "SELECT checklists.*, i.id AS item_id, i.title AS item_title, \
         i.completed AS item_completed, i.position AS item_position, \
         i.created_at AS item_created_at, i.updated_at AS item_updated_at \
         FROM checklists \
         LEFT JOIN checklist_items i ON i.checklist_id = checklists.id \
         WHERE checklists.card_id = {card} AND {pred} \
         ORDER BY checklists.position ASC, checklists.id ASC, i.position ASC, i.id ASC",
        pred = CHECKLISTS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChecklistRequest {
    pub title: String,
    pub card_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChecklistRequest {
    pub title: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub checklist_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub position: Option<i32>,
}

pub async fn list_checklists(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
) -> Result<Json<Vec<Checklist>>, ApiError> {
    let rows = with_conn(&state.conn, move |conn| {
        if !repo::owns(conn, &CARDS, &user.user_id, card_id)? {
            return Err(ApiError::not_found("card"));
        }
        Ok(card_checklists(card_id, &user.user_id).load::<ChecklistRow>(conn)?)
    })
    .await?;

    Ok(Json(assemble_checklists(&rows)))
}

pub async fn create_checklist(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateChecklistRequest>,
) -> Result<Json<Checklist>, ApiError> {
    let insert = ChildInsert::new("checklists", "card_id", CARDS)
        .value("title", require_text("title", &req.title)?)
        .at_end();

    let checklist = with_conn(&state.conn, move |conn| {
        insert
            .execute::<ChecklistRecord>(conn, req.card_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("card"))
    })
    .await?;

    info!("Created checklist: {} ({}) on card {}", checklist.title, checklist.id, checklist.card_id);
    Ok(Json(Checklist {
        checklist,
        items: Vec::new(),
    }))
}

pub async fn update_checklist(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(checklist_id): Path<i64>,
    Json(req): Json<UpdateChecklistRequest>,
) -> Result<Json<ChecklistRecord>, ApiError> {
    let patch = Patch::new(CHECKLISTS)
        .set("title", require_text_opt("title", req.title)?)
        .set("position", req.position);

    let checklist = with_conn(&state.conn, move |conn| {
        patch
            .execute::<ChecklistRecord>(conn, checklist_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("checklist"))
    })
    .await?;

    info!("Updated checklist: {} ({})", checklist.title, checklist.id);
    Ok(Json(checklist))
}

pub async fn delete_checklist(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(checklist_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &CHECKLISTS, &user.user_id, checklist_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("checklist"))
        }
    })
    .await?;

    info!("Deleted checklist: {checklist_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateItemRequest>,
) -> Result<Json<ChecklistItem>, ApiError> {
    let insert = ChildInsert::new("checklist_items", "checklist_id", CHECKLISTS)
        .value("title", require_text("title", &req.title)?)
        .at_end();

    let item = with_conn(&state.conn, move |conn| {
        insert
            .execute::<ChecklistItem>(conn, req.checklist_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("checklist"))
    })
    .await?;

    info!("Created checklist item: {} ({})", item.title, item.id);
    Ok(Json(item))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ChecklistItem>, ApiError> {
    let patch = Patch::new(CHECKLIST_ITEMS)
        .set("title", require_text_opt("title", req.title)?)
        .set("completed", req.completed)
        .set("position", req.position);

    let item = with_conn(&state.conn, move |conn| {
        patch
            .execute::<ChecklistItem>(conn, item_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("checklist item"))
    })
    .await?;

    info!("Updated checklist item: {} ({}) completed={}", item.title, item.id, item.completed);
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &CHECKLIST_ITEMS, &user.user_id, item_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("checklist item"))
        }
    })
    .await?;

    info!("Deleted checklist item: {item_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: i64, item: Option<(i64, bool)>) -> ChecklistRow {
        let at = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();
        ChecklistRow {
            id,
            title: format!("checklist-{id}"),
            card_id: 9,
            position: 1,
            created_at: at,
            updated_at: at,
            item_id: item.map(|(id, _)| id),
            item_title: item.map(|(id, _)| format!("item-{id}")),
            item_completed: item.map(|(_, done)| done),
            item_position: item.map(|(id, _)| id as i32),
            item_created_at: item.map(|_| at),
            item_updated_at: item.map(|_| at),
        }
    }

    #[test]
    fn test_assemble_checklists() {
        let rows = vec![row(1, Some((1, true))), row(1, Some((2, false))), row(2, None)];
        let checklists = assemble_checklists(&rows);
        assert_eq!(checklists.len(), 2);
        assert_eq!(checklists[0].items.len(), 2);
        assert!(checklists[0].items[0].completed);
        assert_eq!(checklists[0].items[1].checklist_id, 1);
        assert!(checklists[1].items.is_empty());
    }

    #[test]
    fn test_item_delete_walks_full_chain() {
        let stmt = CHECKLIST_ITEMS.delete_one(4, "u");
        assert!(stmt.sql().contains("checklist_items.checklist_id IN (SELECT checklists.id"));
        assert!(stmt.sql().contains("checklists.card_id IN (SELECT cards.id"));
        assert!(stmt.sql().ends_with("boards.user_id = $2))))"));
    }

    #[test]
    fn test_card_checklists_binds_user_first() {
        let stmt = card_checklists(9, "u");
        assert!(stmt.sql().contains("WHERE checklists.card_id = $2 AND checklists.card_id IN"));
    }
}
