use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cards::Card;
use super::{BOARDS, LISTS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert, Patch};
use crate::core::shared::schema::lists;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = lists)]
pub struct ListRecord {
    pub id: i64,
    pub title: String,
    pub position: i32,
    pub board_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    #[serde(flatten)]
    pub list: ListRecord,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListRequest {
    pub title: String,
    pub board_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListRequest {
    pub title: Option<String>,
    pub position: Option<i32>,
}

pub async fn create_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateListRequest>,
) -> Result<Json<List>, ApiError> {
    let insert = ChildInsert::new("lists", "board_id", BOARDS)
        .value("title", require_text("title", &req.title)?)
        .at_end();

    let list = with_conn(&state.conn, move |conn| {
        insert
            .execute::<ListRecord>(conn, req.board_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("board"))
    })
    .await?;

    info!("Created list: {} ({}) on board {}", list.title, list.id, list.board_id);
    Ok(Json(List {
        list,
        cards: Vec::new(),
    }))
}

pub async fn update_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
    Json(req): Json<UpdateListRequest>,
) -> Result<Json<ListRecord>, ApiError> {
    let patch = Patch::new(LISTS)
        .set("title", require_text_opt("title", req.title)?)
        .set("position", req.position);

    let list = with_conn(&state.conn, move |conn| {
        patch
            .execute::<ListRecord>(conn, list_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("list"))
    })
    .await?;

    info!("Updated list: {} ({})", list.title, list.id);
    Ok(Json(list))
}

pub async fn delete_list(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(list_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &LISTS, &user.user_id, list_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("list"))
        }
    })
    .await?;

    info!("Deleted list: {list_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
