use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, OwnershipPath, Patch};
use crate::core::shared::schema::journal_entries;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};
use crate::core::urls::ApiUrls;

pub const JOURNAL_ENTRIES: OwnershipPath = OwnershipPath::direct("journal_entries");

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = journal_entries)]
pub struct JournalEntry {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub date: NaiveDate,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = journal_entries)]
struct NewJournalEntry {
    title: String,
    content: String,
    mood: Option<String>,
    date: NaiveDate,
    user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub mood: Option<Option<String>>,
    pub date: Option<NaiveDate>,
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let entries = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<JournalEntry>(
            conn,
            &JOURNAL_ENTRIES,
            &user.user_id,
            "date DESC, created_at DESC",
        )?)
    })
    .await?;

    Ok(Json(entries))
}

pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateEntryRequest>,
) -> Result<Json<JournalEntry>, ApiError> {
    let new_entry = NewJournalEntry {
        title: require_text("title", &req.title)?,
        content: req.content,
        mood: req.mood.filter(|m| !m.trim().is_empty()),
        date: req.date,
        user_id: user.user_id,
    };

    let entry = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(journal_entries::table)
            .values(&new_entry)
            .returning(JournalEntry::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created journal entry: {} ({})", entry.title, entry.id);
    Ok(Json(entry))
}

pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<Json<JournalEntry>, ApiError> {
    with_conn(&state.conn, move |conn| {
        repo::find_owned::<JournalEntry>(conn, &JOURNAL_ENTRIES, &user.user_id, entry_id)?
            .ok_or_else(|| ApiError::not_found("journal entry"))
    })
    .await
    .map(Json)
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<JournalEntry>, ApiError> {
    let patch = Patch::new(JOURNAL_ENTRIES)
        .set("title", require_text_opt("title", req.title)?)
        .set("content", req.content)
        .set("mood", req.mood)
        .set("date", req.date);

    let entry: JournalEntry = with_conn(&state.conn, move |conn| {
        patch
            .execute(conn, entry_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("journal entry"))
    })
    .await?;

    info!("Updated journal entry: {}", entry.id);
    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &JOURNAL_ENTRIES, &user.user_id, entry_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("journal entry"))
        }
    })
    .await?;

    info!("Deleted journal entry: {entry_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn configure_journal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::JOURNAL_ENTRIES, get(list_entries).post(create_entry))
        .route(
            ApiUrls::JOURNAL_ENTRY_BY_ID,
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}
