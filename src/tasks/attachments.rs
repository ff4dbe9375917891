use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ATTACHMENTS, CARDS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert};
use crate::core::shared::schema::attachments;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = attachments)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub card_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttachmentRequest {
    pub name: String,
    pub url: String,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub card_id: i64,
}

pub async fn list_attachments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    let attachments = with_conn(&state.conn, move |conn| {
        if !repo::owns(conn, &CARDS, &user.user_id, card_id)? {
            return Err(ApiError::not_found("card"));
        }
        Ok(repo::list_owned_where::<Attachment>(
            conn,
            &ATTACHMENTS,
            &user.user_id,
            "card_id",
            card_id,
            "attachments.created_at DESC, attachments.id DESC",
        )?)
    })
    .await?;

    Ok(Json(attachments))
}

pub async fn create_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAttachmentRequest>,
) -> Result<Json<Attachment>, ApiError> {
    if matches!(req.size_bytes, Some(size) if size < 0) {
        return Err(ApiError::invalid("size_bytes must not be negative"));
    }
    let insert = ChildInsert::new("attachments", "card_id", CARDS)
        .value("name", require_text("name", &req.name)?)
        .value("url", require_text("url", &req.url)?)
        .value("size_bytes", req.size_bytes)
        .value("mime_type", req.mime_type);

    let attachment = with_conn(&state.conn, move |conn| {
        insert
            .execute::<Attachment>(conn, req.card_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("card"))
    })
    .await?;

    info!("Created attachment: {} ({}) on card {}", attachment.name, attachment.id, attachment.card_id);
    Ok(Json(attachment))
}

pub async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(attachment_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &ATTACHMENTS, &user.user_id, attachment_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("attachment"))
        }
    })
    .await?;

    info!("Deleted attachment: {attachment_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
