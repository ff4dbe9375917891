use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{CARDS, COMMENTS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert, Patch};
use crate::core::shared::schema::comments;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub card_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub card_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = with_conn(&state.conn, move |conn| {
        if !repo::owns(conn, &CARDS, &user.user_id, card_id)? {
            return Err(ApiError::not_found("card"));
        }
        Ok(repo::list_owned_where::<Comment>(
            conn,
            &COMMENTS,
            &user.user_id,
            "card_id",
            card_id,
            "comments.created_at ASC, comments.id ASC",
        )?)
    })
    .await?;

    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let insert = ChildInsert::new("comments", "card_id", CARDS)
        .value("content", require_text("content", &req.content)?)
        .value("user_id", user.user_id.as_str());

    let comment = with_conn(&state.conn, move |conn| {
        insert
            .execute::<Comment>(conn, req.card_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("card"))
    })
    .await?;

    info!("Created comment {} on card {}", comment.id, comment.card_id);
    Ok(Json(comment))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(comment_id): Path<i64>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let patch = Patch::new(COMMENTS).set("content", require_text_opt("content", req.content)?);

    let comment = with_conn(&state.conn, move |conn| {
        patch
            .execute::<Comment>(conn, comment_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("comment"))
    })
    .await?;

    info!("Updated comment: {}", comment.id);
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(comment_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &COMMENTS, &user.user_id, comment_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("comment"))
        }
    })
    .await?;

    info!("Deleted comment: {comment_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_edit_is_scoped_to_board_owner() {
        let stmt = Patch::new(COMMENTS)
            .set("content", Some("Edited"))
            .into_statement(8, "u")
            .unwrap();
        assert!(stmt
            .sql()
            .starts_with("UPDATE comments SET content = $1, updated_at = NOW() WHERE comments.id = $2 AND"));
        assert!(stmt.sql().contains("comments.card_id IN (SELECT cards.id FROM cards"));
        assert!(stmt.sql().ends_with("boards.user_id = $3))) RETURNING comments.*"));
    }

    #[test]
    fn test_comment_listing_filters_by_card() {
        let stmt = COMMENTS.select_all("u", Some(("card_id", 3_i64.into())), "comments.created_at ASC");
        assert!(stmt.sql().contains(" AND comments.card_id = $2 ORDER BY comments.created_at ASC"));
    }
}
