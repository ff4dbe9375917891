use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{EntryKind, CATEGORIES};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Patch};
use crate::core::shared::schema::budget_categories;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = budget_categories)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = budget_categories)]
struct NewCategory {
    name: String,
    kind: String,
    user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRecord> for Category {
    type Error = ApiError;

    fn try_from(record: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record.name,
            kind: EntryKind::parse(&record.kind)?,
            user_id: record.user_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EntryKind>,
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    let records = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<CategoryRecord>(
            conn,
            &CATEGORIES,
            &user.user_id,
            "name ASC, id ASC",
        )?)
    })
    .await?;

    records
        .into_iter()
        .map(Category::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let new_category = NewCategory {
        name: require_text("name", &req.name)?,
        kind: req.kind.as_str().to_string(),
        user_id: user.user_id,
    };

    let record = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(budget_categories::table)
            .values(&new_category)
            .returning(CategoryRecord::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created budget category: {} ({})", record.name, record.id);
    Category::try_from(record).map(Json)
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(category_id): Path<i64>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let patch = Patch::new(CATEGORIES)
        .set("name", require_text_opt("name", req.name)?)
        .set("kind", req.kind.map(EntryKind::as_str));

    let record = with_conn(&state.conn, move |conn| {
        patch
            .execute::<CategoryRecord>(conn, category_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("category"))
    })
    .await?;

    info!("Updated budget category: {} ({})", record.name, record.id);
    Category::try_from(record).map(Json)
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(category_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &CATEGORIES, &user.user_id, category_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("category"))
        }
    })
    .await?;

    info!("Deleted budget category: {category_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
