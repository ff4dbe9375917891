//! Calendar Module
//!
//! Per-user events with iCal (RFC 5545) export and import using the icalendar library.

pub mod ical;

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, OwnershipPath, Patch};
use crate::core::shared::schema::events;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};
use crate::core::urls::ApiUrls;

pub const EVENTS: OwnershipPath = OwnershipPath::direct("events");

const EVENT_ORDER: &str = "date ASC, id ASC";

/// Rows per INSERT during import. Four binds per row must stay under the 65,535 bind limit.
pub const IMPORT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
struct NewEvent {
    title: String,
    description: Option<String>,
    date: DateTime<Utc>,
    user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<Event>(conn, &EVENTS, &user.user_id, EVENT_ORDER)?)
    })
    .await?;

    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let new_event = NewEvent {
        title: require_text("title", &req.title)?,
        description: req.description,
        date: req.date,
        user_id: user.user_id,
    };

    let event = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(events::table)
            .values(&new_event)
            .returning(Event::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created event: {} ({})", event.title, event.id);
    Ok(Json(event))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(event_id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    with_conn(&state.conn, move |conn| {
        repo::find_owned::<Event>(conn, &EVENTS, &user.user_id, event_id)?
            .ok_or_else(|| ApiError::not_found("event"))
    })
    .await
    .map(Json)
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(event_id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let patch = Patch::new(EVENTS)
        .set("title", require_text_opt("title", req.title)?)
        .set("description", req.description)
        .set("date", req.date);

    let event = with_conn(&state.conn, move |conn| {
        patch
            .execute::<Event>(conn, event_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("event"))
    })
    .await?;

    info!("Updated event: {} ({})", event.title, event.id);
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(event_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &EVENTS, &user.user_id, event_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("event"))
        }
    })
    .await?;

    info!("Deleted event: {event_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn export_ical(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let events = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<Event>(conn, &EVENTS, &user.user_id, EVENT_ORDER)?)
    })
    .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/calendar; charset=utf-8")],
        ical::export_to_ical(&events, "Lifedash Calendar"),
    ))
}

pub async fn import_ical(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let new_events: Vec<NewEvent> = ical::import_from_ical(&body)
        .into_iter()
        .filter(|e| !e.title.trim().is_empty())
        .map(|e| NewEvent {
            title: e.title,
            description: e.description,
            date: e.date,
            user_id: user.user_id.clone(),
        })
        .collect();

    if new_events.is_empty() {
        return Err(ApiError::invalid("no events found in calendar data"));
    }

    let imported = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            let mut imported = 0;
            for batch in new_events.chunks(IMPORT_BATCH_SIZE) {
                imported += diesel::insert_into(events::table).values(batch).execute(conn)?;
            }
            Ok(imported)
        })
    })
    .await?;

    info!("Imported {} event(s) for {}", imported, user.user_id);
    Ok(Json(serde_json::json!({ "imported": imported })))
}

pub fn configure_calendar_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::CALENDAR_EVENTS, get(list_events).post(create_event))
        .route(
            ApiUrls::CALENDAR_EVENT_BY_ID,
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(ApiUrls::CALENDAR_EXPORT, get(export_ical))
        .route(ApiUrls::CALENDAR_IMPORT, post(import_ical))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_batches_stay_under_bind_limit() {
        let binds_per_event = 4;
        assert!(IMPORT_BATCH_SIZE * binds_per_event < u16::MAX as usize);
        assert_eq!(17_000_usize.div_ceil(IMPORT_BATCH_SIZE), 17);
    }
}
