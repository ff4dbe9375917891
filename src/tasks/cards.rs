use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Array, Int4, Int8, Nullable, Text, Timestamptz};
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{CARDS, LISTS};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, ChildInsert, Nest, Patch, Statement};
use crate::core::shared::schema::{card_members, cards};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = cards)]
pub struct CardRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub position: i32,
    pub list_id: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = card_members)]
pub struct CardMember {
    pub id: i64,
    pub card_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    #[serde(flatten)]
    pub card: CardRecord,
    pub members: Vec<CardMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCardRequest {
    pub title: String,
    pub description: Option<String>,
    pub list_id: i64,
    pub due_date: Option<DateTime<Utc>>,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub list_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Debug, QueryableByName)]
pub struct CardRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub description: String,
    #[diesel(sql_type = Int4)]
    pub position: i32,
    #[diesel(sql_type = Int8)]
    pub list_id: i64,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub due_date: Option<DateTime<Utc>>,
    #[diesel(sql_type = Array<Text>)]
    pub labels: Vec<String>,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub member_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub member_user_id: Option<String>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub member_created_at: Option<DateTime<Utc>>,
}

impl CardRow {
    fn card(&self) -> CardRecord {
        CardRecord {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            position: self.position,
            list_id: self.list_id,
            due_date: self.due_date,
            labels: self.labels.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn member(&self) -> Option<CardMember> {
        Some(CardMember {
            id: self.member_id?,
            card_id: self.id,
            user_id: self.member_user_id.clone()?,
            created_at: self.member_created_at?,
        })
    }
}

pub fn assemble_cards(rows: &[CardRow]) -> Vec<Card> {
    let mut nest = Nest::new();
    for row in rows {
        let slot = nest.parent(row.id, || row.card());
        if let Some(member) = row.member() {
            nest.child(slot, member.id, || member);
        }
    }
    nest.finish()
        .into_iter()
        .map(|(card, members)| Card { card, members })
        .collect()
}

/// Which cards a joined card read returns.
#[derive(Debug, Clone, Copy)]
pub enum CardFilter {
    ById(i64),
    DueBetween(DateTime<Utc>, DateTime<Utc>),
}

fn cards_with_members(user_id: &str, filter: CardFilter) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let (condition, order) = match filter {
        CardFilter::ById(id) => (format!("cards.id = {}", stmt.bind(id)), "cards.id ASC"),
        CardFilter::DueBetween(from, to) => (
            format!(
                "cards.due_date >= {} AND cards.due_date < {}",
                stmt.bind(from),
                stmt.bind(to)
            ),
            "cards.due_date ASC, cards.id ASC",
        ),
    };
    let sql = format!(
        "SELECT cards.*, m.id AS member_id, m.user_id AS member_user_id, \
         m.created_at AS member_created_at \
         FROM cards \
         LEFT JOIN card_members m ON m.card_id = cards.id \
         WHERE {condition} AND {pred} \
         ORDER BY {order}, m.created_at ASC, m.id ASC",
        pred = CARDS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

/// Half-open UTC day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    (start, start + Duration::days(1))
}

fn load_card(conn: &mut PgConnection, user_id: &str, card_id: i64) -> Result<Card, ApiError> {
    let rows = cards_with_members(user_id, CardFilter::ById(card_id)).load::<CardRow>(conn)?;
    assemble_cards(&rows)
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("card"))
}

fn ensure_card(conn: &mut PgConnection, user_id: &str, card_id: i64) -> Result<(), ApiError> {
    if repo::owns(conn, &CARDS, user_id, card_id)? {
        Ok(())
    } else {
        Err(ApiError::not_found("card"))
    }
}

pub async fn create_card(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCardRequest>,
) -> Result<Json<Card>, ApiError> {
    let insert = ChildInsert::new("cards", "list_id", LISTS)
        .value("title", require_text("title", &req.title)?)
        .value("description", req.description.unwrap_or_default())
        .value("due_date", req.due_date)
        .value("labels", req.labels.unwrap_or_default())
        .at_end();

    let card = with_conn(&state.conn, move |conn| {
        insert
            .execute::<CardRecord>(conn, req.list_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("list"))
    })
    .await?;

    info!("Created card: {} ({}) in list {}", card.title, card.id, card.list_id);
    Ok(Json(Card {
        card,
        members: Vec::new(),
    }))
}

pub async fn cards_due_today(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Card>>, ApiError> {
    let (start, end) = day_bounds(Utc::now());

    let rows = with_conn(&state.conn, move |conn| {
        Ok(cards_with_members(&user.user_id, CardFilter::DueBetween(start, end))
            .load::<CardRow>(conn)?)
    })
    .await?;

    Ok(Json(assemble_cards(&rows)))
}

pub async fn get_card(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
) -> Result<Json<Card>, ApiError> {
    with_conn(&state.conn, move |conn| load_card(conn, &user.user_id, card_id))
        .await
        .map(Json)
}

pub async fn update_card(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<Json<Card>, ApiError> {
    let target_list = req.list_id;
    let patch = Patch::new(CARDS)
        .set("title", require_text_opt("title", req.title)?)
        .set("description", req.description)
        .set("position", req.position)
        .set("list_id", req.list_id)
        .set("due_date", req.due_date)
        .set("labels", req.labels);

    let card = with_conn(&state.conn, move |conn| {
        if let Some(list_id) = target_list {
            if !repo::owns(conn, &LISTS, &user.user_id, list_id)? {
                return Err(ApiError::not_found("list"));
            }
        }
        patch
            .execute::<CardRecord>(conn, card_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("card"))?;
        load_card(conn, &user.user_id, card_id)
    })
    .await?;

    info!("Updated card: {} ({})", card.card.title, card.card.id);
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &CARDS, &user.user_id, card_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("card"))
        }
    })
    .await?;

    info!("Deleted card: {card_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Adds a member to a card; adding the same user again returns the existing row.
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(card_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<CardMember>, ApiError> {
    let member_id = require_text("user_id", &req.user_id)?;

    let member = with_conn(&state.conn, move |conn| {
        ensure_card(conn, &user.user_id, card_id)?;
        diesel::insert_into(card_members::table)
            .values((
                card_members::card_id.eq(card_id),
                card_members::user_id.eq(&member_id),
            ))
            .on_conflict((card_members::card_id, card_members::user_id))
            .do_nothing()
            .execute(conn)?;

        Ok(card_members::table
            .filter(card_members::card_id.eq(card_id))
            .filter(card_members::user_id.eq(&member_id))
            .select(CardMember::as_select())
            .first(conn)?)
    })
    .await?;

    info!("Added member {} to card {}", member.user_id, member.card_id);
    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((card_id, member_id)): Path<(i64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = with_conn(&state.conn, move |conn| {
        ensure_card(conn, &user.user_id, card_id)?;
        Ok(diesel::delete(
            card_members::table
                .filter(card_members::card_id.eq(card_id))
                .filter(card_members::user_id.eq(member_id)),
        )
        .execute(conn)?)
    })
    .await?;

    if removed > 0 {
        info!("Removed member from card {card_id}");
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
