use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Date, Int8, Nullable, Text, Timestamptz};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Hop, Nest, OwnershipPath, Patch, Statement};
use crate::core::shared::schema::{habit_entries, habits};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};
use crate::core::urls::ApiUrls;

pub const HABITS: OwnershipPath = OwnershipPath::direct("habits");
pub const HABIT_ENTRIES: OwnershipPath = OwnershipPath::via(
    "habit_entries",
    &[Hop { column: "habit_id", parent: "habits" }],
);

/// Days of history returned with each habit, today included.
pub const HISTORY_DAYS: i64 = 30;

const DEFAULT_COLOR: &str = "#007AFF";
const DEFAULT_ICON: &str = "zap";
const DEFAULT_FREQUENCY: &str = "daily";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = habits)]
pub struct HabitRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub frequency: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = habit_entries)]
pub struct HabitEntry {
    pub id: i64,
    pub habit_id: i64,
    pub completed_at: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = habits)]
struct NewHabit {
    name: String,
    description: Option<String>,
    color: String,
    icon: String,
    frequency: String,
    user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    #[serde(flatten)]
    pub habit: HabitRecord,
    pub entries: Vec<HabitEntry>,
}

#[derive(Debug, QueryableByName)]
pub struct HabitRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub description: Option<String>,
    #[diesel(sql_type = Text)]
    pub color: String,
    #[diesel(sql_type = Text)]
    pub icon: String,
    #[diesel(sql_type = Text)]
    pub frequency: String,
    #[diesel(sql_type = Text)]
    pub user_id: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub entry_id: Option<i64>,
    #[diesel(sql_type = Nullable<Date>)]
    pub entry_completed_at: Option<NaiveDate>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub entry_created_at: Option<DateTime<Utc>>,
}

impl HabitRow {
    fn habit(&self) -> HabitRecord {
        HabitRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
            frequency: self.frequency.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn entry(&self) -> Option<(i64, HabitEntry)> {
        match (self.entry_id, self.entry_completed_at, self.entry_created_at) {
            (Some(id), Some(completed_at), Some(created_at)) => Some((
                id,
                HabitEntry {
                    id,
                    habit_id: self.id,
                    completed_at,
                    created_at,
                },
            )),
            _ => None,
        }
    }
}

pub fn assemble_habits(rows: &[HabitRow]) -> Vec<Habit> {
    let mut nest = Nest::new();
    for row in rows {
        let slot = nest.parent(row.id, || row.habit());
        if let Some((entry_id, entry)) = row.entry() {
            nest.child(slot, entry_id, || entry);
        }
    }
    nest.finish()
        .into_iter()
        .map(|(habit, entries)| Habit { habit, entries })
        .collect()
}

fn habits_with_history(user_id: &str, since: NaiveDate) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let since = stmt.bind(since);
    let sql = format!(
        "SELECT habits.*, e.id AS entry_id, e.completed_at AS entry_completed_at, \
         e.created_at AS entry_created_at \
         FROM habits \
         LEFT JOIN habit_entries e ON e.habit_id = habits.id AND e.completed_at >= {since} \
         WHERE {pred} \
         ORDER BY habits.created_at DESC, habits.id DESC, e.completed_at ASC",
        pred = HABITS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

fn track_statement(habit_id: i64, date: NaiveDate, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let habit = stmt.bind(habit_id);
    let date = stmt.bind(date);
    let user = stmt.bind(user_id);
    let sql = format!(
        "INSERT INTO habit_entries (habit_id, completed_at) \
         SELECT {habit}, {date} WHERE {owned} \
         ON CONFLICT (habit_id, completed_at) DO NOTHING \
         RETURNING habit_entries.*",
        owned = HABITS.exists_clause(&habit, &user),
    );
    stmt.push(&sql);
    stmt
}

fn entry_for_date(habit_id: i64, date: NaiveDate, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let habit = stmt.bind(habit_id);
    let date = stmt.bind(date);
    let user = stmt.bind(user_id);
    let sql = format!(
        "SELECT habit_entries.* FROM habit_entries \
         WHERE habit_entries.habit_id = {habit} AND habit_entries.completed_at = {date} AND {pred}",
        pred = HABIT_ENTRIES.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

fn untrack_statement(habit_id: i64, date: NaiveDate, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let habit = stmt.bind(habit_id);
    let date = stmt.bind(date);
    let user = stmt.bind(user_id);
    let sql = format!(
        "DELETE FROM habit_entries \
         WHERE habit_entries.habit_id = {habit} AND habit_entries.completed_at = {date} AND {pred}",
        pred = HABIT_ENTRIES.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHabitRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackHabitRequest {
    pub habit_id: i64,
    pub date: NaiveDate,
}

pub async fn list_habits(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Habit>>, ApiError> {
    let since = Utc::now().date_naive() - Duration::days(HISTORY_DAYS - 1);

    let rows = with_conn(&state.conn, move |conn| {
        Ok(habits_with_history(&user.user_id, since).load::<HabitRow>(conn)?)
    })
    .await?;

    Ok(Json(assemble_habits(&rows)))
}

pub async fn create_habit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateHabitRequest>,
) -> Result<Json<Habit>, ApiError> {
    let new_habit = NewHabit {
        name: require_text("name", &req.name)?,
        description: req.description,
        color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        icon: req.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        frequency: DEFAULT_FREQUENCY.to_string(),
        user_id: user.user_id,
    };

    let habit = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(habits::table)
            .values(&new_habit)
            .returning(HabitRecord::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created habit: {} ({})", habit.name, habit.id);
    Ok(Json(Habit {
        habit,
        entries: Vec::new(),
    }))
}

pub async fn update_habit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(habit_id): Path<i64>,
    Json(req): Json<UpdateHabitRequest>,
) -> Result<Json<HabitRecord>, ApiError> {
    let patch = Patch::new(HABITS)
        .set("name", require_text_opt("name", req.name)?)
        .set("description", req.description)
        .set("color", req.color)
        .set("icon", req.icon);

    let habit = with_conn(&state.conn, move |conn| {
        patch
            .execute::<HabitRecord>(conn, habit_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("habit"))
    })
    .await?;

    info!("Updated habit: {} ({})", habit.name, habit.id);
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(habit_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &HABITS, &user.user_id, habit_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("habit"))
        }
    })
    .await?;

    info!("Deleted habit: {habit_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Marks the habit done on `date`; tracking twice returns the existing entry.
pub async fn track_habit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<TrackHabitRequest>,
) -> Result<Json<HabitEntry>, ApiError> {
    let entry = with_conn(&state.conn, move |conn| {
        let inserted = track_statement(req.habit_id, req.date, &user.user_id)
            .fetch_optional::<HabitEntry>(conn)?;
        if let Some(entry) = inserted {
            return Ok(entry);
        }
        entry_for_date(req.habit_id, req.date, &user.user_id)
            .fetch_optional::<HabitEntry>(conn)?
            .ok_or_else(|| ApiError::not_found("habit"))
    })
    .await?;

    info!("Tracked habit {} on {}", entry.habit_id, entry.completed_at);
    Ok(Json(entry))
}

pub async fn untrack_habit(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<TrackHabitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if !repo::owns(conn, &HABITS, &user.user_id, req.habit_id)? {
            return Err(ApiError::not_found("habit"));
        }
        let removed = untrack_statement(req.habit_id, req.date, &user.user_id).execute(conn)?;
        if removed > 0 {
            info!("Untracked habit {} on {}", req.habit_id, req.date);
        }
        Ok(())
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn configure_habits_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::HABITS, get(list_habits).post(create_habit))
        .route(ApiUrls::HABIT_BY_ID, put(update_habit).delete(delete_habit))
        .route(ApiUrls::HABITS_TRACK, post(track_habit))
        .route(ApiUrls::HABITS_UNTRACK, post(untrack_habit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: i64, entry: Option<(i64, u32)>) -> HabitRow {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        HabitRow {
            id,
            name: format!("habit-{id}"),
            description: None,
            color: DEFAULT_COLOR.to_string(),
            icon: DEFAULT_ICON.to_string(),
            frequency: DEFAULT_FREQUENCY.to_string(),
            user_id: "u".to_string(),
            created_at: at,
            updated_at: at,
            entry_id: entry.map(|(id, _)| id),
            entry_completed_at: entry.and_then(|(_, day)| NaiveDate::from_ymd_opt(2024, 5, day)),
            entry_created_at: entry.map(|_| at),
        }
    }

    #[test]
    fn test_assemble_habits_groups_entries() {
        let rows = vec![
            row(2, Some((20, 1))),
            row(2, Some((21, 2))),
            row(1, None),
        ];
        let habits = assemble_habits(&rows);
        assert_eq!(habits.len(), 2);
        assert_eq!(habits[0].habit.id, 2);
        assert_eq!(habits[0].entries.len(), 2);
        assert_eq!(habits[0].entries[1].completed_at, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(habits[1].habit.id, 1);
        assert!(habits[1].entries.is_empty());
    }

    #[test]
    fn test_habit_serializes_flat_with_entries() {
        let habits = assemble_habits(&[row(1, None)]);
        let json = serde_json::to_value(&habits[0]).unwrap();
        assert_eq!(json["name"], "habit-1");
        assert_eq!(json["icon"], "zap");
        assert_eq!(json["entries"], serde_json::json!([]));
    }

    #[test]
    fn test_track_is_conflict_tolerant_and_scoped() {
        let stmt = track_statement(3, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), "u");
        assert!(stmt.sql().contains("ON CONFLICT (habit_id, completed_at) DO NOTHING"));
        assert!(stmt
            .sql()
            .contains("WHERE EXISTS (SELECT 1 FROM habits WHERE habits.id = $1 AND habits.user_id = $3)"));
    }

    #[test]
    fn test_untrack_is_scoped_through_habit() {
        let stmt = untrack_statement(3, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), "u");
        assert!(stmt.sql().ends_with(
            "habit_entries.habit_id IN (SELECT habits.id FROM habits WHERE habits.user_id = $3)"
        ));
    }

    #[test]
    fn test_history_window_binds_since() {
        let since = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let stmt = habits_with_history("u", since);
        assert!(stmt.sql().contains("e.completed_at >= $2"));
        assert_eq!(stmt.binds()[1], crate::core::repo::SqlValue::Date(since));
    }
}
