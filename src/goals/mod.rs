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
use crate::core::repo::{self, OwnershipPath, Patch, SqlValue};
use crate::core::shared::schema::goals;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{double_option, require_text, require_text_opt, with_conn};
use crate::core::urls::ApiUrls;

pub const GOALS: OwnershipPath = OwnershipPath::direct("goals");

const COMPLETE_AT_STORED_TARGET: &str =
    "CASE WHEN $? >= target_value THEN 'completed' ELSE status END";
const COMPLETE_AT_NEW_TARGET: &str = "CASE WHEN $? >= $? THEN 'completed' ELSE status END";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = goals)]
pub struct GoalRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub target_date: NaiveDate,
    pub status: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = goals)]
struct NewGoal {
    title: String,
    description: Option<String>,
    target_value: f64,
    current_value: f64,
    unit: String,
    target_date: NaiveDate,
    status: String,
    user_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
}

impl GoalStatus {
    fn from_str(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "paused" => Self::Paused,
            _ => Self::Active,
        }
    }

    fn to_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
        }
    }

    /// Status a goal should start in given its initial progress.
    pub fn initial(current_value: f64, target_value: f64) -> Self {
        if current_value >= target_value {
            Self::Completed
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub target_date: NaiveDate,
    pub status: GoalStatus,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
}

fn record_to_goal(record: GoalRecord) -> Goal {
    Goal {
        id: record.id,
        title: record.title,
        description: record.description,
        target_value: record.target_value,
        current_value: record.current_value,
        unit: record.unit,
        target_date: record.target_date,
        status: GoalStatus::from_str(&record.status),
        user_id: record.user_id,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn validate_target(value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ApiError::invalid("target_value must be a positive number"));
    }
    Ok(value)
}

fn validate_current(value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::invalid("current_value must be a non-negative number"));
    }
    Ok(value)
}

/// Builds the sparse update for a goal.
///
/// A supplied `current_value` completes the goal in the same statement once it
/// reaches the target, unless the request sets `status` explicitly.
pub fn goal_patch(req: UpdateGoalRequest) -> Result<Patch, ApiError> {
    let target_value = req.target_value.map(validate_target).transpose()?;
    let current_value = req.current_value.map(validate_current).transpose()?;

    let mut patch = Patch::new(GOALS)
        .set("title", require_text_opt("title", req.title)?)
        .set("description", req.description)
        .set("target_value", target_value)
        .set("current_value", current_value)
        .set("unit", req.unit)
        .set("target_date", req.target_date)
        .set("status", req.status.map(GoalStatus::to_str));

    if let (Some(current), None) = (current_value, req.status) {
        patch = match target_value {
            Some(target) => patch.set_expr(
                "status",
                COMPLETE_AT_NEW_TARGET,
                vec![SqlValue::Float(current), SqlValue::Float(target)],
            ),
            None => patch.set_expr(
                "status",
                COMPLETE_AT_STORED_TARGET,
                vec![SqlValue::Float(current)],
            ),
        };
    }
    Ok(patch)
}

pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Goal>>, ApiError> {
    let records = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<GoalRecord>(
            conn,
            &GOALS,
            &user.user_id,
            "target_date ASC, created_at DESC",
        )?)
    })
    .await?;

    Ok(Json(records.into_iter().map(record_to_goal).collect()))
}

pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateGoalRequest>,
) -> Result<Json<Goal>, ApiError> {
    let target_value = validate_target(req.target_value)?;
    let current_value = validate_current(req.current_value.unwrap_or(0.0))?;
    let new_goal = NewGoal {
        title: require_text("title", &req.title)?,
        description: req.description,
        target_value,
        current_value,
        unit: req.unit.unwrap_or_default(),
        target_date: req.target_date,
        status: GoalStatus::initial(current_value, target_value).to_str().to_string(),
        user_id: user.user_id,
    };

    let record = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(goals::table)
            .values(&new_goal)
            .returning(GoalRecord::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created goal: {} ({})", record.title, record.id);
    Ok(Json(record_to_goal(record)))
}

pub async fn get_goal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(goal_id): Path<i64>,
) -> Result<Json<Goal>, ApiError> {
    let record = with_conn(&state.conn, move |conn| {
        repo::find_owned::<GoalRecord>(conn, &GOALS, &user.user_id, goal_id)?
            .ok_or_else(|| ApiError::not_found("goal"))
    })
    .await?;

    Ok(Json(record_to_goal(record)))
}

pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(goal_id): Path<i64>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<Goal>, ApiError> {
    let patch = goal_patch(req)?;

    let record = with_conn(&state.conn, move |conn| {
        patch
            .execute::<GoalRecord>(conn, goal_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("goal"))
    })
    .await?;

    info!("Updated goal: {} ({}) status={}", record.title, record.id, record.status);
    Ok(Json(record_to_goal(record)))
}

pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(goal_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &GOALS, &user.user_id, goal_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("goal"))
        }
    })
    .await?;

    info!("Deleted goal: {goal_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn configure_goals_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::GOALS, get(list_goals).post(create_goal))
        .route(
            ApiUrls::GOAL_BY_ID,
            get(get_goal).put(update_goal).delete(delete_goal),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_value_completes_against_stored_target() {
        let stmt = goal_patch(UpdateGoalRequest {
            current_value: Some(100.0),
            ..Default::default()
        })
        .unwrap()
        .into_statement(1, "u")
        .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE goals SET current_value = $1, \
             status = CASE WHEN $2 >= target_value THEN 'completed' ELSE status END, \
             updated_at = NOW() WHERE goals.id = $3 AND goals.user_id = $4 RETURNING goals.*"
        );
        assert_eq!(stmt.binds()[1], SqlValue::Float(100.0));
    }

    #[test]
    fn test_new_target_is_used_when_supplied() {
        let stmt = goal_patch(UpdateGoalRequest {
            current_value: Some(50.0),
            target_value: Some(40.0),
            ..Default::default()
        })
        .unwrap()
        .into_statement(1, "u")
        .unwrap();
        assert!(stmt
            .sql()
            .contains("status = CASE WHEN $3 >= $4 THEN 'completed' ELSE status END"));
        assert_eq!(stmt.binds()[2], SqlValue::Float(50.0));
        assert_eq!(stmt.binds()[3], SqlValue::Float(40.0));
    }

    #[test]
    fn test_explicit_status_wins() {
        let patch = goal_patch(UpdateGoalRequest {
            current_value: Some(100.0),
            status: Some(GoalStatus::Active),
            ..Default::default()
        })
        .unwrap();
        let stmt = patch.into_statement(1, "u").unwrap();
        assert!(!stmt.sql().contains("CASE"));
        assert!(stmt.sql().contains("status = $2"));
        assert_eq!(stmt.binds()[1], SqlValue::Text("active".into()));
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = goal_patch(UpdateGoalRequest::default())
            .unwrap()
            .into_statement(1, "u")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(goal_patch(UpdateGoalRequest {
            target_value: Some(0.0),
            ..Default::default()
        })
        .is_err());
        assert!(goal_patch(UpdateGoalRequest {
            current_value: Some(-1.0),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(GoalStatus::initial(0.0, 100.0), GoalStatus::Active);
        assert_eq!(GoalStatus::initial(100.0, 100.0), GoalStatus::Completed);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [GoalStatus::Active, GoalStatus::Completed, GoalStatus::Paused] {
            assert_eq!(GoalStatus::from_str(status.to_str()), status);
        }
    }

    #[test]
    fn test_update_request_distinguishes_null_description() {
        let req: UpdateGoalRequest = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(req.description, Some(None));
        let req: UpdateGoalRequest = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(req.description, None);
    }
}
