use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::upsert::excluded;
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{MEAL_PLANS, RECIPES};
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Statement};
use crate::core::shared::schema::{meal_plan_entries, meal_plans, recipes};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            other => Err(ApiError::Internal(format!("unknown meal type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = meal_plans)]
pub struct MealPlan {
    pub id: i64,
    pub week_of: NaiveDate,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = meal_plan_entries)]
pub struct MealEntryRecord {
    pub id: i64,
    pub meal_plan_id: i64,
    pub day_of_week: i32,
    pub meal_type: String,
    pub recipe_id: Option<i64>,
    pub custom_meal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = meal_plan_entries)]
struct NewMealEntry {
    meal_plan_id: i64,
    day_of_week: i32,
    meal_type: String,
    recipe_id: Option<i64>,
    custom_meal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: i64,
    pub meal_plan_id: i64,
    pub day_of_week: i32,
    pub meal_type: MealType,
    pub recipe_id: Option<i64>,
    pub recipe_name: Option<String>,
    pub custom_meal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MealEntry {
    fn from_record(record: MealEntryRecord, recipe_name: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            id: record.id,
            meal_plan_id: record.meal_plan_id,
            day_of_week: record.day_of_week,
            meal_type: MealType::parse(&record.meal_type)?,
            recipe_id: record.recipe_id,
            recipe_name,
            custom_meal: record.custom_meal,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlanWithEntries {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub entries: Vec<MealEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekQuery {
    pub week_of: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMealRequest {
    pub week_of: NaiveDate,
    pub day_of_week: i32,
    pub meal_type: MealType,
    pub recipe_id: Option<i64>,
    pub custom_meal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveMealQuery {
    pub week_of: NaiveDate,
    pub day_of_week: i32,
    pub meal_type: MealType,
}

#[derive(Debug, QueryableByName)]
struct IngredientLine {
    #[diesel(sql_type = Text)]
    line: String,
}

pub fn validate_day(day_of_week: i32) -> Result<i32, ApiError> {
    if (0..=6).contains(&day_of_week) {
        Ok(day_of_week)
    } else {
        Err(ApiError::invalid("day_of_week must be between 0 and 6"))
    }
}

/// Entries by day, then breakfast, lunch, dinner.
pub fn sort_entries(entries: &mut [MealEntry]) {
    entries.sort_by_key(|e| (e.day_of_week, e.meal_type));
}

/// Returns the caller's plan for `week_of`, creating it on first use.
///
/// Concurrent first requests both insert with `ON CONFLICT DO NOTHING`; the
/// row that landed first is the one read back.
fn get_or_create_plan(
    conn: &mut PgConnection,
    user_id: &str,
    week_of: NaiveDate,
) -> Result<MealPlan, ApiError> {
    diesel::insert_into(meal_plans::table)
        .values((meal_plans::user_id.eq(user_id), meal_plans::week_of.eq(week_of)))
        .on_conflict((meal_plans::user_id, meal_plans::week_of))
        .do_nothing()
        .execute(conn)?;

    Ok(meal_plans::table
        .filter(meal_plans::user_id.eq(user_id))
        .filter(meal_plans::week_of.eq(week_of))
        .select(MealPlan::as_select())
        .first(conn)?)
}

fn load_entries(conn: &mut PgConnection, plan_id: i64) -> Result<Vec<MealEntry>, ApiError> {
    let rows = meal_plan_entries::table
        .left_join(recipes::table)
        .filter(meal_plan_entries::meal_plan_id.eq(plan_id))
        .select((MealEntryRecord::as_select(), recipes::name.nullable()))
        .load::<(MealEntryRecord, Option<String>)>(conn)?;

    let mut entries = rows
        .into_iter()
        .map(|(record, recipe_name)| MealEntry::from_record(record, recipe_name))
        .collect::<Result<Vec<_>, _>>()?;
    sort_entries(&mut entries);
    Ok(entries)
}

fn week_ingredients(user_id: &str, week_of: NaiveDate) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let week = stmt.bind(week_of);
    let sql = format!(
        "SELECT DISTINCT CASE WHEN i.quantity = '' THEN i.name \
         ELSE i.name || ' (' || i.quantity || ')' END AS line \
         FROM meal_plans \
         JOIN meal_plan_entries e ON e.meal_plan_id = meal_plans.id \
         JOIN recipes r ON r.id = e.recipe_id AND r.user_id = meal_plans.user_id \
         JOIN recipe_ingredients i ON i.recipe_id = r.id \
         WHERE meal_plans.week_of = {week} AND {pred} \
         ORDER BY line ASC",
        pred = MEAL_PLANS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

pub async fn get_meal_plan(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<WeekQuery>,
) -> Result<Json<MealPlanWithEntries>, ApiError> {
    let plan = with_conn(&state.conn, move |conn| {
        let plan = get_or_create_plan(conn, &user.user_id, query.week_of)?;
        let entries = load_entries(conn, plan.id)?;
        Ok(MealPlanWithEntries { plan, entries })
    })
    .await?;

    Ok(Json(plan))
}

pub async fn set_meal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<SetMealRequest>,
) -> Result<Json<MealEntry>, ApiError> {
    let day_of_week = validate_day(req.day_of_week)?;
    let custom_meal = req
        .custom_meal
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    if req.recipe_id.is_none() && custom_meal.is_none() {
        return Err(ApiError::invalid("recipe_id or custom_meal is required"));
    }

    let entry = with_conn(&state.conn, move |conn| {
        let recipe_name = match req.recipe_id {
            Some(recipe_id) => {
                if !repo::owns(conn, &RECIPES, &user.user_id, recipe_id)? {
                    return Err(ApiError::not_found("recipe"));
                }
                Some(
                    recipes::table
                        .find(recipe_id)
                        .select(recipes::name)
                        .first::<String>(conn)?,
                )
            }
            None => None,
        };

        let plan = get_or_create_plan(conn, &user.user_id, req.week_of)?;
        let new_entry = NewMealEntry {
            meal_plan_id: plan.id,
            day_of_week,
            meal_type: req.meal_type.as_str().to_string(),
            recipe_id: req.recipe_id,
            custom_meal,
        };

        let record = diesel::insert_into(meal_plan_entries::table)
            .values(&new_entry)
            .on_conflict((
                meal_plan_entries::meal_plan_id,
                meal_plan_entries::day_of_week,
                meal_plan_entries::meal_type,
            ))
            .do_update()
            .set((
                meal_plan_entries::recipe_id.eq(excluded(meal_plan_entries::recipe_id)),
                meal_plan_entries::custom_meal.eq(excluded(meal_plan_entries::custom_meal)),
                meal_plan_entries::updated_at.eq(diesel::dsl::now),
            ))
            .returning(MealEntryRecord::as_returning())
            .get_result::<MealEntryRecord>(conn)?;

        MealEntry::from_record(record, recipe_name)
    })
    .await?;

    info!(
        "Set meal {} day {} on plan {} ({})",
        entry.meal_type.as_str(),
        entry.day_of_week,
        entry.meal_plan_id,
        entry.id
    );
    Ok(Json(entry))
}

pub async fn remove_meal(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<RemoveMealQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let day_of_week = validate_day(query.day_of_week)?;
    let week_of = query.week_of;
    let meal_type = query.meal_type;

    let removed = with_conn(&state.conn, move |conn| {
        let plan_id = meal_plans::table
            .filter(meal_plans::user_id.eq(&user.user_id))
            .filter(meal_plans::week_of.eq(week_of))
            .select(meal_plans::id)
            .first::<i64>(conn)
            .optional()?;

        let Some(plan_id) = plan_id else {
            return Ok(0);
        };

        Ok(diesel::delete(
            meal_plan_entries::table
                .filter(meal_plan_entries::meal_plan_id.eq(plan_id))
                .filter(meal_plan_entries::day_of_week.eq(day_of_week))
                .filter(meal_plan_entries::meal_type.eq(meal_type.as_str())),
        )
        .execute(conn)?)
    })
    .await?;

    if removed > 0 {
        info!(
            "Removed {} meal on day {} of week {}",
            meal_type.as_str(),
            day_of_week,
            week_of
        );
    }
    Ok(Json(serde_json::json!({ "deleted": removed > 0 })))
}

pub async fn get_ingredients(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let lines = with_conn(&state.conn, move |conn| {
        Ok(week_ingredients(&user.user_id, query.week_of).load::<IngredientLine>(conn)?)
    })
    .await?;

    Ok(Json(lines.into_iter().map(|l| l.line).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(day: i32, meal_type: MealType) -> MealEntry {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MealEntry {
            id: i64::from(day) * 10,
            meal_plan_id: 1,
            day_of_week: day,
            meal_type,
            recipe_id: None,
            recipe_name: None,
            custom_meal: Some("Leftovers".into()),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_entries_sort_by_day_then_meal() {
        let mut entries = vec![
            entry(2, MealType::Breakfast),
            entry(0, MealType::Dinner),
            entry(0, MealType::Breakfast),
            entry(0, MealType::Lunch),
        ];
        sort_entries(&mut entries);
        let order: Vec<_> = entries.iter().map(|e| (e.day_of_week, e.meal_type)).collect();
        assert_eq!(
            order,
            vec![
                (0, MealType::Breakfast),
                (0, MealType::Lunch),
                (0, MealType::Dinner),
                (2, MealType::Breakfast),
            ]
        );
    }

    #[test]
    fn test_validate_day() {
        assert_eq!(validate_day(0).unwrap(), 0);
        assert_eq!(validate_day(6).unwrap(), 6);
        assert!(validate_day(7).is_err());
        assert!(validate_day(-1).is_err());
    }

    #[test]
    fn test_meal_type_wire_format() {
        let req: SetMealRequest = serde_json::from_str(
            r#"{"week_of": "2024-06-03", "day_of_week": 1, "meal_type": "lunch", "recipe_id": 4}"#,
        )
        .unwrap();
        assert_eq!(req.meal_type, MealType::Lunch);
        assert_eq!(req.custom_meal, None);
        assert!(serde_json::from_str::<MealType>("\"brunch\"").is_err());
    }

    #[test]
    fn test_ingredients_are_scoped_to_owner() {
        let stmt = week_ingredients("u", NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert!(stmt
            .sql()
            .contains("WHERE meal_plans.week_of = $2 AND meal_plans.user_id = $1"));
        assert!(stmt.sql().contains("SELECT DISTINCT"));
    }
}
