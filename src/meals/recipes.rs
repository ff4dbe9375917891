use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Int4, Int8, Nullable, Text, Timestamptz};
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::RECIPES;
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Nest, Patch, Statement};
use crate::core::shared::schema::{recipe_ingredients, recipes};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = recipes)]
pub struct RecipeRecord {
    pub id: i64,
    pub name: String,
    pub instructions: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = recipe_ingredients)]
pub struct Ingredient {
    pub id: i64,
    pub recipe_id: i64,
    pub name: String,
    pub quantity: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recipes)]
struct NewRecipe {
    name: String,
    instructions: String,
    user_id: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recipe_ingredients)]
struct NewIngredient {
    recipe_id: i64,
    name: String,
    quantity: String,
    position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(flatten)]
    pub recipe: RecipeRecord,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientInput {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    pub instructions: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub instructions: Option<String>,
    pub ingredients: Option<Vec<IngredientInput>>,
}

#[derive(Debug, QueryableByName)]
pub struct RecipeRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub instructions: String,
    #[diesel(sql_type = Text)]
    pub user_id: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub ingredient_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub ingredient_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub ingredient_quantity: Option<String>,
    #[diesel(sql_type = Nullable<Int4>)]
    pub ingredient_position: Option<i32>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub ingredient_created_at: Option<DateTime<Utc>>,
}

impl RecipeRow {
    fn recipe(&self) -> RecipeRecord {
        RecipeRecord {
            id: self.id,
            name: self.name.clone(),
            instructions: self.instructions.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn ingredient(&self) -> Option<Ingredient> {
        Some(Ingredient {
            id: self.ingredient_id?,
            recipe_id: self.id,
            name: self.ingredient_name.clone()?,
            quantity: self.ingredient_quantity.clone()?,
            position: self.ingredient_position?,
            created_at: self.ingredient_created_at?,
        })
    }
}

pub fn assemble_recipes(rows: &[RecipeRow]) -> Vec<Recipe> {
    let mut nest = Nest::new();
    for row in rows {
        let slot = nest.parent(row.id, || row.recipe());
        if let Some(ingredient) = row.ingredient() {
            nest.child(slot, ingredient.id, || ingredient);
        }
    }
    nest.finish()
        .into_iter()
        .map(|(recipe, ingredients)| Recipe { recipe, ingredients })
        .collect()
}

fn recipes_with_ingredients(user_id: &str, recipe_id: Option<i64>) -> Statement {
    let mut stmt = Statement::new();
    let user = stmt.bind(user_id);
    let mut sql = format!(
        "SELECT recipes.*, i.id AS ingredient_id, i.name AS ingredient_name, \
         i.quantity AS ingredient_quantity, i.position AS ingredient_position, \
         i.created_at AS ingredient_created_at \
         FROM recipes \
         LEFT JOIN recipe_ingredients i ON i.recipe_id = recipes.id \
         WHERE {}",
        RECIPES.predicate(&user),
    );
    if let Some(id) = recipe_id {
        let id = stmt.bind(id);
        sql.push_str(&format!(" AND recipes.id = {id}"));
    }
    sql.push_str(" ORDER BY recipes.name ASC, recipes.id ASC, i.position ASC, i.id ASC");
    stmt.push(&sql);
    stmt
}

fn load_recipe(
    conn: &mut PgConnection,
    user_id: &str,
    recipe_id: i64,
) -> Result<Recipe, ApiError> {
    let rows = recipes_with_ingredients(user_id, Some(recipe_id)).load::<RecipeRow>(conn)?;
    assemble_recipes(&rows)
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("recipe"))
}

fn clean_ingredients(recipe_id: i64, inputs: Vec<IngredientInput>) -> Vec<NewIngredient> {
    inputs
        .into_iter()
        .filter(|i| !i.name.trim().is_empty())
        .zip(1..)
        .map(|(input, position)| NewIngredient {
            recipe_id,
            name: input.name.trim().to_string(),
            quantity: input.quantity.trim().to_string(),
            position,
        })
        .collect()
}

fn insert_ingredients(
    conn: &mut PgConnection,
    recipe_id: i64,
    inputs: Vec<IngredientInput>,
) -> Result<(), ApiError> {
    let ingredients = clean_ingredients(recipe_id, inputs);
    if !ingredients.is_empty() {
        diesel::insert_into(recipe_ingredients::table)
            .values(&ingredients)
            .execute(conn)?;
    }
    Ok(())
}

pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let rows = with_conn(&state.conn, move |conn| {
        Ok(recipes_with_ingredients(&user.user_id, None).load::<RecipeRow>(conn)?)
    })
    .await?;

    Ok(Json(assemble_recipes(&rows)))
}

pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let new_recipe = NewRecipe {
        name: require_text("name", &req.name)?,
        instructions: req.instructions.unwrap_or_default(),
        user_id: user.user_id.clone(),
    };
    let ingredients = req.ingredients;

    let recipe = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            let record: RecipeRecord = diesel::insert_into(recipes::table)
                .values(&new_recipe)
                .returning(RecipeRecord::as_returning())
                .get_result(conn)?;
            insert_ingredients(conn, record.id, ingredients)?;
            load_recipe(conn, &user.user_id, record.id)
        })
    })
    .await?;

    info!(
        "Created recipe: {} ({}) with {} ingredient(s)",
        recipe.recipe.name,
        recipe.recipe.id,
        recipe.ingredients.len()
    );
    Ok(Json(recipe))
}

pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(recipe_id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    with_conn(&state.conn, move |conn| {
        load_recipe(conn, &user.user_id, recipe_id)
    })
    .await
    .map(Json)
}

pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(recipe_id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let mut patch = Patch::new(RECIPES)
        .set("name", require_text_opt("name", req.name)?)
        .set("instructions", req.instructions);
    if req.ingredients.is_some() {
        patch = patch.allow_touch_only();
    }
    let ingredients = req.ingredients;

    let recipe = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, ApiError, _>(|conn| {
            patch
                .execute::<RecipeRecord>(conn, recipe_id, &user.user_id)?
                .ok_or_else(|| ApiError::not_found("recipe"))?;
            if let Some(ingredients) = ingredients {
                diesel::delete(
                    recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)),
                )
                .execute(conn)?;
                insert_ingredients(conn, recipe_id, ingredients)?;
            }
            load_recipe(conn, &user.user_id, recipe_id)
        })
    })
    .await?;

    info!("Updated recipe: {} ({})", recipe.recipe.name, recipe.recipe.id);
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(recipe_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &RECIPES, &user.user_id, recipe_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("recipe"))
        }
    })
    .await?;

    info!("Deleted recipe: {recipe_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
