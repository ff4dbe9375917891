//! Meals Module
//!
//! Recipe book and weekly meal plans.

pub mod plans;
pub mod recipes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::repo::OwnershipPath;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub const RECIPES: OwnershipPath = OwnershipPath::direct("recipes");
pub const MEAL_PLANS: OwnershipPath = OwnershipPath::direct("meal_plans");

pub fn configure_meals_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::RECIPES,
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            ApiUrls::RECIPE_BY_ID,
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(ApiUrls::MEAL_PLANS, get(plans::get_meal_plan))
        .route(
            ApiUrls::MEAL_PLAN_MEALS,
            post(plans::set_meal).delete(plans::remove_meal),
        )
        .route(ApiUrls::MEAL_PLAN_INGREDIENTS, get(plans::get_ingredients))
}
