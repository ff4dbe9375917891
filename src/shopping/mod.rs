//! Shopping Module
//!
//! Shopping lists with positioned, checkable items.

pub mod items;
pub mod lists;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::repo::{Hop, OwnershipPath};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub const SHOPPING_LISTS: OwnershipPath = OwnershipPath::direct("shopping_lists");
pub const SHOPPING_ITEMS: OwnershipPath = OwnershipPath::via(
    "shopping_items",
    &[Hop { column: "list_id", parent: "shopping_lists" }],
);

pub fn configure_shopping_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::SHOPPING_LISTS,
            get(lists::list_lists).post(lists::create_list),
        )
        .route(
            ApiUrls::SHOPPING_LIST_BY_ID,
            get(lists::get_list)
                .put(lists::update_list)
                .delete(lists::delete_list),
        )
        .route(ApiUrls::SHOPPING_LIST_BULK, post(items::bulk_add_items))
        .route(ApiUrls::SHOPPING_LIST_UNCHECK_ALL, post(items::uncheck_all))
        .route(ApiUrls::SHOPPING_ITEMS, post(items::create_item))
        .route(
            ApiUrls::SHOPPING_ITEM_BY_ID,
            put(items::update_item).delete(items::delete_item),
        )
}
