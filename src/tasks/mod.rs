//! Tasks module - Kanban boards
//!
//! This module is split into:
//! - boards: boards and the assembled board tree
//! - lists: columns of a board
//! - cards: cards, due-today view and card members
//! - checklists: checklists and their items
//! - comments, attachments: card sub-resources
//!
//! Everything below a board is owned through its parent chain up to `boards.user_id`.

pub mod attachments;
pub mod boards;
pub mod cards;
pub mod checklists;
pub mod comments;
pub mod lists;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::repo::{Hop, OwnershipPath};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use boards::{assemble_board, BoardTree};

pub const BOARDS: OwnershipPath = OwnershipPath::direct("boards");

pub const LISTS: OwnershipPath = OwnershipPath::via(
    "lists",
    &[Hop { column: "board_id", parent: "boards" }],
);

pub const CARDS: OwnershipPath = OwnershipPath::via(
    "cards",
    &[
        Hop { column: "list_id", parent: "lists" },
        Hop { column: "board_id", parent: "boards" },
    ],
);

pub const CHECKLISTS: OwnershipPath = OwnershipPath::via(
    "checklists",
    &[
        Hop { column: "card_id", parent: "cards" },
        Hop { column: "list_id", parent: "lists" },
        Hop { column: "board_id", parent: "boards" },
    ],
);

pub const CHECKLIST_ITEMS: OwnershipPath = OwnershipPath::via(
    "checklist_items",
    &[
        Hop { column: "checklist_id", parent: "checklists" },
        Hop { column: "card_id", parent: "cards" },
        Hop { column: "list_id", parent: "lists" },
        Hop { column: "board_id", parent: "boards" },
    ],
);

pub const COMMENTS: OwnershipPath = OwnershipPath::via(
    "comments",
    &[
        Hop { column: "card_id", parent: "cards" },
        Hop { column: "list_id", parent: "lists" },
        Hop { column: "board_id", parent: "boards" },
    ],
);

pub const ATTACHMENTS: OwnershipPath = OwnershipPath::via(
    "attachments",
    &[
        Hop { column: "card_id", parent: "cards" },
        Hop { column: "list_id", parent: "lists" },
        Hop { column: "board_id", parent: "boards" },
    ],
);

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::BOARDS, get(boards::list_boards).post(boards::create_board))
        .route(
            ApiUrls::BOARD_BY_ID,
            get(boards::get_board)
                .put(boards::update_board)
                .delete(boards::delete_board),
        )
        .route(ApiUrls::LISTS, post(lists::create_list))
        .route(
            ApiUrls::LIST_BY_ID,
            put(lists::update_list).delete(lists::delete_list),
        )
        .route(ApiUrls::CARDS, post(cards::create_card))
        .route(ApiUrls::CARDS_TODAY, get(cards::cards_due_today))
        .route(
            ApiUrls::CARD_BY_ID,
            get(cards::get_card)
                .put(cards::update_card)
                .delete(cards::delete_card),
        )
        .route(ApiUrls::CARD_MEMBERS, post(cards::add_member))
        .route(ApiUrls::CARD_MEMBER, delete(cards::remove_member))
        .route(ApiUrls::CARD_CHECKLISTS, get(checklists::list_checklists))
        .route(ApiUrls::CARD_COMMENTS, get(comments::list_comments))
        .route(ApiUrls::CARD_ATTACHMENTS, get(attachments::list_attachments))
        .route(ApiUrls::CHECKLISTS, post(checklists::create_checklist))
        .route(
            ApiUrls::CHECKLIST_BY_ID,
            put(checklists::update_checklist).delete(checklists::delete_checklist),
        )
        .route(ApiUrls::CHECKLIST_ITEMS, post(checklists::create_item))
        .route(
            ApiUrls::CHECKLIST_ITEM_BY_ID,
            put(checklists::update_item).delete(checklists::delete_item),
        )
        .route(ApiUrls::COMMENTS, post(comments::create_comment))
        .route(
            ApiUrls::COMMENT_BY_ID,
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(ApiUrls::ATTACHMENTS, post(attachments::create_attachment))
        .route(ApiUrls::ATTACHMENT_BY_ID, delete(attachments::delete_attachment))
}
