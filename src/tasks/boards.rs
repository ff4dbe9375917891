use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Array, Int4, Int8, Nullable, Text, Timestamptz};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::cards::{Card, CardMember, CardRecord};
use super::lists::{List, ListRecord};
use super::BOARDS;
use crate::core::error::ApiError;
use crate::core::middleware::AuthenticatedUser;
use crate::core::repo::{self, Nest, Patch, Statement};
use crate::core::shared::schema::boards;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{require_text, require_text_opt, with_conn};

pub const DEFAULT_BACKGROUND: &str = "#007AFF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = boards)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub background: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = boards)]
pub struct NewBoard {
    pub title: String,
    pub background: String,
    pub user_id: String,
}

/// A board with its lists, their cards and each card's members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardTree {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<List>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub title: String,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBoardRequest {
    pub title: Option<String>,
    pub background: Option<String>,
}

/// One row of the board read: board columns, then the optional list, card and member.
#[derive(Debug, Clone, QueryableByName)]
pub struct BoardRow {
    #[diesel(sql_type = Int8)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub background: String,
    #[diesel(sql_type = Text)]
    pub user_id: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub list_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub list_title: Option<String>,
    #[diesel(sql_type = Nullable<Int4>)]
    pub list_position: Option<i32>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub list_created_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub list_updated_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub card_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub card_title: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub card_description: Option<String>,
    #[diesel(sql_type = Nullable<Int4>)]
    pub card_position: Option<i32>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub card_due_date: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Array<Text>>)]
    pub card_labels: Option<Vec<String>>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub card_created_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub card_updated_at: Option<DateTime<Utc>>,
    #[diesel(sql_type = Nullable<Int8>)]
    pub member_id: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub member_user_id: Option<String>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub member_created_at: Option<DateTime<Utc>>,
}

impl BoardRow {
    fn board(&self) -> Board {
        Board {
            id: self.id,
            title: self.title.clone(),
            background: self.background.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn list(&self) -> Option<ListRecord> {
        Some(ListRecord {
            id: self.list_id?,
            title: self.list_title.clone()?,
            position: self.list_position?,
            board_id: self.id,
            created_at: self.list_created_at?,
            updated_at: self.list_updated_at?,
        })
    }

    fn card(&self) -> Option<CardRecord> {
        Some(CardRecord {
            id: self.card_id?,
            title: self.card_title.clone()?,
            description: self.card_description.clone()?,
            position: self.card_position?,
            list_id: self.list_id?,
            due_date: self.card_due_date,
            labels: self.card_labels.clone().unwrap_or_default(),
            created_at: self.card_created_at?,
            updated_at: self.card_updated_at?,
        })
    }

    fn member(&self) -> Option<CardMember> {
        Some(CardMember {
            id: self.member_id?,
            card_id: self.card_id?,
            user_id: self.member_user_id.clone()?,
            created_at: self.member_created_at?,
        })
    }
}

/// Folds the flat board rows into a tree, bottom-up.
///
/// Members attach to cards, cards attach to lists, lists attach to the board.
/// Returns `None` for an empty row set.
pub fn assemble_board(rows: &[BoardRow]) -> Option<BoardTree> {
    let board = rows.first()?.board();

    let mut cards = Nest::new();
    let mut lists = Nest::new();
    for row in rows {
        let Some(list) = row.list() else { continue };
        let list_slot = lists.parent(list.id, || list);
        let Some(card) = row.card() else { continue };
        let card_id = card.id;
        lists.child(list_slot, card_id, || card_id);
        let card_slot = cards.parent(card_id, || card);
        if let Some(member) = row.member() {
            cards.child(card_slot, member.id, || member);
        }
    }

    let mut by_id: HashMap<i64, Card> = cards
        .finish()
        .into_iter()
        .map(|(card, members)| (card.id, Card { card, members }))
        .collect();

    let lists = lists
        .finish()
        .into_iter()
        .map(|(list, card_ids)| List {
            list,
            cards: card_ids.iter().filter_map(|id| by_id.remove(id)).collect(),
        })
        .collect();

    Some(BoardTree { board, lists })
}

fn board_tree(board_id: i64, user_id: &str) -> Statement {
    let mut stmt = Statement::new();
    let board = stmt.bind(board_id);
    let user = stmt.bind(user_id);
    let sql = format!(
        "SELECT boards.*, \
         l.id AS list_id, l.title AS list_title, l.position AS list_position, \
         l.created_at AS list_created_at, l.updated_at AS list_updated_at, \
         c.id AS card_id, c.title AS card_title, c.description AS card_description, \
         c.position AS card_position, c.due_date AS card_due_date, c.labels AS card_labels, \
         c.created_at AS card_created_at, c.updated_at AS card_updated_at, \
         m.id AS member_id, m.user_id AS member_user_id, m.created_at AS member_created_at \
         FROM boards \
         LEFT JOIN lists l ON l.board_id = boards.id \
         LEFT JOIN cards c ON c.list_id = l.id \
         LEFT JOIN card_members m ON m.card_id = c.id \
         WHERE boards.id = {board} AND {pred} \
         ORDER BY l.position ASC, l.id ASC, c.position ASC, c.id ASC, m.created_at ASC, m.id ASC",
        pred = BOARDS.predicate(&user),
    );
    stmt.push(&sql);
    stmt
}

pub async fn list_boards(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Board>>, ApiError> {
    let boards = with_conn(&state.conn, move |conn| {
        Ok(repo::list_owned::<Board>(
            conn,
            &BOARDS,
            &user.user_id,
            "boards.updated_at DESC, boards.id DESC",
        )?)
    })
    .await?;

    Ok(Json(boards))
}

pub async fn create_board(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateBoardRequest>,
) -> Result<Json<BoardTree>, ApiError> {
    let new_board = NewBoard {
        title: require_text("title", &req.title)?,
        background: req
            .background
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
        user_id: user.user_id,
    };

    let board = with_conn(&state.conn, move |conn| {
        Ok(diesel::insert_into(boards::table)
            .values(&new_board)
            .returning(Board::as_returning())
            .get_result(conn)?)
    })
    .await?;

    info!("Created board: {} ({})", board.title, board.id);
    Ok(Json(BoardTree {
        board,
        lists: Vec::new(),
    }))
}

pub async fn get_board(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(board_id): Path<i64>,
) -> Result<Json<BoardTree>, ApiError> {
    let rows = with_conn(&state.conn, move |conn| {
        Ok(board_tree(board_id, &user.user_id).load::<BoardRow>(conn)?)
    })
    .await?;

    assemble_board(&rows)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("board"))
}

pub async fn update_board(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(board_id): Path<i64>,
    Json(req): Json<UpdateBoardRequest>,
) -> Result<Json<Board>, ApiError> {
    let patch = Patch::new(BOARDS)
        .set("title", require_text_opt("title", req.title)?)
        .set("background", req.background);

    let board = with_conn(&state.conn, move |conn| {
        patch
            .execute::<Board>(conn, board_id, &user.user_id)?
            .ok_or_else(|| ApiError::not_found("board"))
    })
    .await?;

    info!("Updated board: {} ({})", board.title, board.id);
    Ok(Json(board))
}

pub async fn delete_board(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(board_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        if repo::delete_owned(conn, &BOARDS, &user.user_id, board_id)? {
            Ok(())
        } else {
            Err(ApiError::not_found("board"))
        }
    })
    .await?;

    info!("Deleted board: {board_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn empty_board_row() -> BoardRow {
        BoardRow {
            id: 1,
            title: "Home".into(),
            background: DEFAULT_BACKGROUND.into(),
            user_id: "u".into(),
            created_at: at(),
            updated_at: at(),
            list_id: None,
            list_title: None,
            list_position: None,
            list_created_at: None,
            list_updated_at: None,
            card_id: None,
            card_title: None,
            card_description: None,
            card_position: None,
            card_due_date: None,
            card_labels: None,
            card_created_at: None,
            card_updated_at: None,
            member_id: None,
            member_user_id: None,
            member_created_at: None,
        }
    }

    fn row(list: i64, card: Option<i64>, member: Option<(i64, &str)>) -> BoardRow {
        let mut row = empty_board_row();
        row.list_id = Some(list);
        row.list_title = Some(format!("list-{list}"));
        row.list_position = Some(list as i32);
        row.list_created_at = Some(at());
        row.list_updated_at = Some(at());
        if let Some(card) = card {
            row.card_id = Some(card);
            row.card_title = Some(format!("card-{card}"));
            row.card_description = Some(String::new());
            row.card_position = Some(card as i32);
            row.card_labels = Some(vec!["home".into()]);
            row.card_created_at = Some(at());
            row.card_updated_at = Some(at());
        }
        if let Some((id, user)) = member {
            row.member_id = Some(id);
            row.member_user_id = Some(user.into());
            row.member_created_at = Some(at());
        }
        row
    }

    #[test]
    fn test_assemble_board_nests_every_level() {
        let rows = vec![
            row(10, Some(100), Some((1, "ana"))),
            row(10, Some(100), Some((2, "bo"))),
            row(10, Some(101), None),
            row(11, None, None),
        ];
        let tree = assemble_board(&rows).unwrap();

        assert_eq!(tree.lists.len(), 2);
        let a = &tree.lists[0];
        assert_eq!(a.list.id, 10);
        assert_eq!(a.cards.len(), 2);
        assert_eq!(a.cards[0].card.id, 100);
        assert_eq!(a.cards[1].card.id, 101);
        let members: Vec<&str> = a.cards[0].members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(members, vec!["ana", "bo"]);
        assert!(a.cards[1].members.is_empty());
        assert!(tree.lists[1].cards.is_empty());

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["title"], "Home");
        assert_eq!(json["lists"][0]["cards"][1]["members"], serde_json::json!([]));
        assert_eq!(json["lists"][1]["cards"], serde_json::json!([]));
    }

    #[test]
    fn test_assemble_board_without_lists() {
        let tree = assemble_board(&[empty_board_row()]).unwrap();
        assert_eq!(tree.board.id, 1);
        assert!(tree.lists.is_empty());
    }

    #[test]
    fn test_assemble_board_empty_rows() {
        assert!(assemble_board(&[]).is_none());
    }

    #[test]
    fn test_board_tree_is_scoped_to_owner() {
        let stmt = board_tree(1, "u");
        assert!(stmt.sql().contains("WHERE boards.id = $1 AND boards.user_id = $2"));
        assert!(stmt.sql().contains("ORDER BY l.position ASC"));
    }
}
