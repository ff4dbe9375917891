use super::{SqlValue, Statement};

/// Column on the root table holding the owning user's id.
pub const OWNER_COLUMN: &str = "user_id";

/// One step up the parent chain: `column` on the current table references `parent.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub column: &'static str,
    pub parent: &'static str,
}

/// Chain of foreign-key hops from `table` to the user-owned root.
///
/// An empty chain means `table` carries `user_id` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipPath {
    pub table: &'static str,
    pub hops: &'static [Hop],
}

impl OwnershipPath {
    pub const fn direct(table: &'static str) -> Self {
        Self { table, hops: &[] }
    }

    pub const fn via(table: &'static str, hops: &'static [Hop]) -> Self {
        Self { table, hops }
    }

    /// Predicate over rows of `self.table` that holds only for rows owned by the
    /// user bound at `user_param`.
    pub fn predicate(&self, user_param: &str) -> String {
        render(self.table, self.hops, user_param)
    }

    /// `EXISTS (...)` that holds when the row bound at `id_param` is owned.
    pub fn exists_clause(&self, id_param: &str, user_param: &str) -> String {
        format!(
            "EXISTS (SELECT 1 FROM {t} WHERE {t}.id = {id_param} AND {pred})",
            t = self.table,
            pred = self.predicate(user_param),
        )
    }

    pub fn select_one(&self, id: i64, user_id: &str) -> Statement {
        let mut stmt = Statement::new();
        let id = stmt.bind(id);
        let user = stmt.bind(user_id);
        let sql = format!(
            "SELECT {t}.* FROM {t} WHERE {t}.id = {id} AND {pred}",
            t = self.table,
            pred = self.predicate(&user),
        );
        stmt.push(&sql);
        stmt
    }

    pub fn select_all(
        &self,
        user_id: &str,
        filter: Option<(&'static str, SqlValue)>,
        order_by: &str,
    ) -> Statement {
        let mut stmt = Statement::new();
        let user = stmt.bind(user_id);
        let mut sql = format!(
            "SELECT {t}.* FROM {t} WHERE {pred}",
            t = self.table,
            pred = self.predicate(&user),
        );
        if let Some((column, value)) = filter {
            let param = stmt.bind(value);
            sql.push_str(&format!(" AND {}.{} = {}", self.table, column, param));
        }
        sql.push_str(&format!(" ORDER BY {order_by}"));
        stmt.push(&sql);
        stmt
    }

    pub fn delete_one(&self, id: i64, user_id: &str) -> Statement {
        let mut stmt = Statement::new();
        let id = stmt.bind(id);
        let user = stmt.bind(user_id);
        let sql = format!(
            "DELETE FROM {t} WHERE {t}.id = {id} AND {pred}",
            t = self.table,
            pred = self.predicate(&user),
        );
        stmt.push(&sql);
        stmt
    }

    pub fn exists(&self, id: i64, user_id: &str) -> Statement {
        let mut stmt = Statement::new();
        let id = stmt.bind(id);
        let user = stmt.bind(user_id);
        let sql = format!("SELECT {} AS found", self.exists_clause(&id, &user));
        stmt.push(&sql);
        stmt
    }
}

fn render(table: &str, hops: &[Hop], user_param: &str) -> String {
    match hops.split_first() {
        None => format!("{table}.{OWNER_COLUMN} = {user_param}"),
        Some((hop, rest)) => format!(
            "{table}.{column} IN (SELECT {parent}.id FROM {parent} WHERE {inner})",
            column = hop.column,
            parent = hop.parent,
            inner = render(hop.parent, rest, user_param),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: OwnershipPath = OwnershipPath::direct("events");
    const ITEMS: OwnershipPath = OwnershipPath::via(
        "checklist_items",
        &[
            Hop { column: "checklist_id", parent: "checklists" },
            Hop { column: "card_id", parent: "cards" },
            Hop { column: "list_id", parent: "lists" },
            Hop { column: "board_id", parent: "boards" },
        ],
    );

    #[test]
    fn test_direct_predicate() {
        assert_eq!(EVENTS.predicate("$2"), "events.user_id = $2");
    }

    #[test]
    fn test_chain_predicate_walks_every_hop() {
        assert_eq!(
            ITEMS.predicate("$2"),
            "checklist_items.checklist_id IN (SELECT checklists.id FROM checklists WHERE \
             checklists.card_id IN (SELECT cards.id FROM cards WHERE \
             cards.list_id IN (SELECT lists.id FROM lists WHERE \
             lists.board_id IN (SELECT boards.id FROM boards WHERE boards.user_id = $2))))"
        );
    }

    #[test]
    fn test_select_one_binds_id_then_user() {
        let stmt = EVENTS.select_one(42, "user-a");
        assert_eq!(
            stmt.sql(),
            "SELECT events.* FROM events WHERE events.id = $1 AND events.user_id = $2"
        );
        assert_eq!(
            stmt.binds(),
            &[SqlValue::BigInt(42), SqlValue::Text("user-a".into())]
        );
    }

    #[test]
    fn test_select_all_with_filter() {
        let stmt = EVENTS.select_all("u", Some(("title", SqlValue::from("x"))), "date ASC");
        assert_eq!(
            stmt.sql(),
            "SELECT events.* FROM events WHERE events.user_id = $1 AND events.title = $2 ORDER BY date ASC"
        );
        assert_eq!(stmt.binds().len(), 2);
    }

    #[test]
    fn test_delete_is_scoped() {
        let stmt = ITEMS.delete_one(1, "u");
        assert!(stmt.sql().starts_with("DELETE FROM checklist_items WHERE checklist_items.id = $1 AND "));
        assert!(stmt.sql().ends_with("boards.user_id = $2))))"));
    }

    #[test]
    fn test_exists_statement() {
        let stmt = EVENTS.exists(5, "u");
        assert_eq!(
            stmt.sql(),
            "SELECT EXISTS (SELECT 1 FROM events WHERE events.id = $1 AND events.user_id = $2) AS found"
        );
    }
}
