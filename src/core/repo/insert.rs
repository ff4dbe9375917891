use diesel::deserialize::QueryableByName;
use diesel::pg::Pg;
use diesel::{PgConnection, QueryResult};

use super::{OwnershipPath, SqlValue, Statement};

/// Insert of one child row that only happens when its parent is owned.
///
/// Rendered as `INSERT .. SELECT .. WHERE EXISTS (<owned parent>)`, so the
/// ownership check and the write are one statement. With [`ChildInsert::at_end`]
/// the row takes `MAX(position) + 1` among its siblings.
#[derive(Debug, Clone)]
pub struct ChildInsert {
    table: &'static str,
    parent_column: &'static str,
    parent: OwnershipPath,
    values: Vec<(&'static str, SqlValue)>,
    at_end: bool,
}

impl ChildInsert {
    pub fn new(table: &'static str, parent_column: &'static str, parent: OwnershipPath) -> Self {
        Self {
            table,
            parent_column,
            parent,
            values: Vec::new(),
            at_end: false,
        }
    }

    pub fn value(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    pub fn at_end(mut self) -> Self {
        self.at_end = true;
        self
    }

    pub fn into_statement(self, parent_id: i64, user_id: &str) -> Statement {
        let mut stmt = Statement::new();
        let parent = stmt.bind(parent_id);
        let user = stmt.bind(user_id);

        let mut columns = vec![self.parent_column.to_string()];
        let mut exprs = vec![parent.clone()];
        for (column, value) in self.values {
            columns.push(column.to_string());
            exprs.push(stmt.bind(value));
        }
        if self.at_end {
            columns.push("position".to_string());
            exprs.push(format!(
                "COALESCE((SELECT MAX(position) FROM {t} WHERE {t}.{c} = {parent}), 0) + 1",
                t = self.table,
                c = self.parent_column,
            ));
        }

        let sql = format!(
            "INSERT INTO {t} ({columns}) SELECT {exprs} WHERE {owned} RETURNING {t}.*",
            t = self.table,
            columns = columns.join(", "),
            exprs = exprs.join(", "),
            owned = self.parent.exists_clause(&parent, &user),
        );
        stmt.push(&sql);
        stmt
    }

    /// Returns the inserted row, or `None` when the parent is absent or not owned.
    pub fn execute<T>(
        self,
        conn: &mut PgConnection,
        parent_id: i64,
        user_id: &str,
    ) -> QueryResult<Option<T>>
    where
        T: QueryableByName<Pg> + 'static,
    {
        self.into_statement(parent_id, user_id).fetch_optional(conn)
    }
}
