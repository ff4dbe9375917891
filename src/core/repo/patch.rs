use diesel::deserialize::QueryableByName;
use diesel::pg::Pg;
use diesel::PgConnection;

use super::{OwnershipPath, SqlValue, Statement};
use crate::core::error::ApiError;

/// Placeholder token inside [`Patch::set_expr`] templates.
pub const TEMPLATE_PARAM: &str = "$?";

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Value {
        column: &'static str,
        value: SqlValue,
    },
    Expr {
        column: &'static str,
        template: String,
        values: Vec<SqlValue>,
    },
}

impl Assignment {
    fn column(&self) -> &'static str {
        match self {
            Self::Value { column, .. } | Self::Expr { column, .. } => column,
        }
    }
}

/// Sparse update of one owned row.
///
/// Only columns explicitly supplied are written; `updated_at` is always touched.
#[derive(Debug, Clone)]
pub struct Patch {
    path: OwnershipPath,
    assignments: Vec<Assignment>,
    touch_only: bool,
}

impl Patch {
    pub fn new(path: OwnershipPath) -> Self {
        Self {
            path,
            assignments: Vec::new(),
            touch_only: false,
        }
    }

    /// Adds `column = value` when `value` is present. Pass `Option<Option<T>>`
    /// for nullable columns so that an explicit null clears the column.
    pub fn set<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.assignments.push(Assignment::Value {
                column,
                value: value.into(),
            });
        }
        self
    }

    /// Adds `column = <template>` where each `$?` in the template takes the next
    /// value from `values`. Templates are static SQL only.
    pub fn set_expr(
        mut self,
        column: &'static str,
        template: impl Into<String>,
        values: Vec<SqlValue>,
    ) -> Self {
        self.assignments.push(Assignment::Expr {
            column,
            template: template.into(),
            values,
        });
        self
    }

    /// Permits a timestamp-only write, for callers that changed dependent rows.
    pub fn allow_touch_only(mut self) -> Self {
        self.touch_only = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn has(&self, column: &str) -> bool {
        self.assignments.iter().any(|a| a.column() == column)
    }

    pub fn into_statement(self, id: i64, user_id: &str) -> Result<Statement, ApiError> {
        if self.assignments.is_empty() && !self.touch_only {
            return Err(ApiError::invalid("no fields to update"));
        }

        let mut stmt = Statement::new();
        let mut sets = Vec::with_capacity(self.assignments.len() + 1);
        for assignment in self.assignments {
            match assignment {
                Assignment::Value { column, value } => {
                    let param = stmt.bind(value);
                    sets.push(format!("{column} = {param}"));
                }
                Assignment::Expr {
                    column,
                    template,
                    values,
                } => {
                    let expr = render_template(&mut stmt, &template, values)?;
                    sets.push(format!("{column} = {expr}"));
                }
            }
        }
        sets.push("updated_at = NOW()".to_string());

        let id = stmt.bind(id);
        let user = stmt.bind(user_id);
        let sql = format!(
            "UPDATE {t} SET {sets} WHERE {t}.id = {id} AND {pred} RETURNING {t}.*",
            t = self.path.table,
            sets = sets.join(", "),
            pred = self.path.predicate(&user),
        );
        stmt.push(&sql);
        Ok(stmt)
    }

    /// Runs the update; `None` means the row is absent or not owned.
    pub fn execute<T>(
        self,
        conn: &mut PgConnection,
        id: i64,
        user_id: &str,
    ) -> Result<Option<T>, ApiError>
    where
        T: QueryableByName<Pg> + 'static,
    {
        Ok(self.into_statement(id, user_id)?.fetch_optional(conn)?)
    }
}

fn render_template(
    stmt: &mut Statement,
    template: &str,
    values: Vec<SqlValue>,
) -> Result<String, ApiError> {
    let mut values = values.into_iter();
    let mut parts = template.split(TEMPLATE_PARAM);
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let value = values
            .next()
            .ok_or_else(|| ApiError::Internal(format!("missing value for template: {template}")))?;
        out.push_str(&stmt.bind(value));
        out.push_str(part);
    }
    if values.next().is_some() {
        return Err(ApiError::Internal(format!("unused value for template: {template}")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::Hop;

    const GOALS: OwnershipPath = OwnershipPath::direct("goals");
    const CARDS: OwnershipPath = OwnershipPath::via(
        "cards",
        &[
            Hop { column: "list_id", parent: "lists" },
            Hop { column: "board_id", parent: "boards" },
        ],
    );

    #[test]
    fn test_empty_patch_is_rejected() {
        let err = Patch::new(GOALS).into_statement(1, "u").unwrap_err();
        match err {
            ApiError::InvalidArgument(msg) => assert_eq!(msg, "no fields to update"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_absent_fields_are_skipped() {
        let stmt = Patch::new(GOALS)
            .set("title", Some("Run"))
            .set::<String>("unit", None)
            .into_statement(9, "u")
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE goals SET title = $1, updated_at = NOW() WHERE goals.id = $2 AND goals.user_id = $3 RETURNING goals.*"
        );
        assert_eq!(
            stmt.binds(),
            &[
                SqlValue::Text("Run".into()),
                SqlValue::BigInt(9),
                SqlValue::Text("u".into()),
            ]
        );
    }

    #[test]
    fn test_explicit_null_clears_nullable_column() {
        let cleared: Option<Option<String>> = Some(None);
        let stmt = Patch::new(GOALS)
            .set("description", cleared)
            .into_statement(1, "u")
            .unwrap();
        assert_eq!(stmt.binds()[0], SqlValue::NullableText(None));
        assert!(stmt.sql().starts_with("UPDATE goals SET description = $1, updated_at = NOW()"));
    }

    #[test]
    fn test_expression_template_binds_values() {
        let stmt = Patch::new(GOALS)
            .set("current_value", Some(100.0))
            .set_expr(
                "status",
                "CASE WHEN $? >= target_value THEN 'completed' ELSE status END",
                vec![SqlValue::Float(100.0)],
            )
            .into_statement(3, "u")
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE goals SET current_value = $1, status = CASE WHEN $2 >= target_value THEN 'completed' ELSE status END, \
             updated_at = NOW() WHERE goals.id = $3 AND goals.user_id = $4 RETURNING goals.*"
        );
        assert_eq!(stmt.binds().len(), 4);
    }

    #[test]
    fn test_template_value_mismatch_is_internal() {
        let err = Patch::new(GOALS)
            .set_expr("status", "CASE WHEN $? >= $? THEN 'x' END", vec![SqlValue::Float(1.0)])
            .into_statement(1, "u")
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_touch_only_when_allowed() {
        let stmt = Patch::new(GOALS)
            .allow_touch_only()
            .into_statement(1, "u")
            .unwrap();
        assert!(stmt.sql().starts_with("UPDATE goals SET updated_at = NOW() WHERE"));
    }

    #[test]
    fn test_transitive_update_is_scoped() {
        let stmt = Patch::new(CARDS)
            .set("title", Some("x"))
            .into_statement(1, "u")
            .unwrap();
        assert!(stmt.sql().contains(
            "WHERE cards.id = $2 AND cards.list_id IN (SELECT lists.id FROM lists WHERE \
             lists.board_id IN (SELECT boards.id FROM boards WHERE boards.user_id = $3))"
        ));
    }

    #[test]
    fn test_has_reports_columns() {
        let patch = Patch::new(GOALS).set("status", Some("paused"));
        assert!(patch.has("status"));
        assert!(!patch.has("title"));
        assert!(!patch.is_empty());
    }
}
