//! Ownership-scoped data access.
//!
//! Statements whose shape is only known at runtime (ownership chains, partial
//! updates, joined reads) are assembled here as SQL text with positional `$n`
//! placeholders plus an ordered list of typed bind values. User input only
//! ever travels through the bind list.

pub mod insert;
pub mod nest;
pub mod ownership;
pub mod patch;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::deserialize::QueryableByName;
use diesel::pg::Pg;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{Array, Bool, Date, Double, Int4, Int8, Nullable, Numeric, Text, Timestamptz};
use diesel::{OptionalExtension, PgConnection, QueryResult, RunQueryDsl};

pub use insert::ChildInsert;
pub use nest::Nest;
pub use ownership::{Hop, OwnershipPath};
pub use patch::Patch;

/// A typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    NullableText(Option<String>),
    Int(i32),
    BigInt(i64),
    NullableBigInt(Option<i64>),
    Float(f64),
    Numeric(BigDecimal),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    NullableTimestamp(Option<DateTime<Utc>>),
    TextArray(Vec<String>),
}

impl SqlValue {
    fn bind_to(
        self,
        query: BoxedSqlQuery<'static, Pg, SqlQuery>,
    ) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
        match self {
            Self::Text(v) => query.bind::<Text, _>(v),
            Self::NullableText(v) => query.bind::<Nullable<Text>, _>(v),
            Self::Int(v) => query.bind::<Int4, _>(v),
            Self::BigInt(v) => query.bind::<Int8, _>(v),
            Self::NullableBigInt(v) => query.bind::<Nullable<Int8>, _>(v),
            Self::Float(v) => query.bind::<Double, _>(v),
            Self::Numeric(v) => query.bind::<Numeric, _>(v),
            Self::Bool(v) => query.bind::<Bool, _>(v),
            Self::Date(v) => query.bind::<Date, _>(v),
            Self::Timestamp(v) => query.bind::<Timestamptz, _>(v),
            Self::NullableTimestamp(v) => query.bind::<Nullable<Timestamptz>, _>(v),
            Self::TextArray(v) => query.bind::<Array<Text>, _>(v),
        }
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        Self::NullableText(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        Self::NullableBigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<BigDecimal> for SqlValue {
    fn from(v: BigDecimal) -> Self {
        Self::Numeric(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        Self::NullableTimestamp(v)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextArray(v)
    }
}

/// SQL text plus its ordered bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    binds: Vec<SqlValue>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bind value and returns its placeholder (`$1`, `$2`, ...).
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.binds.push(value.into());
        format!("${}", self.binds.len())
    }

    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[SqlValue] {
        &self.binds
    }

    fn into_query(self) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
        let query = diesel::sql_query(self.sql).into_boxed::<Pg>();
        self.binds
            .into_iter()
            .fold(query, |query, value| value.bind_to(query))
    }

    pub fn load<T>(self, conn: &mut PgConnection) -> QueryResult<Vec<T>>
    where
        T: QueryableByName<Pg> + 'static,
    {
        self.into_query().load::<T>(conn)
    }

    pub fn fetch_optional<T>(self, conn: &mut PgConnection) -> QueryResult<Option<T>>
    where
        T: QueryableByName<Pg> + 'static,
    {
        self.into_query().get_result::<T>(conn).optional()
    }

    pub fn execute(self, conn: &mut PgConnection) -> QueryResult<usize> {
        self.into_query().execute(conn)
    }
}

#[derive(Debug, QueryableByName)]
struct Found {
    #[diesel(sql_type = Bool)]
    found: bool,
}

pub fn find_owned<T>(
    conn: &mut PgConnection,
    path: &OwnershipPath,
    user_id: &str,
    id: i64,
) -> QueryResult<Option<T>>
where
    T: QueryableByName<Pg> + 'static,
{
    path.select_one(id, user_id).fetch_optional(conn)
}

pub fn list_owned<T>(
    conn: &mut PgConnection,
    path: &OwnershipPath,
    user_id: &str,
    order_by: &str,
) -> QueryResult<Vec<T>>
where
    T: QueryableByName<Pg> + 'static,
{
    path.select_all(user_id, None, order_by).load(conn)
}

/// Rows of `path.table` whose `column` equals `value`, still scoped to the owner.
pub fn list_owned_where<T>(
    conn: &mut PgConnection,
    path: &OwnershipPath,
    user_id: &str,
    column: &'static str,
    value: impl Into<SqlValue>,
    order_by: &str,
) -> QueryResult<Vec<T>>
where
    T: QueryableByName<Pg> + 'static,
{
    path.select_all(user_id, Some((column, value.into())), order_by)
        .load(conn)
}

pub fn delete_owned(
    conn: &mut PgConnection,
    path: &OwnershipPath,
    user_id: &str,
    id: i64,
) -> QueryResult<bool> {
    Ok(path.delete_one(id, user_id).execute(conn)? > 0)
}

pub fn owns(
    conn: &mut PgConnection,
    path: &OwnershipPath,
    user_id: &str,
    id: i64,
) -> QueryResult<bool> {
    let row: Option<Found> = path.exists(id, user_id).fetch_optional(conn)?;
    Ok(row.map(|r| r.found).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_numbers_placeholders_in_order() {
        let mut stmt = Statement::new();
        assert_eq!(stmt.bind("a"), "$1");
        assert_eq!(stmt.bind(7_i64), "$2");
        assert_eq!(stmt.bind(Some("c".to_string())), "$3");
        assert_eq!(
            stmt.binds(),
            &[
                SqlValue::Text("a".into()),
                SqlValue::BigInt(7),
                SqlValue::NullableText(Some("c".into())),
            ]
        );
    }

    #[test]
    fn test_nullable_conversions_keep_null() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::NullableText(None));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::NullableBigInt(None));
        assert_eq!(
            SqlValue::from(None::<DateTime<Utc>>),
            SqlValue::NullableTimestamp(None)
        );
    }
}
