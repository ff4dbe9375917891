use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use serde::{Deserialize, Deserializer};

use crate::core::config::DatabaseConfig;
use crate::core::error::ApiError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn create_conn(config: &DatabaseConfig) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder()
        .max_size(config.max_connections.max(1))
        .build(manager)
}

/// Pool that opens connections on first checkout.
pub fn create_lazy_conn(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(2)
        .connection_timeout(std::time::Duration::from_secs(2))
        .build_unchecked(manager)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub async fn with_conn<F, T>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims `value` and rejects it when blank.
pub fn require_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Like [`require_text`] for optional patch fields.
pub fn require_text_opt(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    value.map(|v| require_text(field, &v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default, deserialize_with = "double_option")]
        due_date: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_absent_null_and_value() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.due_date, None);

        let null: Body = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        assert_eq!(null.due_date, Some(None));

        let set: Body = serde_json::from_str(r#"{"due_date": "2024-01-01"}"#).unwrap();
        assert_eq!(set.due_date, Some(Some("2024-01-01".to_string())));
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("title", "  Groceries ").unwrap(), "Groceries");
        assert!(matches!(
            require_text("title", "   "),
            Err(ApiError::InvalidArgument(_))
        ));
        assert_eq!(require_text_opt("title", None).unwrap(), None);
    }
}
