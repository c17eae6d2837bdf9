//! Startup schema bootstrap and health probes for the registry table.

use sqlx::PgPool;
use tracing::info;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS ws_connections (\
    connection_id TEXT NOT NULL, \
    channel_key TEXT NOT NULL, \
    connected_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
    authorized BOOLEAN NOT NULL DEFAULT FALSE, \
    user_id TEXT, \
    role TEXT, \
    expiration BIGINT, \
    PRIMARY KEY (connection_id, channel_key)\
)";

/// Create the registry table and, when configured, the channel-key index.
///
/// # Errors
/// Returns the underlying database error if DDL execution fails.
pub async fn run(pool: &PgPool, channel_index: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query(SCHEMA).execute(pool).await?;
    info!("registry table ready");

    if let Some(name) = channel_index {
        let ddl = format!(
            "CREATE INDEX IF NOT EXISTS \"{name}\" ON ws_connections (channel_key)"
        );
        sqlx::query(&ddl).execute(pool).await?;
        info!(index = name, "channel index ready");
    } else {
        info!("no channel index configured; channel lookups will scan");
    }

    Ok(())
}

/// Simple liveness check used during startup.
pub async fn ensure_liveness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Readiness probe: the registry table must exist and be queryable.
pub async fn ensure_readiness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM ws_connections WHERE FALSE")
        .execute(pool)
        .await
        .map(|_| ())
}
