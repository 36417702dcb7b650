use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};

pub type DbPool = PgPool;

/// Pool on the backend's Postgres, used for change notifications only.
/// Row access goes through the REST surface.
pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Installs the change-notification triggers and the activity log table.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
