use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Creates the `Files` table if it does not exist yet. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS Files (
            id INTEGER PRIMARY KEY,
            file_name TEXT,
            file_type TEXT,
            upload_date TEXT,
            file_content BLOB
        )
        "#,
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
