use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

// Never log the URL itself; it carries credentials.
pub async fn connect(config: &Config) -> Result<MySqlPool> {
    let url = config.database_url()?;
    let options = MySqlConnectOptions::from_str(&url).context("Invalid database URL")?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .context("Failed to connect to the WordPress database")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "connected to WordPress database"
    );
    Ok(pool)
}
