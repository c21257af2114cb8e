use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;

/// Creates the PostgreSQL connection pool, retrying transient connect
/// failures with linear backoff (attempt N sleeps N * SQL_RETRY_BACKOFF_MS).
///
/// Connect and request timeouts are both finite: SQL_CONNECT_TIMEOUT_MS caps
/// pool acquisition and SQL_REQUEST_TIMEOUT_MS is installed on every
/// connection as the server-side `statement_timeout`.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    info!("Connecting to PostgreSQL at {}...", config.db_server);

    let connect_options = PgConnectOptions::from_str(&config.database_url())?
        .options([("statement_timeout", config.sql_request_timeout_ms.to_string())]);

    let pool_options = PgPoolOptions::new()
        .max_connections(config.sql_pool_max)
        .acquire_timeout(Duration::from_millis(config.sql_connect_timeout_ms));

    let mut last_error = None;

    for attempt in 1..=config.sql_retry_attempts {
        match pool_options
            .clone()
            .connect_with(connect_options.clone())
            .await
        {
            Ok(pool) => {
                info!("PostgreSQL connection pool established");
                return Ok(pool);
            }
            Err(e) => {
                let delay = Duration::from_millis(config.sql_retry_backoff_ms * attempt as u64);
                warn!(
                    "PostgreSQL connect attempt {attempt}/{} failed: {e}; retrying in {}ms",
                    config.sql_retry_attempts,
                    delay.as_millis()
                );
                last_error = Some(e);
                if attempt < config.sql_retry_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "PostgreSQL unavailable after {} attempts: {}",
        config.sql_retry_attempts,
        last_error.expect("at least one attempt")
    ))
}
