use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Boot fails with context if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    // Auth
    pub auth_disabled: bool,
    pub auth0_domain: Option<String>,
    pub auth0_audience: Option<String>,
    pub auth0_issuer_base_url: Option<String>,

    // Database
    pub db_server: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub sql_connect_timeout_ms: u64,
    pub sql_request_timeout_ms: u64,
    pub sql_pool_max: u32,
    pub sql_retry_attempts: u32,
    pub sql_retry_backoff_ms: u64,

    // Queue broker
    pub redis_url: String,
    pub parse_queue_concurrency: usize,
    pub match_queue_concurrency: usize,
    pub queue_max_attempts: u32,
    pub queue_retry_base_ms: u64,
    pub queue_job_timeout_ms: u64,

    // NLP collaborator
    pub python_service_url: String,
    pub nlp_connect_timeout_ms: u64,
    pub nlp_request_timeout_ms: u64,

    // Object storage (Cloudflare R2 / any S3-compatible endpoint)
    pub r2_account_id: String,
    pub r2_access_key_id: String,
    pub r2_secret_access_key: String,
    pub r2_bucket: String,
    pub r2_endpoint: String,

    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let auth_disabled = env_bool("AUTH_DISABLED");
        let r2_account_id = require_env("R2_ACCOUNT_ID")?;
        let r2_endpoint = std::env::var("R2_ENDPOINT")
            .unwrap_or_else(|_| format!("https://{r2_account_id}.r2.cloudflarestorage.com"));

        Ok(Config {
            port: env_parse("PORT", 4000)?,

            auth_disabled,
            auth0_domain: optional_env("AUTH0_DOMAIN"),
            auth0_audience: optional_env("AUTH0_AUDIENCE"),
            auth0_issuer_base_url: optional_env("AUTH0_ISSUER_BASE_URL"),

            db_server: require_env("DB_SERVER")?,
            db_name: require_env("DB_NAME")?,
            db_user: require_env("DB_USER")?,
            db_password: require_env("DB_PASSWORD")?,
            sql_connect_timeout_ms: env_parse("SQL_CONNECT_TIMEOUT_MS", 30_000)?,
            sql_request_timeout_ms: env_parse("SQL_REQUEST_TIMEOUT_MS", 60_000)?,
            sql_pool_max: env_parse("SQL_POOL_MAX", 10)?,
            sql_retry_attempts: env_parse("SQL_RETRY_ATTEMPTS", 5)?,
            sql_retry_backoff_ms: env_parse("SQL_RETRY_BACKOFF_MS", 3_000)?,

            redis_url: require_env("REDIS_URL")?,
            parse_queue_concurrency: env_parse("PARSE_QUEUE_CONCURRENCY", 1)?,
            match_queue_concurrency: env_parse("MATCH_QUEUE_CONCURRENCY", 2)?,
            queue_max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", 3)?,
            queue_retry_base_ms: env_parse("QUEUE_RETRY_BASE_MS", 5_000)?,
            queue_job_timeout_ms: env_parse("QUEUE_JOB_TIMEOUT_MS", 300_000)?,

            python_service_url: require_env("PYTHON_SERVICE_URL")?,
            nlp_connect_timeout_ms: env_parse("NLP_CONNECT_TIMEOUT_MS", 10_000)?,
            nlp_request_timeout_ms: env_parse("NLP_REQUEST_TIMEOUT_MS", 60_000)?,

            r2_account_id,
            r2_access_key_id: require_env("R2_ACCESS_KEY_ID")?,
            r2_secret_access_key: require_env("R2_SECRET_ACCESS_KEY")?,
            r2_bucket: require_env("R2_BUCKET")?,
            r2_endpoint,

            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Postgres connection URL assembled from the discrete DB_* variables.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}",
            self.db_user, self.db_password, self.db_server, self.db_name
        )
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("'{key}' must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
