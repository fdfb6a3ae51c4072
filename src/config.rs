use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub openai_api_key: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub store_domain: String,
    pub store_access_token: String,
    pub store_api_version: String,
    pub redis_url: Option<String>,
    pub snapshot_dir: String,
    pub brand_name: String,
    pub catalog_page_size: u32,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Load from environment or use defaults
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            openai_api_key: required("OPENAI_API_KEY")?,
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            store_domain: required("STORE_DOMAIN")?,
            store_access_token: required("STORE_ACCESS_TOKEN")?,
            store_api_version: std::env::var("STORE_API_VERSION")
                .unwrap_or_else(|_| "2024-01".to_string()),
            redis_url: std::env::var("REDIS_URL").ok(),
            snapshot_dir: std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "./data".to_string()),
            brand_name: std::env::var("BRAND_NAME").unwrap_or_else(|_| "la tienda".to_string()),
            catalog_page_size: parse_or("CATALOG_PAGE_SIZE", 100)?,
            retry_attempts: parse_or("RETRY_ATTEMPTS", 3)?,
            retry_backoff_ms: parse_or("RETRY_BACKOFF_MS", 250)?,
        })
    }
}

fn required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    std::env::var(name).map_err(|_| format!("{} must be set", name).into())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T::Err: std::error::Error + 'static,
{
    match std::env::var(name) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}
