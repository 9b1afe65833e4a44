// /server/src/config.rs
use anyhow::{anyhow, Context, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" | "in-memory" => Ok(Self::Memory),
            _ => Err(anyhow!("STORAGE_BACKEND must be one of: postgres, memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let storage_backend =
            StorageBackend::parse(&env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".into()))?;

        let database_url = match storage_backend {
            StorageBackend::Postgres => {
                env::var("DATABASE_URL").context("DATABASE_URL must be set")?
            }
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        Ok(Self {
            host,
            port,
            storage_backend,
            database_url,
            db_max_connections,
            jwt_secret,
        })
    }

    /// Configuration for tests and local runs against the in-memory store.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage_backend: StorageBackend::Memory,
            database_url: String::new(),
            db_max_connections: 1,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
