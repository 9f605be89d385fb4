//! Database configuration.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

/// Which repository implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MySql,
    Memory,
}

/// MySQL connection settings for the fire-log and video-log databases.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Repository implementation
    pub backend: StoreBackend,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// Database holding `fire_logs`
    pub fire_database: String,
    /// Database holding `video_logs`
    pub video_database: String,
    /// Pool size per database
    pub max_connections: u32,
    /// How long a query waits for a connection
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::MySql,
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            fire_database: "fire_detection".to_string(),
            video_database: "fire_detection_vod".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: match std::env::var("STORE_BACKEND") {
                Ok(v) if v.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
                _ => StoreBackend::MySql,
            },
            host: std::env::var("DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            user: std::env::var("DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
            fire_database: std::env::var("DB_NAME").unwrap_or(defaults.fire_database),
            video_database: std::env::var("DB_NAME_VOD").unwrap_or(defaults.video_database),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout: defaults.acquire_timeout,
        }
    }

    /// Connection options for one of the two databases.
    pub fn connect_options(&self, database: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
    }

    /// Pool that connects on first use, so startup never waits on the server.
    pub fn connect_lazy(&self, database: &str) -> MySqlPool {
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy_with(self.connect_options(database))
    }
}
