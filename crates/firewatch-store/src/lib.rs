//! Persistence for the Firewatch backend.
//!
//! Two append-only tables, `fire_logs` and `video_logs`, each behind an
//! async repository trait. The MySQL implementation keeps the tables in the
//! two configured databases; the in-memory one backs local runs and tests.

pub mod config;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod repository;
pub mod schema;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::{DbConfig, StoreBackend};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryLogStore;
pub use mysql::{MySqlFireLogStore, MySqlVideoLogStore};
pub use repository::{FireLogStore, VideoLogStore};

/// The pair of repositories the service writes to.
#[derive(Clone)]
pub struct LogStores {
    pub fire: Arc<dyn FireLogStore>,
    pub video: Arc<dyn VideoLogStore>,
}

impl LogStores {
    pub fn new(fire: Arc<dyn FireLogStore>, video: Arc<dyn VideoLogStore>) -> Self {
        Self { fire, video }
    }

    /// Both tables backed by one in-memory store.
    pub fn in_memory() -> (Self, Arc<MemoryLogStore>) {
        let store = Arc::new(MemoryLogStore::new());
        (Self::new(store.clone(), store.clone()), store)
    }

    /// Build the configured backend. MySQL pools connect lazily; schema
    /// bootstrap failures are logged and startup continues.
    pub async fn connect(config: &DbConfig) -> Self {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory log store");
                Self::in_memory().0
            }
            StoreBackend::MySql => {
                let fire = MySqlFireLogStore::new(config.connect_lazy(&config.fire_database));
                let video = MySqlVideoLogStore::new(config.connect_lazy(&config.video_database));

                if let Err(e) = fire.ensure_schema().await {
                    warn!(database = %config.fire_database, "Schema bootstrap failed: {}", e);
                }
                if let Err(e) = video.ensure_schema().await {
                    warn!(database = %config.video_database, "Schema bootstrap failed: {}", e);
                }

                info!(
                    host = %config.host,
                    port = config.port,
                    fire_database = %config.fire_database,
                    video_database = %config.video_database,
                    "Using MySQL log store"
                );
                Self::new(Arc::new(fire), Arc::new(video))
            }
        }
    }

    /// Probe both backends.
    pub async fn ping(&self) -> StoreResult<()> {
        self.fire.ping().await?;
        self.video.ping().await
    }
}
