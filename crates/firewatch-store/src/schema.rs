//! Table bootstrap.

use sqlx::MySqlPool;
use tracing::info;

use crate::error::StoreResult;

const CREATE_FIRE_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS fire_logs (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    `timestamp` DATETIME NOT NULL,
    confidence DOUBLE NOT NULL,
    image_path VARCHAR(512) NOT NULL,
    INDEX idx_fire_logs_timestamp (`timestamp`)
)
"#;

const CREATE_VIDEO_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS video_logs (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    `timestamp` DATETIME NOT NULL,
    video_path VARCHAR(512) NOT NULL,
    csv_path VARCHAR(512) NOT NULL,
    INDEX idx_video_logs_timestamp (`timestamp`)
)
"#;

/// Create `fire_logs` if it does not exist.
pub async fn ensure_fire_logs(pool: &MySqlPool) -> StoreResult<()> {
    sqlx::query(CREATE_FIRE_LOGS).execute(pool).await?;
    info!("fire_logs table ready");
    Ok(())
}

/// Create `video_logs` if it does not exist.
pub async fn ensure_video_logs(pool: &MySqlPool) -> StoreResult<()> {
    sqlx::query(CREATE_VIDEO_LOGS).execute(pool).await?;
    info!("video_logs table ready");
    Ok(())
}
