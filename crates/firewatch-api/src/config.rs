//! API configuration.

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Verbose logging
    pub debug: bool,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second on control routes
    pub rate_limit_rps: u32,
    /// Max request body size (uploads included)
    pub max_upload_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_upload_size: 512 * 1024 * 1024, // 512MB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            debug: std::env::var("DEBUG")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.debug),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Detector model settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model used by the webcam loop
    pub realtime_model_path: String,
    /// Model used for uploaded videos
    pub vod_model_path: String,
    /// "cpu", "cuda" or "auto"
    pub device: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            realtime_model_path: "best.onnx".to_string(),
            vod_model_path: "best.onnx".to_string(),
            device: "auto".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            realtime_model_path: std::env::var("REALTIME_MODEL_PATH")
                .unwrap_or(defaults.realtime_model_path),
            vod_model_path: std::env::var("VOD_MODEL_PATH").unwrap_or(defaults.vod_model_path),
            device: std::env::var("INFERENCE_DEVICE").unwrap_or(defaults.device),
        }
    }
}

/// `true`/`1`/`yes`, case-insensitive.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
