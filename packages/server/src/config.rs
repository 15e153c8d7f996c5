use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Admin account created on startup when no admin with that email exists.
#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Student and admin tokens are signed with independent secrets.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub student_jwt_secret: String,
    pub admin_jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory backing `/uploads/<filename>` references.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    /// Maximum size of a single upload in bytes. Default: 10 MB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PointsConfig {
    /// Points granted once when an ERP profile is verified. Default: 50.
    #[serde(default = "default_erp_verification_points")]
    pub erp_verification: i32,
}

fn default_erp_verification_points() -> i32 {
    50
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            erp_verification: default_erp_verification_points(),
        }
    }
}

/// Outbound email relay. When disabled, notifications are only logged.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    /// HTTP endpoint of the mail relay accepting JSON messages.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mail_from")]
    pub from: String,
}

fn default_mail_from() -> String {
    "no-reply@achievements.local".into()
}

/// External image-understanding model used by the certificate validator.
#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Full URL of the generate-content endpoint.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vision_timeout_secs() -> u64 {
    30
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_vision_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DetectorConfig {
    /// Offset from UTC of the institution's clock, used by the night-time
    /// submission check.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl DetectorConfig {
    /// Institution clock offset. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!(
                utc_offset_minutes = self.utc_offset_minutes,
                "Invalid detector UTC offset; using UTC"
            );
            Utc.fix()
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., ERP__AUTH__ADMIN_JWT_SECRET)
            .add_source(Environment::with_prefix("ERP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
