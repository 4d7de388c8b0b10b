/// Configuration management for message-hub
///
/// Everything is read from environment variables with development-friendly
/// defaults. Production refuses to start without a capability public key.
use std::fmt;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub capability: CapabilityConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub notifications: NotificationConfig,
}

/// Application settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Address other hubs use to reach this one; matched against token `hub` claims
    pub external_address: String,
    /// `json` or `pretty`
    pub log_format: String,
}

/// Database configuration
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

/// Capability token verification
#[derive(Debug, Clone)]
pub struct CapabilityConfig {
    /// RSA public key (PEM) of the issuing hub
    pub public_key_pem: String,
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, localstack); empty uses the AWS default
    pub endpoint: String,
}

/// Attachment processing
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    pub ffmpeg_timeout_secs: u64,
    /// JPEG quality used when re-encoding rotated images
    pub jpeg_quality: u8,
}

/// Outbound notification delivery
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Webhook receiving notification batches; empty disables delivery
    pub webhook_url: String,
    pub timeout_secs: u64,
}

impl MediaConfig {
    pub fn ffmpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.ffmpeg_timeout_secs)
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = env_or("APP_ENV", "development");
        let is_production = app_env.eq_ignore_ascii_case("production");

        let public_key_pem = std::env::var("CAPABILITY_PUBLIC_KEY_PEM").unwrap_or_default();
        if is_production && public_key_pem.trim().is_empty() {
            return Err("CAPABILITY_PUBLIC_KEY_PEM must be set in production".to_string());
        }

        let external_address = env_or("HUB_EXTERNAL_ADDRESS", "http://localhost:8080");
        if external_address.trim().is_empty() {
            return Err("HUB_EXTERNAL_ADDRESS cannot be empty".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env,
                external_address,
                log_format: env_or("LOG_FORMAT", "pretty"),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/message_hub"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 10),
            },
            capability: CapabilityConfig { public_key_pem },
            storage: StorageConfig {
                bucket: env_or("S3_BUCKET", "message-hub"),
                region: env_or("AWS_REGION", "us-east-1"),
                endpoint: env_or("S3_ENDPOINT", ""),
            },
            media: MediaConfig {
                ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
                ffmpeg_timeout_secs: env_parse("FFMPEG_TIMEOUT_SECS", 30),
                jpeg_quality: env_parse("JPEG_QUALITY", 90),
            },
            notifications: NotificationConfig {
                webhook_url: env_or("NOTIFICATION_WEBHOOK_URL", ""),
                timeout_secs: env_parse("NOTIFICATION_TIMEOUT_SECS", 5),
            },
        })
    }

    /// Load `.env` (if present) and then read the environment
    pub fn load() -> Result<Self, String> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(format!("failed to read .env: {err}"));
            }
        }
        Self::from_env()
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }
}
