/// Wiring of the production collaborators behind `MessageService`
use crate::capability::CapabilityVerifier;
use crate::config::Config;
use crate::db::PgMessageRepository;
use crate::notifications::{
    HttpNotificationSender, NoopNotificationSender, NotificationFanout, NotificationSender,
};
use crate::services::{AttachmentProcessor, FfmpegFrameExtractor, MessageService};
use crate::storage::S3BlobStore;
use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Open the pool and bring the schema up to date
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run database migrations")?;

    info!(
        max_connections = config.database.max_connections,
        "database ready"
    );
    Ok(pool)
}

/// Build a ready-to-use `MessageService` from configuration
pub async fn connect(config: &Config) -> Result<MessageService> {
    let verifier = CapabilityVerifier::from_pem(
        &config.capability.public_key_pem,
        config.app.external_address.clone(),
    )
    .context("load capability public key")?;

    let pool = connect_database(config).await?;
    let repo = Arc::new(PgMessageRepository::new(pool));

    let store = Arc::new(S3BlobStore::from_config(&config.storage).await);
    let frames = Arc::new(FfmpegFrameExtractor::new(
        config.media.ffmpeg_path.clone(),
        config.media.ffmpeg_timeout(),
    ));
    let attachments = AttachmentProcessor::new(store, frames, config.media.jpeg_quality);

    let sender: Arc<dyn NotificationSender> = if config.notifications.webhook_url.is_empty() {
        warn!("NOTIFICATION_WEBHOOK_URL not set; notifications will be dropped");
        Arc::new(NoopNotificationSender)
    } else {
        Arc::new(HttpNotificationSender::new(
            config.notifications.webhook_url.clone(),
            config.notifications.timeout(),
        )?)
    };

    info!(
        env = %config.app.env,
        hub = %config.app.external_address,
        bucket = %config.storage.bucket,
        "message hub initialized"
    );

    Ok(MessageService::new(
        repo,
        attachments,
        verifier,
        NotificationFanout::new(sender),
    ))
}
