/// Webhook notification sender
use super::{Notification, NotificationSender};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Posts each notification as JSON to a delivery webhook
pub struct HttpNotificationSender {
    client: reqwest::Client,
    url: String,
}

impl HttpNotificationSender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build notification HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send(&self, notification: Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await
            .context("notification webhook unreachable")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("notification webhook returned {status}"));
        }
        Ok(())
    }
}
