//! Stock chat commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use meerkat_core::{Attachment, OutboundEvent};
use meerkat_telegram::{CommandHandler, InboundMessage};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::temperature::{MAX_RETRIES, TemperatureSensor};

pub const SNAPSHOT_FILE_NAME: &str = "snapshot.jpg";
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// `/ping`: liveness check.
pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn handle(&self, _message: &InboundMessage, _cancel: &CancellationToken) -> anyhow::Result<OutboundEvent> {
        Ok(OutboundEvent::text("pong"))
    }
}

/// `/temp`: current sensor reading with its timestamp.
pub struct TempCommand {
    sensor: Arc<TemperatureSensor>,
}

impl TempCommand {
    pub fn new(sensor: Arc<TemperatureSensor>) -> Self {
        Self { sensor }
    }
}

#[async_trait]
impl CommandHandler for TempCommand {
    async fn handle(&self, _message: &InboundMessage, cancel: &CancellationToken) -> anyhow::Result<OutboundEvent> {
        let text = match self.sensor.read_with_retries(MAX_RETRIES, cancel).await {
            Ok(reading) => format!(
                "{:.1} ℃ 🌡 on {}",
                reading.celsius(),
                reading.taken_at.format("%b %-d %H:%M:%S")
            ),
            Err(e) => format!("🌡 sensor unavailable: {}", e),
        };
        Ok(OutboundEvent::text(text))
    }
}

/// `/pic`: downloads a camera snapshot and replies with it as a photo.
pub struct PictureCommand {
    client: Client,
    url: String,
}

impl PictureCommand {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(SNAPSHOT_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn download(&self) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("fetching {}", self.url))?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl CommandHandler for PictureCommand {
    async fn handle(&self, _message: &InboundMessage, cancel: &CancellationToken) -> anyhow::Result<OutboundEvent> {
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => bail!("snapshot download cancelled"),
            data = self.download() => data?,
        };
        info!("📷 Snapshot: downloaded {} bytes", data.len());
        Ok(OutboundEvent::photo(Attachment::memory(SNAPSHOT_FILE_NAME, data), None))
    }
}
