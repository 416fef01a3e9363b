//! The chat transport seam and its Telegram implementation.

use std::time::Duration;

use async_trait::async_trait;
use meerkat_core::event::{Attachment, MediaMessage};
use meerkat_core::OutboundEvent;
use teloxide::prelude::*;
use teloxide::types::{InputFile, UpdateKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Shutdown, TransportError};
use crate::retry::{RETRY_INTERVAL, retry_till_cancelled};

/// Whole-request timeout of the HTTP client.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Long-poll timeout in seconds; kept under [`HTTP_TIMEOUT`].
const POLL_TIMEOUT_SECS: u32 = 29;
/// Telegram rejects texts longer than 4096 characters.
const MAX_TEXT_CHARS: usize = 4000;
const UPDATES_CAPACITY: usize = 10;

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// Delivers one outbound event to the chat named by its destination.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, event: &OutboundEvent) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: teloxide::Bot,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            bot: teloxide::Bot::with_client(token, client),
        })
    }

    /// Checks the token against the API, retrying until it works or `cancel`
    /// fires.
    pub async fn connect(&self, cancel: &CancellationToken, runtime: &str) -> Result<(), Shutdown> {
        info!("📡 Telegram Gateway Starting...");
        retry_till_cancelled(cancel, RETRY_INTERVAL, runtime, || async {
            let me = self.bot.get_me().await?;
            info!("✅ Telegram Gateway Active as @{}", me.username());
            Ok::<(), TransportError>(())
        })
        .await
    }

    /// Long-polls for updates in the background and forwards text messages.
    /// The returned channel closes once `cancel` fires.
    pub fn spawn_updates(&self, cancel: CancellationToken) -> mpsc::Receiver<InboundMessage> {
        let (tx, rx) = mpsc::channel(UPDATES_CAPACITY);
        let bot = self.bot.clone();

        tokio::spawn(async move {
            let mut offset = 0;
            loop {
                let request = bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS);
                let updates = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    updates = request.send() => updates,
                };

                let updates = match updates {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!("📡 Telegram: polling failed: {}", e);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RETRY_INTERVAL) => continue,
                        }
                    }
                };

                for update in updates {
                    offset = update.id.as_offset();
                    let UpdateKind::Message(message) = update.kind else {
                        continue;
                    };
                    let Some(text) = message.text() else {
                        debug!("📡 Telegram: skipping non-text message in {}", message.chat.id);
                        continue;
                    };

                    let inbound = InboundMessage::new(message.chat.id.0, text);
                    if tx.send(inbound).await.is_err() {
                        debug!("📡 Telegram: update consumer closed");
                        return;
                    }
                }
            }
            info!("📡 Telegram: update polling stopped");
        });

        rx
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        let chat = ChatId(event.destination().ok_or(TransportError::NoDestination)?);
        debug!("📡 Telegram: sending {} to chat_id: {}", event.kind(), chat);

        match event {
            OutboundEvent::Text(msg) => {
                for chunk in split_message(&msg.text, MAX_TEXT_CHARS) {
                    self.bot.send_message(chat, chunk).await?;
                }
            }
            OutboundEvent::Photo(msg) => {
                let mut request = self.bot.send_photo(chat, input_file(msg)?);
                if let Some(caption) = &msg.caption {
                    request = request.caption(caption.clone());
                }
                request.await?;
            }
            OutboundEvent::Video(msg) => {
                let mut request = self.bot.send_video(chat, input_file(msg)?);
                if let Some(caption) = &msg.caption {
                    request = request.caption(caption.clone());
                }
                request.await?;
            }
            OutboundEvent::Document(msg) => {
                let mut request = self.bot.send_document(chat, input_file(msg)?);
                if let Some(caption) = &msg.caption {
                    request = request.caption(caption.clone());
                }
                request.await?;
            }
        }
        Ok(())
    }
}

fn input_file(msg: &MediaMessage) -> Result<InputFile, TransportError> {
    match &msg.attachment {
        Attachment::Path(path) => Ok(InputFile::file(path.clone())),
        Attachment::Memory { file_name, data } => {
            Ok(InputFile::memory(data.to_vec()).file_name(file_name.clone()))
        }
        Attachment::Released => Err(TransportError::Released),
    }
}

/// Splits `text` into pieces of at most `max_chars` characters.
fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut current = text;
    while let Some((cut, _)) = current.char_indices().nth(max_chars) {
        let (chunk, rest) = current.split_at(cut);
        chunks.push(chunk);
        current = rest;
    }
    chunks.push(current);
    chunks
}
