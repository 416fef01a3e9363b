//! Public IP change detection.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use meerkat_telegram::TaskFunction;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{FeedError, Result};
use crate::persist::IpStore;

/// Some resolvers refuse programmatic clients.
const USER_AGENT: &str = "curl/7.74.0";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_BODY_LEN: usize = "1.1.1.1".len();
const MAX_BODY_LEN: usize = "255.255.255.255".len();

pub struct PublicIpResolver {
    client: Client,
    url: String,
    store: IpStore,
    last: Mutex<Option<IpAddr>>,
}

impl PublicIpResolver {
    pub fn new(url: impl Into<String>, store: IpStore) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let last = store.read();
        if let Some(ip) = last {
            info!("🌐 Public IP: last known address {}", ip);
        }

        Ok(Self {
            client,
            url: url.into(),
            store,
            last: Mutex::new(last),
        })
    }

    pub fn last_known(&self) -> Option<IpAddr> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the current public IP when it differs from the last known one,
    /// otherwise an empty string. Failures are logged and also give "".
    pub async fn changed_ip(&self, cancel: &CancellationToken) -> String {
        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FeedError::Cancelled),
            current = self.fetch() => current,
        };
        let current = match current {
            Ok(ip) => ip,
            Err(e) => {
                warn!("🌐 Public IP: error getting public IP: {}", e);
                return String::new();
            }
        };

        {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            if *last == Some(current) {
                return String::new();
            }
            *last = Some(current);
        }
        self.store.write(&current);
        current.to_string()
    }

    async fn fetch(&self) -> Result<IpAddr> {
        let response = self.client.get(&self.url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(FeedError::Status(response.status().as_u16()));
        }
        if let Some(length) = response.content_length() {
            if length > MAX_BODY_LEN as u64 + 1 {
                return Err(FeedError::LongResponse(length));
            }
        }

        let body = response.text().await?;
        let body = body.trim();
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body.len()) {
            return Err(FeedError::InvalidIp(body.chars().take(MAX_BODY_LEN + 1).collect()));
        }
        body.parse()
            .map_err(|_| FeedError::InvalidIp(body.to_string()))
    }
}

#[async_trait]
impl TaskFunction for PublicIpResolver {
    async fn report(&self, cancel: &CancellationToken) -> String {
        self.changed_ip(cancel).await
    }
}
