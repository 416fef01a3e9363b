//! 1-wire temperature sensor (`w1_slave`) reader and change monitor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use meerkat_telegram::TaskFunction;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};

pub const MAX_RETRIES: i32 = 10;
/// Reads closer together than this are answered from the cache.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Change in milli-degrees that the monitor reports.
pub const REPORT_THRESHOLD: i64 = 500;
const RETRY_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub milli_celsius: i32,
    pub taken_at: DateTime<Local>,
}

impl Reading {
    pub fn celsius(&self) -> f32 {
        self.milli_celsius as f32 / 1000.0
    }
}

/// Extracts the `t=<milli-degrees>` value from `w1_slave` output.
pub fn parse_reading(raw: &str) -> Result<i32> {
    for line in raw.lines() {
        let tokens: Vec<&str> = line.trim().split(' ').collect();
        if tokens.len() < 2 {
            continue;
        }
        let last = tokens[tokens.len() - 1];
        if !last.starts_with("t=") {
            continue;
        }

        let parts: Vec<&str> = last.split('=').collect();
        let [_, value] = parts.as_slice() else {
            return Err(FeedError::BadTemperature(last.to_string()));
        };
        let value = value
            .parse::<i32>()
            .map_err(|_| FeedError::BadTemperature(last.to_string()))?;
        debug!("🌡 Sensor: scanned temp {}", value);
        return Ok(value);
    }
    Err(FeedError::NoTemperature)
}

pub async fn read_device(path: &Path) -> Result<i32> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_reading(&raw)
}

/// A sensor device plus the last good reading taken from it.
pub struct TemperatureSensor {
    device: PathBuf,
    min_refresh: Duration,
    last: Mutex<Option<(Reading, Instant)>>,
}

impl TemperatureSensor {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            min_refresh: MIN_REFRESH_INTERVAL,
            last: Mutex::new(None),
        }
    }

    pub fn with_min_refresh(mut self, interval: Duration) -> Self {
        self.min_refresh = interval;
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    fn cached(&self) -> Option<(Reading, Instant)> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reads the sensor, retrying up to `retries` extra times (clamped to
    /// 1..=10) while it keeps returning the cached value, which is what a
    /// sensor that has not refreshed yet looks like. Falls back to the cached
    /// reading when every attempt fails.
    pub async fn read_with_retries(&self, retries: i32, cancel: &CancellationToken) -> Result<Reading> {
        let cached = self.cached();
        if let Some((reading, at)) = cached {
            if at.elapsed() < self.min_refresh {
                return Ok(reading);
            }
        }
        let cached_value = cached.map(|(reading, _)| reading.milli_celsius);

        let attempts = retries.clamp(1, MAX_RETRIES) + 1;
        let mut fresh = None;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match read_device(&self.device).await {
                Ok(value) => {
                    fresh = Some(value);
                    if Some(value) != cached_value {
                        break;
                    }
                }
                Err(e) => last_error = Some(e),
            }
            if attempt == attempts {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RETRY_PAUSE) => {}
            }
        }

        if let Some(value) = fresh {
            let reading = Reading {
                milli_celsius: value,
                taken_at: Local::now(),
            };
            *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some((reading, Instant::now()));
            return Ok(reading);
        }

        let error = last_error.unwrap_or(FeedError::Cancelled);
        match cached {
            Some((reading, _)) => {
                warn!("🌡 Sensor: {} unreadable ({}), using cached value", self.device.display(), error);
                Ok(reading)
            }
            None => Err(error),
        }
    }
}

/// Periodic task reporting temperature moves of more than half a degree.
pub struct TemperatureMonitor {
    sensor: Arc<TemperatureSensor>,
    reported: Mutex<Option<i32>>,
}

impl TemperatureMonitor {
    pub fn new(sensor: Arc<TemperatureSensor>) -> Self {
        Self {
            sensor,
            reported: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TaskFunction for TemperatureMonitor {
    async fn report(&self, cancel: &CancellationToken) -> String {
        let reading = match self.sensor.read_with_retries(MAX_RETRIES, cancel).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("🌡 Sensor: error reading temperature: {}", e);
                return String::new();
            }
        };

        let mut reported = self.reported.lock().unwrap_or_else(|e| e.into_inner());
        let moved = match *reported {
            Some(previous) => (i64::from(reading.milli_celsius) - i64::from(previous)).abs() > REPORT_THRESHOLD,
            None => true,
        };
        if !moved {
            return String::new();
        }
        *reported = Some(reading.milli_celsius);
        format!("{:.1} ℃ 🌡", reading.celsius())
    }
}
