//! Simulated upload for when the real endpoint is not available yet.
//!
//! Progress is derived purely from elapsed ticks at a fixed bandwidth, so the
//! sequence of reported values depends only on the file size and the rate.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::error::TransferError;
use super::{ProgressInfo, UploadRequest, Uploader};
use crate::config::TransferConfig;

pub struct MockUploader {
    rate_mbps: f64,
    tick: Duration,
}

impl MockUploader {
    pub fn new(rate_mbps: f64, tick: Duration) -> Self {
        Self {
            rate_mbps,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.mock_rate_mbps, config.mock_tick)
    }

    fn bytes_per_second(&self) -> f64 {
        self.rate_mbps * 1_000_000.0 / 8.0
    }

    /// Time a file of `size` bytes would take at the simulated rate.
    ///
    /// `None` when the rate is not positive or the result does not fit in a
    /// `Duration`.
    pub fn duration_for(&self, size: u64) -> Option<Duration> {
        let bytes_per_second = self.bytes_per_second();
        if !(bytes_per_second.is_finite() && bytes_per_second > 0.0) {
            return None;
        }
        Duration::try_from_secs_f64(size as f64 / bytes_per_second).ok()
    }

    fn loaded_after(&self, elapsed: Duration, total: u64) -> u64 {
        let loaded = (elapsed.as_secs_f64() * self.bytes_per_second()).floor() as u64;
        loaded.min(total)
    }
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<(), TransferError> {
        let path = &request.file.path;
        let total = tokio::fs::metadata(path)
            .await
            .map_err(|source| TransferError::File {
                path: path.clone(),
                source,
            })?
            .len();

        let start = Instant::now();
        let (duration, deadline) = self
            .duration_for(total)
            .and_then(|duration| Some((duration, start.checked_add(duration)?)))
            .ok_or(TransferError::MockRate {
                rate_mbps: self.rate_mbps,
                size: total,
            })?;
        debug!(
            "Simulating upload of {} ({} bytes) over {:?}",
            path.display(),
            total,
            duration
        );

        let first_tick = start.checked_add(self.tick).unwrap_or(deadline);
        let mut ticker = tokio::time::interval_at(first_tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    ticks = ticks.saturating_add(1);
                    let loaded = self.loaded_after(self.tick.saturating_mul(ticks), total);
                    request.report(ProgressInfo::new(loaded, total));
                }
            }
        }

        request.report(ProgressInfo::new(total, total));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Simulated upload with the default 25 Mbps rate and 50 ms tick
pub async fn upload_mock(request: &UploadRequest) -> Result<(), TransferError> {
    MockUploader::default().upload(request).await
}
