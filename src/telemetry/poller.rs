// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device polling tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::command::request_settings_frame;
use crate::protocol::FramePublisher;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the polling task of every device so they can be stopped together.
#[derive(Debug, Default)]
pub(crate) struct PollerSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PollerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts one task per device that publishes the settings request every
    /// `interval`. The first request goes out after one full interval.
    ///
    /// Ticks are skipped while `online` is false.
    pub(crate) fn start<P>(
        &self,
        publisher: &P,
        device_ids: &[String],
        interval: Duration,
        online: &Arc<AtomicBool>,
    ) where
        P: FramePublisher + Clone + 'static,
    {
        let period = interval.max(MIN_POLL_INTERVAL);
        let mut handles = self.handles.lock();

        for device_id in device_ids {
            let publisher = publisher.clone();
            let device_id = device_id.clone();
            let online = Arc::clone(online);

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    if !online.load(Ordering::Acquire) {
                        continue;
                    }
                    if let Err(e) = publisher
                        .publish_frame(&device_id, request_settings_frame())
                        .await
                    {
                        tracing::warn!(device = %device_id, error = %e, "Settings request failed");
                    }
                }
            }));
        }

        tracing::debug!(count = device_ids.len(), period_ms = period.as_millis(), "Pollers started");
    }

    /// Returns the number of running pollers.
    pub(crate) fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Aborts every poller.
    pub(crate) fn stop_all(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for handle in &handles {
            handle.abort();
        }
        tracing::debug!(count = handles.len(), "Pollers stopped");
    }
}

impl Drop for PollerSet {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::RecordingPublisher;

    fn ids() -> Vec<String> {
        vec!["AABB".to_string(), "CCDD".to_string()]
    }

    fn online() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_after_one_interval() {
        let publisher = RecordingPublisher::new();
        let pollers = PollerSet::new();
        pollers.start(&publisher, &ids(), Duration::from_secs(2), &online());
        assert_eq!(pollers.len(), 2);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(publisher.published().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(publisher.count_for("AABB"), 1);
        assert_eq!(publisher.count_for("CCDD"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_repeat_with_request_settings_frame() {
        let publisher = RecordingPublisher::new();
        let pollers = PollerSet::new();
        pollers.start(&publisher, &ids(), Duration::from_secs(2), &online());

        tokio::time::sleep(Duration::from_millis(6100)).await;

        assert_eq!(publisher.count_for("AABB"), 3);
        assert!(
            publisher
                .published()
                .iter()
                .all(|(_, frame)| frame == request_settings_frame())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_cancels_pollers() {
        let publisher = RecordingPublisher::new();
        let pollers = PollerSet::new();
        pollers.start(&publisher, &ids(), Duration::from_secs(2), &online());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        pollers.stop_all();
        assert_eq!(pollers.len(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(publisher.count_for("AABB"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_publish_keeps_polling() {
        let publisher = RecordingPublisher::failing();
        let pollers = PollerSet::new();
        pollers.start(&publisher, &ids(), Duration::from_secs(1), &online());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(pollers.len(), 2);
        assert!(pollers.handles.lock().iter().all(|h| !h.is_finished()));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_ticks_are_skipped() {
        let publisher = RecordingPublisher::new();
        let pollers = PollerSet::new();
        let online = Arc::new(AtomicBool::new(false));
        pollers.start(&publisher, &ids(), Duration::from_secs(1), &online);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(publisher.published().is_empty());

        online.store(true, Ordering::Release);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(publisher.count_for("AABB"), 1);
    }
}
