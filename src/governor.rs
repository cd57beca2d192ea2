//! Sliding-window admission control for outbound upstream calls.
//! At most `max_requests` admissions fall inside any trailing `window`. A denied
//! caller sleeps until the oldest recorded admission leaves the window.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{RelayError, Result};

pub struct RateGovernor {
    admitted: Mutex<VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateGovernor {
    pub fn new(max_requests: usize, window: Duration) -> Result<Self> {
        if max_requests == 0 || window.is_zero() {
            return Err(RelayError::Config(
                "rate governor needs a positive limit and window".into(),
            ));
        }
        Ok(Self {
            admitted: Mutex::new(VecDeque::with_capacity(max_requests)),
            max_requests,
            window,
        })
    }

    /// Wait until a request fits in the window, then record it.
    /// Returns how long the caller was held back.
    pub async fn admit(&self) -> Duration {
        let start = Instant::now();
        loop {
            let wake_at = {
                let mut admitted = self.admitted.lock();
                let now = Instant::now();
                self.prune(&mut admitted, now);
                if admitted.len() < self.max_requests {
                    admitted.push_back(now);
                    return now.duration_since(start);
                }
                // Oldest slot frees up exactly one window after it was taken.
                match admitted.front() {
                    Some(oldest) => *oldest + self.window,
                    None => now,
                }
            };
            debug!(
                wait_ms = wake_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "admission window full, waiting"
            );
            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Admissions currently inside the window.
    pub fn in_flight(&self) -> usize {
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, Instant::now());
        admitted.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admitted.front() {
            if now.duration_since(*oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_without_waiting() {
        let gov = RateGovernor::new(2, Duration::from_secs(1)).unwrap();
        assert_eq!(gov.admit().await, Duration::ZERO);
        assert_eq!(gov.admit().await, Duration::ZERO);
        assert_eq!(gov.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn third_request_waits_for_window() {
        let gov = RateGovernor::new(2, Duration::from_secs(1)).unwrap();
        gov.admit().await;
        gov.admit().await;
        let waited = gov.admit().await;
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn slots_free_after_window_elapses() {
        let gov = RateGovernor::new(1, Duration::from_millis(500)).unwrap();
        gov.admit().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(gov.in_flight(), 0);
        assert_eq!(gov.admit().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_admissions_respect_window() {
        let window = Duration::from_secs(1);
        let gov = Arc::new(RateGovernor::new(2, window).unwrap());
        let stamps = Arc::new(Mutex::new(Vec::new()));

        let tasks: Vec<_> = (0..9)
            .map(|_| {
                let gov = Arc::clone(&gov);
                let stamps = Arc::clone(&stamps);
                tokio::spawn(async move {
                    gov.admit().await;
                    stamps.lock().push(Instant::now());
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        let mut stamps = stamps.lock().clone();
        stamps.sort();
        assert_eq!(stamps.len(), 9);
        for (i, start) in stamps.iter().enumerate() {
            let inside = stamps[i..]
                .iter()
                .take_while(|t| t.duration_since(*start) < window)
                .count();
            assert!(inside <= 2, "{inside} admissions within one window");
        }
        // 9 requests at 2/s need at least four full windows.
        assert!(stamps[8].duration_since(stamps[0]) >= Duration::from_secs(4));
    }

    #[test]
    fn rejects_degenerate_limits() {
        assert!(RateGovernor::new(0, Duration::from_secs(1)).is_err());
        assert!(RateGovernor::new(2, Duration::ZERO).is_err());
    }
}
