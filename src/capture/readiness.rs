//! Host readiness: waiting for the host integration without hanging.
//!
//! The host bootstrap publishes the host exactly once through a
//! [`HostSlot`]. Sessions wait on the slot for a bounded budget. Hosts that
//! cannot signal readiness are probed with [`poll_until_ready`] instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Bounded wait policy: `max_attempts` checks spaced `interval_ms` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_attempts: 20,
        }
    }
}

impl ReadinessPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Total time a waiter may spend before giving up.
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_attempts
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Capture host not available after {attempts} attempts ({waited_ms}ms)")]
pub struct HostUnavailable {
    pub attempts: u32,
    pub waited_ms: u128,
}

/// Once-resolved publication point for the host integration.
pub struct HostSlot<H> {
    tx: watch::Sender<Option<Arc<H>>>,
}

impl<H> HostSlot<H> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// A slot that is ready from the start.
    pub fn ready_with(host: H) -> Self {
        let slot = Self::new();
        slot.announce(host);
        slot
    }

    /// Publishes the host. Only the first announcement takes effect.
    pub fn announce(&self, host: H) -> bool {
        let mut host = Some(host);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = host.take().map(Arc::new);
            true
        })
    }

    pub fn current(&self) -> Option<Arc<H>> {
        self.tx.borrow().clone()
    }

    /// Waits until the host has been announced, at most `policy.budget()`.
    pub async fn ready(&self, policy: &ReadinessPolicy) -> Result<Arc<H>, HostUnavailable> {
        if let Some(host) = self.current() {
            return Ok(host);
        }

        log::warn!(
            "[CAPTURE] Host not ready yet, waiting up to {}ms",
            policy.budget().as_millis()
        );

        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(policy.budget(), async {
            rx.wait_for(|host| host.is_some())
                .await
                .ok()
                .and_then(|host| host.clone())
        })
        .await;

        match waited {
            Ok(Some(host)) => Ok(host),
            _ => Err(HostUnavailable {
                attempts: policy.max_attempts,
                waited_ms: policy.budget().as_millis(),
            }),
        }
    }
}

impl<H> Default for HostSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Portable fallback: calls `probe` until it yields a value, sleeping
/// `policy.interval()` between attempts, at most `policy.max_attempts` times.
pub async fn poll_until_ready<T, F>(
    policy: &ReadinessPolicy,
    mut probe: F,
) -> Result<T, HostUnavailable>
where
    F: FnMut() -> Option<T>,
{
    let start = std::time::Instant::now();

    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe() {
            if attempt > 1 {
                log::info!("[CAPTURE] Host ready after {} attempts", attempt);
            }
            return Ok(value);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }

    Err(HostUnavailable {
        attempts: policy.max_attempts,
        waited_ms: start.elapsed().as_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> ReadinessPolicy {
        ReadinessPolicy {
            interval_ms: 5,
            max_attempts: 4,
        }
    }

    #[tokio::test]
    async fn ready_returns_announced_host() {
        let slot = HostSlot::ready_with(7u32);
        let host = slot.ready(&fast_policy()).await.unwrap();
        assert_eq!(*host, 7);
    }

    #[tokio::test]
    async fn ready_waits_for_late_announcement() {
        let slot = Arc::new(HostSlot::<u32>::new());
        let bootstrap = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            bootstrap.announce(3);
        });

        let policy = ReadinessPolicy {
            interval_ms: 50,
            max_attempts: 20,
        };
        assert_eq!(*slot.ready(&policy).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ready_gives_up_after_budget() {
        let slot = HostSlot::<u32>::new();
        let err = slot.ready(&fast_policy()).await.unwrap_err();
        assert_eq!(err.attempts, 4);
    }

    #[test]
    fn only_first_announcement_wins() {
        let slot = HostSlot::new();
        assert!(slot.announce("first"));
        assert!(!slot.announce("second"));
        assert_eq!(*slot.current().unwrap(), "first");
    }

    #[tokio::test]
    async fn poll_succeeds_on_later_attempt() {
        let mut calls = 0;
        let value = poll_until_ready(&fast_policy(), || {
            calls += 1;
            (calls == 3).then_some("up")
        })
        .await
        .unwrap();
        assert_eq!(value, "up");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn poll_is_bounded() {
        let mut calls = 0;
        let result: Result<(), _> = poll_until_ready(&fast_policy(), || {
            calls += 1;
            None
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }
}
