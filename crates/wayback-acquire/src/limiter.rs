use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of snapshot retrievals running at once.
///
/// A worker that gets the last free slot waits `saturation_pause` before
/// proceeding so that bursts of releases don't turn straight into bursts of
/// requests.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
    saturation_pause: Duration,
}

/// A held slot. Dropping it frees the slot, whatever happened to the worker.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize, saturation_pause: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            saturation_pause,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Wait for a free slot. `None` once the limiter has been closed.
    pub async fn admit(&self) -> Option<Admission> {
        let permit = Arc::clone(&self.slots).acquire_owned().await.ok()?;
        if self.slots.available_permits() == 0 && !self.saturation_pause.is_zero() {
            tracing::trace!(capacity = self.capacity, "Limiter saturated, pausing");
            tokio::time::sleep(self.saturation_pause).await;
        }
        Some(Admission { _permit: permit })
    }

    /// Refuse every waiting and future admission.
    pub fn close(&self) {
        self.slots.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_admission_is_bounded() {
        let limiter = ConcurrencyLimiter::new(3, Duration::ZERO);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                let _slot = limiter.admit().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn test_slot_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(1, Duration::ZERO);
        {
            let _slot = limiter.admit().await;
            assert_eq!(limiter.in_use(), 1);
        }
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn test_slot_released_when_task_panics() {
        let limiter = ConcurrencyLimiter::new(1, Duration::ZERO);
        let held = limiter.clone();
        let result = tokio::spawn(async move {
            let _slot = held.admit().await;
            panic!("worker blew up");
        })
        .await;
        assert!(result.is_err());
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn test_saturated_admission_pauses() {
        let limiter = ConcurrencyLimiter::new(1, Duration::from_millis(50));
        let started = std::time::Instant::now();
        let _slot = limiter.admit().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_closed_limiter_refuses_admission() {
        let limiter = ConcurrencyLimiter::new(1, Duration::ZERO);
        let held = limiter.admit().await;
        assert!(held.is_some());

        let waiter = limiter.clone();
        let waiting = tokio::spawn(async move { waiter.admit().await.is_none() });
        tokio::task::yield_now().await;
        limiter.close();

        assert!(waiting.await.unwrap());
        assert!(limiter.admit().await.is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let limiter = ConcurrencyLimiter::new(0, Duration::ZERO);
        assert_eq!(limiter.capacity(), 1);
    }
}
