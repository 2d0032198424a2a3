use core::time::Duration;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::time::Instant;

/// Pauses closer together than this are treated as the same pause.
const PAUSE_RESOLUTION: Duration = Duration::from_millis(50);

/// Bounds in-flight hosting requests and lets a rate-limited request hold back its siblings.
///
/// Every request takes a permit through [`Throttler::acquire`]. A request that learns the
/// provider is rate limiting calls [`Throttler::pause_for`], which sets a resume deadline;
/// new permits are not handed out before it. A later pause can only push the deadline out.
#[derive(Debug)]
pub struct Throttler {
    permits: Arc<Semaphore>,
    resume_at: watch::Sender<Option<Instant>>,
}

impl Throttler {
    #[must_use]
    pub fn new(max_in_flight: usize) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            resume_at: watch::Sender::new(None),
        })
    }

    /// Wait out any pause, then take an in-flight slot that is freed when the permit drops.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        while let Some(deadline) = self.active_deadline() {
            tokio::time::sleep_until(deadline).await;
        }

        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.active_deadline().is_some()
    }

    /// Hold back new requests for `duration`.
    ///
    /// Requests already holding a permit keep running. Returns `false` when a pause ending at
    /// about the same time or later is already in place.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;

        self.resume_at.send_if_modified(|current| match *current {
            Some(existing) if existing + PAUSE_RESOLUTION >= until => false,
            _ => {
                *current = Some(until);
                true
            }
        })
    }

    fn active_deadline(&self) -> Option<Instant> {
        let deadline = (*self.resume_at.borrow())?;
        (deadline > Instant::now()).then_some(deadline)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_in_flight_requests_are_bounded() {
        let throttler = Throttler::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let requests = (0..8).map(|_| {
            let throttler = Arc::clone(&throttler);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let _permit = throttler.acquire().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        });

        let _ = futures_util::future::join_all(requests).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pause_holds_back_new_requests() {
        let throttler = Throttler::new(4);
        assert!(throttler.pause_for(Duration::from_millis(200)));
        assert!(throttler.is_paused());

        let start = Instant::now();
        let _permit = throttler.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(190));
        assert!(!throttler.is_paused());
    }

    #[tokio::test]
    async fn test_pause_only_extends() {
        let throttler = Throttler::new(1);
        assert!(throttler.pause_for(Duration::from_millis(300)));
        assert!(!throttler.pause_for(Duration::from_millis(10)));
        assert!(!throttler.pause_for(Duration::from_millis(320)));
        assert!(throttler.pause_for(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_zero_width_still_admits_one() {
        let throttler = Throttler::new(0);
        let _permit = throttler.acquire().await;
    }
}
