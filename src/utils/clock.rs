use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::time::Instant;

/// Source of wall time, monotonic instants and sleeping for the timer. Swapping it out lets tests
/// drive sessions under tokio's paused clock.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);

    /// Wall time at the precision stored in session records.
    fn timestamp(&self) -> DateTime<Utc> {
        self.time().trunc_subsecs(3)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleep_until(self.instant() + duration).await
    }
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Wall clock anchored to a fixed start that advances with tokio time. Under a paused runtime it
/// moves only when tokio auto-advances, which keeps timer tests deterministic.
#[derive(Clone)]
pub struct AnchoredClock {
    start_time: DateTime<Utc>,
    reference: Instant,
}

impl AnchoredClock {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            reference: Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for AnchoredClock {
    fn time(&self) -> DateTime<Utc> {
        self.start_time + self.reference.elapsed()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::{AnchoredClock, Clock};

    #[tokio::test(start_paused = true)]
    async fn anchored_clock_follows_paused_time() {
        let start = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();
        let clock = AnchoredClock::new(start);

        clock.sleep(Duration::from_secs(90)).await;

        assert_eq!((clock.timestamp() - start).num_seconds(), 90);
    }
}
