//! Periodic PING schedule owned by the dispatcher.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// A cancellable ping timer. Stopped timers never fire.
#[derive(Debug)]
pub struct KeepAlive {
    period: Duration,
    interval: Option<Interval>,
}

impl KeepAlive {
    /// A zero `period` disables pings entirely.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Starts (or restarts) the schedule; the first ping is one period away.
    pub fn start(&mut self) {
        if self.period.is_zero() {
            return;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Completes when the next ping is due; pends forever while stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let mut keepalive = KeepAlive::new(Duration::from_secs(15));
        keepalive.start();
        let started = Instant::now();

        keepalive.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        keepalive.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_fires() {
        let mut keepalive = KeepAlive::new(Duration::from_secs(1));
        keepalive.start();
        keepalive.stop();
        assert!(!keepalive.is_running());

        let fired = tokio::time::timeout(Duration::from_secs(10), keepalive.tick()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn zero_period_disables() {
        let mut keepalive = KeepAlive::new(Duration::ZERO);
        keepalive.start();
        assert!(!keepalive.is_running());
    }
}
