//! Fixed-cadence output timer

use std::time::Duration;
use tokio::time::Instant;

/// Default spacing between delivered segments
pub const DEFAULT_OUTPUT_INTERVAL: Duration = Duration::from_millis(500);

/// Whether the driver is currently ticking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
}

/// Timer that paces segment delivery.
///
/// `start` arms the driver so the first tick fires immediately and every
/// following tick fires one interval after the previous one. The only timer
/// state is the next deadline, so `stop` leaves nothing behind that could fire
/// later.
#[derive(Debug, Clone)]
pub struct PacedDriver {
    interval: Duration,
    next_fire: Option<Instant>,
}

impl PacedDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> DriverState {
        if self.next_fire.is_some() {
            DriverState::Running
        } else {
            DriverState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_fire.is_some()
    }

    /// Start ticking. Returns `false` (and changes nothing) if already running.
    pub fn start(&mut self) -> bool {
        if self.next_fire.is_some() {
            return false;
        }
        self.next_fire = Some(Instant::now());
        true
    }

    /// Stop ticking. Returns whether the driver was running.
    pub fn stop(&mut self) -> bool {
        self.next_fire.take().is_some()
    }

    /// Wait for the next tick.
    ///
    /// Never resolves while idle. Cancel safe: dropping the future before it
    /// resolves leaves the deadline untouched.
    pub async fn tick(&mut self) {
        let Some(deadline) = self.next_fire else {
            return std::future::pending().await;
        };
        tokio::time::sleep_until(deadline).await;
        self.next_fire = Some(Instant::now() + self.interval);
    }
}

impl Default for PacedDriver {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_INTERVAL)
    }
}
