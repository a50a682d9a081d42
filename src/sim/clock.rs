//! Discrete global clock.
//!
//! Time is a tick count that only moves when the driver advances it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct SimClock {
    current: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(tick: u64) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(tick)),
        }
    }

    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn advance_by(&self, ticks: u64) -> u64 {
        self.current.fetch_add(ticks, Ordering::SeqCst) + ticks
    }
}

impl Clock for SimClock {
    fn now(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}
