use std::collections::VecDeque;
use std::time::Duration;

/// Per-tick streaming statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub tiles_loaded_this_tick: usize,
    pub tiles_unloaded_this_tick: usize,
    pub resident_tiles: usize,
    /// Built contents attached to their container this tick.
    pub contents_applied: usize,
    pub builds_failed: usize,
    /// Completions dropped because their tile was unloaded or replaced.
    pub results_discarded: usize,
    /// Re-bases since streaming started.
    pub total_rebases: u64,
    pub tick_time: Duration,
}

/// Rolling window of tick durations.
#[derive(Debug, Clone)]
pub struct TickTimer {
    window: VecDeque<Duration>,
    capacity: usize,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(dt);
    }

    pub fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        self.window.iter().sum::<Duration>() / self.window.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.window.iter().copied().max().unwrap_or_default()
    }

    pub fn min(&self) -> Duration {
        self.window.iter().copied().min().unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.window.len()
    }
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(120)
    }
}
