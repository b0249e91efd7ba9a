//! Moving-average wait-time estimation
//!
//! Estimates are advisory projections, recomputed after every mutation that
//! changes the waiting set. They never gate admission or selection.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Rolling estimator over recently observed service durations
///
/// Until the first completion lands, the configured default service duration
/// stands in for the average so early estimates are never zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitEstimator {
    /// Most recent observed service durations, oldest first
    recent: VecDeque<u32>,
    /// How many completions the moving average covers
    window: usize,
    /// Fallback used while `recent` is empty
    default_service_minutes: u32,
}

impl WaitEstimator {
    pub fn new(window: usize, default_service_minutes: u32) -> Self {
        WaitEstimator {
            recent: VecDeque::with_capacity(window),
            window,
            default_service_minutes,
        }
    }

    /// Record an observed service duration, evicting beyond the window
    pub fn record_completion(&mut self, service_minutes: u32) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(service_minutes);
    }

    /// Current average service duration in minutes
    pub fn average_service_minutes(&self) -> f64 {
        if self.recent.is_empty() {
            return f64::from(self.default_service_minutes);
        }
        let total: u64 = self.recent.iter().map(|&m| u64::from(m)).sum();
        total as f64 / self.recent.len() as f64
    }

    /// Projected wait for an entry with `ahead` active entries before it
    pub fn estimate(&self, ahead: usize) -> u32 {
        (ahead as f64 * self.average_service_minutes()).round() as u32
    }

    /// Number of completions currently inside the window
    pub fn observed(&self) -> usize {
        self.recent.len()
    }
}
