use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Queue engine configuration
///
/// Encompasses the defaults applied to newly created sessions, the wait-time
/// estimator parameters, and the broadcast channel sizing.
///
/// # Examples
///
/// ## Default configuration
///
/// ```
/// use queue_engine::QueueEngineConfig;
///
/// let config = QueueEngineConfig::default();
/// assert_eq!(config.session.max_capacity, 50);
/// assert_eq!(config.estimator.completion_window, 20);
/// config.validate().expect("defaults are valid");
/// ```
///
/// ## Custom configuration
///
/// ```
/// use queue_engine::QueueEngineConfig;
///
/// let mut config = QueueEngineConfig::default();
/// config.session.max_capacity = 120;
/// config.session.buffer_minutes = 10;
/// config.validate().expect("configuration should be valid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueEngineConfig {
    /// Defaults applied to sessions created on first admission
    pub session: SessionDefaults,

    /// Wait-time estimator behavior
    pub estimator: EstimatorConfig,

    /// Broadcast event channel sizing
    pub events: EventsConfig,
}

/// Per-session defaults used when a session is auto-created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Maximum number of active entries a session admits (1..=200)
    ///
    /// The (max_capacity + 1)-th admission is refused with `QueueFull`,
    /// never queued.
    pub max_capacity: u32,

    /// Whether clients should advance to the next customer automatically
    /// after a completion
    ///
    /// Surfaced through snapshots; the engine itself never mutates on a
    /// timer or as a side effect of another entry's transition.
    pub auto_advance: bool,

    /// Minutes of grace beyond the estimate before a waiting entry is
    /// considered overdue
    pub buffer_minutes: u32,

    /// Advisory ceiling on how long a customer is expected to wait
    pub max_wait_minutes: u32,

    /// Service duration assumed until enough completions are observed
    pub default_service_minutes: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            max_capacity: 50,
            auto_advance: true,
            buffer_minutes: 15,
            max_wait_minutes: 120,
            default_service_minutes: 30,
        }
    }
}

/// Wait-time estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Number of most recent completions the moving average covers
    ///
    /// With fewer completions than the window, the average spans everything
    /// observed so far.
    pub completion_window: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            completion_window: 20,
        }
    }
}

/// Broadcast channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of the broadcast channel; slow subscribers that lag beyond
    /// this many events miss the overwritten ones
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl QueueEngineConfig {
    /// Validate the configuration
    ///
    /// Returns `Configuration` errors describing the first violated bound.
    pub fn validate(&self) -> Result<()> {
        if !(1..=200).contains(&self.session.max_capacity) {
            return Err(QueueError::configuration(format!(
                "session.max_capacity must be between 1 and 200, got {}",
                self.session.max_capacity
            )));
        }
        if self.session.default_service_minutes == 0 {
            return Err(QueueError::configuration(
                "session.default_service_minutes must be positive",
            ));
        }
        if self.estimator.completion_window == 0 {
            return Err(QueueError::configuration(
                "estimator.completion_window must be at least 1",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(QueueError::configuration(
                "events.channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
