//! Seat accounting for a session
//!
//! The ledger is the single source of truth for occupancy. A seat is taken
//! at admission and given back only when the entry stops counting as active;
//! skipped entries keep their seat because the customer is still on premises
//! awaiting a re-queue decision.

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Occupancy ledger with a hard capacity bound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityLedger {
    max_capacity: u32,
    occupied: u32,
}

impl CapacityLedger {
    pub fn new(max_capacity: u32) -> Self {
        CapacityLedger {
            max_capacity,
            occupied: 0,
        }
    }

    /// Take a seat, or refuse with `QueueFull` when none is free
    ///
    /// Refusal is immediate; there is no overflow list.
    pub fn try_admit(&mut self) -> Result<()> {
        if self.occupied >= self.max_capacity {
            return Err(QueueError::QueueFull);
        }
        self.occupied += 1;
        Ok(())
    }

    /// Give a seat back
    pub fn release(&mut self) {
        debug_assert!(self.occupied > 0, "released more seats than were taken");
        self.occupied = self.occupied.saturating_sub(1);
    }

    /// Raise or lower the bound
    ///
    /// Lowering below the current occupancy is allowed: existing entries are
    /// never evicted, the session just refuses admissions until occupancy
    /// drops under the new bound.
    pub fn set_max_capacity(&mut self, max_capacity: u32) {
        self.max_capacity = max_capacity;
    }

    pub fn occupied(&self) -> u32 {
        self.occupied
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn is_full(&self) -> bool {
        self.occupied >= self.max_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_past_capacity_is_refused() {
        let mut ledger = CapacityLedger::new(2);
        ledger.try_admit().unwrap();
        ledger.try_admit().unwrap();
        assert!(matches!(ledger.try_admit(), Err(QueueError::QueueFull)));
        assert_eq!(ledger.occupied(), 2);
    }

    #[test]
    fn release_frees_a_seat() {
        let mut ledger = CapacityLedger::new(1);
        ledger.try_admit().unwrap();
        assert!(ledger.is_full());
        ledger.release();
        ledger.try_admit().unwrap();
    }

    #[test]
    fn shrinking_below_occupancy_blocks_admissions_only() {
        let mut ledger = CapacityLedger::new(5);
        for _ in 0..4 {
            ledger.try_admit().unwrap();
        }
        ledger.set_max_capacity(2);
        assert_eq!(ledger.occupied(), 4);
        assert!(matches!(ledger.try_admit(), Err(QueueError::QueueFull)));
        ledger.release();
        ledger.release();
        ledger.release();
        ledger.try_admit().unwrap();
    }
}
