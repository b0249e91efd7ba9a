//! Queue sessions: one queue per location per calendar day

pub mod capacity;
pub mod core;

pub use capacity::CapacityLedger;
pub use core::{
    AdmitRequest, QueueSession, QueueSnapshot, SessionSettings, SessionStats, SessionStatus,
};
