use serde::{Deserialize, Serialize};

use super::HostIndex;

/// Lifecycle of one host's execution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotPhase {
    /// Host is waiting for admission.
    Pending,
    /// Client process spawned; output streams are open.
    Running,
    /// Process has exited; buffered output is still being flushed.
    Draining,
    /// Output flushed, resources released, slot removed from the pool.
    Done,
}

impl SlotPhase {
    /// Returns `true` while the slot counts against the concurrency bound.
    pub fn is_active(&self) -> bool {
        matches!(self, SlotPhase::Running | SlotPhase::Draining)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPhase::Pending => "pending",
            SlotPhase::Running => "running",
            SlotPhase::Draining => "draining",
            SlotPhase::Done => "done",
        }
    }
}

/// A single phase change, recorded in the order the scheduler observed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Admission index of the host.
    pub index: HostIndex,
    /// Host label (`user@host[:port]`).
    pub label: String,
    /// Phase entered.
    pub phase: SlotPhase,
    /// Pool occupancy right after the transition.
    pub active: usize,
}
