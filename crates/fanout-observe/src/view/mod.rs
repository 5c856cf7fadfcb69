use fanout_model::{SlotPhase, Transition};
use tracing::{debug, trace};

#[inline]
pub fn message_for(phase: SlotPhase) -> &'static str {
    match phase {
        SlotPhase::Pending => "host queued for admission",
        SlotPhase::Running => "client spawned",
        SlotPhase::Draining => "client exited; flushing buffered output",
        SlotPhase::Done => "slot released",
    }
}

#[inline]
pub fn log_transition(t: &Transition) {
    let msg = message_for(t.phase);
    let phase = t.phase.as_str();

    match t.phase {
        SlotPhase::Pending | SlotPhase::Draining => {
            trace!(target: "fanout.slot", host = %t.label, phase, "{msg}")
        }
        SlotPhase::Running | SlotPhase::Done => {
            debug!(target: "fanout.slot", host = %t.label, phase, index = t.index, active = t.active, "{msg}")
        }
    }
}
