//! Completion handling: exit bookkeeping and slot finalisation.
//!
//! A slot is finalised once its client has been reaped *and* both of its pipes
//! reached end-of-stream, whichever comes last. Finalisation flushes any
//! unterminated tail (stdout first), emits the host's terminal line, releases
//! the sinks and splices the slot out of the pool.
use fanout_model::{HostOutcome, SlotPhase};
use tracing::{debug, trace, warn};

use crate::{pool::SlotId, scheduler::Run, slot::StreamKind};

impl<'a> Run<'a> {
    /// A client exited; record its status and finalise if its pipes are already closed.
    pub(crate) fn on_exit(&mut self, pid: u32, code: Option<i32>) {
        let Some(id) = self.pool.find(|s| s.pid == Some(pid)) else {
            warn!(target: "fanout.exec.reap", pid, "exit for unknown client");
            return;
        };
        let Some(slot) = self.pool.get_mut(id) else {
            return;
        };
        if slot.phase != SlotPhase::Running {
            warn!(target: "fanout.exec.reap", host = %slot.host, pid, phase = slot.phase.as_str(), "duplicate exit ignored");
            return;
        }

        let outcome = HostOutcome::from_code(code);
        debug!(target: "fanout.exec.reap", host = %slot.host, pid, code = ?outcome.code(), "client exited");
        slot.pid = None;
        slot.outcome = Some(outcome);
        slot.phase = SlotPhase::Draining;
        let (index, host) = (slot.index, slot.host);
        self.transition(index, host, SlotPhase::Draining);

        self.finalize_if_drained(id);
    }

    /// One of the slot's pipes reached end-of-stream.
    pub(crate) fn on_closed(&mut self, id: SlotId, kind: StreamKind) {
        let Some(slot) = self.pool.get_mut(id) else {
            warn!(target: "fanout.exec.reap", slot = %id, stream = kind.ext(), "close for unknown slot");
            return;
        };
        slot.stream_mut(kind).open = false;
        trace!(target: "fanout.exec.reap", host = %slot.host, stream = kind.ext(), "stream closed");
        self.finalize_if_drained(id);
    }

    fn finalize_if_drained(&mut self, id: SlotId) {
        if self.pool.get(id).is_some_and(|s| s.is_drained()) {
            self.finalize(id);
        }
    }

    fn finalize(&mut self, id: SlotId) {
        self.done += 1;
        let progress = self.progress();
        let Some(slot) = self.pool.get_mut(id) else {
            return;
        };
        let host = slot.host;

        let mut emitted = false;
        for kind in StreamKind::ALL {
            let stream = slot.stream_mut(kind);
            if let Some(tail) = stream.buffer.take_partial() {
                emitted |= self.fmt.record(host, kind, &tail, progress, stream.sink.as_mut());
            }
        }
        slot.produced_output |= emitted;

        let outcome = slot
            .outcome
            .clone()
            .unwrap_or_else(|| HostOutcome::from_code(None));
        self.fmt.finish(host, &outcome, slot.produced_output, progress);

        let Some(removed) = self.pool.remove(id) else {
            return;
        };
        let index = removed.value.index;
        removed.value.release();
        self.active = self.active.saturating_sub(1);
        if removed.next.is_none() {
            trace!(target: "fanout.exec.reap", done = self.done, "pool empty");
        }

        self.report.outcomes.push((index, outcome));
        self.transition(index, host, SlotPhase::Done);
    }
}
