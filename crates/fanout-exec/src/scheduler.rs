//! Bounded-concurrency admission loop.
//!
//! One loop owns the slot pool. Admission, output rendering and reaping all
//! happen on it, driven by [`SlotEvent`]s from the per-slot reader and watcher
//! tasks. While there are hosts left and the pool has room, pending events are
//! drained without waiting; otherwise the loop parks until an event or the
//! cancellation token wakes it.
use std::{sync::Arc, time::Duration};

use fanout_model::{Host, HostIndex, HostList, HostOutcome, SlotPhase, Transition};
use fanout_observe::log_transition;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::RunConfig,
    error::ExecError,
    format::{Console, Formatter, Progress},
    launch::Launcher,
    limits,
    mux::{SlotEvent, spawn_reader, spawn_watcher},
    pool::{SlotId, SlotPool},
    slot::{Slot, StreamKind},
};

/// Queued events per slot before readers start waiting on the loop.
const EVENTS_PER_SLOT: usize = 16;
/// Time a client gets between SIGTERM and SIGKILL on cancellation.
const KILL_GRACE: Duration = Duration::from_secs(3);

/// Summary of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Hosts in the list.
    pub total: usize,
    /// Hosts whose client was reaped.
    pub processed: usize,
    /// Final outcome per host, in completion order.
    pub outcomes: Vec<(HostIndex, HostOutcome)>,
    /// Highest number of slots active at once.
    pub peak_active: usize,
    /// Every phase change, in the order the loop applied it.
    pub timeline: Vec<Transition>,
    /// The run was interrupted.
    pub cancelled: bool,
    /// Hosts never admitted because of cancellation.
    pub not_started: usize,
}

impl RunReport {
    pub fn outcome(&self, index: HostIndex) -> Option<&HostOutcome> {
        self.outcomes
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, o)| o)
    }

    /// Hosts that did not exit with status 0.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_success()).count()
    }

    /// Position of the first transition of `index` into `phase`.
    pub fn position(&self, index: HostIndex, phase: SlotPhase) -> Option<usize> {
        self.timeline
            .iter()
            .position(|t| t.index == index && t.phase == phase)
    }
}

/// Runs one command across a host list.
pub struct Scheduler {
    cfg: RunConfig,
    launcher: Arc<dyn Launcher>,
    formatter: Formatter,
}

impl Scheduler {
    pub fn new(cfg: RunConfig, launcher: Arc<dyn Launcher>, console: Console) -> Result<Self, ExecError> {
        cfg.validate()?;
        let formatter = Formatter::new(&cfg, console);
        Ok(Self {
            cfg,
            launcher,
            formatter,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    /// Print a line on the console outside of any host's output.
    pub fn notice(&mut self, line: &str) {
        self.formatter.notice(line);
    }

    /// Execute on every host and wait until all slots are released.
    ///
    /// Cancelling `cancel` stops admission and terminates running clients;
    /// the call still returns once their output has been drained.
    #[instrument(level = "debug", skip_all, fields(hosts = hosts.len()))]
    pub async fn run(&mut self, hosts: &HostList, cancel: CancellationToken) -> Result<RunReport, ExecError> {
        let parallel = self.cfg.effective_parallel(hosts.len());
        limits::ensure_fd_budget(parallel);
        self.formatter.set_width(hosts.label_width());

        let (tx, rx) = mpsc::channel(parallel * EVENTS_PER_SLOT);
        info!(target: "fanout.exec.sched", hosts = hosts.len(), parallel, "run started");

        let mut run = Run {
            cfg: &self.cfg,
            launcher: self.launcher.as_ref(),
            fmt: &mut self.formatter,
            hosts,
            parallel,
            pool: SlotPool::with_capacity(parallel),
            tx,
            cancel,
            next: 0,
            active: 0,
            done: 0,
            cancelling: false,
            report: RunReport {
                total: hosts.len(),
                ..RunReport::default()
            },
        };
        run.drive(rx).await;

        let report = run.into_report();
        info!(
            target: "fanout.exec.sched",
            processed = report.processed,
            failures = report.failures(),
            peak = report.peak_active,
            cancelled = report.cancelled,
            "run finished"
        );
        self.formatter
            .notice(&format!("Done. {} hosts processed.", report.processed));
        Ok(report)
    }
}

/// State scoped to one call of [`Scheduler::run`].
pub(crate) struct Run<'a> {
    pub(crate) cfg: &'a RunConfig,
    pub(crate) launcher: &'a dyn Launcher,
    pub(crate) fmt: &'a mut Formatter,
    pub(crate) hosts: &'a HostList,
    pub(crate) parallel: usize,
    pub(crate) pool: SlotPool<Slot<'a>>,
    pub(crate) tx: mpsc::Sender<SlotEvent>,
    pub(crate) cancel: CancellationToken,
    /// Index of the next host to admit.
    pub(crate) next: usize,
    /// Running or draining slots.
    pub(crate) active: usize,
    /// Reaped hosts.
    pub(crate) done: usize,
    pub(crate) cancelling: bool,
    pub(crate) report: RunReport,
}

impl<'a> Run<'a> {
    async fn drive(&mut self, mut rx: mpsc::Receiver<SlotEvent>) {
        let delay = self.cfg.launch_delay;
        let mut next_launch = Instant::now();

        loop {
            if !self.cancelling && self.cancel.is_cancelled() {
                self.begin_cancel();
            }
            let hosts_left = !self.cancelling && self.next < self.hosts.len();
            if !hosts_left && self.pool.is_empty() {
                break;
            }

            if hosts_left && self.pool.len() < self.parallel {
                for _ in 0..self.parallel * EVENTS_PER_SLOT {
                    match rx.try_recv() {
                        Ok(ev) => self.handle(ev),
                        Err(_) => break,
                    }
                }
                if !delay.is_zero() && Instant::now() < next_launch {
                    tokio::select! {
                        _ = sleep_until(next_launch) => {}
                        Some(ev) = rx.recv() => self.handle(ev),
                        _ = self.cancel.cancelled() => self.begin_cancel(),
                    }
                    continue;
                }
                self.admit_next();
                next_launch = Instant::now() + delay;
                continue;
            }

            tokio::select! {
                Some(ev) = rx.recv() => self.handle(ev),
                _ = self.cancel.cancelled(), if !self.cancelling => self.begin_cancel(),
                else => break,
            }
        }
    }

    fn begin_cancel(&mut self) {
        self.cancelling = true;
        warn!(
            target: "fanout.exec.sched",
            running = self.active,
            not_started = self.hosts.len() - self.next,
            "cancelled; stopping running clients"
        );
    }

    fn handle(&mut self, ev: SlotEvent) {
        match ev {
            SlotEvent::Output { slot, stream, chunk } => self.on_output(slot, stream, &chunk),
            SlotEvent::Closed { slot, stream } => self.on_closed(slot, stream),
            SlotEvent::Exited { pid, code } => self.on_exit(pid, code),
        }
    }

    /// Admit the next host: allocate its slot and start the client.
    fn admit_next(&mut self) {
        let index = self.next;
        self.next += 1;
        let Some(host) = self.hosts.get(index) else {
            return;
        };

        let id = self.pool.admit(Slot::new(
            index,
            host,
            self.cfg.line_capacity,
            self.cfg.out_dir.as_deref(),
        ));
        self.transition(index, host, SlotPhase::Pending);

        match self.spawn(id, host) {
            Ok(pid) => {
                if let Some(slot) = self.pool.get_mut(id) {
                    slot.start(pid);
                }
                self.active += 1;
                self.report.peak_active = self.report.peak_active.max(self.active);
                self.transition(index, host, SlotPhase::Running);
            }
            Err(e) => {
                warn!(
                    target: "fanout.exec.sched",
                    host = %host,
                    launcher = self.launcher.name(),
                    error = %e,
                    "spawn failed; skipping host"
                );
                if let Some(removed) = self.pool.remove(id) {
                    removed.value.release();
                }
                self.report
                    .outcomes
                    .push((index, HostOutcome::SpawnFailed { reason: e.to_string() }));
            }
        }
    }

    /// Start the client for `host` and wire its pipes and exit into the loop.
    fn spawn(&self, id: SlotId, host: &Host) -> Result<u32, ExecError> {
        let spawn_err = |reason: String| ExecError::Spawn {
            host: host.label(),
            reason,
        };

        let invocation = self.launcher.invocation(host)?;
        let mut cmd = invocation.command()?;
        cmd.kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| spawn_err("child exited before it could be tracked".into()))?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(spawn_err("output pipes missing".into()));
        };

        spawn_reader(id, StreamKind::Stdout, stdout, self.tx.clone());
        spawn_reader(id, StreamKind::Stderr, stderr, self.tx.clone());
        spawn_watcher(pid, child, self.tx.clone(), self.cancel.child_token(), KILL_GRACE);

        debug!(
            target: "fanout.exec.sched",
            host = %host,
            launcher = self.launcher.name(),
            pid,
            slot = %id,
            "client spawned"
        );
        Ok(pid)
    }

    /// Feed a chunk into the stream's accumulator and render completed records.
    fn on_output(&mut self, id: SlotId, kind: StreamKind, chunk: &[u8]) {
        let progress = self.progress();
        let Some(slot) = self.pool.get_mut(id) else {
            warn!(target: "fanout.exec.mux", slot = %id, "output for unknown slot");
            return;
        };
        let host = slot.host;
        let stream = slot.stream_mut(kind);

        let mut emitted = false;
        for record in stream.buffer.feed(chunk) {
            emitted |= self.fmt.record(host, kind, &record, progress, stream.sink.as_mut());
        }
        slot.produced_output |= emitted;
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress {
            done: self.done,
            total: self.hosts.len(),
        }
    }

    /// Record a phase change in the timeline and the log.
    pub(crate) fn transition(&mut self, index: HostIndex, host: &Host, phase: SlotPhase) {
        let t = Transition {
            index,
            label: host.label(),
            phase,
            active: self.active,
        };
        debug_assert_eq!(
            self.active,
            self.pool.iter().filter(|(_, s)| s.phase.is_active()).count(),
            "active counter out of step with the pool"
        );
        log_transition(&t);
        self.report.timeline.push(t);
    }

    fn into_report(self) -> RunReport {
        let mut report = self.report;
        report.processed = self.done;
        report.cancelled = self.cancelling;
        report.not_started = if self.cancelling {
            self.hosts.len() - self.next
        } else {
            0
        };
        report
    }
}
