//! Event sources feeding the scheduler loop.
//!
//! Every running slot owns three tasks: one reader per output pipe and one
//! watcher waiting on the child. None of them touch the pool; they only send
//! [`SlotEvent`]s to the loop, which is the single mutator of slot state.
use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{pool::SlotId, slot::StreamKind, util::kill_graceful};

/// Bytes requested per pipe read.
const READ_CHUNK: usize = 4096;

#[derive(Debug)]
pub(crate) enum SlotEvent {
    /// Raw bytes read from one of the child's pipes.
    Output {
        slot: SlotId,
        stream: StreamKind,
        chunk: Vec<u8>,
    },
    /// The pipe reached end-of-stream, or became unreadable.
    Closed { slot: SlotId, stream: StreamKind },
    /// The child was reaped. `code` is `None` when a signal ended it.
    Exited { pid: u32, code: Option<i32> },
}

/// Forward everything `reader` yields as [`SlotEvent::Output`], then report closure.
pub(crate) fn spawn_reader<R>(
    slot: SlotId,
    stream: StreamKind,
    mut reader: R,
    tx: mpsc::Sender<SlotEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buf[..n].to_vec();
                    if tx.send(SlotEvent::Output { slot, stream, chunk }).await.is_err() {
                        // Loop is gone; nobody left to render this.
                        return;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(target: "fanout.exec.mux", %slot, stream = stream.ext(), error = %e, "read failed; dropping rest of stream");
                    break;
                }
            }
        }
        trace!(target: "fanout.exec.mux", %slot, stream = stream.ext(), "end of stream");
        let _ = tx.send(SlotEvent::Closed { slot, stream }).await;
    })
}

/// Wait for `child` and report its exit; on cancellation stop it first.
pub(crate) fn spawn_watcher(
    pid: u32,
    mut child: Child,
    tx: mpsc::Sender<SlotEvent>,
    cancel: CancellationToken,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                debug!(target: "fanout.exec.mux", pid, "cancelled; stopping client");
                kill_graceful(&mut child, grace).await
            }
        };
        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(target: "fanout.exec.mux", pid, error = %e, "wait failed; treating as killed");
                None
            }
        };
        trace!(target: "fanout.exec.mux", pid, ?code, "child reaped");
        let _ = tx.send(SlotEvent::Exited { pid, code }).await;
    })
}
