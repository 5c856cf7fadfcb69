use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use fanout_model::{Host, HostIndex, HostOutcome, SlotPhase};
use tracing::{trace, warn};

use crate::line::LineBuffer;

/// Which of the client's two output streams a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Stdout, StreamKind::Stderr];

    /// File extension of the per-host sink.
    pub fn ext(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "out",
            StreamKind::Stderr => "err",
        }
    }

    fn idx(&self) -> usize {
        match self {
            StreamKind::Stdout => 0,
            StreamKind::Stderr => 1,
        }
    }
}

/// Per-host, per-stream output file.
///
/// The file is created on the first write; a sink that never received a
/// byte leaves nothing behind once closed.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    written: u64,
    failed: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            written: 0,
            failed: false,
        }
    }

    /// `<dir>/<user>@<host>[:port].<out|err>`
    pub fn for_host(dir: &Path, host: &Host, kind: StreamKind) -> Self {
        Self::new(dir.join(format!("{}.{}", host.label(), kind.ext())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append one record plus a newline.
    ///
    /// After the first failure the sink goes quiet; the rest of the run is unaffected.
    pub fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        if self.failed {
            return Ok(());
        }
        let res = self.write_inner(record);
        if let Err(e) = &res {
            warn!(target: "fanout.exec.sink", path = %self.path.display(), error = %e, "output file disabled");
            self.failed = true;
        }
        res
    }

    fn write_inner(&mut self, record: &[u8]) -> io::Result<()> {
        let file = match self.file.take() {
            Some(f) => f,
            None => OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?,
        };
        let file = self.file.insert(file);
        file.write_all(record)?;
        file.write_all(b"\n")?;
        self.written += record.len() as u64 + 1;
        Ok(())
    }

    /// Close the file, deleting it if nothing was ever written.
    pub fn close(mut self) {
        let opened = self.file.take().is_some();
        if opened && self.written == 0 {
            if let Err(e) = fs::remove_file(&self.path) {
                trace!(target: "fanout.exec.sink", path = %self.path.display(), error = %e, "empty file not removed");
            }
        }
    }
}

/// One output stream of a slot.
#[derive(Debug)]
pub(crate) struct StreamState {
    pub(crate) buffer: LineBuffer,
    pub(crate) open: bool,
    pub(crate) sink: Option<FileSink>,
}

/// Runtime record of one host's execution.
#[derive(Debug)]
pub(crate) struct Slot<'h> {
    pub(crate) index: HostIndex,
    pub(crate) host: &'h Host,
    pub(crate) pid: Option<u32>,
    pub(crate) phase: SlotPhase,
    pub(crate) outcome: Option<HostOutcome>,
    /// Any record reached a destination.
    pub(crate) produced_output: bool,
    streams: [StreamState; 2],
}

impl<'h> Slot<'h> {
    pub(crate) fn new(
        index: HostIndex,
        host: &'h Host,
        line_capacity: usize,
        out_dir: Option<&Path>,
    ) -> Self {
        let stream = |kind: StreamKind| StreamState {
            buffer: LineBuffer::new(line_capacity),
            open: false,
            sink: out_dir.map(|dir| FileSink::for_host(dir, host, kind)),
        };
        Self {
            index,
            host,
            pid: None,
            phase: SlotPhase::Pending,
            outcome: None,
            produced_output: false,
            streams: [stream(StreamKind::Stdout), stream(StreamKind::Stderr)],
        }
    }

    pub(crate) fn stream_mut(&mut self, kind: StreamKind) -> &mut StreamState {
        &mut self.streams[kind.idx()]
    }

    /// Mark both streams as attached to a live child.
    pub(crate) fn start(&mut self, pid: u32) {
        self.pid = Some(pid);
        self.phase = SlotPhase::Running;
        for s in &mut self.streams {
            s.open = true;
        }
    }

    /// Exit observed and both pipes hit end-of-stream.
    pub(crate) fn is_drained(&self) -> bool {
        self.outcome.is_some() && self.streams.iter().all(|s| !s.open)
    }

    /// Close both sinks, deleting files that stayed empty.
    pub(crate) fn release(self) {
        let [out, err] = self.streams;
        for sink in [out.sink, err.sink].into_iter().flatten() {
            sink.close();
        }
        trace!(target: "fanout.exec.slot", host = %self.host, "slot released");
    }
}
