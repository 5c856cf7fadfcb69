//! Console and file rendering of output records.
//!
//! Console line layout:
//!
//! ```text
//! <label padded to width> [<done>/<total>] <marker> <text>
//! ```
//!
//! The progress fraction only appears in verbose mode. Markers are `->` for
//! stdout, `=>` for stderr and `=:` for the exit status line; they are colored
//! only when the destination is a terminal. The exit status line is tagged
//! `[<user> @ <host>]` instead of the padded label.

use std::{
    fmt,
    io::{self, Write},
};

use fanout_model::{Host, HostOutcome};
use tracing::trace;

use crate::{config::RunConfig, slot::FileSink, slot::StreamKind};

const GREEN: &str = "\x1b[1;32m";
const RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0;39m";

/// Completed/total host counter shown in verbose mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.total.to_string().len();
        write!(f, "[{:>width$}/{}]", self.done, self.total)
    }
}

/// The two console destinations.
pub struct Console {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    out_tty: bool,
    err_tty: bool,
}

impl Console {
    /// Process stdout/stderr; color follows terminal detection per stream.
    pub fn stdio() -> Self {
        Self {
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            out_tty: atty::is(atty::Stream::Stdout),
            err_tty: atty::is(atty::Stream::Stderr),
        }
    }

    /// Arbitrary writers, e.g. in-memory buffers.
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>, tty: bool) -> Self {
        Self {
            out,
            err,
            out_tty: tty,
            err_tty: tty,
        }
    }

    fn writer(&mut self, kind: StreamKind) -> (&mut Box<dyn Write + Send>, bool) {
        match kind {
            StreamKind::Stdout => (&mut self.out, self.out_tty),
            StreamKind::Stderr => (&mut self.err, self.err_tty),
        }
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("out_tty", &self.out_tty)
            .field("err_tty", &self.err_tty)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Formatter {
    console: Console,
    width: usize,
    blind: bool,
    verbose: bool,
    print_exit: bool,
    to_files: bool,
}

impl Formatter {
    pub fn new(cfg: &RunConfig, console: Console) -> Self {
        Self {
            console,
            width: 0,
            blind: cfg.blind,
            verbose: cfg.verbose,
            print_exit: cfg.print_exit,
            to_files: cfg.out_dir.is_some(),
        }
    }

    /// Column width for host labels.
    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    /// Render one record to the file sink and/or the console.
    ///
    /// Returns `true` if the record reached at least one destination.
    pub fn record(
        &mut self,
        host: &Host,
        kind: StreamKind,
        text: &[u8],
        progress: Progress,
        sink: Option<&mut FileSink>,
    ) -> bool {
        let mut emitted = false;
        if let Some(sink) = sink {
            emitted |= sink.write_record(text).is_ok();
        }
        if !self.blind {
            let marker = stream_marker(kind);
            let prefix = self.prefix(host, progress);
            let (w, tty) = self.console.writer(kind);
            let marker = paint(marker, if kind == StreamKind::Stdout { GREEN } else { RED }, tty);
            let res = write_line(w, &prefix, &marker, &String::from_utf8_lossy(text));
            emitted |= res.is_ok();
        }
        emitted
    }

    /// Emit the single terminal line for a finished host.
    ///
    /// Exit status if requested; otherwise, in verbose mode, a "no output"
    /// line for hosts that printed nothing (console-only runs) or a progress
    /// tick (blind runs). Never both.
    pub fn finish(&mut self, host: &Host, outcome: &HostOutcome, produced_output: bool, progress: Progress) {
        let prefix = self.prefix(host, progress);
        let tty = self.console.out_tty;

        let res = if self.print_exit {
            let Some(code) = outcome.code() else {
                return;
            };
            let marker = paint("=:", if code == 0 { GREEN } else { RED }, tty);
            let tag = self.status_prefix(host, progress);
            write_line(&mut self.console.out, &tag, &marker, &code.to_string())
        } else if self.verbose && self.blind {
            writeln!(self.console.out, "{}", prefix.trim_end()).and_then(|_| self.console.out.flush())
        } else if self.verbose && !produced_output && !self.to_files {
            writeln!(self.console.out, "{prefix}(no output)").and_then(|_| self.console.out.flush())
        } else {
            return;
        };
        if let Err(e) = res {
            trace!(target: "fanout.exec.format", error = %e, "console write failed");
        }
    }

    /// Write a line that is not tied to any host (banner, summary).
    pub fn notice(&mut self, line: &str) {
        let _ = writeln!(self.console.out, "{line}").and_then(|_| self.console.out.flush());
    }

    /// `[<user> @ <host>] `, plus the progress fraction in verbose mode.
    fn status_prefix(&self, host: &Host, progress: Progress) -> String {
        let tag = format!("[{} @ {}]", host.user, host.hostname);
        if self.verbose {
            format!("{tag} {progress} ")
        } else {
            format!("{tag} ")
        }
    }

    fn prefix(&self, host: &Host, progress: Progress) -> String {
        let label = host.label();
        if self.verbose {
            format!("{label:<w$} {progress} ", w = self.width)
        } else {
            format!("{label:<w$} ", w = self.width)
        }
    }
}

fn stream_marker(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Stdout => "->",
        StreamKind::Stderr => "=>",
    }
}

fn paint(marker: &str, color: &str, tty: bool) -> String {
    if tty {
        format!("{color}{marker}{RESET}")
    } else {
        marker.to_string()
    }
}

fn write_line<W: Write + ?Sized>(w: &mut W, prefix: &str, marker: &str, text: &str) -> io::Result<()> {
    writeln!(w, "{prefix}{marker} {text}")?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Write for Buf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn formatter(cfg: &RunConfig, tty: bool) -> (Formatter, Buf, Buf) {
        let (out, err) = (Buf::default(), Buf::default());
        let console = Console::new(Box::new(out.clone()), Box::new(err.clone()), tty);
        let mut f = Formatter::new(cfg, console);
        f.set_width(12);
        (f, out, err)
    }

    const P: Progress = Progress { done: 3, total: 10 };

    #[test]
    fn progress_is_right_aligned() {
        assert_eq!(P.to_string(), "[ 3/10]");
        assert_eq!(Progress { done: 7, total: 7 }.to_string(), "[7/7]");
    }

    #[test]
    fn records_go_to_matching_stream() {
        let cfg = RunConfig::default();
        let (mut f, out, err) = formatter(&cfg, false);
        let host = Host::new("ops", "web1");

        assert!(f.record(&host, StreamKind::Stdout, b"up 3 days", P, None));
        assert!(f.record(&host, StreamKind::Stderr, b"warning", P, None));

        assert_eq!(out.text(), "ops@web1     -> up 3 days\n");
        assert_eq!(err.text(), "ops@web1     => warning\n");
    }

    #[test]
    fn markers_are_colored_on_tty() {
        let cfg = RunConfig::default();
        let (mut f, out, _) = formatter(&cfg, true);
        f.record(&Host::new("ops", "web1"), StreamKind::Stdout, b"x", P, None);
        assert!(out.text().contains("\x1b[1;32m->\x1b[0;39m"));
    }

    #[test]
    fn verbose_adds_progress() {
        let mut cfg = RunConfig::default();
        cfg.verbose = true;
        let (mut f, out, _) = formatter(&cfg, false);
        f.record(&Host::new("ops", "web1"), StreamKind::Stdout, b"hi", P, None);
        assert_eq!(out.text(), "ops@web1     [ 3/10] -> hi\n");
    }

    #[test]
    fn blind_mode_only_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = RunConfig::default();
        cfg.blind = true;
        cfg.out_dir = Some(dir.path().to_path_buf());
        let (mut f, out, _) = formatter(&cfg, false);
        let host = Host::new("ops", "web1");
        let mut sink = FileSink::for_host(dir.path(), &host, StreamKind::Stdout);

        assert!(f.record(&host, StreamKind::Stdout, b"secret", P, Some(&mut sink)));
        assert!(out.text().is_empty());
        assert_eq!(sink.written(), 7);
    }

    #[test]
    fn exit_status_line() {
        let mut cfg = RunConfig::default();
        cfg.print_exit = true;
        cfg.verbose = true;
        let (mut f, out, _) = formatter(&cfg, false);
        let host = Host::new("ops", "web1");

        f.finish(&host, &HostOutcome::Exited { code: 42 }, false, P);
        assert_eq!(out.text(), "[ops @ web1] [ 3/10] =: 42\n");

        let ported = Host::new("ops", "db").with_port(2222);
        f.finish(&ported, &HostOutcome::Exited { code: 0 }, true, P);
        assert!(out.text().ends_with("[ops @ db] [ 3/10] =: 0\n"));
    }

    #[test]
    fn no_output_line_only_for_silent_hosts() {
        let mut cfg = RunConfig::default();
        cfg.verbose = true;
        let (mut f, out, _) = formatter(&cfg, false);
        let host = Host::new("ops", "web1");

        f.finish(&host, &HostOutcome::Exited { code: 0 }, true, P);
        assert!(out.text().is_empty());

        f.finish(&host, &HostOutcome::Exited { code: 0 }, false, P);
        assert_eq!(out.text(), "ops@web1     [ 3/10] (no output)\n");
    }

    #[test]
    fn quiet_mode_prints_no_terminal_line() {
        let cfg = RunConfig::default();
        let (mut f, out, _) = formatter(&cfg, false);
        f.finish(&Host::new("ops", "web1"), &HostOutcome::Exited { code: 1 }, false, P);
        assert!(out.text().is_empty());
    }

    #[test]
    fn blind_verbose_prints_progress_tick() {
        let mut cfg = RunConfig::default();
        cfg.blind = true;
        cfg.verbose = true;
        cfg.out_dir = Some("/tmp".into());
        let (mut f, out, _) = formatter(&cfg, false);
        f.finish(&Host::new("ops", "web1"), &HostOutcome::Exited { code: 0 }, true, P);
        assert_eq!(out.text(), "ops@web1     [ 3/10]\n");
    }
}
