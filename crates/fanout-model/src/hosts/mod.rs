mod error;
mod parse;

pub use error::HostListError;

use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};

use tracing::{debug, trace};

use crate::Host;
use parse::{Line, parse_line};

/// First character of a label marker line.
pub const LABEL_MARKER: char = '%';

/// Host list file used when none is given.
pub const DEFAULT_HOST_LIST: &str = "hostlist.txt";

/// Where host entries are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSource {
    Path(PathBuf),
    Stdin,
}

impl HostSource {
    /// `-` selects standard input, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            HostSource::Stdin
        } else {
            HostSource::Path(PathBuf::from(arg))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            HostSource::Path(p) => p.display().to_string(),
            HostSource::Stdin => "<stdin>".to_string(),
        }
    }
}

impl Default for HostSource {
    fn default() -> Self {
        HostSource::Path(PathBuf::from(DEFAULT_HOST_LIST))
    }
}

/// Ordered, deduplicated targets in admission order.
#[derive(Debug, Clone, Default)]
pub struct HostList {
    hosts: Vec<Host>,
    seen: HashSet<Host>,
    user_width: usize,
    host_width: usize,
    label_width: usize,
}

impl HostList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a host unless an identical one is already present.
    ///
    /// Returns `false` for a duplicate.
    pub fn push(&mut self, host: Host) -> bool {
        if self.seen.contains(&host) {
            return false;
        }
        self.user_width = self.user_width.max(host.user.len());
        self.host_width = self.host_width.max(host.hostname.len());
        self.label_width = self.label_width.max(host.label().len());
        self.seen.insert(host.clone());
        self.hosts.push(host);
        true
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Host> {
        self.hosts.get(index)
    }

    pub fn as_slice(&self) -> &[Host] {
        &self.hosts
    }

    /// Widest user name in the list.
    pub fn user_width(&self) -> usize {
        self.user_width
    }

    /// Widest host name in the list.
    pub fn host_width(&self) -> usize {
        self.host_width
    }

    /// Widest rendered `user@host[:port]` label, used for column alignment.
    pub fn label_width(&self) -> usize {
        self.label_width
    }
}

impl FromIterator<Host> for HostList {
    fn from_iter<I: IntoIterator<Item = Host>>(iter: I) -> Self {
        let mut list = HostList::new();
        for host in iter {
            list.push(host);
        }
        list
    }
}

/// Reads a line-oriented host source into a [`HostList`].
#[derive(Debug, Clone)]
pub struct HostListLoader {
    default_user: String,
    label_filter: Option<String>,
}

impl HostListLoader {
    /// `default_user` is applied to entries without a `user@` prefix.
    pub fn new(default_user: impl Into<String>) -> Self {
        Self {
            default_user: default_user.into(),
            label_filter: None,
        }
    }

    /// Keep only hosts tagged with `label`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label_filter = Some(label.into());
        self
    }

    pub fn load(&self, source: &HostSource) -> Result<HostList, HostListError> {
        match source {
            HostSource::Path(path) => {
                let file = File::open(path).map_err(|source| HostListError::Open {
                    path: path.clone(),
                    source,
                })?;
                self.load_reader(BufReader::new(file), &source.describe())
            }
            HostSource::Stdin => {
                let stdin = io::stdin();
                self.load_reader(stdin.lock(), &source.describe())
            }
        }
    }

    /// Parse every line of `reader`. `origin` only names the source in errors.
    pub fn load_reader<R: BufRead>(
        &self,
        mut reader: R,
        origin: &str,
    ) -> Result<HostList, HostListError> {
        let mut list = HostList::new();
        let mut label: Option<String> = None;
        let mut buf = Vec::new();
        let mut lineno = 0usize;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| HostListError::Read {
                    origin: origin.to_string(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            lineno += 1;

            let Ok(text) = std::str::from_utf8(&buf) else {
                trace!(target: "fanout.model.hosts", lineno, "skipping non-utf8 line");
                continue;
            };

            match parse_line(text) {
                Line::Label(next) => label = next.map(str::to_string),
                Line::Target {
                    user,
                    hostname,
                    port,
                } => {
                    if !self.accepts(label.as_deref()) {
                        continue;
                    }
                    let mut host = Host::new(user.unwrap_or(&self.default_user), hostname);
                    host.port = port;
                    if !list.push(host) {
                        trace!(target: "fanout.model.hosts", lineno, "duplicate host dropped");
                    }
                }
                Line::Skip => {}
            }
        }

        if list.is_empty() {
            return Err(HostListError::Empty {
                origin: origin.to_string(),
            });
        }
        debug!(target: "fanout.model.hosts", origin, hosts = list.len(), "host list loaded");
        Ok(list)
    }

    fn accepts(&self, label: Option<&str>) -> bool {
        match &self.label_filter {
            Some(wanted) => label == Some(wanted.as_str()),
            None => true,
        }
    }
}
