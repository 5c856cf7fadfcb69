use std::{path::PathBuf, time::Duration};

use crate::error::ConfigError;

/// Default number of clients running at once.
pub const DEFAULT_PARALLEL: usize = 100;
/// Hard ceiling on parallel clients.
pub const MAX_PARALLEL: usize = 1024;
/// Default size of the per-stream line accumulator.
pub const DEFAULT_LINE_CAPACITY: usize = 120;
pub const DEFAULT_SSH_PATH: &str = "/usr/bin/ssh";

/// What each client runs on its target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Run a command line remotely.
    Command(String),
    /// Push a local script through the client and execute it remotely.
    Script(PathBuf),
}

impl Mode {
    pub fn describe(&self) -> String {
        match self {
            Mode::Command(cmd) => cmd.clone(),
            Mode::Script(path) => format!("script {}", path.display()),
        }
    }
}

/// Settings for one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Concurrency bound. `0` selects [`DEFAULT_PARALLEL`].
    pub max_parallel: usize,
    /// Pause between two successive admissions.
    pub launch_delay: Duration,
    /// Passed to the client as its connect timeout.
    pub connect_timeout: Duration,
    pub host_key_check: bool,
    /// Suppress console echo of remote output.
    pub blind: bool,
    /// Print one exit status line per host.
    pub print_exit: bool,
    /// Progress fraction and "no output" lines.
    pub verbose: bool,
    /// Directory for `<user>@<host>.out` / `.err` files.
    pub out_dir: Option<PathBuf>,
    /// Size of each stream's line accumulator; records hold at most `line_capacity - 1` bytes.
    pub line_capacity: usize,
    pub ssh_path: PathBuf,
    pub mode: Mode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_PARALLEL,
            launch_delay: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            host_key_check: true,
            blind: false,
            print_exit: false,
            verbose: false,
            out_dir: None,
            line_capacity: DEFAULT_LINE_CAPACITY,
            ssh_path: PathBuf::from(DEFAULT_SSH_PATH),
            mode: Mode::Command(String::new()),
        }
    }
}

impl RunConfig {
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.mode = Mode::Command(command.into());
        self
    }

    pub fn with_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blind && self.out_dir.is_none() {
            return Err(ConfigError::BlindWithoutOutDir);
        }
        if self.blind && self.print_exit {
            return Err(ConfigError::BlindWithPrintExit);
        }
        if self.line_capacity < 2 {
            return Err(ConfigError::LineCapacity(self.line_capacity));
        }
        if let Mode::Command(cmd) = &self.mode
            && cmd.trim().is_empty()
        {
            return Err(ConfigError::EmptyCommand);
        }
        if self.ssh_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySshPath);
        }
        Ok(())
    }

    /// Concurrency bound actually used for `host_count` targets.
    pub fn effective_parallel(&self, host_count: usize) -> usize {
        let wanted = match self.max_parallel {
            0 => DEFAULT_PARALLEL,
            n => n.min(MAX_PARALLEL),
        };
        wanted.min(host_count).max(1)
    }
}
