use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;
use fanout_exec::{
    Mode, RunConfig,
    config::{DEFAULT_PARALLEL, DEFAULT_SSH_PATH},
};
use fanout_model::{DEFAULT_HOST_LIST, HostListLoader, HostSource};
use fanout_observe::{LoggerConfig, LoggerFormat};

#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(about = "Run one command on many hosts over ssh, in parallel")]
#[command(version)]
pub struct Cli {
    /// Login user for entries without a `user@` prefix (defaults to the invoking user)
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Maximum number of ssh clients running at once (0 = default)
    #[arg(short = 'p', long = "parallel", default_value_t = DEFAULT_PARALLEL)]
    pub parallel: usize,

    /// Host list file, `-` for stdin
    #[arg(short = 'f', long = "file", default_value = DEFAULT_HOST_LIST)]
    pub file: String,

    /// Only run on hosts under this label
    #[arg(short = 'l', long = "label")]
    pub label: Option<String>,

    /// Print the exit status of every host
    #[arg(short = 'e', long = "exit-code")]
    pub print_exit: bool,

    /// Do not echo remote output to the console (needs -o)
    #[arg(short = 'b', long = "blind", requires = "out_dir", conflicts_with = "print_exit")]
    pub blind: bool,

    /// Write per-host `.out`/`.err` files into this directory
    #[arg(short = 'o', long = "outdir")]
    pub out_dir: Option<PathBuf>,

    /// Disable strict host key checking
    #[arg(short = 's', long = "no-host-key-check")]
    pub no_host_key_check: bool,

    /// Show progress and mark hosts that printed nothing
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Milliseconds to wait between two launches
    #[arg(short = 'd', long = "delay", default_value_t = 0)]
    pub delay_ms: u64,

    /// ssh connect timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Push this local script to every host and run it instead of a command
    #[arg(short = 'r', long = "script", conflicts_with = "command")]
    pub script: Option<PathBuf>,

    /// Path of the ssh client
    #[arg(long = "ssh", default_value = DEFAULT_SSH_PATH)]
    pub ssh: PathBuf,

    /// Diagnostic log filter
    #[arg(long = "log-level", env = "FANOUT_LOG", default_value = "warn")]
    pub log_level: String,

    /// Diagnostic log format: text, json or journald
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: LoggerFormat,

    /// Command to run on every host
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig::default()
            .with_filter(self.log_level.clone())
            .with_format(self.log_format)
    }

    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mode = match &self.script {
            Some(path) => {
                let meta = std::fs::metadata(path)
                    .with_context(|| format!("cannot read script {}", path.display()))?;
                if !meta.is_file() {
                    bail!("script {} is not a regular file", path.display());
                }
                Mode::Script(path.clone())
            }
            None => {
                let command = self.command.join(" ");
                if command.trim().is_empty() {
                    bail!("no command given");
                }
                Mode::Command(command)
            }
        };

        let cfg = RunConfig {
            max_parallel: self.parallel,
            launch_delay: Duration::from_millis(self.delay_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            host_key_check: !self.no_host_key_check,
            blind: self.blind,
            print_exit: self.print_exit,
            verbose: self.verbose,
            out_dir: self.out_dir.clone(),
            ssh_path: self.ssh.clone(),
            mode,
            ..RunConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn host_source(&self) -> HostSource {
        HostSource::from_arg(&self.file)
    }

    pub fn loader(&self, default_user: &str) -> HostListLoader {
        let loader = HostListLoader::new(default_user);
        match &self.label {
            Some(label) => loader.with_label(label.clone()),
            None => loader,
        }
    }
}
