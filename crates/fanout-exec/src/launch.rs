use std::{fs::File, path::PathBuf, process::Stdio, time::Duration};

use fanout_model::Host;
use tokio::process::Command;
use tracing::trace;

use crate::{
    config::{Mode, RunConfig},
    error::ExecError,
};

/// Remote side of script mode: store stdin in a temp file, run it, clean up, keep the exit code.
const SCRIPT_BOOTSTRAP: &str = "f=$(mktemp /tmp/fanout.XXXXXX) || exit 255; \
     cat > \"$f\" && chmod 700 \"$f\" && \"$f\"; rc=$?; rm -f \"$f\"; exit $rc";

/// Keeps a host without key auth from blocking its slot on a password prompt.
const NON_INTERACTIVE_OPTS: [&str; 2] = [
    "-oPreferredAuthentications=publickey",
    "-oBatchMode=yes",
];

/// A fully resolved process launch: program, argv and optional stdin file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// File streamed to the child's stdin; `None` means `/dev/null`.
    pub stdin: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
        }
    }

    /// Build a command with both output streams piped back to the scheduler.
    pub fn command(&self) -> Result<Command, ExecError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        match &self.stdin {
            Some(path) => {
                let file = File::open(path).map_err(|source| ExecError::Script {
                    path: path.clone(),
                    source,
                })?;
                cmd.stdin(Stdio::from(file));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        trace!(target: "fanout.exec.launch", program = %self.program.display(), args = ?self.args, "command built");
        Ok(cmd)
    }
}

/// Turns a host into the process that executes work on it.
pub trait Launcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn invocation(&self, host: &Host) -> Result<Invocation, ExecError>;
}

/// Launches the external secure-shell client.
#[derive(Clone, Debug)]
pub struct SshLauncher {
    ssh_path: PathBuf,
    host_key_check: bool,
    connect_timeout: Duration,
    mode: Mode,
}

impl SshLauncher {
    pub fn new(mode: Mode) -> Self {
        let cfg = RunConfig::default();
        Self {
            ssh_path: cfg.ssh_path,
            host_key_check: cfg.host_key_check,
            connect_timeout: cfg.connect_timeout,
            mode,
        }
    }

    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            ssh_path: cfg.ssh_path.clone(),
            host_key_check: cfg.host_key_check,
            connect_timeout: cfg.connect_timeout,
            mode: cfg.mode.clone(),
        }
    }

    pub fn with_ssh_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh_path = path.into();
        self
    }

    fn base_args(&self, host: &Host) -> Vec<String> {
        let mut args = vec!["-l".to_string(), host.user.clone()];
        if let Some(port) = host.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(format!(
            "-oStrictHostKeyChecking={}",
            if self.host_key_check { "yes" } else { "no" }
        ));
        args.extend(NON_INTERACTIVE_OPTS.iter().map(|o| o.to_string()));
        args.push(format!(
            "-oConnectTimeout={}",
            self.connect_timeout.as_secs().max(1)
        ));
        args.push(host.hostname.clone());
        args
    }
}

impl Launcher for SshLauncher {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn invocation(&self, host: &Host) -> Result<Invocation, ExecError> {
        let mut args = self.base_args(host);
        let stdin = match &self.mode {
            Mode::Command(cmd) => {
                args.push(cmd.clone());
                None
            }
            Mode::Script(path) => {
                args.push(SCRIPT_BOOTSTRAP.to_string());
                Some(path.clone())
            }
        };
        Ok(Invocation {
            program: self.ssh_path.clone(),
            args,
            stdin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(launcher: &SshLauncher, host: &Host) -> Vec<String> {
        launcher.invocation(host).unwrap().args
    }

    #[test]
    fn command_mode_argv() {
        let launcher = SshLauncher::new(Mode::Command("uptime".into()));
        let inv = launcher.invocation(&Host::new("ops", "web1")).unwrap();

        assert_eq!(inv.program, PathBuf::from("/usr/bin/ssh"));
        assert_eq!(
            inv.args,
            vec![
                "-l",
                "ops",
                "-oStrictHostKeyChecking=yes",
                "-oPreferredAuthentications=publickey",
                "-oBatchMode=yes",
                "-oConnectTimeout=30",
                "web1",
                "uptime"
            ]
        );
        assert!(inv.stdin.is_none());
    }

    #[test]
    fn port_flag_only_when_explicit() {
        let launcher = SshLauncher::new(Mode::Command("id".into()));
        let args = argv(&launcher, &Host::new("ops", "db").with_port(2222));
        assert_eq!(&args[..4], &["-l", "ops", "-p", "2222"]);

        let args = argv(&launcher, &Host::new("ops", "db"));
        assert!(!args.iter().any(|a| a == "-p"));
    }

    #[test]
    fn host_key_check_and_timeout_follow_config() {
        let mut cfg = RunConfig::default().with_command("id");
        cfg.host_key_check = false;
        cfg.connect_timeout = Duration::from_secs(5);
        cfg.ssh_path = PathBuf::from("/opt/bin/ssh");
        let launcher = SshLauncher::from_config(&cfg);

        let inv = launcher.invocation(&Host::new("ops", "db")).unwrap();
        assert_eq!(inv.program, PathBuf::from("/opt/bin/ssh"));
        assert!(inv.args.contains(&"-oStrictHostKeyChecking=no".to_string()));
        assert!(inv.args.contains(&"-oConnectTimeout=5".to_string()));
    }

    #[test]
    fn script_mode_streams_file_on_stdin() {
        let launcher = SshLauncher::new(Mode::Script(PathBuf::from("deploy.sh")));
        let inv = launcher.invocation(&Host::new("ops", "web1")).unwrap();

        assert_eq!(inv.stdin, Some(PathBuf::from("deploy.sh")));
        assert_eq!(inv.args.last().map(String::as_str), Some(SCRIPT_BOOTSTRAP));
        assert_eq!(inv.args[inv.args.len() - 2], "web1");
    }

    #[test]
    fn password_prompts_are_disabled_in_every_mode() {
        for mode in [
            Mode::Command("id".into()),
            Mode::Script(PathBuf::from("deploy.sh")),
        ] {
            let mut cfg = RunConfig::default();
            cfg.mode = mode;
            cfg.host_key_check = false;
            let host = Host::new("ops", "db").with_port(22);
            let args = argv(&SshLauncher::from_config(&cfg), &host);
            let host_at = args.iter().position(|a| a == "db").unwrap();
            for opt in NON_INTERACTIVE_OPTS {
                let at = args.iter().position(|a| a == opt).unwrap();
                assert!(at < host_at, "{opt} must precede the hostname");
            }
        }
    }

    #[tokio::test]
    async fn missing_script_fails_command_build() {
        let inv = Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec![],
            stdin: Some(PathBuf::from("/no/such/script.sh")),
        };
        assert!(matches!(inv.command(), Err(ExecError::Script { .. })));
    }

    #[tokio::test]
    async fn script_bootstrap_runs_locally() {
        let mut script = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut script, b"#!/bin/sh\necho pushed\nexit 7\n").unwrap();

        let inv = Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), SCRIPT_BOOTSTRAP.into()],
            stdin: Some(script.path().to_path_buf()),
        };
        let out = inv.command().unwrap().output().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "pushed\n");
        assert_eq!(out.status.code(), Some(7));
    }
}
