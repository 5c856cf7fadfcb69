#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use fanout_exec::{Console, ExecError, Invocation, Launcher, RunConfig, Scheduler};
use fanout_model::{Host, HostList};

/// Runs a local `sh -c <script>` per hostname instead of a remote client.
#[derive(Default)]
pub struct ScriptedLauncher {
    scripts: HashMap<String, String>,
    pushed: HashMap<String, PathBuf>,
    broken: Vec<String>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, hostname: &str, script: &str) -> Self {
        self.scripts.insert(hostname.to_string(), script.to_string());
        self
    }

    /// Hosts that run `sh -s` with `script` streamed on stdin.
    pub fn pushed(mut self, hostname: &str, script: impl Into<PathBuf>) -> Self {
        self.pushed.insert(hostname.to_string(), script.into());
        self
    }

    /// Hosts whose launch points at a program that does not exist.
    pub fn broken(mut self, hostname: &str) -> Self {
        self.broken.push(hostname.to_string());
        self
    }

    /// Host list in the order hosts were declared by `names`.
    pub fn hosts(names: &[&str]) -> HostList {
        names.iter().map(|n| Host::new("t", *n)).collect()
    }
}

impl Launcher for ScriptedLauncher {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn invocation(&self, host: &Host) -> Result<Invocation, ExecError> {
        if self.broken.contains(&host.hostname) {
            return Ok(Invocation::new("/nonexistent/fanout-client", vec![]));
        }
        if let Some(path) = self.pushed.get(&host.hostname) {
            return Ok(Invocation {
                program: PathBuf::from("/bin/sh"),
                args: vec!["-s".to_string()],
                stdin: Some(path.clone()),
            });
        }
        let script = self
            .scripts
            .get(&host.hostname)
            .cloned()
            .unwrap_or_else(|| "true".to_string());
        Ok(Invocation::new(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script],
        ))
    }
}

/// In-memory console destination shared with the test.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

pub struct Harness {
    pub scheduler: Scheduler,
    pub out: Capture,
    pub err: Capture,
}

pub fn config(parallel: usize) -> RunConfig {
    RunConfig::default()
        .with_command("scripted")
        .with_parallel(parallel)
}

pub fn harness(cfg: RunConfig, launcher: ScriptedLauncher) -> Harness {
    harness_with(cfg, Arc::new(launcher))
}

pub fn harness_with(cfg: RunConfig, launcher: Arc<dyn Launcher>) -> Harness {
    let (out, err) = (Capture::default(), Capture::default());
    let console = Console::new(Box::new(out.clone()), Box::new(err.clone()), false);
    let scheduler = Scheduler::new(cfg, launcher, console).unwrap();
    Harness { scheduler, out, err }
}

/// Executable stand-in for the ssh client: runs its last argument locally,
/// passing stdin through.
pub fn fake_ssh(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ssh");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor last; do :; done\nexec /bin/sh -c \"$last\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
