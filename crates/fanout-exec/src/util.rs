use std::{process::ExitStatus, time::Duration};

use tokio::process::Child;
use tracing::debug;

/// Ask a child to stop: SIGTERM first, SIGKILL if it is still alive after `grace`.
#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Some(id) = child.id()
        && let Err(e) = kill(Pid::from_raw(id as i32), Signal::SIGTERM)
    {
        debug!(target: "fanout.exec.util", pid = id, err = %e, "SIGTERM failed");
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(target: "fanout.exec.util", "grace period over; killing child");
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<ExitStatus> {
    child.kill().await?;
    child.wait().await
}

/// Login name of the invoking user.
///
/// `USER`/`LOGNAME` win over the password database, matching what ssh itself would pick.
pub fn login_user() -> Option<String> {
    for var in ["USER", "LOGNAME"] {
        if let Ok(name) = std::env::var(var)
            && !name.is_empty()
        {
            return Some(name);
        }
    }
    passwd_name()
}

#[cfg(target_family = "unix")]
fn passwd_name() -> Option<String> {
    use nix::unistd::{Uid, User};

    match User::from_uid(Uid::current()) {
        Ok(user) => user.map(|u| u.name),
        Err(e) => {
            debug!(target: "fanout.exec.util", err = %e, "password database lookup failed");
            None
        }
    }
}

#[cfg(not(target_family = "unix"))]
fn passwd_name() -> Option<String> {
    None
}
