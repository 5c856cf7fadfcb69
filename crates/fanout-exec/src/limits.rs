//! File-descriptor budget for the supervising process.
//!
//! Every running slot holds two pipe read ends and up to two output files, so a
//! run with a large concurrency bound can exceed the default soft `RLIMIT_NOFILE`
//! of many systems. [`ensure_fd_budget`] raises the soft limit towards what the
//! run needs, never above the hard limit. Failing to raise it is not fatal: the
//! run proceeds and spawns that hit `EMFILE` fail per host.
use tracing::{debug, warn};

/// Descriptors kept aside for stdio, the logger and the runtime.
const HEADROOM: u64 = 64;
/// Pipes plus output files per slot.
const FDS_PER_SLOT: u64 = 4;

/// Soft/hard `RLIMIT_NOFILE` after adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdBudget {
    pub soft: u64,
    pub hard: u64,
    /// How many descriptors the run asked for.
    pub wanted: u64,
}

impl FdBudget {
    /// Returns `true` if the soft limit covers the request.
    #[inline]
    pub fn is_sufficient(&self) -> bool {
        self.soft >= self.wanted
    }
}

/// Descriptors needed for `parallel` concurrent slots.
pub fn fds_for(parallel: usize) -> u64 {
    parallel as u64 * FDS_PER_SLOT + HEADROOM
}

/// Raise the soft open-files limit so that `parallel` slots fit.
pub fn ensure_fd_budget(parallel: usize) -> Option<FdBudget> {
    let wanted = fds_for(parallel);

    #[cfg(unix)]
    {
        match unix_impl::raise_nofile(wanted) {
            Ok(budget) => {
                if budget.is_sufficient() {
                    debug!(target: "fanout.exec.limits", soft = budget.soft, wanted, "fd budget ok");
                } else {
                    warn!(
                        target: "fanout.exec.limits",
                        soft = budget.soft,
                        hard = budget.hard,
                        wanted,
                        "open file limit is below what the requested parallelism needs"
                    );
                }
                Some(budget)
            }
            Err(e) => {
                warn!(target: "fanout.exec.limits", error = %e, "cannot adjust RLIMIT_NOFILE");
                None
            }
        }
    }

    #[cfg(not(unix))]
    {
        debug!(target: "fanout.exec.limits", wanted, "rlimits not supported on this OS");
        None
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use super::FdBudget;

    pub(super) fn raise_nofile(wanted: u64) -> io::Result<FdBudget> {
        let mut rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: rlim is a valid out-pointer for the duration of the call.
        if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let soft = rlim.rlim_cur as u64;
        let hard = rlim.rlim_max as u64;
        if soft >= wanted {
            return Ok(FdBudget { soft, hard, wanted });
        }

        let target = wanted.min(hard);
        let raised = libc::rlimit {
            rlim_cur: target as libc::rlim_t,
            rlim_max: rlim.rlim_max,
        };
        // SAFETY: raised is a valid, initialised rlimit.
        if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &raised) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(FdBudget {
            soft: target,
            hard,
            wanted,
        })
    }
}
