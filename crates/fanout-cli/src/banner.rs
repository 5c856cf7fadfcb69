use std::{fmt, path::Path};

use anyhow::bail;
use fanout_exec::RunConfig;

/// Run summary printed before the first host is admitted.
pub struct Banner<'a> {
    pub cfg: &'a RunConfig,
    pub hosts: usize,
    pub parallel: usize,
    pub user: &'a str,
    pub label: Option<&'a str>,
}

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fanout {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(f)?;
        writeln!(f, "  [*] read ({}) hosts from the list", self.hosts)?;
        if let Some(label) = self.label {
            writeln!(f, "  [*] restricted to label \"{label}\"")?;
        }
        writeln!(
            f,
            "  [*] executing \"{}\" as user \"{}\" on each",
            self.cfg.mode.describe(),
            self.user
        )?;
        if !self.cfg.host_key_check {
            writeln!(f, "  [*] strict host key check disabled")?;
        }
        if self.cfg.blind {
            writeln!(f, "  [*] blind mode enabled")?;
        }
        if self.cfg.verbose {
            writeln!(f, "  [*] verbose mode enabled")?;
        }
        if let Some(dir) = &self.cfg.out_dir {
            writeln!(f, "  [*] using output directory : {}", dir.display())?;
        }
        writeln!(f, "  [*] spawning {} parallel ssh sessions", self.parallel)
    }
}

/// The output directory must exist and be readable, writable and searchable.
pub fn check_out_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() || !accessible(dir) {
        bail!("can't access output dir : {}", dir.display());
    }
    Ok(())
}

#[cfg(unix)]
fn accessible(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};

    access(dir, AccessFlags::R_OK | AccessFlags::W_OK | AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn accessible(dir: &Path) -> bool {
    std::fs::metadata(dir).is_ok_and(|m| !m.permissions().readonly())
}
