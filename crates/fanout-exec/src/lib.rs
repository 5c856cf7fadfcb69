mod error;
pub use error::{ConfigError, ExecError};

pub mod config;
pub use config::{Mode, RunConfig};

pub mod launch;
pub use launch::{Invocation, Launcher, SshLauncher};

pub mod format;
pub use format::{Console, Formatter, Progress};

pub mod pool;
pub use pool::{Removed, SlotId, SlotPool};

mod line;
pub use line::LineBuffer;

mod slot;
pub use slot::{FileSink, StreamKind};

mod mux;
mod reaper;

mod scheduler;
pub use scheduler::{RunReport, Scheduler};

pub mod limits;
pub mod util;

pub mod prelude {
    pub use crate::config::{Mode, RunConfig};
    pub use crate::error::{ConfigError, ExecError};
    pub use crate::format::Console;
    pub use crate::launch::{Launcher, SshLauncher};
    pub use crate::scheduler::{RunReport, Scheduler};
}
