mod host;
pub use host::Host;

mod phase;
pub use phase::{SlotPhase, Transition};

mod outcome;
pub use outcome::{HostOutcome, SIGNALED_EXIT_CODE};

/// Position of a host in admission order (index into the host list).
pub type HostIndex = usize;
