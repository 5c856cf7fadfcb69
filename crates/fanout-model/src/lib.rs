mod domain;
pub use domain::*;

mod hosts;
pub use hosts::{DEFAULT_HOST_LIST, HostList, HostListError, HostListLoader, HostSource, LABEL_MARKER};
