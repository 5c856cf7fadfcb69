use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostListError {
    #[error("cannot open host list {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read host list {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no usable hosts in {origin}")]
    Empty { origin: String },
}
