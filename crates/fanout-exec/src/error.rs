use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("spawn failed for {host}: {reason}")]
    Spawn { host: String, reason: String },
    #[error("cannot open script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("blind mode needs an output directory")]
    BlindWithoutOutDir,
    #[error("blind mode cannot be combined with exit status printing")]
    BlindWithPrintExit,
    #[error("line capacity must be at least 2 bytes, got {0}")]
    LineCapacity(usize),
    #[error("command is empty")]
    EmptyCommand,
    #[error("ssh client path is empty")]
    EmptySshPath,
}
