use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a valid executable: {0}")]
    InvalidExecutable(String),

    #[error("Invalid version string `{0}`")]
    InvalidVersion(String),

    #[error("Malformed runtime info line `{0}`")]
    MalformedRuntimeLine(String),

    #[error("dotnet executable not found")]
    DotnetNotFound,

    #[error("Runtime enumeration failed: {0}")]
    Enumeration(String),

    #[error("`dotnet --list-runtimes` timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Unsupported requirement: {0}")]
    UnsupportedRequirement(String),
}

pub type Result<T> = std::result::Result<T, Error>;
