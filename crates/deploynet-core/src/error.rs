//! Error types for engine construction, inference and teardown.
//!
//! Everything here is recoverable. Caller/config contract violations
//! (input count or size mismatches) are not represented: they panic.

use std::path::PathBuf;

use thiserror::Error;

use crate::EngineState;

#[derive(Debug, Error)]
#[error("shape {shape:?} needs {expected} elements, got {actual}")]
pub struct ShapeError {
    pub shape: [usize; 4],
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Error)]
#[error("could not locate {} in any of {searched:?}", file.display())]
pub struct LocateError {
    pub file: PathBuf,
    pub searched: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build is not valid in state {0:?}")]
    InvalidState(EngineState),

    #[error("the {0} parser library has been shut down")]
    ParserShutDown(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("graph builder unavailable")]
    Builder(#[source] anyhow::Error),

    #[error("network definition unavailable")]
    Network(#[source] anyhow::Error),

    #[error("model parser unavailable")]
    Parser(#[source] anyhow::Error),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("failed to parse model description")]
    Parse(#[source] anyhow::Error),

    #[error("engine compilation produced no engine")]
    Compile(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum InferError {
    #[error("inference is not valid in state {0:?}")]
    InvalidState(EngineState),

    #[error("failed to allocate binding buffers")]
    Buffers(#[source] anyhow::Error),

    #[error("execution context unavailable")]
    Context(#[source] anyhow::Error),

    #[error("execution stream failure")]
    Stream(#[source] anyhow::Error),

    #[error("device dispatch failed")]
    Dispatch(#[source] anyhow::Error),

    #[error("host/device transfer failed")]
    Transfer(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("teardown is not valid in state {0:?}")]
    InvalidState(EngineState),

    #[error("the {0} parser library was already shut down in this process")]
    AlreadyShutDown(&'static str),
}
