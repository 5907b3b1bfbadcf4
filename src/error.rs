use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems while building the scene; the process cannot start.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("error loading cloud {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cloud {} has no valid points", path.display())]
    Empty { path: PathBuf },
}

/// A registration step was handed input it cannot work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("target cloud is empty")]
    EmptyTarget,
    #[error("moving cloud is empty")]
    EmptyMoving,
}
