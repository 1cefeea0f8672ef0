use std::fmt;

/// Error type for draftnet
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Indicates some dimension is incompatible in a matrix or layer operation.
    DimensionErr,
    /// The declared layer architecture is unusable, or a saved parameter blob
    /// disagrees with it.
    ArchitectureErr(String),
    /// A finite-difference estimate hit its iteration cap before two
    /// successive estimates agreed.
    NonConvergent,
    /// A dataset index was out of range.
    IndexErr,
    /// A file could not be read or written.
    IoErr(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionErr => write!(f, "incompatible dimensions"),
            Error::ArchitectureErr(msg) => write!(f, "invalid architecture: {msg}"),
            Error::NonConvergent => write!(f, "finite-difference estimate did not converge"),
            Error::IndexErr => write!(f, "sample index out of range"),
            Error::IoErr(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoErr(err.to_string())
    }
}
