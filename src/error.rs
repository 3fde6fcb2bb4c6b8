//! Error taxonomy of the front-end.
//!
//! Every failure is an [`Error`]: a kind plus an optional source location
//! (path and 1-based line number). Errors render in the GCC-like form
//! `<path>:<line>: <message>` so they can be parsed by editors. The location
//! is back-filled by outer layers as it becomes known and is never
//! overwritten once set, which keeps the original location of errors that
//! propagate out of recursively processed definitions.

use std::fmt;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong. `Internal` means a bug in the front-end itself;
/// everything else points at the processed definitions.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Semantic(String),
    #[error("{0}")]
    UndefinedType(String),
    #[error("{0}")]
    UndefinedIdentifier(String),
    #[error("{0}")]
    UndefinedAttribute(String),
    #[error("{0}")]
    InvalidOperand(String),
    #[error("{0}")]
    CyclicDependency(String),
    #[error("{0}")]
    BitCompatibility(String),
    #[error("{0}")]
    Naming(String),
    #[error("{0}")]
    Version(String),
    #[error("{0}")]
    PortId(String),
    #[error("{0}")]
    FileName(String),
}

/// An error with an optional source location.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    path: Option<PathBuf>,
    line: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            path: None,
            line: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 1-based line number, if known.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Fills in the location parts that are still unknown. Entries that are
    /// already set are left unchanged, which matters when an error bubbles
    /// up through recursively processed definitions.
    pub fn set_location_if_unknown(&mut self, path: Option<&Path>, line: Option<usize>) {
        if self.path.is_none() {
            if let Some(p) = path {
                self.path = Some(p.to_path_buf());
            }
        }
        if self.line.is_none() {
            self.line = line;
        }
    }

    pub fn with_location(mut self, path: Option<&Path>, line: Option<usize>) -> Self {
        self.set_location_if_unknown(path, line);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => write!(f, "{}:{}: {}", path.display(), line, self.kind),
            (Some(path), None) => write!(f, "{}: {}", path.display(), self.kind),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn rendering_with_and_without_location() {
        let e = Error::new(ErrorKind::Semantic("hello world".into()));
        assert_eq!(e.to_string(), "hello world");

        let e = e.with_location(Some(Path::new("path/to/File.1.0.dsdl")), Some(123));
        assert_eq!(e.to_string(), "path/to/File.1.0.dsdl:123: hello world");

        let mut e = Error::new(ErrorKind::Naming("bad".into()));
        e.set_location_if_unknown(Some(Path::new("a.dsdl")), None);
        assert_eq!(e.to_string(), "a.dsdl: bad");
    }

    #[test]
    fn location_is_not_overwritten() {
        let mut e = Error::new(ErrorKind::Semantic("x".into()))
            .with_location(Some(Path::new("inner.dsdl")), Some(7));
        e.set_location_if_unknown(Some(Path::new("outer.dsdl")), Some(1));
        assert_eq!(e.path(), Some(Path::new("inner.dsdl")));
        assert_eq!(e.line(), Some(7));
    }
}
