//! Error taxonomy and operation summary for put/get.
//!
//! # Logging Convention
//! The Display implementation of wrapped errors shows the full error chain, so you can log it
//! with any format specifier:
//! ```ignore
//! tracing::error!("transfer failed: {}", &error);
//! tracing::error!("transfer failed: {:#}", &error);
//! ```
//!
//! Argument, type-mismatch, same-file and missing-source errors are raised before anything is created,
//! opened for writing or copied. Creation and transfer errors may leave earlier steps applied;
//! they carry the [`Summary`] of what was done up to the failure.

use remote::{EntryKind, PathState};

/// Which operand of an operation an argument refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing {side} operand `{key}`")]
    Missing { side: Side, key: &'static str },
    #[error("only one content source may be given, got: {}", .0.join(", "))]
    Conflicting(Vec<&'static str>),
    #[error("{side} path {path:?} has no base name to copy into a directory")]
    NoBaseName { side: Side, path: std::path::PathBuf },
    #[error("invalid settings: {0}")]
    Settings(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    Argument(#[from] ArgumentError),
    #[error("cannot copy {source_kind} onto existing {found} at {path:?}")]
    TypeMismatch {
        source_kind: EntryKind,
        found: PathState,
        path: std::path::PathBuf,
    },
    #[error("{path:?} is a directory and cannot be delivered as a single stream")]
    DirectoryNotStreamable { path: std::path::PathBuf },
    #[error("cannot copy {source_path:?} onto {destination:?}: it is the source or lies inside it")]
    SameFile {
        source_path: std::path::PathBuf,
        destination: std::path::PathBuf,
    },
    #[error("{side} source {path:?} does not exist")]
    MissingSource {
        side: Side,
        path: std::path::PathBuf,
    },
    #[error("cannot create directory {path:?}: {source:#}")]
    Creation {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
        summary: Summary,
    },
    #[error("{source:#}")]
    Transfer {
        #[source]
        source: anyhow::Error,
        summary: Summary,
    },
}

impl Error {
    pub fn transfer(source: anyhow::Error) -> Self {
        Error::Transfer {
            source,
            summary: Summary::default(),
        }
    }

    /// Work completed before the failure
    #[must_use]
    pub fn summary(&self) -> Summary {
        match self {
            Error::Creation { summary, .. } | Error::Transfer { summary, .. } => *summary,
            _ => Summary::default(),
        }
    }

    /// True if the error was raised before any destination was modified
    #[must_use]
    pub fn is_pre_transfer(&self) -> bool {
        matches!(
            self,
            Error::Argument(_)
                | Error::TypeMismatch { .. }
                | Error::DirectoryNotStreamable { .. }
                | Error::SameFile { .. }
                | Error::MissingSource { .. }
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub directories_created: usize,
    pub directories_unchanged: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            directories_unchanged: self.directories_unchanged + other.directories_unchanged,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            directories created: {}\n\
            directories unchanged: {}",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.directories_created,
            self.directories_unchanged,
        )
    }
}
