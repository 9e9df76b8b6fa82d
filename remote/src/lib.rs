//! File access capability surface used by the rxfer transfer engine
//!
//! The engine never talks to a filesystem or a remote protocol directly. Everything it needs is
//! expressed by the [`FileAccess`] trait:
//!
//! - [`FileAccess::stat`] classifies a path as absent, a file or a directory
//! - [`FileAccess::list`] returns the entries of a directory in a stable order
//! - [`FileAccess::make_dir`] creates a directory, succeeding if one already exists
//! - [`FileAccess::open_read`] / [`FileAccess::open_write`] hand out scoped byte streams
//!
//! Two collaborators implement it: [`LocalFs`] (tokio::fs) and [`SshFs`] (commands over an
//! `openssh` multiplexed session). A channel is used by one operation at a time, every method
//! takes `&mut self`.
//!
//! # Handles
//!
//! [`Reader`] and [`Writer`] wrap a boxed stream plus an optional completion future. Callers
//! must finish with [`Reader::close`] / [`Writer::close`] to learn whether the other end
//! accepted the data; dropping a handle releases it without reporting.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

pub mod local;
pub mod ssh;

pub use local::LocalFs;
pub use ssh::{SshFs, SshSession};

/// Type alias for a boxed read stream
pub type BoxedRead = Box<dyn AsyncRead + Unpin + Send>;
/// Type alias for a boxed write stream
pub type BoxedWrite = Box<dyn AsyncWrite + Unpin + Send>;
/// Work that has to finish after a stream is released, e.g. waiting on a remote command
pub type Completion = futures::future::BoxFuture<'static, anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// What currently lives at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathState {
    Absent,
    File,
    Directory,
}

impl PathState {
    #[must_use]
    pub fn kind(self) -> Option<EntryKind> {
        match self {
            PathState::Absent => None,
            PathState::File => Some(EntryKind::File),
            PathState::Directory => Some(EntryKind::Directory),
        }
    }
}

impl From<EntryKind> for PathState {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => PathState::File,
            EntryKind::Directory => PathState::Directory,
        }
    }
}

impl std::fmt::Display for PathState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PathState::Absent => write!(f, "nothing"),
            PathState::File => write!(f, "file"),
            PathState::Directory => write!(f, "directory"),
        }
    }
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: std::ffi::OsString,
    pub kind: EntryKind,
}

/// A file or directory on either side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: std::path::PathBuf,
    pub kind: EntryKind,
}

impl Entry {
    pub fn new(path: impl Into<std::path::PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Base name of the entry, `None` for paths like `/` or `..`
    #[must_use]
    pub fn name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }

    #[must_use]
    pub fn child(&self, entry: &DirEntry) -> Entry {
        Entry::new(self.path.join(&entry.name), entry.kind)
    }
}

/// Scoped read handle
pub struct Reader {
    inner: BoxedRead,
    completion: Option<Completion>,
}

impl Reader {
    pub fn new(inner: BoxedRead) -> Self {
        Self {
            inner,
            completion: None,
        }
    }

    pub fn with_completion(inner: BoxedRead, completion: Completion) -> Self {
        Self {
            inner,
            completion: Some(completion),
        }
    }

    /// Replace the stream with one wrapping it, keeping the completion
    #[must_use]
    pub fn map(self, wrap: impl FnOnce(BoxedRead) -> BoxedRead) -> Self {
        Self {
            inner: wrap(self.inner),
            completion: self.completion,
        }
    }

    /// Release the stream and wait for the producer to report success
    pub async fn close(self) -> anyhow::Result<()> {
        drop(self.inner);
        if let Some(completion) = self.completion {
            completion.await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("completion", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}

impl AsyncRead for Reader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// Scoped write handle
pub struct Writer {
    inner: BoxedWrite,
    completion: Option<Completion>,
}

impl Writer {
    pub fn new(inner: BoxedWrite) -> Self {
        Self {
            inner,
            completion: None,
        }
    }

    pub fn with_completion(inner: BoxedWrite, completion: Completion) -> Self {
        Self {
            inner,
            completion: Some(completion),
        }
    }

    /// Replace the stream with one wrapping it, keeping the completion
    #[must_use]
    pub fn map(self, wrap: impl FnOnce(BoxedWrite) -> BoxedWrite) -> Self {
        Self {
            inner: wrap(self.inner),
            completion: self.completion,
        }
    }

    /// Flush and shut down the stream, then wait for the consumer to report success.
    ///
    /// The completion runs even if the shutdown fails so the other end is always released.
    pub async fn close(mut self) -> anyhow::Result<()> {
        let shutdown = self.inner.shutdown().await;
        drop(self.inner);
        if let Some(completion) = self.completion {
            completion.await?;
        }
        shutdown?;
        Ok(())
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("completion", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}

impl AsyncWrite for Writer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Capability surface of one side of a transfer.
#[async_trait::async_trait]
pub trait FileAccess: Send {
    /// Short label for logs, e.g. `local` or `user@host:22`
    fn describe(&self) -> String;

    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState>;

    /// Children of `path`, sorted by name
    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>>;

    /// Create `path`; an existing directory is not an error, anything else in the way is
    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()>;

    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader>;

    /// Create or truncate `path`
    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer>;

    /// Absolute, symlink-free form of `path` if this channel is the local filesystem.
    ///
    /// `path` need not exist; its missing tail is appended to the resolved ancestor.
    async fn local_path(
        &mut self,
        _path: &std::path::Path,
    ) -> anyhow::Result<Option<std::path::PathBuf>> {
        Ok(None)
    }
}
