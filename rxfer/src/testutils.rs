use remote::{DirEntry, FileAccess, PathState, Reader, Writer};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Deterministic, non-repeating-looking binary content
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

pub async fn setup_test_dir() -> anyhow::Result<tempfile::TempDir> {
    let tmp_dir = tempfile::tempdir()?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- empty
    let foo_path = tmp_dir.path().join("foo");
    tokio::fs::create_dir(&foo_path).await?;
    tokio::fs::write(foo_path.join("0.txt"), "0").await?;
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await?;
    tokio::fs::write(bar_path.join("1.txt"), "1").await?;
    tokio::fs::write(bar_path.join("2.txt"), "2").await?;
    tokio::fs::write(bar_path.join("3.txt"), "3").await?;
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await?;
    tokio::fs::write(baz_path.join("4.txt"), "4").await?;
    tokio::fs::create_dir(baz_path.join("empty")).await?;
    Ok(tmp_dir)
}

/// Stream wrapper keeping a count of live handles
struct Tracked<T> {
    inner: T,
    open: Arc<AtomicUsize>,
}

impl<T> Tracked<T> {
    fn new(inner: T, open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            inner,
            open: Arc::clone(open),
        }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Tracked<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Tracked<T> {
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

/// Counts every capability call and every handle still open
pub struct CountingFs<F> {
    inner: F,
    calls: usize,
    open: Arc<AtomicUsize>,
}

impl<F: FileAccess> CountingFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: 0,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<F: FileAccess> FileAccess for CountingFs<F> {
    fn describe(&self) -> String {
        format!("counting({})", self.inner.describe())
    }

    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState> {
        self.calls += 1;
        self.inner.stat(path).await
    }

    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>> {
        self.calls += 1;
        self.inner.list(path).await
    }

    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        self.calls += 1;
        self.inner.make_dir(path).await
    }

    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader> {
        self.calls += 1;
        let reader = self.inner.open_read(path).await?;
        let open = Arc::clone(&self.open);
        Ok(reader.map(move |inner| Box::new(Tracked::new(inner, &open))))
    }

    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer> {
        self.calls += 1;
        let writer = self.inner.open_write(path).await?;
        let open = Arc::clone(&self.open);
        Ok(writer.map(move |inner| Box::new(Tracked::new(inner, &open))))
    }

    async fn local_path(
        &mut self,
        path: &std::path::Path,
    ) -> anyhow::Result<Option<std::path::PathBuf>> {
        self.inner.local_path(path).await
    }
}

/// Failure to inject into a [`FaultyFs`]
#[derive(Debug, Clone)]
pub enum Fault {
    /// `make_dir` of this path fails
    MakeDir(std::path::PathBuf),
    /// Reading this path fails after the given number of bytes
    ReadAfter(std::path::PathBuf, usize),
}

struct FailingRead<T> {
    inner: T,
    remaining: usize,
}

impl<T: AsyncRead + Unpin> AsyncRead for FailingRead<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(std::io::Error::other("injected read failure")));
        }
        let limit = self.remaining.min(buf.remaining());
        let mut limited = ReadBuf::new(buf.initialize_unfilled_to(limit));
        let poll = Pin::new(&mut self.inner).poll_read(cx, &mut limited);
        if let Poll::Ready(Ok(())) = poll {
            let read = limited.filled().len();
            buf.advance(read);
            self.remaining -= read;
        }
        poll
    }
}

/// Passes everything through to `inner` except the configured fault
pub struct FaultyFs<F> {
    inner: CountingFs<F>,
    fault: Fault,
}

impl<F: FileAccess> FaultyFs<F> {
    pub fn new(inner: F, fault: Fault) -> Self {
        Self {
            inner: CountingFs::new(inner),
            fault,
        }
    }

    pub fn open_handles(&self) -> usize {
        self.inner.open_handles()
    }
}

#[async_trait::async_trait]
impl<F: FileAccess> FileAccess for FaultyFs<F> {
    fn describe(&self) -> String {
        format!("faulty({})", self.inner.describe())
    }

    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState> {
        self.inner.stat(path).await
    }

    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>> {
        self.inner.list(path).await
    }

    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        if matches!(&self.fault, Fault::MakeDir(broken) if broken == path) {
            return Err(anyhow::anyhow!("injected mkdir failure for {path:?}"));
        }
        self.inner.make_dir(path).await
    }

    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader> {
        let reader = self.inner.open_read(path).await?;
        match &self.fault {
            Fault::ReadAfter(broken, after) if broken == path => {
                let remaining = *after;
                Ok(reader.map(move |inner| Box::new(FailingRead { inner, remaining })))
            }
            _ => Ok(reader),
        }
    }

    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer> {
        self.inner.open_write(path).await
    }

    async fn local_path(
        &mut self,
        path: &std::path::Path,
    ) -> anyhow::Result<Option<std::path::PathBuf>> {
        self.inner.local_path(path).await
    }
}

/// Local files whose writes are rejected by the completion, like a remote `cat` that fails
pub struct RejectingFs;

#[async_trait::async_trait]
impl FileAccess for RejectingFs {
    fn describe(&self) -> String {
        "rejecting".to_string()
    }

    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState> {
        remote::LocalFs.stat(path).await
    }

    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>> {
        remote::LocalFs.list(path).await
    }

    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        remote::LocalFs.make_dir(path).await
    }

    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader> {
        remote::LocalFs.open_read(path).await
    }

    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer> {
        let writer = remote::LocalFs.open_write(path).await?;
        let path = path.to_path_buf();
        Ok(Writer::with_completion(
            Box::new(writer),
            Box::pin(async move { Err(anyhow::anyhow!("remote rejected {path:?}")) }),
        ))
    }
}
