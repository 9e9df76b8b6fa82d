use anyhow::{Context, anyhow};
use tracing::instrument;

use crate::{DirEntry, EntryKind, FileAccess, PathState, Reader, Writer};

/// The local filesystem, accessed through tokio::fs.
///
/// Symbolic links are followed: a link to a file is a file, a link to a directory is a
/// directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl FileAccess for LocalFs {
    fn describe(&self) -> String {
        "local".to_string()
    }

    #[instrument(skip(self))]
    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_dir() => Ok(PathState::Directory),
            Ok(_) => Ok(PathState::File),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(PathState::Absent),
            Err(error) => {
                Err(error).with_context(|| format!("failed reading metadata from {path:?}"))
            }
        }
    }

    #[instrument(skip(self))]
    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("cannot open directory {path:?} for reading"))?;
        let mut listing = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {path:?}"))?
        {
            let entry_path = entry.path();
            let metadata = tokio::fs::metadata(&entry_path)
                .await
                .with_context(|| format!("failed reading metadata from {entry_path:?}"))?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            listing.push(DirEntry {
                name: entry.file_name(),
                kind,
            });
        }
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::trace!("listed {} entries", listing.len());
        Ok(listing)
    }

    #[instrument(skip(self))]
    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        match tokio::fs::create_dir(path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                let metadata = tokio::fs::metadata(path)
                    .await
                    .with_context(|| format!("failed reading metadata from {path:?}"))?;
                if metadata.is_dir() {
                    tracing::debug!("directory already exists, leaving it as is");
                    Ok(())
                } else {
                    Err(anyhow!("{path:?} exists and is not a directory"))
                }
            }
            Err(error) => Err(error).with_context(|| format!("cannot create directory {path:?}")),
        }
    }

    #[instrument(skip(self))]
    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("cannot open {path:?} for reading"))?;
        Ok(Reader::new(Box::new(file)))
    }

    #[instrument(skip(self))]
    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer> {
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("cannot open {path:?} for writing"))?;
        Ok(Writer::new(Box::new(file)))
    }

    #[instrument(skip(self))]
    async fn local_path(
        &mut self,
        path: &std::path::Path,
    ) -> anyhow::Result<Option<std::path::PathBuf>> {
        let mut missing = vec![];
        let mut current = path.to_path_buf();
        loop {
            match tokio::fs::canonicalize(&current).await {
                Ok(mut resolved) => {
                    resolved.extend(missing.iter().rev());
                    return Ok(Some(resolved));
                }
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    let (Some(parent), Some(name)) = (current.parent(), current.file_name())
                    else {
                        return Err(error).with_context(|| format!("cannot resolve {path:?}"));
                    };
                    missing.push(name.to_os_string());
                    current = if parent.as_os_str().is_empty() {
                        std::path::PathBuf::from(".")
                    } else {
                        parent.to_path_buf()
                    };
                }
                Err(error) => return Err(error).with_context(|| format!("cannot resolve {path:?}")),
            }
        }
    }
}
