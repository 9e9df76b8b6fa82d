//! Transfer plans and the recursive merge planner.
//!
//! A plan is computed completely before anything is created or written, so every
//! type conflict inside a tree is reported while the destination is still untouched.
//! Directories that already exist on the destination are reused as they are; their
//! children that the source does not mention are never looked at.

use async_recursion::async_recursion;
use remote::{EntryKind, FileAccess, PathState};
use std::collections::HashMap;
use tracing::instrument;

use crate::error::Error;
use crate::resolve::{check_compatible, classify};

/// Where the bytes of a copy step come from
pub enum Origin {
    Path(std::path::PathBuf),
    Bytes(bytes::Bytes),
    Stream(remote::BoxedRead),
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Origin::Path(path) => write!(f, "{path:?}"),
            Origin::Bytes(bytes) => write!(f, "<{} bytes of content>", bytes.len()),
            Origin::Stream(_) => write!(f, "<stream>"),
        }
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Origin({self})")
    }
}

/// Where the bytes of a copy step go
pub enum Destination {
    Path(std::path::PathBuf),
    Stream(remote::BoxedWrite),
    /// Keep the content in memory and hand it back to the caller
    Collect,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Destination::Path(path) => write!(f, "{path:?}"),
            Destination::Stream(_) => write!(f, "<stream>"),
            Destination::Collect => write!(f, "<memory>"),
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Destination({self})")
    }
}

#[derive(Debug)]
pub enum Step {
    MakeDirectory(std::path::PathBuf),
    CopyFile { from: Origin, to: Destination },
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Step::MakeDirectory(path) => write!(f, "create directory {path:?}"),
            Step::CopyFile { from, to } => write!(f, "copy {from} to {to}"),
        }
    }
}

/// Ordered steps of one put/get; a directory is always created before anything lands in it
#[derive(Debug, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
    /// Existing destination directories the plan merges into
    pub directories_unchanged: usize,
    /// Destination paths already claimed by a step, with the kind the step puts there
    pub(crate) planned: HashMap<std::path::PathBuf, EntryKind>,
}

impl Plan {
    #[must_use]
    pub fn single(from: Origin, to: Destination) -> Self {
        let mut plan = Self::default();
        plan.push_copy(from, to);
        plan
    }

    pub fn push_copy(&mut self, from: Origin, to: Destination) {
        if let Destination::Path(path) = &to {
            self.planned.insert(path.clone(), EntryKind::File);
        }
        self.steps.push(Step::CopyFile { from, to });
    }

    /// What `path` on `dst` will be once the steps planned so far have run
    pub async fn state_of(
        &mut self,
        dst: &mut dyn FileAccess,
        path: &std::path::Path,
    ) -> Result<PathState, Error> {
        match self.planned.get(path) {
            Some(kind) => Ok(PathState::from(*kind)),
            None => classify(dst, path).await,
        }
    }

    /// Reuse the destination directory or plan its creation.
    ///
    /// Returns `true` if the directory is new, in which case nothing below it exists yet.
    /// A directory this plan already created or merged into is merged into again.
    pub fn ensure_directory(
        &mut self,
        path: &std::path::Path,
        existing: PathState,
    ) -> Result<bool, Error> {
        match self.planned.get(path) {
            Some(EntryKind::Directory) => return Ok(false),
            Some(EntryKind::File) => {
                return Err(Error::TypeMismatch {
                    source_kind: EntryKind::Directory,
                    found: PathState::File,
                    path: path.to_path_buf(),
                });
            }
            None => {}
        }
        let is_fresh = match existing {
            PathState::Directory => {
                self.directories_unchanged += 1;
                false
            }
            PathState::Absent => {
                self.steps.push(Step::MakeDirectory(path.to_path_buf()));
                true
            }
            PathState::File => {
                return Err(Error::TypeMismatch {
                    source_kind: EntryKind::Directory,
                    found: existing,
                    path: path.to_path_buf(),
                });
            }
        };
        self.planned.insert(path.to_path_buf(), EntryKind::Directory);
        Ok(is_fresh)
    }
}

/// Expand the source directory `src_dir` into steps merging it into `dst_dir`.
///
/// `dst_state` is what currently exists at `dst_dir`. Files are planned before
/// subdirectories, each group in source listing order.
#[instrument(skip(src, dst, plan))]
#[async_recursion]
pub async fn plan_directory(
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    dst_state: PathState,
    plan: &mut Plan,
) -> Result<(), Error> {
    // nothing to look up under a directory that does not exist yet
    let is_fresh = plan.ensure_directory(dst_dir, dst_state)?;
    tracing::debug!("listing source directory");
    let listing = src.list(src_dir).await.map_err(Error::transfer)?;
    let (files, directories): (Vec<_>, Vec<_>) = listing
        .into_iter()
        .partition(|entry| entry.kind == EntryKind::File);
    for entry in files {
        let to = dst_dir.join(&entry.name);
        if !is_fresh {
            let existing = plan.state_of(dst, &to).await?;
            check_compatible(EntryKind::File, existing, &to)?;
        }
        plan.push_copy(Origin::Path(src_dir.join(&entry.name)), Destination::Path(to));
    }
    for entry in directories {
        let to = dst_dir.join(&entry.name);
        let existing = if is_fresh {
            PathState::Absent
        } else {
            plan.state_of(dst, &to).await?
        };
        plan_directory(src, dst, &src_dir.join(&entry.name), &to, existing, plan).await?;
    }
    Ok(())
}
