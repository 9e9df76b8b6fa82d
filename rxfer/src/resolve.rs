//! Destination classification and naming.
//!
//! The same rules apply to put (remote destination) and get (local destination):
//! an existing directory receives the source under its base name, while an absent path
//! or an existing file is the copy itself.

use remote::{Entry, EntryKind, FileAccess, PathState};
use tracing::instrument;

use crate::error::{ArgumentError, Error, Side};
use crate::plan::Plan;

/// Where a copied entry lands and what is currently there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: std::path::PathBuf,
    pub existing: PathState,
}

pub async fn classify(
    channel: &mut dyn FileAccess,
    path: &std::path::Path,
) -> Result<PathState, Error> {
    channel.stat(path).await.map_err(Error::transfer)
}

/// Look up the source of a transfer, failing if it does not exist
#[instrument(skip(channel))]
pub async fn source_entry(
    channel: &mut dyn FileAccess,
    path: &std::path::Path,
    side: Side,
) -> Result<Entry, Error> {
    match classify(channel, path).await?.kind() {
        Some(kind) => Ok(Entry::new(path, kind)),
        None => Err(Error::MissingSource {
            side,
            path: path.to_path_buf(),
        }),
    }
}

/// Path a copied entry named `name` takes when sent to `into`, given what `into` is
#[must_use]
pub fn effective_path(
    into: &std::path::Path,
    into_state: PathState,
    name: &std::ffi::OsStr,
) -> std::path::PathBuf {
    match into_state {
        PathState::Directory => into.join(name),
        PathState::Absent | PathState::File => into.to_path_buf(),
    }
}

/// Fail unless an entry of `kind` may be written over whatever `existing` is
pub fn check_compatible(
    kind: EntryKind,
    existing: PathState,
    path: &std::path::Path,
) -> Result<(), Error> {
    match (kind, existing) {
        (_, PathState::Absent)
        | (EntryKind::File, PathState::File)
        | (EntryKind::Directory, PathState::Directory) => Ok(()),
        _ => Err(Error::TypeMismatch {
            source_kind: kind,
            found: existing,
            path: path.to_path_buf(),
        }),
    }
}

/// Resolve the final destination of `source` sent to `into` on `dst`.
///
/// `into_state` is what the caller found (or is about to create) at `into`. Paths already
/// claimed by `plan` count as what the plan puts there. `source_side` only labels the error
/// when the source has no usable base name.
#[instrument(skip(dst, plan))]
pub async fn resolve_destination(
    dst: &mut dyn FileAccess,
    plan: &mut Plan,
    into: &std::path::Path,
    into_state: PathState,
    source: &Entry,
    source_side: Side,
) -> Result<Resolved, Error> {
    let resolved = if into_state == PathState::Directory {
        let name = source.name().ok_or_else(|| ArgumentError::NoBaseName {
            side: source_side,
            path: source.path.clone(),
        })?;
        let path = effective_path(into, into_state, name);
        let existing = plan.state_of(dst, &path).await?;
        Resolved { path, existing }
    } else {
        Resolved {
            path: into.to_path_buf(),
            existing: into_state,
        }
    };
    check_compatible(source.kind, resolved.existing, &resolved.path)?;
    tracing::debug!(
        "{} {:?} resolves to {:?} ({})",
        source.kind,
        source.path,
        resolved.path,
        resolved.existing
    );
    Ok(resolved)
}

/// Fail if writing `destination` on `dst` would overwrite `source` on `src` or land inside it.
///
/// Only channels on the local filesystem can share storage; any other pair passes.
pub async fn check_distinct(
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    source: &Entry,
    destination: &std::path::Path,
) -> Result<(), Error> {
    let Some(source_path) = src.local_path(&source.path).await.map_err(Error::transfer)? else {
        return Ok(());
    };
    let Some(destination_path) = dst.local_path(destination).await.map_err(Error::transfer)?
    else {
        return Ok(());
    };
    if destination_path.starts_with(&source_path) {
        return Err(Error::SameFile {
            source_path: source.path.clone(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}
