//! put and get: validate, plan, execute.
//!
//! Both operations validate their arguments and settings before calling either side. The
//! complete plan (including every type check inside a directory tree) is computed before the
//! first directory is created or the first byte is written.

use common::{Encoding, TransferSettings};
use remote::{Entry, EntryKind, FileAccess, PathState};
use tracing::instrument;

use crate::error::{ArgumentError, Error, Side, Summary};
use crate::execute::{Outcome, describe_plan, execute};
use crate::plan::{Destination, Origin, Plan, plan_directory};
use crate::resolve::{
    check_compatible, check_distinct, classify, resolve_destination, source_entry,
};
use crate::source::{ContentSource, GetArgs, GetRequest, PutArgs, PutRequest, TransferTarget};

/// What a get produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Content was written to the requested destination
    Written(Summary),
    Text(String),
    Bytes(Vec<u8>),
}

impl Fetched {
    #[must_use]
    pub fn summary(&self) -> Option<Summary> {
        match self {
            Fetched::Written(summary) => Some(*summary),
            Fetched::Text(_) | Fetched::Bytes(_) => None,
        }
    }
}

/// Plan sending the entry `source` on `src` to `into` on `dst`, `into_state` being what is there
async fn plan_entry(
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    source: &Entry,
    into: &std::path::Path,
    into_state: PathState,
    source_side: Side,
    plan: &mut Plan,
) -> Result<(), Error> {
    let resolved = resolve_destination(dst, plan, into, into_state, source, source_side).await?;
    check_distinct(src, dst, source, &resolved.path).await?;
    match source.kind {
        EntryKind::File => plan.push_copy(
            Origin::Path(source.path.clone()),
            Destination::Path(resolved.path),
        ),
        EntryKind::Directory => {
            plan_directory(
                src,
                dst,
                &source.path,
                &resolved.path,
                resolved.existing,
                plan,
            )
            .await?;
        }
    }
    Ok(())
}

async fn plan_put(
    local: &mut dyn FileAccess,
    remote: &mut dyn FileAccess,
    request: PutRequest,
) -> Result<Plan, Error> {
    let PutRequest { source, into } = request;
    let mut plan = Plan::default();
    let content = match source {
        ContentSource::LocalPath(path) => {
            let entry = source_entry(local, &path, Side::Local).await?;
            let into_state = classify(remote, &into).await?;
            plan_entry(
                local,
                remote,
                &entry,
                &into,
                into_state,
                Side::Local,
                &mut plan,
            )
            .await?;
            return Ok(plan);
        }
        ContentSource::LocalPathCollection(paths) => {
            let mut entries = Vec::with_capacity(paths.len());
            for path in &paths {
                entries.push(source_entry(local, path, Side::Local).await?);
            }
            let into_state = classify(remote, &into).await?;
            plan.ensure_directory(&into, into_state)?;
            for entry in &entries {
                plan_entry(
                    local,
                    remote,
                    entry,
                    &into,
                    PathState::Directory,
                    Side::Local,
                    &mut plan,
                )
                .await?;
            }
            return Ok(plan);
        }
        ContentSource::TextContent(text) => Origin::Bytes(text.into()),
        ContentSource::BinaryContent(bytes) => Origin::Bytes(bytes),
        ContentSource::ReadableStream(stream) => Origin::Stream(stream),
    };
    let existing = classify(remote, &into).await?;
    check_compatible(EntryKind::File, existing, &into)?;
    plan.push_copy(content, Destination::Path(into));
    Ok(plan)
}

async fn run_plan(
    plan: Plan,
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    settings: &TransferSettings,
) -> Result<Outcome, Error> {
    if settings.dry_run {
        describe_plan(&plan);
        return Ok(Outcome::default());
    }
    execute(plan, src, dst, settings.buffer_size).await
}

/// Send local content to the remote side.
///
/// `settings` must already be fully resolved; nothing here merges configuration.
#[instrument(skip_all)]
pub async fn put(
    local: &mut dyn FileAccess,
    remote: &mut dyn FileAccess,
    args: PutArgs,
    settings: &TransferSettings,
) -> Result<Summary, Error> {
    let request = PutRequest::try_from(args)?;
    settings.validate().map_err(ArgumentError::Settings)?;
    tracing::info!(
        "put {:?} into {}:{:?}",
        &request.source,
        remote.describe(),
        &request.into
    );
    let plan = plan_put(local, remote, request).await?;
    let outcome = run_plan(plan, local, remote, settings).await?;
    tracing::info!("put done: {}", outcome.summary.to_string().replace('\n', ", "));
    Ok(outcome.summary)
}

fn decode(data: Vec<u8>, encoding: Encoding, outcome_summary: Summary) -> Result<Fetched, Error> {
    match encoding {
        Encoding::Binary => Ok(Fetched::Bytes(data)),
        Encoding::Utf8 => String::from_utf8(data)
            .map(Fetched::Text)
            .map_err(|error| Error::Transfer {
                source: anyhow::Error::new(error).context("fetched content is not valid UTF-8"),
                summary: outcome_summary,
            }),
    }
}

/// Fetch remote content, either to a local destination or back to the caller.
#[instrument(skip_all)]
pub async fn get(
    remote: &mut dyn FileAccess,
    local: &mut dyn FileAccess,
    args: GetArgs,
    settings: &TransferSettings,
) -> Result<Fetched, Error> {
    let GetRequest { from, target } = GetRequest::try_from(args)?;
    settings.validate().map_err(ArgumentError::Settings)?;
    tracing::info!("get {}:{:?} into {:?}", remote.describe(), &from, &target);
    let source = source_entry(remote, &from, Side::Remote).await?;
    let destination = match target {
        TransferTarget::LocalPath(into) => {
            let into_state = classify(local, &into).await?;
            let mut plan = Plan::default();
            plan_entry(
                remote,
                local,
                &source,
                &into,
                into_state,
                Side::Remote,
                &mut plan,
            )
            .await?;
            let outcome = run_plan(plan, remote, local, settings).await?;
            tracing::info!("get done: {}", outcome.summary.to_string().replace('\n', ", "));
            return Ok(Fetched::Written(outcome.summary));
        }
        TransferTarget::LocalFileHandle(file) => Destination::Stream(Box::new(file)),
        TransferTarget::WritableStream(stream) => Destination::Stream(stream),
        TransferTarget::None => Destination::Collect,
    };
    if source.kind == EntryKind::Directory {
        return Err(Error::DirectoryNotStreamable { path: from });
    }
    let collect = matches!(destination, Destination::Collect);
    let plan = Plan::single(Origin::Path(from), destination);
    let outcome = run_plan(plan, remote, local, settings).await?;
    match outcome.collected {
        Some(data) if collect => decode(data, settings.encoding, outcome.summary),
        _ => Ok(Fetched::Written(outcome.summary)),
    }
}
