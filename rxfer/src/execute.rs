//! Runs a [`Plan`] step by step against the two sides of a transfer.

use anyhow::Context;
use remote::{FileAccess, Reader, Writer};
use tokio::io::AsyncReadExt;
use tracing::instrument;

use crate::error::{Error, Summary};
use crate::plan::{Destination, Origin, Plan, Step};

/// Result of an executed plan
#[derive(Debug, Default)]
pub struct Outcome {
    pub summary: Summary,
    /// Content of a step whose destination was [`Destination::Collect`]
    pub collected: Option<Vec<u8>>,
}

async fn open_origin(origin: Origin, src: &mut dyn FileAccess) -> anyhow::Result<Reader> {
    match origin {
        Origin::Path(path) => src.open_read(&path).await,
        Origin::Bytes(bytes) => Ok(Reader::new(Box::new(std::io::Cursor::new(bytes)))),
        Origin::Stream(stream) => Ok(Reader::new(stream)),
    }
}

/// Stream everything from `reader` into `writer`; both handles are closed on every path
async fn pump(mut reader: Reader, mut writer: Writer, buffer_size: usize) -> anyhow::Result<u64> {
    let copied = {
        let mut buffered = tokio::io::BufReader::with_capacity(buffer_size, &mut reader);
        tokio::io::copy_buf(&mut buffered, &mut writer).await
    };
    let written = writer.close().await;
    let read = reader.close().await;
    let bytes = copied.context("failed streaming file contents")?;
    written.context("failed finishing write")?;
    read.context("failed finishing read")?;
    Ok(bytes)
}

async fn collect(mut reader: Reader) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    let read = reader.read_to_end(&mut data).await;
    let closed = reader.close().await;
    read.context("failed reading file contents")?;
    closed.context("failed finishing read")?;
    Ok(data)
}

/// Copy one file, returning the number of bytes moved and any collected content
async fn copy_file(
    from: Origin,
    to: Destination,
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    buffer_size: usize,
) -> anyhow::Result<(u64, Option<Vec<u8>>)> {
    let reader = open_origin(from, src).await?;
    match to {
        Destination::Collect => {
            let data = collect(reader).await?;
            Ok((data.len() as u64, Some(data)))
        }
        Destination::Stream(stream) => {
            let bytes = pump(reader, Writer::new(stream), buffer_size).await?;
            Ok((bytes, None))
        }
        Destination::Path(path) => {
            let writer = match dst.open_write(&path).await {
                Ok(writer) => writer,
                Err(error) => {
                    if let Err(close_error) = reader.close().await {
                        tracing::warn!("failed releasing source after open error: {close_error:#}");
                    }
                    return Err(error);
                }
            };
            let bytes = pump(reader, writer, buffer_size).await?;
            Ok((bytes, None))
        }
    }
}

/// Log what `plan` would do without touching either side
pub fn describe_plan(plan: &Plan) {
    for step in &plan.steps {
        tracing::info!("dry run: {}", step);
    }
    if plan.directories_unchanged > 0 {
        tracing::info!(
            "dry run: {} existing directories would be merged into",
            plan.directories_unchanged
        );
    }
}

/// Execute `plan`, reading from `src` and writing to `dst`.
///
/// The first failing step aborts the rest; steps already applied stay applied and are
/// reflected in the summary carried by the error.
#[instrument(skip_all, fields(steps = plan.steps.len()))]
pub async fn execute(
    plan: Plan,
    src: &mut dyn FileAccess,
    dst: &mut dyn FileAccess,
    buffer_size: usize,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome {
        summary: Summary {
            directories_unchanged: plan.directories_unchanged,
            ..Default::default()
        },
        collected: None,
    };
    for step in plan.steps {
        match step {
            Step::MakeDirectory(path) => {
                tracing::debug!("creating directory {:?}", &path);
                if let Err(source) = dst.make_dir(&path).await {
                    return Err(Error::Creation {
                        path,
                        source,
                        summary: outcome.summary,
                    });
                }
                outcome.summary.directories_created += 1;
            }
            Step::CopyFile { from, to } => {
                let what = format!("{from} to {to}");
                tracing::debug!("copying {}", &what);
                match copy_file(from, to, src, dst, buffer_size).await {
                    Ok((bytes, collected)) => {
                        outcome.summary.files_copied += 1;
                        outcome.summary.bytes_copied += bytes;
                        if collected.is_some() {
                            outcome.collected = collected;
                        }
                    }
                    Err(source) => {
                        return Err(Error::Transfer {
                            source: source.context(format!("failed copying {what}")),
                            summary: outcome.summary,
                        });
                    }
                }
            }
        }
    }
    Ok(outcome)
}
