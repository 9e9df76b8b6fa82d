use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::instrument;

use rxfer::path::{Operand, parse_operand};
use rxfer::{GetArgs, GetInto, PutArgs, PutFrom, Session, Summary};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rxfer",
    version,
    about = "Put files to and get files from remote hosts with merge-and-overwrite semantics",
    long_about = "`rxfer` transfers files and directory trees between the local machine and remote hosts reached over SSH.

Directories are merged: existing destination directories are reused, files are overwritten and nothing is ever deleted. A source sent to an existing directory lands inside it under its own name.

Remote operands use `[user@]host[:port]:/path`. An operand without a host refers to the local filesystem.

EXAMPLES:
    # Upload a directory tree, merging into an existing one
    rxfer put ./site --into web01:/srv/www

    # Upload literal text to several hosts at once
    rxfer put --text 'enabled=true' --into web01:/etc/app.flag --into web02:/etc/app.flag

    # Download a file and print it
    rxfer get --from web01:/var/log/app.log

    # Download a directory into a local directory
    rxfer get --from web01:/srv/www --into ./backup/"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    // Transfer settings
    /// JSON file with transfer settings; command-line flags take precedence
    #[arg(long, global = true, value_name = "FILE", help_heading = "Transfer settings")]
    config: Option<std::path::PathBuf>,

    /// How content fetched without a destination is decoded
    #[arg(long, global = true, value_enum, help_heading = "Transfer settings")]
    encoding: Option<common::Encoding>,

    /// Compute and log the transfer plan without modifying anything
    #[arg(long, global = true, help_heading = "Transfer settings")]
    dry_run: bool,

    /// Read buffer size in bytes used when streaming file contents
    #[arg(long, global = true, value_name = "BYTES", help_heading = "Transfer settings")]
    buffer_size: Option<usize>,

    // Progress & output
    /// Print summary at the end
    #[arg(long, global = true, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Progress & output")]
    quiet: bool,

    // Performance & throttling
    /// Number of worker threads, 0 means number of cores
    #[arg(long, global = true, default_value = "0", help_heading = "Performance & throttling")]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(long, global = true, default_value = "0", help_heading = "Performance & throttling")]
    max_blocking_threads: usize,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Send local files, directories or literal content to one or more destinations
    Put {
        /// Local files or directories to send; several are sent into a directory
        sources: Vec<std::path::PathBuf>,

        /// Send this text instead of files
        #[arg(long)]
        text: Option<String>,

        /// Send standard input instead of files
        #[arg(long)]
        stdin: bool,

        /// Destination, repeat to send to several destinations concurrently
        #[arg(long, required = true, value_name = "DEST")]
        into: Vec<String>,
    },
    /// Fetch a remote file or directory
    Get {
        /// Remote source
        #[arg(long, value_name = "SRC")]
        from: String,

        /// Local destination; without it the content is written to standard output
        #[arg(long, value_name = "LOCAL")]
        into: Option<std::path::PathBuf>,
    },
}

fn resolve_settings(args: &Args) -> anyhow::Result<common::TransferSettings> {
    let file_layer = match &args.config {
        Some(path) => common::TransferOverrides::from_file(path)?,
        None => common::TransferOverrides::default(),
    };
    let flag_layer = common::TransferOverrides {
        encoding: args.encoding,
        dry_run: args.dry_run.then_some(true),
        buffer_size: args.buffer_size,
    };
    Ok(common::TransferSettings::default().merged(&file_layer.then(&flag_layer)))
}

fn put_args(
    sources: &[std::path::PathBuf],
    text: Option<&str>,
    bytes: Option<&bytes::Bytes>,
    into: std::path::PathBuf,
) -> PutArgs {
    let from = match sources {
        [] => None,
        [single] => Some(PutFrom::Path(single.clone())),
        many => Some(PutFrom::Paths(many.to_vec())),
    };
    PutArgs {
        from,
        text: text.map(str::to_string),
        bytes: bytes.cloned(),
        into: Some(into),
    }
}

#[instrument(skip(sources, text, settings))]
async fn run_put(
    sources: Vec<std::path::PathBuf>,
    text: Option<String>,
    stdin: bool,
    into: Vec<String>,
    settings: common::TransferSettings,
) -> anyhow::Result<Summary> {
    let bytes = if stdin {
        let mut data = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut data)
            .await
            .context("failed reading standard input")?;
        Some(bytes::Bytes::from(data))
    } else {
        None
    };
    let operands = into
        .iter()
        .map(|dest| parse_operand(dest))
        .collect::<anyhow::Result<Vec<Operand>>>()?;
    let mut sessions = Vec::with_capacity(operands.len());
    for operand in &operands {
        sessions.push(
            Session::open(operand, settings)
                .await
                .with_context(|| format!("failed to open session for {operand}"))?,
        );
    }
    let results = rxfer::dispatch::run_sessions(sessions, |index, mut session| {
        let args = put_args(
            &sources,
            text.as_deref(),
            bytes.as_ref(),
            operands[index].path().to_path_buf(),
        );
        async move { session.put(args).await }
    })
    .await;
    let mut total = Summary::default();
    let mut failed = Vec::new();
    for (operand, result) in operands.iter().zip(results) {
        match result {
            Ok(summary) => total = total + summary,
            Err(error) => {
                total = total + error.summary();
                failed.push(format!("{operand}: {error}"));
            }
        }
    }
    if failed.is_empty() {
        Ok(total)
    } else {
        Err(anyhow!(
            "{} of {} destinations failed:\n{}",
            failed.len(),
            operands.len(),
            failed.join("\n")
        ))
    }
}

#[instrument(skip(settings))]
async fn run_get(
    from: String,
    into: Option<std::path::PathBuf>,
    settings: common::TransferSettings,
) -> anyhow::Result<Summary> {
    let operand = parse_operand(&from)?;
    let mut session = Session::open(&operand, settings)
        .await
        .with_context(|| format!("failed to open session for {operand}"))?;
    let into = match into {
        Some(path) => GetInto::Path(path),
        None => GetInto::Stream(Box::new(tokio::io::stdout())),
    };
    let fetched = session
        .get(GetArgs {
            from: Some(operand.path().to_path_buf()),
            into: Some(into),
        })
        .await?;
    Ok(fetched.summary().unwrap_or_default())
}

async fn async_main(args: Args) -> anyhow::Result<Summary> {
    let settings = resolve_settings(&args)?;
    match args.command {
        Command::Put {
            sources,
            text,
            stdin,
            into,
        } => run_put(sources, text, stdin, into, settings).await,
        Command::Get { from, into } => run_get(from, into, settings).await,
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
