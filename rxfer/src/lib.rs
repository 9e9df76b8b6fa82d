//! Remote put/get with merge-and-overwrite directory semantics
//!
//! `rxfer` moves files and directory trees between the local filesystem and a remote side
//! reached through a [`remote::FileAccess`] channel (SSH in production, the local filesystem
//! for loopback use and tests).
//!
//! # Semantics
//!
//! - **Naming** - a source sent to an existing directory lands inside it under its base name;
//!   sent to an absent path or an existing file, it becomes that path
//! - **Merge** - existing destination directories are reused as they are; entries the source
//!   does not mention are left alone
//! - **Overwrite** - files that exist at the destination are always replaced
//! - **Nothing is deleted** - every side effect is a directory creation or a file write
//!
//! A directory can never replace a file or vice versa; such conflicts are reported as
//! [`Error::TypeMismatch`] before anything is modified, because the whole plan is computed
//! before the first step runs.
//!
//! # Sources and destinations
//!
//! A put takes exactly one of: a local path, a collection of local paths, literal text,
//! literal bytes or a readable stream (see [`PutArgs`]). A get delivers to a local path, an
//! open file, a writable stream, or back to the caller as text or bytes depending on the
//! configured [`common::Encoding`] (see [`GetArgs`]).
//!
//! # Errors
//!
//! Missing or conflicting arguments, type conflicts and missing sources are all detected before
//! either side is modified. Directory creation and I/O failures abort the remaining steps;
//! what was already done stays done and is reported in the error's [`Summary`].
//!
//! # Sessions
//!
//! A [`Session`] owns one channel and runs one operation at a time. Independent sessions can
//! run concurrently with [`dispatch::run_sessions`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let mut session = rxfer::Session::new(
//!     Box::new(remote::LocalFs::new()),
//!     common::TransferSettings::default(),
//! );
//! session
//!     .put(rxfer::PutArgs {
//!         text: Some("hello".to_string()),
//!         into: Some("/tmp/greeting.txt".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//! let fetched = session
//!     .get(rxfer::GetArgs {
//!         from: Some("/tmp/greeting.txt".into()),
//!         into: None,
//!     })
//!     .await?;
//! assert_eq!(fetched, rxfer::Fetched::Text("hello".to_string()));
//! # Ok(())
//! # }
//! ```

use common::{TransferOverrides, TransferSettings};
use remote::FileAccess;
use tracing::instrument;

pub mod dispatch;
pub mod error;
pub mod execute;
pub mod path;
pub mod plan;
pub mod resolve;
pub mod source;
pub mod transfer;

#[cfg(test)]
mod testutils;

pub use error::{ArgumentError, Error, Side, Summary};
pub use source::{GetArgs, GetInto, PutArgs, PutFrom};
pub use transfer::{Fetched, get, put};

/// One remote channel plus the local side and the base settings for operations on it
pub struct Session {
    name: String,
    channel: Box<dyn FileAccess>,
    local: Box<dyn FileAccess>,
    settings: TransferSettings,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(channel: Box<dyn FileAccess>, settings: TransferSettings) -> Self {
        Self {
            name: channel.describe(),
            channel,
            local: Box::new(remote::LocalFs::new()),
            settings,
        }
    }

    /// Open a session for a parsed command-line operand
    pub async fn open(
        operand: &path::Operand,
        settings: TransferSettings,
    ) -> anyhow::Result<Self> {
        let channel: Box<dyn FileAccess> = match operand.session() {
            Some(ssh) => Box::new(remote::SshFs::connect(ssh).await?),
            None => Box::new(remote::LocalFs::new()),
        };
        Ok(Self::new(channel, settings))
    }

    /// Replace the local side, e.g. with an instrumented channel
    #[must_use]
    pub fn with_local(mut self, local: Box<dyn FileAccess>) -> Self {
        self.local = local;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub async fn put(&mut self, args: PutArgs) -> Result<Summary, Error> {
        self.put_with(args, &TransferOverrides::default()).await
    }

    /// Put with per-call settings layered over the session's
    #[instrument(skip_all, fields(session = %self.name))]
    pub async fn put_with(
        &mut self,
        args: PutArgs,
        overrides: &TransferOverrides,
    ) -> Result<Summary, Error> {
        let settings = self.settings.merged(overrides);
        put(
            self.local.as_mut(),
            self.channel.as_mut(),
            args,
            &settings,
        )
        .await
    }

    pub async fn get(&mut self, args: GetArgs) -> Result<Fetched, Error> {
        self.get_with(args, &TransferOverrides::default()).await
    }

    /// Get with per-call settings layered over the session's
    #[instrument(skip_all, fields(session = %self.name))]
    pub async fn get_with(
        &mut self,
        args: GetArgs,
        overrides: &TransferOverrides,
    ) -> Result<Fetched, Error> {
        let settings = self.settings.merged(overrides);
        get(
            self.channel.as_mut(),
            self.local.as_mut(),
            args,
            &settings,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Encoding;
    use remote::LocalFs;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn per_call_overrides_apply_once() -> Result<(), anyhow::Error> {
        let tmp_dir = tempfile::tempdir()?;
        let target = tmp_dir.path().join("data.bin");
        let mut session = Session::new(Box::new(LocalFs::new()), TransferSettings::default());
        assert_eq!(session.name(), "local");
        session
            .put(PutArgs {
                bytes: Some(bytes::Bytes::from_static(b"\x00\x01")),
                into: Some(target.clone()),
                ..Default::default()
            })
            .await?;
        let binary = TransferOverrides {
            encoding: Some(Encoding::Binary),
            ..Default::default()
        };
        let fetched = session
            .get_with(
                GetArgs {
                    from: Some(target.clone()),
                    into: None,
                },
                &binary,
            )
            .await?;
        assert_eq!(fetched, Fetched::Bytes(vec![0, 1]));
        // the session's own settings are unchanged
        assert_eq!(session.settings().encoding, Encoding::Utf8);
        let dry = TransferOverrides {
            dry_run: Some(true),
            ..Default::default()
        };
        let summary = session
            .put_with(
                PutArgs {
                    text: Some("changed".into()),
                    into: Some(target.clone()),
                    ..Default::default()
                },
                &dry,
            )
            .await?;
        assert_eq!(summary, Summary::default());
        assert_eq!(tokio::fs::read(&target).await?, vec![0, 1]);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn instrumented_local_side() -> Result<(), anyhow::Error> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let mut session = Session::new(Box::new(LocalFs::new()), TransferSettings::default())
            .with_local(Box::new(testutils::CountingFs::new(LocalFs::new())));
        let summary = session
            .put(PutArgs {
                from: Some(tmp_dir.path().join("foo").join("bar").into()),
                into: Some(tmp_dir.path().join("bar-copy")),
                ..Default::default()
            })
            .await?;
        assert_eq!(summary.files_copied, 3);
        assert_eq!(summary.directories_created, 1);
        Ok(())
    }
}
