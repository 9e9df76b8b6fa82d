//! Remote file access over an SSH session.
//!
//! Every capability is a short command on the remote host (`test`, `ls`, `mkdir`, `cat`) run
//! over one multiplexed `openssh` connection. File contents travel through the command's
//! stdin/stdout, so no extra software is needed on the remote side beyond a POSIX shell.

use anyhow::{Context, anyhow};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::instrument;

use crate::{Completion, DirEntry, EntryKind, FileAccess, PathState, Reader, Writer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSession {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl SshSession {
    /// Destination string understood by `ssh`
    #[must_use]
    pub fn destination(&self) -> String {
        let host = self.host.as_str();
        match (self.user.as_deref(), self.port) {
            (Some(user), Some(port)) => format!("ssh://{user}@{host}:{port}"),
            (None, Some(port)) => format!("ssh://{host}:{port}"),
            (Some(user), None) => format!("ssh://{user}@{host}"),
            (None, None) => format!("ssh://{host}"),
        }
    }
}

impl std::fmt::Display for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

/// Quote `value` for a POSIX shell
#[must_use]
pub fn shell_escape(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn path_str(path: &std::path::Path) -> anyhow::Result<&str> {
    path.to_str()
        .with_context(|| format!("remote path {path:?} is not valid UTF-8"))
}

fn stat_script(path: &str) -> String {
    let path = shell_escape(path);
    format!(
        "if [ -d {path} ]; then echo directory; elif [ -e {path} ]; then echo file; else echo absent; fi"
    )
}

fn parse_stat(output: &str) -> anyhow::Result<PathState> {
    match output.trim() {
        "directory" => Ok(PathState::Directory),
        "file" => Ok(PathState::File),
        "absent" => Ok(PathState::Absent),
        other => Err(anyhow!("unexpected stat output: {other:?}")),
    }
}

/// `-L` classifies symbolic links by their target, so a link to a directory lists as one
fn list_script(path: &str) -> String {
    format!("ls -A1pL -- {}", shell_escape(path))
}

/// Parse `ls -A1pL` output: one name per line, directories carry a trailing `/`
fn parse_listing(output: &str) -> Vec<DirEntry> {
    let mut listing: Vec<DirEntry> = output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_suffix('/') {
            Some(name) => DirEntry {
                name: name.into(),
                kind: EntryKind::Directory,
            },
            None => DirEntry {
                name: line.into(),
                kind: EntryKind::File,
            },
        })
        .collect();
    listing.sort_by(|a, b| a.name.cmp(&b.name));
    listing
}

async fn wait_for_command(
    mut child: openssh::Child<Arc<openssh::Session>>,
    what: String,
) -> anyhow::Result<()> {
    let mut stderr_data = Vec::new();
    let stderr_read = match child.stderr().take() {
        Some(mut stderr) => stderr.read_to_end(&mut stderr_data).await.map(|_| ()),
        None => Ok(()),
    };
    if let Err(error) = stderr_read {
        tracing::debug!("failed reading stderr of remote command ({}): {:#}", &what, error);
    }
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to wait for remote command ({what})"))?;
    if !status.success() {
        return Err(anyhow!(
            "remote command failed ({what}), status code: {:?}, stderr: {}",
            status.code(),
            String::from_utf8_lossy(&stderr_data).trim()
        ));
    }
    Ok(())
}

/// A remote host reached over SSH
pub struct SshFs {
    label: String,
    session: Arc<openssh::Session>,
}

impl std::fmt::Debug for SshFs {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SshFs").field("label", &self.label).finish()
    }
}

impl SshFs {
    #[instrument]
    pub async fn connect(session: &SshSession) -> anyhow::Result<Self> {
        let destination = session.destination();
        tracing::debug!("Connecting to SSH destination: {}", destination);
        let ssh = openssh::Session::connect(&destination, openssh::KnownHosts::Add)
            .await
            .with_context(|| format!("Failed to establish SSH connection to {destination}"))?;
        Ok(Self {
            label: session.to_string(),
            session: Arc::new(ssh),
        })
    }

    async fn run_script(&self, script: &str) -> anyhow::Result<String> {
        tracing::trace!("running remote script: {}", script);
        let output = self
            .session
            .command("sh")
            .arg("-c")
            .arg(script)
            .output()
            .await
            .context("failed to run remote command")?;
        if !output.status.success() {
            return Err(anyhow!(
                "remote command failed, status code: {:?}, stderr: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl FileAccess for SshFs {
    fn describe(&self) -> String {
        self.label.clone()
    }

    #[instrument(skip(self))]
    async fn stat(&mut self, path: &std::path::Path) -> anyhow::Result<PathState> {
        let output = self
            .run_script(&stat_script(path_str(path)?))
            .await
            .with_context(|| format!("failed reading metadata from {path:?}"))?;
        parse_stat(&output)
    }

    #[instrument(skip(self))]
    async fn list(&mut self, path: &std::path::Path) -> anyhow::Result<Vec<DirEntry>> {
        let output = self
            .run_script(&list_script(path_str(path)?))
            .await
            .with_context(|| format!("cannot open directory {path:?} for reading"))?;
        Ok(parse_listing(&output))
    }

    #[instrument(skip(self))]
    async fn make_dir(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        let path_arg = shell_escape(path_str(path)?);
        self.run_script(&format!("[ -d {path_arg} ] || mkdir -- {path_arg}"))
            .await
            .with_context(|| format!("cannot create directory {path:?}"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_read(&mut self, path: &std::path::Path) -> anyhow::Result<Reader> {
        let mut cmd = Arc::clone(&self.session).arc_command("cat");
        let mut child = cmd
            .arg("--")
            .arg(path_str(path)?)
            .stdin(openssh::Stdio::null())
            .stdout(openssh::Stdio::piped())
            .stderr(openssh::Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("cannot open {path:?} for reading"))?;
        let stdout = child
            .stdout()
            .take()
            .context("failed to get stdout for remote command")?;
        let completion: Completion =
            Box::pin(wait_for_command(child, format!("reading {path:?}")));
        Ok(Reader::with_completion(Box::new(stdout), completion))
    }

    #[instrument(skip(self))]
    async fn open_write(&mut self, path: &std::path::Path) -> anyhow::Result<Writer> {
        let script = format!("cat > {}", shell_escape(path_str(path)?));
        let mut cmd = Arc::clone(&self.session).arc_command("sh");
        let mut child = cmd
            .arg("-c")
            .arg(&script)
            .stdin(openssh::Stdio::piped())
            .stdout(openssh::Stdio::null())
            .stderr(openssh::Stdio::piped())
            .spawn()
            .await
            .with_context(|| format!("cannot open {path:?} for writing"))?;
        let stdin = child
            .stdin()
            .take()
            .context("failed to get stdin for remote command")?;
        let completion: Completion =
            Box::pin(wait_for_command(child, format!("writing {path:?}")));
        Ok(Writer::with_completion(Box::new(stdin), completion))
    }
}
