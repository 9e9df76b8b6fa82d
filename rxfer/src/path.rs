use anyhow::Context;

const REMOTE_OPERAND: &str =
    r"^(?:(?P<user>[^@]+)@)?(?P<host>(?:\[[^\]]+\]|[^:\[\]]+))(?::(?P<port>\d+))?:(?P<path>.+)$";

/// A command-line operand: a local path or `[user@]host[:port]:path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Local(std::path::PathBuf),
    Remote {
        session: remote::SshSession,
        path: std::path::PathBuf,
    },
}

impl Operand {
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Operand::Local(path) | Operand::Remote { path, .. } => path,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&remote::SshSession> {
        match self {
            Operand::Local(_) => None,
            Operand::Remote { session, .. } => Some(session),
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Operand::Local(path) => write!(f, "{}", path.display()),
            Operand::Remote { session, path } => write!(f, "{session}:{}", path.display()),
        }
    }
}

fn is_explicitly_local(operand: &str) -> bool {
    operand.starts_with('/') || operand.starts_with("./") || operand.starts_with("../")
}

/// Parse an operand; anything that does not name a host is local.
///
/// Relative remote paths are kept relative and resolve against the remote login directory.
pub fn parse_operand(operand: &str) -> anyhow::Result<Operand> {
    if is_explicitly_local(operand) {
        return Ok(Operand::Local(operand.into()));
    }
    let re = regex::Regex::new(REMOTE_OPERAND).context("invalid remote operand pattern")?;
    let Some(captures) = re.captures(operand) else {
        return Ok(Operand::Local(operand.into()));
    };
    let (Some(host), Some(path)) = (captures.name("host"), captures.name("path")) else {
        return Ok(Operand::Local(operand.into()));
    };
    let user = captures.name("user").map(|m| m.as_str().to_string());
    let port = captures
        .name("port")
        .map(|m| m.as_str().parse::<u16>())
        .transpose()
        .with_context(|| format!("invalid port in {operand:?}"))?;
    Ok(Operand::Remote {
        session: remote::SshSession {
            user,
            host: host.as_str().to_string(),
            port,
        },
        path: path.as_str().into(),
    })
}
