//! Caller-facing arguments for put/get and their canonical, validated form.
//!
//! [`PutArgs`] and [`GetArgs`] mirror the keyed argument surface (`from`, `text`, `bytes`,
//! `into`). Converting them into a [`PutRequest`] / [`GetRequest`] performs every argument-shape
//! check; this happens before either side of the transfer is touched.

use crate::error::{ArgumentError, Side};

/// The `from` key of a put
pub enum PutFrom {
    Path(std::path::PathBuf),
    Paths(Vec<std::path::PathBuf>),
    /// Any readable stream, including an open local file
    Stream(remote::BoxedRead),
}

impl std::fmt::Debug for PutFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PutFrom::Path(path) => f.debug_tuple("Path").field(path).finish(),
            PutFrom::Paths(paths) => f.debug_tuple("Paths").field(paths).finish(),
            PutFrom::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for PutFrom {
    fn from(path: &str) -> Self {
        PutFrom::Path(path.into())
    }
}

impl From<std::path::PathBuf> for PutFrom {
    fn from(path: std::path::PathBuf) -> Self {
        PutFrom::Path(path)
    }
}

impl From<&std::path::Path> for PutFrom {
    fn from(path: &std::path::Path) -> Self {
        PutFrom::Path(path.to_path_buf())
    }
}

impl From<Vec<std::path::PathBuf>> for PutFrom {
    fn from(paths: Vec<std::path::PathBuf>) -> Self {
        PutFrom::Paths(paths)
    }
}

impl From<tokio::fs::File> for PutFrom {
    fn from(file: tokio::fs::File) -> Self {
        PutFrom::Stream(Box::new(file))
    }
}

/// Arguments of a put; exactly one of `from`, `text` and `bytes` must be set, `into` always.
#[derive(Debug, Default)]
pub struct PutArgs {
    pub from: Option<PutFrom>,
    pub text: Option<String>,
    pub bytes: Option<bytes::Bytes>,
    /// Remote destination
    pub into: Option<std::path::PathBuf>,
}

/// The `into` key of a get
pub enum GetInto {
    Path(std::path::PathBuf),
    File(tokio::fs::File),
    Stream(remote::BoxedWrite),
}

impl std::fmt::Debug for GetInto {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GetInto::Path(path) => f.debug_tuple("Path").field(path).finish(),
            GetInto::File(_) => f.write_str("File(..)"),
            GetInto::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for GetInto {
    fn from(path: &str) -> Self {
        GetInto::Path(path.into())
    }
}

impl From<std::path::PathBuf> for GetInto {
    fn from(path: std::path::PathBuf) -> Self {
        GetInto::Path(path)
    }
}

impl From<&std::path::Path> for GetInto {
    fn from(path: &std::path::Path) -> Self {
        GetInto::Path(path.to_path_buf())
    }
}

impl From<tokio::fs::File> for GetInto {
    fn from(file: tokio::fs::File) -> Self {
        GetInto::File(file)
    }
}

/// Arguments of a get; `from` is mandatory, no `into` means "return the content".
#[derive(Debug, Default)]
pub struct GetArgs {
    /// Remote source
    pub from: Option<std::path::PathBuf>,
    pub into: Option<GetInto>,
}

/// Canonical description of what a put sends
pub enum ContentSource {
    LocalPath(std::path::PathBuf),
    LocalPathCollection(Vec<std::path::PathBuf>),
    TextContent(String),
    BinaryContent(bytes::Bytes),
    ReadableStream(remote::BoxedRead),
}

impl std::fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ContentSource::LocalPath(path) => f.debug_tuple("LocalPath").field(path).finish(),
            ContentSource::LocalPathCollection(paths) => {
                f.debug_tuple("LocalPathCollection").field(paths).finish()
            }
            ContentSource::TextContent(text) => {
                write!(f, "TextContent({} bytes)", text.len())
            }
            ContentSource::BinaryContent(bytes) => {
                write!(f, "BinaryContent({} bytes)", bytes.len())
            }
            ContentSource::ReadableStream(_) => f.write_str("ReadableStream(..)"),
        }
    }
}

/// Canonical description of where a get delivers
pub enum TransferTarget {
    LocalPath(std::path::PathBuf),
    LocalFileHandle(tokio::fs::File),
    WritableStream(remote::BoxedWrite),
    /// Hand the content back to the caller
    None,
}

impl std::fmt::Debug for TransferTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransferTarget::LocalPath(path) => f.debug_tuple("LocalPath").field(path).finish(),
            TransferTarget::LocalFileHandle(_) => f.write_str("LocalFileHandle(..)"),
            TransferTarget::WritableStream(_) => f.write_str("WritableStream(..)"),
            TransferTarget::None => f.write_str("None"),
        }
    }
}

#[derive(Debug)]
pub struct PutRequest {
    pub source: ContentSource,
    pub into: std::path::PathBuf,
}

#[derive(Debug)]
pub struct GetRequest {
    pub from: std::path::PathBuf,
    pub target: TransferTarget,
}

fn is_blank(path: &std::path::Path) -> bool {
    path.as_os_str().is_empty()
}

fn required_path(
    path: Option<std::path::PathBuf>,
    side: Side,
    key: &'static str,
) -> Result<std::path::PathBuf, ArgumentError> {
    match path {
        Some(path) if !is_blank(&path) => Ok(path),
        _ => Err(ArgumentError::Missing { side, key }),
    }
}

impl TryFrom<PutArgs> for PutRequest {
    type Error = ArgumentError;

    fn try_from(args: PutArgs) -> Result<Self, Self::Error> {
        let supplied: Vec<&'static str> = [
            ("from", args.from.is_some()),
            ("text", args.text.is_some()),
            ("bytes", args.bytes.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, present)| present.then_some(key))
        .collect();
        if supplied.len() > 1 {
            return Err(ArgumentError::Conflicting(supplied));
        }
        let missing_from = ArgumentError::Missing {
            side: Side::Local,
            key: "from",
        };
        let source = match (args.from, args.text, args.bytes) {
            (Some(PutFrom::Path(path)), _, _) => {
                ContentSource::LocalPath(required_path(Some(path), Side::Local, "from")?)
            }
            (Some(PutFrom::Paths(paths)), _, _) => {
                if paths.is_empty() || paths.iter().any(|path| is_blank(path)) {
                    return Err(missing_from);
                }
                ContentSource::LocalPathCollection(paths)
            }
            (Some(PutFrom::Stream(stream)), _, _) => ContentSource::ReadableStream(stream),
            (None, Some(text), _) => ContentSource::TextContent(text),
            (None, None, Some(bytes)) => ContentSource::BinaryContent(bytes),
            (None, None, None) => return Err(missing_from),
        };
        let into = required_path(args.into, Side::Remote, "into")?;
        Ok(PutRequest { source, into })
    }
}

impl TryFrom<GetArgs> for GetRequest {
    type Error = ArgumentError;

    fn try_from(args: GetArgs) -> Result<Self, Self::Error> {
        let from = required_path(args.from, Side::Remote, "from")?;
        let target = match args.into {
            Some(GetInto::Path(path)) => {
                TransferTarget::LocalPath(required_path(Some(path), Side::Local, "into")?)
            }
            Some(GetInto::File(file)) => TransferTarget::LocalFileHandle(file),
            Some(GetInto::Stream(stream)) => TransferTarget::WritableStream(stream),
            None => TransferTarget::None,
        };
        Ok(GetRequest { from, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(args: PutArgs) -> Result<PutRequest, ArgumentError> {
        PutRequest::try_from(args)
    }

    fn get(args: GetArgs) -> Result<GetRequest, ArgumentError> {
        GetRequest::try_from(args)
    }

    #[test]
    fn put_single_path() {
        let request = put(PutArgs {
            from: Some("local/a.txt".into()),
            into: Some("/srv/a.txt".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(request.source, ContentSource::LocalPath(ref p) if p.ends_with("a.txt")));
        assert_eq!(request.into, std::path::Path::new("/srv/a.txt"));
    }

    #[test]
    fn put_missing_from_is_local() {
        let error = put(PutArgs {
            from: None,
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            error,
            ArgumentError::Missing {
                side: Side::Local,
                key: "from"
            }
        );
    }

    #[test]
    fn put_empty_from_is_local() {
        let error = put(PutArgs {
            from: Some("".into()),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            error,
            ArgumentError::Missing {
                side: Side::Local,
                key: "from"
            }
        );
    }

    #[test]
    fn put_missing_into_is_remote() {
        for into in [None, Some(std::path::PathBuf::new())] {
            let error = put(PutArgs {
                from: Some("x".into()),
                into,
                ..Default::default()
            })
            .unwrap_err();
            assert_eq!(
                error,
                ArgumentError::Missing {
                    side: Side::Remote,
                    key: "into"
                }
            );
        }
    }

    #[test]
    fn put_conflicting_sources() {
        let error = put(PutArgs {
            text: Some("hello".to_string()),
            bytes: Some(bytes::Bytes::from_static(b"hello")),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(error, ArgumentError::Conflicting(vec!["text", "bytes"]));
        let error = put(PutArgs {
            from: Some("a".into()),
            text: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(error, ArgumentError::Conflicting(vec!["from", "text"]));
    }

    #[test]
    fn put_collection_rules() {
        let error = put(PutArgs {
            from: Some(PutFrom::Paths(vec![])),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(error, ArgumentError::Missing { side: Side::Local, .. }));
        let error = put(PutArgs {
            from: Some(PutFrom::Paths(vec!["a".into(), "".into()])),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(error, ArgumentError::Missing { side: Side::Local, .. }));
        let request = put(PutArgs {
            from: Some(vec!["a".into(), "b".into()].into()),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(request.source, ContentSource::LocalPathCollection(ref v) if v.len() == 2));
    }

    #[test]
    fn put_empty_text_and_bytes_are_content() {
        let request = put(PutArgs {
            text: Some(String::new()),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(request.source, ContentSource::TextContent(ref t) if t.is_empty()));
        let request = put(PutArgs {
            bytes: Some(bytes::Bytes::new()),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(request.source, ContentSource::BinaryContent(ref b) if b.is_empty()));
    }

    #[test]
    fn put_stream_source() {
        let request = put(PutArgs {
            from: Some(PutFrom::Stream(Box::new(&b"data"[..]))),
            into: Some("x".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(request.source, ContentSource::ReadableStream(_)));
        assert_eq!(format!("{:?}", request.source), "ReadableStream(..)");
    }

    #[test]
    fn get_requires_from() {
        let error = get(GetArgs {
            from: None,
            into: Some("x".into()),
        })
        .unwrap_err();
        assert_eq!(
            error,
            ArgumentError::Missing {
                side: Side::Remote,
                key: "from"
            }
        );
    }

    #[test]
    fn get_empty_into_is_local() {
        let error = get(GetArgs {
            from: Some("/srv/a".into()),
            into: Some("".into()),
        })
        .unwrap_err();
        assert_eq!(
            error,
            ArgumentError::Missing {
                side: Side::Local,
                key: "into"
            }
        );
    }

    #[test]
    fn get_without_into_returns_content() {
        let request = get(GetArgs {
            from: Some("/srv/a".into()),
            into: None,
        })
        .unwrap();
        assert!(matches!(request.target, TransferTarget::None));
        let request = get(GetArgs {
            from: Some("/srv/a".into()),
            into: Some(GetInto::Stream(Box::new(tokio::io::sink()))),
        })
        .unwrap();
        assert!(matches!(request.target, TransferTarget::WritableStream(_)));
    }
}
