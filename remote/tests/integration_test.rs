use anyhow::Result;
use remote::{EntryKind, FileAccess, PathState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn write_through(
    channel: &mut dyn FileAccess,
    path: &std::path::Path,
    data: &[u8],
) -> Result<()> {
    let mut writer = channel.open_write(path).await?;
    writer.write_all(data).await?;
    writer.close().await
}

async fn read_through(channel: &mut dyn FileAccess, path: &std::path::Path) -> Result<Vec<u8>> {
    let mut reader = channel.open_read(path).await?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await?;
    reader.close().await?;
    Ok(data)
}

#[tokio::test]
async fn test_local_channel_as_trait_object() -> Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let mut channel: Box<dyn FileAccess> = Box::new(remote::LocalFs::new());
    assert_eq!(channel.describe(), "local");
    let root = tmp_dir.path().join("root");
    channel.make_dir(&root).await?;
    channel.make_dir(&root.join("sub")).await?;
    let payload: Vec<u8> = (0..12345u32).map(|i| (i % 251) as u8).collect();
    write_through(channel.as_mut(), &root.join("blob.bin"), &payload).await?;
    write_through(channel.as_mut(), &root.join("empty"), b"").await?;
    assert_eq!(channel.stat(&root).await?, PathState::Directory);
    assert_eq!(channel.stat(&root.join("blob.bin")).await?, PathState::File);
    let listing = channel.list(&root).await?;
    let kinds: Vec<_> = listing
        .iter()
        .map(|e| (e.name.to_string_lossy().into_owned(), e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("blob.bin".to_string(), EntryKind::File),
            ("empty".to_string(), EntryKind::File),
            ("sub".to_string(), EntryKind::Directory),
        ]
    );
    assert_eq!(read_through(channel.as_mut(), &root.join("blob.bin")).await?, payload);
    assert!(read_through(channel.as_mut(), &root.join("empty")).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_symlinks_are_followed() -> Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let target_dir = tmp_dir.path().join("target");
    tokio::fs::create_dir(&target_dir).await?;
    tokio::fs::write(target_dir.join("f.txt"), "f").await?;
    tokio::fs::symlink(&target_dir, tmp_dir.path().join("link")).await?;
    let mut channel = remote::LocalFs;
    assert_eq!(
        channel.stat(&tmp_dir.path().join("link")).await?,
        PathState::Directory
    );
    let listing = channel.list(tmp_dir.path()).await?;
    assert!(listing.iter().all(|e| e.kind == EntryKind::Directory));
    Ok(())
}
