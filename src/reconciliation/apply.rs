//! Filesystem side effects of file reconciliation.

use super::entry::{Attributes, EntryKind};
use std::fs::{FileTimes, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{fchown, lchown, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tokio::fs;

/// Create a directory and give it the source's attributes
pub async fn create_directory(destination: &Path, attributes: &Attributes) -> io::Result<()> {
    fs::create_dir_all(destination).await?;
    apply_attributes(destination, attributes).await
}

/// Set owner, group and mode on an existing non-symlink path
pub async fn apply_attributes(path: &Path, attributes: &Attributes) -> io::Result<()> {
    lchown(path, Some(attributes.uid), Some(attributes.gid))?;
    fs::set_permissions(path, Permissions::from_mode(attributes.mode)).await
}

/// Place `content_source` at `destination`.
///
/// Symlinks are recreated as links pointing at the same target. Everything
/// else is copied byte for byte, then given `attributes` and the content
/// source's timestamps.
pub async fn copy_entry(
    content_source: &Path,
    destination: &Path,
    kind: EntryKind,
    attributes: &Attributes,
) -> io::Result<()> {
    match kind {
        EntryKind::Directory => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "directories are not copied"))
        }
        EntryKind::Symlink => {
            let target = fs::read_link(content_source).await?;
            remove_if_not_directory(destination).await?;
            fs::symlink(&target, destination).await?;
            lchown(destination, Some(attributes.uid), Some(attributes.gid))
        }
        EntryKind::Regular | EntryKind::Template => {
            // Replace rather than write through links or read-only files
            remove_if_not_directory(destination).await?;
            copy_file(content_source, destination, attributes)
        }
    }
}

/// Copy content, times and owner through one writable handle. The mode is
/// applied last.
fn copy_file(source: &Path, destination: &Path, attributes: &Attributes) -> io::Result<()> {
    let mut input = std::fs::File::open(source)?;
    let metadata = input.metadata()?;
    let times = FileTimes::new()
        .set_modified(metadata.modified()?)
        .set_accessed(metadata.accessed()?);

    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(destination)?;
    io::copy(&mut input, &mut output)?;
    output.set_times(times)?;
    fchown(&output, Some(attributes.uid), Some(attributes.gid))?;
    output.set_permissions(Permissions::from_mode(attributes.mode))
}

async fn remove_if_not_directory(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} is a directory", path.display()),
        )),
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    fn own_attributes(mode: u32) -> Attributes {
        Attributes {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            mode,
            mtime: 0,
        }
    }

    #[tokio::test]
    async fn test_copy_regular_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&source, "data").await.unwrap();

        copy_entry(&source, &dest, EntryKind::Regular, &own_attributes(0o600))
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "data");
        let metadata = fs::metadata(&dest).await.unwrap();
        assert_eq!(metadata.mode() & 0o7777, 0o600);
        let source_metadata = fs::metadata(&source).await.unwrap();
        assert_eq!(metadata.mtime(), source_metadata.mtime());
    }

    #[tokio::test]
    async fn test_copy_regular_with_unreadable_mode_keeps_times() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&source, "sealed").await.unwrap();
        fs::write(&dest, "previous").await.unwrap();

        copy_entry(&source, &dest, EntryKind::Regular, &own_attributes(0o000))
            .await
            .unwrap();

        let metadata = fs::symlink_metadata(&dest).await.unwrap();
        assert_eq!(metadata.mode() & 0o7777, 0o000);
        assert_eq!(metadata.len(), "sealed".len() as u64);
        let source_metadata = fs::metadata(&source).await.unwrap();
        assert_eq!(metadata.mtime(), source_metadata.mtime());

        std::fs::set_permissions(&dest, Permissions::from_mode(0o600)).unwrap();
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "sealed");
    }

    #[tokio::test]
    async fn test_copy_regular_replaces_symlink_instead_of_following() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let victim = dir.path().join("victim");
        let dest = dir.path().join("dest");
        fs::write(&source, "new").await.unwrap();
        fs::write(&victim, "untouched").await.unwrap();
        fs::symlink(&victim, &dest).await.unwrap();

        copy_entry(&source, &dest, EntryKind::Regular, &own_attributes(0o644))
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&victim).await.unwrap(), "untouched");
        assert!(!fs::symlink_metadata(&dest).await.unwrap().file_type().is_symlink());
    }

    #[tokio::test]
    async fn test_copy_symlink_keeps_link() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("link");
        let dest = dir.path().join("dest");
        fs::symlink("/etc/hostname", &source).await.unwrap();
        fs::write(&dest, "regular file").await.unwrap();

        copy_entry(&source, &dest, EntryKind::Symlink, &own_attributes(0o777))
            .await
            .unwrap();

        assert_eq!(
            fs::read_link(&dest).await.unwrap(),
            Path::new("/etc/hostname")
        );
    }

    #[tokio::test]
    async fn test_copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = copy_entry(
            &dir.path().join("missing"),
            &dir.path().join("dest"),
            EntryKind::Regular,
            &own_attributes(0o644),
        )
        .await;
        assert!(result.is_err());
    }
}
