//! `cap-std` implementation of the transfer filesystem port.
//!
//! The primary root is opened once and every primary-tier path is resolved
//! relative to that handle, so `..` and absolute paths cannot reach outside
//! it. Staging roots are opened per call. Moves are single renames and never
//! replace an existing entry; both roots must live on the same filesystem.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use tracing::debug;

use crate::domain::ports::{EntryKind, TransferFilesystem, TransferFilesystemError};
use crate::domain::{EntryName, PrimaryPath, StagingPath};

/// Transfer filesystem rooted at the primary tier's directory.
#[derive(Debug, Clone)]
pub struct CapStdTransferFilesystem {
    primary: Arc<Dir>,
}

impl CapStdTransferFilesystem {
    /// Open `primary_root` as the root of the primary tier.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be opened.
    pub fn open(primary_root: &Path) -> io::Result<Self> {
        let primary = Dir::open_ambient_dir(primary_root, ambient_authority())?;
        Ok(Self {
            primary: Arc::new(primary),
        })
    }
}

fn io_error(error: io::Error) -> TransferFilesystemError {
    TransferFilesystemError::io(error.to_string())
}

fn kind_of(dir: &Dir, path: &Path) -> Result<EntryKind, TransferFilesystemError> {
    match dir.metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(EntryKind::Folder),
        Ok(meta) if meta.is_file() => Ok(EntryKind::File),
        Ok(_) => Ok(EntryKind::Missing),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
        Err(err) => Err(io_error(err)),
    }
}

fn ensure_vacant(
    dir: &Dir,
    name: &EntryName,
    shown: String,
) -> Result<(), TransferFilesystemError> {
    match dir.symlink_metadata(name.as_str()) {
        Ok(_) => Err(TransferFilesystemError::destination_exists(shown)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(err)),
    }
}

fn open_staging(root: &Path) -> Result<Dir, TransferFilesystemError> {
    Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            TransferFilesystemError::io(format!("staging root {} is missing", root.display()))
        } else {
            io_error(err)
        }
    })
}

fn place_staged(
    primary: &Dir,
    staging_root: &Path,
    staged: &StagingPath,
    folder: &PrimaryPath,
    name: &EntryName,
) -> Result<(), TransferFilesystemError> {
    let staging = open_staging(staging_root)?;
    if kind_of(&staging, Path::new(staged.as_str()))? == EntryKind::Missing {
        return Err(TransferFilesystemError::source_not_found(staged.as_str()));
    }
    if kind_of(primary, Path::new(&folder.to_relative()))? != EntryKind::Folder {
        return Err(TransferFilesystemError::destination_not_found(folder.to_string()));
    }
    let destination = primary
        .open_dir(folder.to_relative())
        .map_err(io_error)?;
    ensure_vacant(&destination, name, folder.join(name).to_string())?;
    staging
        .rename(staged.as_str(), &destination, name.as_str())
        .map_err(io_error)
}

fn place_primary(
    primary: &Dir,
    file: &PrimaryPath,
    staging_root: &Path,
    folder: &StagingPath,
    name: &EntryName,
) -> Result<(), TransferFilesystemError> {
    if kind_of(primary, Path::new(&file.to_relative()))? != EntryKind::File {
        return Err(TransferFilesystemError::source_not_found(file.to_string()));
    }
    let staging = open_staging(staging_root)?;
    staging.create_dir_all(folder.as_str()).map_err(io_error)?;
    let destination = staging.open_dir(folder.as_str()).map_err(io_error)?;
    ensure_vacant(&destination, name, format!("{folder}/{}", name.as_str()))?;
    primary
        .rename(file.to_relative(), &destination, name.as_str())
        .map_err(io_error)
}

async fn blocking<T, F>(task: F) -> Result<T, TransferFilesystemError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransferFilesystemError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| TransferFilesystemError::io(format!("filesystem task failed: {err}")))?
}

#[async_trait]
impl TransferFilesystem for CapStdTransferFilesystem {
    async fn entry_kind(&self, path: &PrimaryPath) -> Result<EntryKind, TransferFilesystemError> {
        let primary = Arc::clone(&self.primary);
        let relative = PathBuf::from(path.to_relative());
        blocking(move || kind_of(&primary, &relative)).await
    }

    async fn move_staged_into_primary(
        &self,
        staging_root: &Path,
        staged: &StagingPath,
        folder: &PrimaryPath,
        name: &EntryName,
    ) -> Result<(), TransferFilesystemError> {
        let primary = Arc::clone(&self.primary);
        let staging_root = staging_root.to_path_buf();
        let (staged, folder, name) = (staged.clone(), folder.clone(), name.clone());
        debug!(staged = %staged, folder = %folder, "placing staged content");
        blocking(move || place_staged(&primary, &staging_root, &staged, &folder, &name)).await
    }

    async fn move_primary_into_staging(
        &self,
        file: &PrimaryPath,
        staging_root: &Path,
        folder: &StagingPath,
        name: &EntryName,
    ) -> Result<(), TransferFilesystemError> {
        let primary = Arc::clone(&self.primary);
        let staging_root = staging_root.to_path_buf();
        let (file, folder, name) = (file.clone(), folder.clone(), name.clone());
        debug!(file = %file, folder = %folder, "staging primary file");
        blocking(move || place_primary(&primary, &file, &staging_root, &folder, &name)).await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    struct Roots {
        primary: TempDir,
        staging: TempDir,
        filesystem: CapStdTransferFilesystem,
    }

    #[fixture]
    fn roots() -> Roots {
        let primary = tempfile::tempdir().expect("primary tempdir");
        let staging = tempfile::tempdir().expect("staging tempdir");
        let filesystem = CapStdTransferFilesystem::open(primary.path()).expect("open primary");
        Roots {
            primary,
            staging,
            filesystem,
        }
    }

    fn path(raw: &str) -> PrimaryPath {
        PrimaryPath::parse(raw).expect("valid path")
    }

    fn name(raw: &str) -> EntryName {
        EntryName::parse(raw).expect("valid name")
    }

    fn staged(raw: &str) -> StagingPath {
        StagingPath::parse(raw).expect("valid staging path")
    }

    #[rstest]
    #[tokio::test]
    async fn entry_kinds_are_reported(roots: Roots) {
        fs::create_dir(roots.primary.path().join("docs")).expect("mkdir");
        fs::write(roots.primary.path().join("docs/a.txt"), b"a").expect("write");

        let fs_port = &roots.filesystem;
        assert_eq!(
            fs_port.entry_kind(&path("/")).await.expect("root"),
            EntryKind::Folder
        );
        assert_eq!(
            fs_port.entry_kind(&path("/docs")).await.expect("docs"),
            EntryKind::Folder
        );
        assert_eq!(
            fs_port.entry_kind(&path("/docs/a.txt")).await.expect("file"),
            EntryKind::File
        );
        assert_eq!(
            fs_port.entry_kind(&path("/docs/b.txt")).await.expect("missing"),
            EntryKind::Missing
        );
    }

    #[rstest]
    #[tokio::test]
    async fn staged_content_lands_in_the_primary_folder_once(roots: Roots) {
        fs::create_dir(roots.primary.path().join("inbox")).expect("mkdir inbox");
        fs::create_dir(roots.staging.path().join("out")).expect("mkdir out");
        fs::write(roots.staging.path().join("out/r.pdf"), b"report").expect("write staged");

        roots
            .filesystem
            .move_staged_into_primary(
                roots.staging.path(),
                &staged("out/r.pdf"),
                &path("/inbox"),
                &name("report.pdf"),
            )
            .await
            .expect("placed");

        let placed =
            fs::read(roots.primary.path().join("inbox/report.pdf")).expect("read placed");
        assert_eq!(placed, b"report");
        assert!(!roots.staging.path().join("out/r.pdf").exists());

        let repeat = roots
            .filesystem
            .move_staged_into_primary(
                roots.staging.path(),
                &staged("out/r.pdf"),
                &path("/inbox"),
                &name("report.pdf"),
            )
            .await
            .expect_err("source gone");
        assert!(matches!(repeat, TransferFilesystemError::SourceNotFound { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn placement_never_overwrites(roots: Roots) {
        fs::create_dir(roots.primary.path().join("inbox")).expect("mkdir inbox");
        fs::write(roots.primary.path().join("inbox/report.pdf"), b"old").expect("write old");
        fs::write(roots.staging.path().join("r.pdf"), b"new").expect("write staged");

        let err = roots
            .filesystem
            .move_staged_into_primary(
                roots.staging.path(),
                &staged("r.pdf"),
                &path("/inbox"),
                &name("report.pdf"),
            )
            .await
            .expect_err("collision");

        assert!(matches!(err, TransferFilesystemError::DestinationExists { .. }));
        assert_eq!(
            fs::read(roots.primary.path().join("inbox/report.pdf")).expect("read"),
            b"old"
        );
        assert!(roots.staging.path().join("r.pdf").exists());
    }

    #[rstest]
    #[tokio::test]
    async fn missing_destination_folders_are_reported(roots: Roots) {
        fs::write(roots.staging.path().join("r.pdf"), b"new").expect("write staged");

        let err = roots
            .filesystem
            .move_staged_into_primary(
                roots.staging.path(),
                &staged("r.pdf"),
                &path("/nowhere"),
                &name("r.pdf"),
            )
            .await
            .expect_err("no folder");

        assert!(matches!(err, TransferFilesystemError::DestinationNotFound { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn primary_files_move_into_staging(roots: Roots) {
        fs::create_dir(roots.primary.path().join("a")).expect("mkdir");
        fs::write(roots.primary.path().join("a/b.txt"), b"bytes").expect("write");

        roots
            .filesystem
            .move_primary_into_staging(
                &path("/a/b.txt"),
                roots.staging.path(),
                &staged("user/in"),
                &name("b.txt"),
            )
            .await
            .expect("staged");

        assert_eq!(
            fs::read(roots.staging.path().join("user/in/b.txt")).expect("read"),
            b"bytes"
        );
        assert!(!roots.primary.path().join("a/b.txt").exists());
    }
}
