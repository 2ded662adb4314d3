//! Collects dSYM artifacts into a fresh temporary directory ready for upload.
//!
//! The staging directory outlives [`Stager::prepare_artifacts`]; whoever
//! receives the [`StagingResult`] is responsible for calling
//! [`cleanup_staging`] once uploads are done.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::StagingConfig;
use crate::error::UserFriendlyError;
use crate::services::archiver::{Archiver, create_archiver};
use crate::utils::validation::{DsymInputShape, validate_dsyms_path};

pub mod scan;

pub use scan::{DsymScan, scan_directory};

/// Every staging directory name starts with this marker
pub const STAGING_DIR_PREFIX: &str = "splunk_dSYMs_upload_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingResult {
    pub zip_files: Vec<PathBuf>,
    pub upload_path: PathBuf,
}

pub struct Stager {
    archiver: Box<dyn Archiver>,
    temp_root: PathBuf,
}

impl Stager {
    pub fn new(archiver: Box<dyn Archiver>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            archiver,
            temp_root: temp_root.into(),
        }
    }

    pub fn from_config(config: &StagingConfig) -> Self {
        Self::new(create_archiver(&config.archiver), config.temp_root.clone())
    }

    /// Validate `path`, then zip or copy whatever it points at into a new
    /// staging directory.
    pub fn prepare_artifacts(&self, path: impl AsRef<Path>) -> Result<StagingResult, UserFriendlyError> {
        let (abs_path, shape) = validate_dsyms_path(path)?;
        let upload_path = self.create_staging_dir()?;

        debug!(
            "Staging {} ({:?}) into {} with the {} archiver",
            abs_path.display(),
            shape,
            upload_path.display(),
            self.archiver.name()
        );

        match self.stage(&abs_path, shape, &upload_path) {
            Ok(zip_files) => {
                info!(
                    "Prepared {} dSYM archive(s) in {}",
                    zip_files.len(),
                    upload_path.display()
                );
                Ok(StagingResult {
                    zip_files,
                    upload_path,
                })
            }
            Err(e) => {
                cleanup_staging(&upload_path);
                Err(e)
            }
        }
    }

    fn stage(
        &self,
        abs_path: &Path,
        shape: DsymInputShape,
        upload_path: &Path,
    ) -> Result<Vec<PathBuf>, UserFriendlyError> {
        match shape {
            DsymInputShape::DsymsDirectory => {
                let scan = scan_directory(abs_path)?;
                let mut results = Vec::with_capacity(scan.dsym_dirs.len() + scan.dsym_zip_files.len());

                for dsym_dir in &scan.dsym_dirs {
                    results.push(self.zip_directory(abs_path, dsym_dir, upload_path)?);
                }
                for zip_file in &scan.dsym_zip_files {
                    // A bundle zipped above already owns this name in the staging dir
                    let dest = upload_path.join(zip_file);
                    if results.contains(&dest) {
                        warn!(
                            "Skipping {} because {} was already zipped from its .dSYM bundle",
                            abs_path.join(zip_file).display(),
                            zip_file
                        );
                        continue;
                    }
                    results.push(copy_into(&abs_path.join(zip_file), upload_path)?);
                }

                if results.is_empty() {
                    warn!(
                        "No .dSYM bundles or .dSYM.zip files found in {}",
                        abs_path.display()
                    );
                }
                Ok(results)
            }
            DsymInputShape::ZipFile => Ok(vec![copy_into(abs_path, upload_path)?]),
            DsymInputShape::DsymDirectory => {
                let (parent, name) = split_parent(abs_path)?;
                Ok(vec![self.zip_directory(parent, &name, upload_path)?])
            }
        }
    }

    fn create_staging_dir(&self) -> Result<PathBuf, UserFriendlyError> {
        tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(&self.temp_root)
            .map(|dir| dir.keep())
            .map_err(|e| {
                UserFriendlyError::with_source(
                    e,
                    format!(
                        "Failed to create a temporary upload directory in {}. Please check that it exists and is writable.",
                        self.temp_root.display()
                    ),
                )
            })
    }

    /// Zip `parent_dir/dir_name` into `dest_dir/dir_name.zip`
    pub fn zip_directory(
        &self,
        parent_dir: &Path,
        dir_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, UserFriendlyError> {
        let source_path = parent_dir.join(dir_name);
        let zip_path = dest_dir.join(format!("{}.zip", dir_name));

        self.archiver.archive(&source_path, &zip_path).map_err(|e| {
            UserFriendlyError::with_source(
                e,
                format!(
                    "Failed to zip {}. Please ensure you have the necessary permissions and that the zip command is available.",
                    source_path.display()
                ),
            )
        })?;

        debug!("Zipped {} -> {}", source_path.display(), zip_path.display());
        Ok(zip_path)
    }
}

fn split_parent(path: &Path) -> Result<(&Path, String), UserFriendlyError> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => Ok((parent, name.to_string_lossy().into_owned())),
        _ => Err(UserFriendlyError::new(
            "Unexpected error with the provided input path.",
        )),
    }
}

/// Copy `src` verbatim into `dest_dir`, keeping its file name
fn copy_into(src: &Path, dest_dir: &Path) -> Result<PathBuf, UserFriendlyError> {
    let (_, name) = split_parent(src)?;
    let dest = dest_dir.join(name);

    fs::copy(src, &dest).map_err(|e| {
        UserFriendlyError::from_io(
            e,
            src,
            &[
                (
                    io::ErrorKind::NotFound,
                    format!(
                        "Failed to copy {} to {}. Please ensure the file exists and is not in use.",
                        src.display(),
                        dest.display()
                    ),
                ),
                (
                    io::ErrorKind::PermissionDenied,
                    format!(
                        "Permission denied while copying {}. Please check your access rights.",
                        src.display()
                    ),
                ),
            ],
        )
    })?;

    Ok(dest)
}

/// Remove a staging directory and everything in it.
///
/// Refuses, with a warning, to touch anything whose name does not carry the
/// staging marker. Failures are logged and never returned.
pub fn cleanup_staging(upload_path: impl AsRef<Path>) {
    let upload_path = upload_path.as_ref();
    let is_staging_dir = upload_path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains(STAGING_DIR_PREFIX));

    if !is_staging_dir {
        warn!(
            "Refusing to delete '{}' as it does not appear to be a temp dSYMs upload directory.",
            upload_path.display()
        );
        return;
    }

    match fs::remove_dir_all(upload_path) {
        Ok(()) => debug!("Removed staging directory {}", upload_path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove temporary directory '{}': {}",
            upload_path.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::archiver::{ArchiveError, InProcessArchiver, ZipCommandArchiver};

    struct FailingArchiver;

    impl Archiver for FailingArchiver {
        fn archive(&self, _source_dir: &Path, _dest_zip: &Path) -> Result<(), ArchiveError> {
            Err(ArchiveError::Io(io::Error::other("disk full")))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_staging_dir_carries_marker() {
        let root = tempfile::tempdir().unwrap();
        let stager = Stager::new(Box::new(InProcessArchiver), root.path());

        let first = stager.create_staging_dir().unwrap();
        let second = stager.create_staging_dir().unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with(root.path()));
        assert!(
            first
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(STAGING_DIR_PREFIX)
        );
    }

    #[test]
    fn test_archiver_failure_removes_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();
        let bundle = input.path().join("App.dSYM");
        fs::create_dir(&bundle).unwrap();

        let stager = Stager::new(Box::new(FailingArchiver), root.path());
        let err = stager.prepare_artifacts(&bundle).unwrap_err();

        assert!(err.message().starts_with("Failed to zip"));
        assert!(err.message().contains("App.dSYM"));
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_bundle_and_prebuilt_zip_with_same_name() {
        let root = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();
        let dsyms = input.path().join("dSYMs");
        fs::create_dir_all(dsyms.join("A.dSYM/Contents")).unwrap();
        fs::write(dsyms.join("A.dSYM/Contents/Info.plist"), b"<plist/>").unwrap();
        fs::write(dsyms.join("A.dSYM.zip"), b"PREBUILT").unwrap();
        fs::write(dsyms.join("B.dSYM.zip"), b"OTHER").unwrap();

        let stager = Stager::new(Box::new(InProcessArchiver), root.path());
        let result = stager.prepare_artifacts(&dsyms).unwrap();

        let zipped = result.upload_path.join("A.dSYM.zip");
        assert_eq!(
            result.zip_files,
            vec![zipped.clone(), result.upload_path.join("B.dSYM.zip")]
        );

        // The staged file is the freshly zipped bundle, not the prebuilt copy
        let archive = zip::ZipArchive::new(fs::File::open(&zipped).unwrap()).unwrap();
        assert!(archive.file_names().any(|name| name == "A.dSYM/Contents/Info.plist"));

        cleanup_staging(&result.upload_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_command_failure_message() {
        let root = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();
        fs::create_dir(input.path().join("App.dSYM")).unwrap();

        let stager = Stager::new(Box::new(ZipCommandArchiver::new("false")), root.path());
        let err = stager
            .zip_directory(input.path(), "App.dSYM", root.path())
            .unwrap_err();

        assert_eq!(
            err.message(),
            format!(
                "Failed to zip {}. Please ensure you have the necessary permissions and that the zip command is available.",
                input.path().join("App.dSYM").display()
            )
        );
        let cause = std::error::Error::source(&err).unwrap();
        assert!(matches!(
            cause.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::Failed { .. })
        ));
    }

    #[test]
    fn test_validation_failure_creates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let stager = Stager::new(Box::new(InProcessArchiver), root.path());

        assert!(stager.prepare_artifacts("/nonexistent/App.dSYM").is_err());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_refuses_unmarked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let precious = dir.path().join("precious");
        fs::create_dir(&precious).unwrap();
        fs::write(precious.join("keep.txt"), b"keep").unwrap();

        cleanup_staging(&precious);

        assert!(precious.join("keep.txt").exists());
    }

    #[test]
    fn test_cleanup_removes_marked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(format!("{}abc123", STAGING_DIR_PREFIX));
        fs::create_dir_all(staging.join("nested")).unwrap();
        fs::write(staging.join("nested/App.dSYM.zip"), b"PK").unwrap();

        cleanup_staging(&staging);
        assert!(!staging.exists());

        // Second call on a missing directory is a no-op
        cleanup_staging(&staging);
    }
}
