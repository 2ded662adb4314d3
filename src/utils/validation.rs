use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::UserFriendlyError;

/// Directory name Xcode archives use for the per-target dSYM bundles
pub const DSYMS_DIR_NAME: &str = "dSYMs";

/// The kinds of input accepted for dSYM uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsymInputShape {
    /// A `dSYMs/` directory holding `.dSYM` bundles and/or `.dSYM.zip` files
    DsymsDirectory,
    /// An already zipped `.dSYM.zip` or `.dSYMs.zip`
    ZipFile,
    /// A single `.dSYM` bundle
    DsymDirectory,
}

impl DsymInputShape {
    /// Match a path against the accepted shapes, in order of precedence
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if name == DSYMS_DIR_NAME {
            Some(Self::DsymsDirectory)
        } else if name.ends_with(".dSYM.zip") || name.ends_with(".dSYMs.zip") {
            Some(Self::ZipFile)
        } else if name.ends_with(".dSYM") {
            Some(Self::DsymDirectory)
        } else {
            None
        }
    }

    fn expects_directory(self) -> bool {
        !matches!(self, Self::ZipFile)
    }

    fn wrong_type_message(self) -> &'static str {
        match self {
            Self::DsymsDirectory => "Invalid input: Expected a 'dSYMs/' directory but got a file.",
            Self::ZipFile => "Invalid input: Expected a '.dSYM.zip' or '.dSYMs.zip' file.",
            Self::DsymDirectory => "Invalid input: Expected a '.dSYM' directory but got a file.",
        }
    }

    fn not_found_message(self, path: &Path) -> String {
        match self {
            Self::DsymsDirectory => {
                "Path not found: Ensure the provided directory exists before re-running.".to_string()
            }
            Self::ZipFile => format!(
                "File not found: Ensure the provided file [{}] exists before re-running.",
                path.display()
            ),
            Self::DsymDirectory => {
                "Directory not found: Ensure the provided directory exists before re-running."
                    .to_string()
            }
        }
    }
}

/// Resolve `path` against the current directory and normalize `.` and `..`
/// lexically, without touching the filesystem.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Validate a user supplied dSYM location.
///
/// Returns the absolute path together with the shape it matched. Missing
/// paths, paths of the wrong type and unrecognised names each produce their
/// own message.
pub fn validate_dsyms_path(path: impl AsRef<Path>) -> Result<(PathBuf, DsymInputShape), UserFriendlyError> {
    let path = path.as_ref();
    let abs_path = absolutize(path).map_err(|e| {
        UserFriendlyError::with_source(
            e,
            format!("Unable to resolve the provided path {}.", path.display()),
        )
    })?;

    let shape = DsymInputShape::detect(&abs_path).ok_or_else(|| {
        UserFriendlyError::new(
            "Invalid input: Expected a path named 'dSYMs' or ending in '.dSYM', '.dSYMs.zip', or '.dSYM.zip'.",
        )
    })?;

    let metadata = std::fs::metadata(&abs_path).map_err(|e| {
        UserFriendlyError::from_io(
            e,
            &abs_path,
            &[
                (io::ErrorKind::NotFound, shape.not_found_message(&abs_path)),
                (
                    io::ErrorKind::PermissionDenied,
                    format!(
                        "Permission denied while accessing {}. Please check your access rights.",
                        abs_path.display()
                    ),
                ),
            ],
        )
    })?;

    let type_matches = if shape.expects_directory() {
        metadata.is_dir()
    } else {
        metadata.is_file()
    };
    if !type_matches {
        return Err(UserFriendlyError::new(shape.wrong_type_message()));
    }

    Ok((abs_path, shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_shapes() {
        assert_eq!(
            DsymInputShape::detect(Path::new("/build/MyApp.xcarchive/dSYMs")),
            Some(DsymInputShape::DsymsDirectory)
        );
        assert_eq!(
            DsymInputShape::detect(Path::new("/out/MyApp.app.dSYM.zip")),
            Some(DsymInputShape::ZipFile)
        );
        assert_eq!(
            DsymInputShape::detect(Path::new("/out/all.dSYMs.zip")),
            Some(DsymInputShape::ZipFile)
        );
        assert_eq!(
            DsymInputShape::detect(Path::new("/out/MyApp.app.dSYM")),
            Some(DsymInputShape::DsymDirectory)
        );
        assert_eq!(DsymInputShape::detect(Path::new("/out/notdSYMs")), None);
        assert_eq!(DsymInputShape::detect(Path::new("/out/MyApp.zip")), None);
        assert_eq!(DsymInputShape::detect(Path::new("/")), None);
    }

    #[test]
    fn test_absolutize_normalizes() {
        let abs = absolutize(Path::new("/a/b/./c/../dSYMs/")).unwrap();
        assert_eq!(abs, PathBuf::from("/a/b/dSYMs"));

        let rel = absolutize(Path::new("dSYMs")).unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("dSYMs"));
    }

    #[test]
    fn test_accepts_each_shape() {
        let dir = tempfile::tempdir().unwrap();
        let dsyms = dir.path().join("dSYMs");
        let bundle = dir.path().join("App.dSYM");
        let zip = dir.path().join("App.dSYM.zip");
        fs::create_dir(&dsyms).unwrap();
        fs::create_dir(&bundle).unwrap();
        fs::write(&zip, b"PK").unwrap();

        assert_eq!(
            validate_dsyms_path(&dsyms).unwrap(),
            (dsyms.clone(), DsymInputShape::DsymsDirectory)
        );
        assert_eq!(
            validate_dsyms_path(&bundle).unwrap(),
            (bundle.clone(), DsymInputShape::DsymDirectory)
        );
        assert_eq!(
            validate_dsyms_path(&zip).unwrap(),
            (zip.clone(), DsymInputShape::ZipFile)
        );
    }

    #[test]
    fn test_rejects_unknown_shape() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_dsyms_path(dir.path().join("symbols.tar")).unwrap_err();
        assert!(err.message().starts_with("Invalid input: Expected a path named 'dSYMs'"));
    }

    #[test]
    fn test_missing_paths_are_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let err = validate_dsyms_path(dir.path().join("dSYMs")).unwrap_err();
        assert!(err.message().starts_with("Path not found"));

        let missing_zip = dir.path().join("App.dSYM.zip");
        let err = validate_dsyms_path(&missing_zip).unwrap_err();
        assert!(err.message().starts_with("File not found"));
        assert!(err.message().contains(&missing_zip.display().to_string()));

        let err = validate_dsyms_path(dir.path().join("App.dSYM")).unwrap_err();
        assert!(err.message().starts_with("Directory not found"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_named_dsyms = dir.path().join("dSYMs");
        let file_named_bundle = dir.path().join("App.dSYM");
        let dir_named_zip = dir.path().join("App.dSYM.zip");
        fs::write(&file_named_dsyms, b"").unwrap();
        fs::write(&file_named_bundle, b"").unwrap();
        fs::create_dir(&dir_named_zip).unwrap();

        let err = validate_dsyms_path(&file_named_dsyms).unwrap_err();
        assert_eq!(err.message(), "Invalid input: Expected a 'dSYMs/' directory but got a file.");

        let err = validate_dsyms_path(&file_named_bundle).unwrap_err();
        assert_eq!(err.message(), "Invalid input: Expected a '.dSYM' directory but got a file.");

        let err = validate_dsyms_path(&dir_named_zip).unwrap_err();
        assert_eq!(err.message(), "Invalid input: Expected a '.dSYM.zip' or '.dSYMs.zip' file.");
    }
}
