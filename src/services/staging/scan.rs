use std::fs;
use std::io;
use std::path::Path;

use crate::error::UserFriendlyError;

/// Immediate children of a `dSYMs/` directory worth uploading
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DsymScan {
    pub dsym_dirs: Vec<String>,
    pub dsym_zip_files: Vec<String>,
}

/// Partition the children of `dsyms_dir` into `.dSYM` bundles and `.dSYM.zip`
/// files. Everything else is ignored, as are entries whose type does not match
/// their name. Names are returned sorted.
pub fn scan_directory(dsyms_dir: &Path) -> Result<DsymScan, UserFriendlyError> {
    let entries = fs::read_dir(dsyms_dir).map_err(|e| {
        UserFriendlyError::from_io(
            e,
            dsyms_dir,
            &[(
                io::ErrorKind::PermissionDenied,
                format!(
                    "Permission denied while reading {}. Please check your access rights.",
                    dsyms_dir.display()
                ),
            )],
        )
    })?;

    let mut scan = DsymScan::default();

    for entry in entries {
        let entry = entry.map_err(|e| UserFriendlyError::from_io(e, dsyms_dir, &[]))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let full_path = entry.path();

        let is_dsym = name.ends_with(".dSYM");
        let is_dsym_zip = name.ends_with(".dSYM.zip");
        if !is_dsym && !is_dsym_zip {
            continue;
        }

        let metadata = fs::metadata(&full_path).map_err(|e| {
            UserFriendlyError::from_io(
                e,
                &full_path,
                &[(
                    io::ErrorKind::NotFound,
                    format!(
                        "Error accessing file or directory at {}. Please ensure it exists and is accessible.",
                        full_path.display()
                    ),
                )],
            )
        })?;

        if is_dsym && metadata.is_dir() {
            scan.dsym_dirs.push(name);
        } else if is_dsym_zip && metadata.is_file() {
            scan.dsym_zip_files.push(name);
        }
    }

    scan.dsym_dirs.sort();
    scan.dsym_zip_files.sort();
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_partitions_children() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("A.dSYM")).unwrap();
        fs::write(dir.path().join("B.dSYM.zip"), b"PK").unwrap();
        fs::write(dir.path().join("C.txt"), b"notes").unwrap();
        fs::write(dir.path().join("D.dSYM"), b"not a bundle").unwrap();

        let scan = scan_directory(dir.path()).unwrap();
        assert_eq!(scan.dsym_dirs, vec!["A.dSYM".to_string()]);
        assert_eq!(scan.dsym_zip_files, vec!["B.dSYM.zip".to_string()]);
    }

    #[test]
    fn test_scan_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Zeta.dSYM", "Alpha.dSYM", "Mid.dSYM"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }

        let scan = scan_directory(dir.path()).unwrap();
        assert_eq!(scan.dsym_dirs, vec!["Alpha.dSYM", "Mid.dSYM", "Zeta.dSYM"]);
        assert!(scan.dsym_zip_files.is_empty());
    }

    #[test]
    fn test_scan_zip_directory_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("E.dSYM.zip")).unwrap();

        let scan = scan_directory(dir.path()).unwrap();
        assert_eq!(scan, DsymScan::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_dangling_entry_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("Broken.dSYM");
        std::os::unix::fs::symlink(dir.path().join("missing-target"), &link).unwrap();

        let err = scan_directory(dir.path()).unwrap_err();
        assert!(err.message().starts_with("Error accessing file or directory at"));
        assert!(err.message().contains("Broken.dSYM"));
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("dSYMs");
        let err = scan_directory(&missing).unwrap_err();
        assert!(err.message().contains(&missing.display().to_string()));
    }
}
