use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("Source {0} has no parent directory or name")]
    InvalidSource(PathBuf),

    #[error("I/O error while archiving: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Recursively compresses a directory into a zip file.
///
/// Entries inside the archive are rooted at the directory's own name, so
/// `Foo.dSYM/Contents/...` unpacks back into a `Foo.dSYM` bundle.
pub trait Archiver: Send + Sync {
    fn archive(&self, source_dir: &Path, dest_zip: &Path) -> Result<(), ArchiveError>;

    fn name(&self) -> &'static str;
}

/// Shells out to the `zip` utility found on `PATH`
pub struct ZipCommandArchiver {
    program: String,
}

impl ZipCommandArchiver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ZipCommandArchiver {
    fn default() -> Self {
        Self::new("zip")
    }
}

impl Archiver for ZipCommandArchiver {
    fn archive(&self, source_dir: &Path, dest_zip: &Path) -> Result<(), ArchiveError> {
        let (parent, name) = match (source_dir.parent(), source_dir.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return Err(ArchiveError::InvalidSource(source_dir.to_path_buf())),
        };
        // zip runs from the parent directory, so the destination must not be relative
        let dest_zip = std::path::absolute(dest_zip)?;

        let status = Command::new(&self.program)
            .arg("-r")
            .arg(&dest_zip)
            .arg(name)
            .current_dir(parent)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ArchiveError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(ArchiveError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "zip"
    }
}

/// Pure Rust archiver backed by the `zip` crate (deflate)
pub struct InProcessArchiver;

impl InProcessArchiver {
    fn add_directory(
        writer: &mut ZipWriter<File>,
        dir: &Path,
        entry_prefix: &str,
        options: FileOptions,
    ) -> Result<(), ArchiveError> {
        writer.add_directory(format!("{}/", entry_prefix), options)?;

        let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let entry_name = format!("{}/{}", entry_prefix, entry.file_name().to_string_lossy());
            if fs::metadata(&path)?.is_dir() {
                Self::add_directory(writer, &path, &entry_name, options)?;
            } else {
                writer.start_file(entry_name, options)?;
                let mut file = File::open(&path)?;
                io::copy(&mut file, writer)?;
            }
        }
        Ok(())
    }
}

impl Archiver for InProcessArchiver {
    fn archive(&self, source_dir: &Path, dest_zip: &Path) -> Result<(), ArchiveError> {
        let root = source_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::InvalidSource(source_dir.to_path_buf()))?;

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(File::create(dest_zip)?);
        Self::add_directory(&mut writer, source_dir, &root, options)?;
        writer.finish()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

/// Factory function to create the archiver named in the configuration
pub fn create_archiver(kind: &str) -> Box<dyn Archiver> {
    match kind.to_lowercase().as_str() {
        "zip" | "command" => Box::new(ZipCommandArchiver::default()),
        "builtin" | "inprocess" | "in-process" => Box::new(InProcessArchiver),
        _ => {
            tracing::warn!("Unknown archiver '{}', using the zip command", kind);
            Box::new(ZipCommandArchiver::default())
        }
    }
}
