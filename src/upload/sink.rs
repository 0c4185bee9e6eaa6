use crate::error::UploadError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{info, trace, warn};

/// Longest file name, leading `/` included, the file store accepts.
pub const MAX_FILE_NAME_LEN: usize = 31;

/// Destination of upload bytes.
///
/// The receiver calls [`UploadSink::release`] exactly once per session, after
/// a successful [`UploadSink::finalize`] or on abort.
pub trait UploadSink: Send {
    /// Name shown in logs and on the progress indicator.
    fn label(&self) -> &str;

    /// Write one chunk and return how many bytes were accepted.
    fn write(&mut self, chunk: &[u8]) -> usize;

    /// Flush and close. Returns the number of bytes committed.
    ///
    /// # Errors
    ///
    /// A sink-specific diagnostic when the data could not be committed.
    fn finalize(&mut self, declared: Option<u64>, written: u64) -> Result<u64, UploadError>;

    /// Give the sink's resources back. `completed` is false on abort.
    fn release(&mut self, completed: bool);
}

/// Prefix a relative upload name with `/`, as the file store expects.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Map a store name onto `root`, refusing anything that climbs out of it.
#[must_use]
pub fn store_path(root: &Path, name: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut any = false;
    for comp in Path::new(name.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => {
                path.push(s);
                any = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    any.then_some(path)
}

/// Upload into a file of the data directory.
#[derive(Debug)]
pub struct FileSink {
    name: String,
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Validate the name and create the target file.
    ///
    /// # Errors
    ///
    /// [`UploadError::NameTooLong`] for names of 32 characters or more, checked
    /// before anything touches the disk, and [`UploadError::OpenFailed`] when
    /// the file cannot be created.
    pub fn open(root: &Path, name: &str) -> Result<Self, UploadError> {
        let name = normalize_name(name);
        if name.chars().count() > MAX_FILE_NAME_LEN {
            warn!(filename = %name, "Filename is too long");
            return Err(UploadError::NameTooLong {
                name,
                max: MAX_FILE_NAME_LEN,
            });
        }
        let path = store_path(root, &name).ok_or_else(|| UploadError::OpenFailed {
            target: name.clone(),
            reason: "invalid path".to_string(),
        })?;
        let file = File::create(&path).map_err(|e| UploadError::OpenFailed {
            target: name.clone(),
            reason: e.to_string(),
        })?;
        trace!(filename = %name, path = %path.display(), "file upload opened");
        Ok(Self {
            name,
            path,
            file: Some(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadSink for FileSink {
    fn label(&self) -> &str {
        &self.name
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        match file.write_all(chunk) {
            Ok(()) => chunk.len(),
            Err(e) => {
                warn!(filename = %self.name, error = %e, "file write failed");
                0
            }
        }
    }

    fn finalize(&mut self, _declared: Option<u64>, written: u64) -> Result<u64, UploadError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| UploadError::Finalize("file already closed".to_string()))?;
        file.flush()
            .and_then(|()| file.sync_all())
            .map_err(|e| UploadError::Finalize(e.to_string()))?;
        info!(filename = %self.name, bytes = written, "Uploaded file");
        Ok(written)
    }

    fn release(&mut self, completed: bool) {
        self.file = None;
        if !completed {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "cannot remove partial upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_names_get_a_leading_slash() {
        assert_eq!(normalize_name("pages.jsonl"), "/pages.jsonl");
        assert_eq!(normalize_name("/pages.jsonl"), "/pages.jsonl");
    }

    #[test]
    fn test_store_path_rejects_traversal() {
        let root = Path::new("/data");
        assert!(store_path(root, "/../etc/passwd").is_none());
        assert!(store_path(root, "/").is_none());
        assert_eq!(
            store_path(root, "/a.txt"),
            Some(PathBuf::from("/data/a.txt"))
        );
    }

    #[test]
    fn test_name_limit_is_checked_before_create() {
        let dir = tempfile::tempdir().unwrap();
        let ok = "a".repeat(30);
        let too_long = "b".repeat(31);
        assert!(FileSink::open(dir.path(), &ok).is_ok());
        let err = FileSink::open(dir.path(), &too_long).unwrap_err();
        assert!(matches!(err, UploadError::NameTooLong { max: 31, .. }));
        assert!(!dir.path().join(&too_long).exists());
    }

    #[test]
    fn test_abort_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::open(dir.path(), "part.bin").unwrap();
        assert_eq!(sink.write(b"abc"), 3);
        let path = sink.path().to_path_buf();
        sink.release(false);
        assert!(!path.exists());
    }
}
