use super::sink::UploadSink;
use crate::error::UploadError;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, trace, warn};

/// Kept free at the end of program space.
pub const FLASH_SAFETY_MARGIN: u64 = 0x1000;
/// Flash erase block size.
pub const FLASH_BLOCK_SIZE: u64 = 0x1000;

/// Usable program space: `(free - margin)` rounded down to a block boundary.
#[must_use]
pub fn usable_space(free: u64) -> u64 {
    free.saturating_sub(FLASH_SAFETY_MARGIN) & !(FLASH_BLOCK_SIZE - 1)
}

/// Program-flash collaborator behind the firmware sink.
pub trait FlashWriter: Send {
    /// Free program space in bytes.
    fn free_space(&self) -> u64;

    /// Prepare to receive an image of at most `max_size` bytes.
    ///
    /// # Errors
    ///
    /// A human readable reason when flashing cannot start.
    fn begin(&mut self, max_size: u64) -> Result<(), String>;

    /// Returns the number of bytes accepted.
    fn write(&mut self, chunk: &[u8]) -> usize;

    /// Commit the image and return its size.
    ///
    /// # Errors
    ///
    /// A human readable reason when the image cannot be committed.
    fn commit(&mut self) -> Result<u64, String>;

    /// Throw away a partially written image.
    fn abort(&mut self);
}

/// Firmware upload sink.
pub struct FirmwareSink {
    label: String,
    flash: Box<dyn FlashWriter>,
}

impl FirmwareSink {
    /// Check program space and start the flash writer.
    ///
    /// # Errors
    ///
    /// [`UploadError::InsufficientSpace`] when the usable space is zero or
    /// smaller than the declared size, [`UploadError::OpenFailed`] when the
    /// writer refuses to begin.
    pub fn open(
        label: &str,
        mut flash: Box<dyn FlashWriter>,
        declared: Option<u64>,
    ) -> Result<Self, UploadError> {
        let available = usable_space(flash.free_space());
        let required = declared.unwrap_or(1);
        if available == 0 || required > available {
            return Err(UploadError::InsufficientSpace {
                required,
                available,
            });
        }
        flash.begin(available).map_err(|reason| UploadError::OpenFailed {
            target: label.to_string(),
            reason,
        })?;
        trace!(label, max_size = available, "firmware update started");
        Ok(Self {
            label: label.to_string(),
            flash,
        })
    }
}

impl UploadSink for FirmwareSink {
    fn label(&self) -> &str {
        &self.label
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        self.flash.write(chunk)
    }

    fn finalize(&mut self, declared: Option<u64>, written: u64) -> Result<u64, UploadError> {
        if let Some(declared) = declared {
            if declared != written {
                return Err(UploadError::SizeMismatch {
                    declared,
                    committed: written,
                });
            }
        }
        let committed = self.flash.commit().map_err(UploadError::Finalize)?;
        if committed != written {
            return Err(UploadError::SizeMismatch {
                declared: written,
                committed,
            });
        }
        Ok(committed)
    }

    fn release(&mut self, completed: bool) {
        if !completed {
            self.flash.abort();
        }
    }
}

/// Host flash writer: stages the image next to its final path and renames it
/// into place on commit.
pub struct ImageFlash {
    image: PathBuf,
    staging: PathBuf,
    capacity: u64,
    file: Option<File>,
    hasher: Sha256,
    written: u64,
    limit: u64,
}

impl ImageFlash {
    #[must_use]
    pub fn new(image: &Path, capacity: u64) -> Self {
        let mut staging = image.as_os_str().to_owned();
        staging.push(".part");
        Self {
            image: image.to_path_buf(),
            staging: PathBuf::from(staging),
            capacity,
            file: None,
            hasher: Sha256::new(),
            written: 0,
            limit: 0,
        }
    }

    fn remove_staging(&self) {
        if let Err(e) = fs::remove_file(&self.staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(staging = %self.staging.display(), error = %e, "staging image not removed");
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl FlashWriter for ImageFlash {
    fn free_space(&self) -> u64 {
        self.capacity
    }

    fn begin(&mut self, max_size: u64) -> Result<(), String> {
        if let Some(parent) = self.staging.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let file = File::create(&self.staging).map_err(|e| e.to_string())?;
        self.file = Some(file);
        self.hasher = Sha256::new();
        self.written = 0;
        self.limit = max_size;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        if self.written + chunk.len() as u64 > self.limit {
            warn!(limit = self.limit, "image exceeds program space");
            return 0;
        }
        match file.write_all(chunk) {
            Ok(()) => {
                self.hasher.update(chunk);
                self.written += chunk.len() as u64;
                chunk.len()
            }
            Err(e) => {
                error!(error = %e, "image write failed");
                0
            }
        }
    }

    fn commit(&mut self) -> Result<u64, String> {
        let mut file = self.file.take().ok_or("no image in progress")?;
        if self.written == 0 {
            self.remove_staging();
            return Err("empty image".to_string());
        }
        file.flush().map_err(|e| e.to_string())?;
        file.sync_all().map_err(|e| e.to_string())?;
        drop(file);
        fs::rename(&self.staging, &self.image).map_err(|e| e.to_string())?;
        let digest = std::mem::take(&mut self.hasher).finalize();
        info!(
            image = %self.image.display(),
            bytes = self.written,
            sha256 = %hex(&digest),
            "firmware image committed"
        );
        Ok(self.written)
    }

    fn abort(&mut self) {
        if self.file.take().is_some() {
            self.remove_staging();
            warn!(staging = %self.staging.display(), "firmware image discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_space_rounds_down_to_blocks() {
        assert_eq!(usable_space(0x10_0000), 0xF_F000);
        assert_eq!(usable_space(0x10_0800), 0xF_F000);
        assert_eq!(usable_space(0x1fff), 0);
        assert_eq!(usable_space(0), 0);
    }

    #[test]
    fn test_image_is_renamed_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("firmware.bin");
        let mut flash = ImageFlash::new(&image, 0x10_0000);
        flash.begin(0x1000).unwrap();
        assert_eq!(flash.write(b"\xe9firmware"), 9);
        assert!(!image.exists());
        assert_eq!(flash.commit().unwrap(), 9);
        assert_eq!(fs::read(&image).unwrap(), b"\xe9firmware");
    }

    #[test]
    fn test_write_past_limit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut flash = ImageFlash::new(&dir.path().join("fw.bin"), 0x10_0000);
        flash.begin(4).unwrap();
        assert_eq!(flash.write(b"12345"), 0);
        flash.abort();
        assert!(!dir.path().join("fw.bin.part").exists());
    }

    #[test]
    fn test_firmware_sink_refuses_oversized_image() {
        let dir = tempfile::tempdir().unwrap();
        let flash = ImageFlash::new(&dir.path().join("fw.bin"), 0x3000);
        let err = FirmwareSink::open("fw.bin", Box::new(flash), Some(0x2001))
            .err()
            .unwrap();
        assert_eq!(
            err,
            UploadError::InsufficientSpace {
                required: 0x2001,
                available: 0x2000
            }
        );
    }

    #[test]
    fn test_finalize_checks_declared_size() {
        let dir = tempfile::tempdir().unwrap();
        let flash = ImageFlash::new(&dir.path().join("fw.bin"), 0x10_0000);
        let mut sink = FirmwareSink::open("fw.bin", Box::new(flash), Some(10)).unwrap();
        assert_eq!(sink.write(b"12345"), 5);
        let err = sink.finalize(Some(10), 5).unwrap_err();
        assert!(matches!(err, UploadError::SizeMismatch { declared: 10, committed: 5 }));
        sink.release(false);
        assert!(!dir.path().join("fw.bin").exists());
    }
}
