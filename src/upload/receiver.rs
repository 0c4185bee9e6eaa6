//! Chunked upload state machine.
//!
//! ```text
//! IDLE --start--> START --chunk*--> WRITING --end--> END
//! START/WRITING --fatal--> ABORTED
//! ```
//!
//! Every call handles the data it is given and returns; nothing here waits
//! for more input. The sink of a session is released exactly once, either
//! after a successful finalize or when the session aborts.

use super::sink::UploadSink;
use crate::error::UploadError;
use crate::progress::ProgressReporter;
use std::time::Instant;
use tracing::{error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Start,
    Writing,
    End,
    Aborted,
}

impl UploadStatus {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, UploadStatus::Start | UploadStatus::Writing)
    }
}

/// What a request announces about the upload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMeta {
    pub target: String,
    /// `None` when the client did not say how large the upload is.
    pub declared_size: Option<u64>,
}

/// Handle to the session opened by one [`UploadReceiver::start`] call.
///
/// `chunk`, `end` and `cancel` only act on the session the handle names, so
/// a producer whose session was superseded cannot touch its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

/// Holds the single upload session of the process.
pub struct UploadReceiver {
    status: UploadStatus,
    session: u64,
    declared: Option<u64>,
    written: u64,
    sink: Option<Box<dyn UploadSink>>,
    last_error: Option<UploadError>,
}

impl Default for UploadReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadReceiver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: UploadStatus::Idle,
            session: 0,
            declared: None,
            written: 0,
            sink: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> UploadStatus {
        self.status
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    #[must_use]
    pub fn declared_size(&self) -> Option<u64> {
        self.declared
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&UploadError> {
        self.last_error.as_ref()
    }

    /// Open a session.
    ///
    /// A refused request returns [`UploadError::Unauthorized`] before
    /// anything changes: the current session, its sink and the progress
    /// record stay as they were, and `open` is never called. Once
    /// authorized, a session still active from an earlier request is
    /// aborted first.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or the reason the new session went straight to
    /// ABORTED.
    pub fn start<F>(
        &mut self,
        meta: &UploadMeta,
        authorized: bool,
        open: F,
        progress: &mut ProgressReporter,
    ) -> Result<SessionId, UploadError>
    where
        F: FnOnce(&UploadMeta) -> Result<Box<dyn UploadSink>, UploadError>,
    {
        if !authorized {
            warn!(upload = %meta.target, "upload refused: authentication required");
            return Err(UploadError::Unauthorized);
        }
        if self.status.is_active() {
            warn!(upload = %meta.target, "new upload while another is active");
            self.abort(UploadError::Superseded, progress);
        }
        self.session += 1;
        self.declared = meta.declared_size;
        self.written = 0;
        self.last_error = None;
        self.status = UploadStatus::Start;

        match open(meta) {
            Ok(sink) => {
                trace!(upload = %meta.target, declared = ?meta.declared_size, "Upload started");
                progress.reset(sink.label());
                if meta.declared_size.is_none() {
                    progress.set_indeterminate();
                }
                self.sink = Some(sink);
                Ok(SessionId(self.session))
            }
            Err(e) => Err(self.abort(e, progress)),
        }
    }

    fn owned(&self, id: SessionId) -> Result<(), UploadError> {
        if id.0 != self.session {
            return Err(UploadError::Superseded);
        }
        if !self.status.is_active() {
            return Err(UploadError::NotActive);
        }
        Ok(())
    }

    /// Write one chunk. The sink must take all of it.
    ///
    /// # Errors
    ///
    /// [`UploadError::Superseded`] when `id` is not the current session,
    /// [`UploadError::NotActive`] outside START/WRITING, or the fatal
    /// [`UploadError::ShortWrite`] that aborted the session.
    pub fn chunk(
        &mut self,
        id: SessionId,
        data: &[u8],
        progress: &mut ProgressReporter,
        now: Instant,
    ) -> Result<(), UploadError> {
        self.owned(id)?;
        let Some(sink) = self.sink.as_mut() else {
            return Err(UploadError::NotActive);
        };
        self.status = UploadStatus::Writing;
        if data.is_empty() {
            return Ok(());
        }
        let accepted = sink.write(data);
        if accepted != data.len() {
            return Err(self.abort(
                UploadError::ShortWrite {
                    offered: data.len(),
                    accepted,
                },
                progress,
            ));
        }
        self.written += data.len() as u64;
        progress.report_bytes(self.written, self.declared, now);
        Ok(())
    }

    /// Finalize the sink and close the session.
    ///
    /// Returns the committed byte count; progress is forced to 100.
    ///
    /// # Errors
    ///
    /// [`UploadError::Superseded`] or [`UploadError::NotActive`] as for
    /// [`chunk`](Self::chunk), or the finalize diagnostic that aborted the
    /// session.
    pub fn end(&mut self, id: SessionId, progress: &mut ProgressReporter) -> Result<u64, UploadError> {
        self.owned(id)?;
        let Some(mut sink) = self.sink.take() else {
            return Err(UploadError::NotActive);
        };
        match sink.finalize(self.declared, self.written) {
            Ok(committed) => {
                sink.release(true);
                self.status = UploadStatus::End;
                progress.set_percent(100);
                info!(label = sink.label(), bytes = committed, "Upload complete");
                Ok(committed)
            }
            Err(e) => {
                self.sink = Some(sink);
                Err(self.abort(e, progress))
            }
        }
    }

    /// Abort session `id` if it is still the active one.
    pub fn cancel(&mut self, id: SessionId, reason: UploadError, progress: &mut ProgressReporter) {
        if self.owned(id).is_ok() {
            self.abort(reason, progress);
        }
    }

    fn abort(&mut self, reason: UploadError, progress: &mut ProgressReporter) -> UploadError {
        error!(error = %reason, written = self.written, "Upload aborted");
        progress.force_message(&reason.to_string());
        if let Some(mut sink) = self.sink.take() {
            sink.release(false);
        }
        self.status = UploadStatus::Aborted;
        self.last_error = Some(reason.clone());
        reason
    }
}
