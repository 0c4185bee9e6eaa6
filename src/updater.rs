//! Firmware update fetched from a URL.
//!
//! The body is read outside the application lock and handed to the upload
//! receiver one chunk per lock acquisition, so pages keep being served while
//! the image downloads. Every call names the session this download opened;
//! once a newer upload supersedes it the download stops instead of writing
//! into the newer image.

use crate::dispatcher::Application;
use crate::error::UploadError;
use crate::handlers::APPLYING_UPDATE;
use crate::upload::{FirmwareSink, UploadMeta, UploadSink};
use may::sync::{Mutex, MutexGuard};
use std::io::{ErrorKind, Read};
use std::time::Instant;
use tracing::{error, info, trace, warn};

fn lock(app: &Mutex<Application>) -> MutexGuard<'_, Application> {
    app.lock().unwrap_or_else(|e| e.into_inner())
}

/// Download `url` and flash it through the upload receiver.
///
/// Returns the committed image size. Every failure is also shown through the
/// progress reporter.
///
/// # Errors
///
/// [`UploadError::OpenFailed`] when the request fails or the server answers
/// with an error status, otherwise whatever ended the upload session.
pub fn web_update(app: &Mutex<Application>, url: &str) -> Result<u64, UploadError> {
    info!(url, "ESP firmware update started");
    let fetch_failed = |reason: String| UploadError::OpenFailed {
        target: url.to_string(),
        reason,
    };
    let response = match reqwest::blocking::get(url).and_then(|r| r.error_for_status()) {
        Ok(r) => r,
        Err(e) => {
            let err = fetch_failed(e.to_string());
            report_failure(app, &err);
            return Err(err);
        }
    };
    let meta = UploadMeta {
        target: "firmware.bin".to_string(),
        declared_size: response.content_length().filter(|&n| n > 0),
    };
    trace!(declared = ?meta.declared_size, "firmware download started");

    let (session, chunk_size) = {
        let mut guard = lock(app);
        let ctx = &mut guard.ctx;
        let flash = ctx.flash_writer();
        let session = ctx.uploads.start(
            &meta,
            true,
            move |m: &UploadMeta| {
                FirmwareSink::open(&m.target, flash, m.declared_size)
                    .map(|s| Box::new(s) as Box<dyn UploadSink>)
            },
            &mut ctx.progress,
        )?;
        (session, ctx.config.upload_chunk_size)
    };

    let mut body = response;
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let err = UploadError::Finalize(format!("download interrupted: {e}"));
                let mut guard = lock(app);
                let ctx = &mut guard.ctx;
                ctx.uploads.cancel(session, err.clone(), &mut ctx.progress);
                return Err(err);
            }
        };
        let mut guard = lock(app);
        let ctx = &mut guard.ctx;
        if let Err(e) = ctx.uploads.chunk(session, &buf[..n], &mut ctx.progress, Instant::now()) {
            warn!(url, error = %e, "firmware download stopped");
            return Err(e);
        }
    }

    let mut guard = lock(app);
    let ctx = &mut guard.ctx;
    match ctx.uploads.end(session, &mut ctx.progress) {
        Ok(bytes) => {
            info!(url, bytes, "ESP firmware update complete");
            ctx.progress.force_message(APPLYING_UPDATE);
            Ok(bytes)
        }
        Err(e) => {
            error!(url, error = %e, "ESP firmware update failed");
            Err(e)
        }
    }
}

fn report_failure(app: &Mutex<Application>, err: &UploadError) {
    warn!(error = %err, "firmware download failed");
    lock(app).ctx.progress.force_message(&err.to_string());
}
