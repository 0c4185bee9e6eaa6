use super::{body_for, declared_upload_size};
use crate::context::{AppContext, PendingAction};
use crate::error::{RequestError, UploadError};
use crate::page::html::{self, MAIN_MENU_BUTTON};
use crate::server::{Request, Transport};
use crate::upload::{
    parse_boundary, FirmwareSink, MultipartReader, ReceiverDriver, UploadMeta, UploadSink,
};
use std::io::Cursor;
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Progress message shown while the new image is activated.
pub const APPLYING_UPDATE: &str = "Applying Firmware Update";

/// `POST /update`: firmware image as a multipart form or a raw body.
pub(super) fn upload(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    let authorized = ctx.gate.allows(req);
    let multipart = req.content_type().starts_with("multipart/form-data");
    let declared = declared_upload_size(req).or_else(|| {
        if multipart {
            None
        } else {
            req.content_length().or(Some(req.body.len() as u64))
        }
    });

    let chunk_size = ctx.config.upload_chunk_size;
    let yield_now = ctx.yield_now;
    let flash = &ctx.flash;
    let config = &ctx.config;
    let mut driver = ReceiverDriver::new(
        &mut ctx.uploads,
        &mut ctx.progress,
        authorized,
        declared,
        |meta: &UploadMeta| {
            trace!(upload = %meta.target, "firmware update");
            FirmwareSink::open(&meta.target, flash(config), meta.declared_size)
                .map(|s| Box::new(s) as Box<dyn UploadSink>)
        },
        yield_now,
    );

    if multipart {
        match parse_boundary(req.content_type()) {
            Ok(boundary) => {
                let body = Cursor::new(req.body.as_slice());
                let reader = MultipartReader::new(body, &boundary, chunk_size);
                if let Err(e) = reader.run(&mut driver) {
                    driver.abandon(&UploadError::from(e));
                }
            }
            Err(e) => driver.abandon(&UploadError::from(e)),
        }
    } else {
        let raw = Cursor::new(req.body.as_slice());
        if let Err(e) = driver.feed_raw("firmware.bin", raw, chunk_size) {
            trace!(error = %e, "raw firmware body not accepted");
        }
    }
    let outcome = driver.outcome.take();

    match outcome {
        Some(Ok(bytes)) => {
            info!(request_id = %req.id, bytes, "Update Success: {bytes} bytes received. Rebooting...");
            ctx.progress.force_message(APPLYING_UPDATE);
            let mut body = body_for(ctx);
            body.push_str("<b>Upload complete. Rebooting device, please wait...</b>");
            ctx.send_page(transport, &body, true)?;
            ctx.defer_restart(true, Duration::from_millis(ctx.config.restart_grace_ms));
            Ok(())
        }
        Some(Err(UploadError::Unauthorized)) => Err(RequestError::AuthRequired),
        None if !authorized => Err(RequestError::AuthRequired),
        Some(Err(e)) => {
            error!(request_id = %req.id, error = %e, "firmware update failed");
            let mut body = body_for(ctx);
            body.push_str(&format!(
                "<b>Firmware update failed</b><br/>{}",
                html::escape(&e.to_string())
            ));
            body.push_str(MAIN_MENU_BUTTON);
            ctx.send_page(transport, &body, false)
        }
        None => Err(RequestError::BadRequest("BAD ARGS")),
    }
}

/// `/espfirmware?url=`: fetch an image from a URL after the page is sent.
pub(super) fn remote(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "espfirmware")?;

    let url = req.arg("url").unwrap_or("").trim();
    let mut body = body_for(ctx);
    body.push_str(&format!(
        "<p><b>ESP update</b></p>Updating ESP firmware from: {}",
        html::escape(url)
    ));
    ctx.send_page(transport, &body, true)?;

    if url.is_empty() {
        warn!(request_id = %req.id, "firmware update without a URL");
    } else {
        trace!(url, "Attempting ESP firmware update");
        ctx.defer(PendingAction::WebUpdate(url.to_string()));
    }
    Ok(())
}
