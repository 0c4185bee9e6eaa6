//! File manager endpoints backing the editor page.

use super::declared_upload_size;
use crate::context::AppContext;
use crate::error::{RequestError, UploadError};
use crate::server::{Request, Transport};
use crate::upload::sink::store_path;
use crate::upload::{
    parse_boundary, FileSink, MultipartReader, ReceiverDriver, UploadMeta, UploadSink,
};
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{error, info, trace, warn};

fn text(transport: &mut dyn Transport, status: u16, body: &str) -> Result<(), RequestError> {
    transport.send(status, "text/plain", body.as_bytes())?;
    Ok(())
}

/// Resolve the first argument to a file under the data directory.
fn target_path(ctx: &AppContext, req: &Request) -> Result<Option<PathBuf>, ()> {
    let Some((_, name)) = req.args.first() else {
        return Err(());
    };
    if name == "/" {
        return Ok(None);
    }
    Ok(store_path(ctx.files.base_dir(), name))
}

/// `GET /list?dir=`: JSON array of the files in the store.
pub(super) fn list(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "filelist")?;

    let Some(dir) = req.arg("dir") else {
        return text(transport, 500, "BAD ARGS");
    };
    trace!(dir, "file list");

    let mut names: Vec<String> = match fs::read_dir(ctx.files.base_dir()) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect(),
        Err(e) => {
            warn!(error = %e, "data directory not readable");
            Vec::new()
        }
    };
    names.sort();
    let listing: Vec<serde_json::Value> = names
        .iter()
        .map(|name| serde_json::json!({ "type": "file", "name": name.trim_start_matches('/') }))
        .collect();
    let body = serde_json::Value::Array(listing).to_string();
    transport.send(200, "text/json", body.as_bytes())?;
    Ok(())
}

/// Any method on `/edit` not claimed by PUT, DELETE or POST loads the editor.
pub(super) fn editor(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "fileread")?;

    match ctx.files.resolve("/edit.htm") {
        Some(file) => {
            ctx.files
                .serve(&file, transport, ctx.config.upload_chunk_size)?;
            Ok(())
        }
        None => text(transport, 404, "FileNotFound"),
    }
}

/// `PUT /edit`: create an empty file named by the first argument.
pub(super) fn create(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "filecreate")?;

    let path = match target_path(ctx, req) {
        Err(()) => return text(transport, 500, "BAD ARGS"),
        Ok(None) => return text(transport, 500, "BAD PATH"),
        Ok(Some(path)) => path,
    };
    trace!(path = %path.display(), "file create");
    if path.exists() {
        return text(transport, 500, "FILE EXISTS");
    }
    match fs::File::create(&path) {
        Ok(_) => {
            info!(path = %path.display(), "file created");
            text(transport, 200, "")
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "file create failed");
            text(transport, 500, "CREATE FAILED")
        }
    }
}

/// `DELETE /edit`: remove the file named by the first argument.
pub(super) fn delete(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "filedelete")?;

    let path = match target_path(ctx, req) {
        Err(()) => return text(transport, 500, "BAD ARGS"),
        Ok(None) => return text(transport, 500, "BAD PATH"),
        Ok(Some(path)) => path,
    };
    trace!(path = %path.display(), "file delete");
    if !path.is_file() {
        return text(transport, 404, "FileNotFound");
    }
    if let Err(e) = fs::remove_file(&path) {
        error!(path = %path.display(), error = %e, "file delete failed");
        return text(transport, 500, "DELETE FAILED");
    }
    info!(path = %path.display(), "file deleted");
    text(transport, 200, "")
}

/// `POST /edit`: multipart file upload into the data directory.
///
/// The gate is evaluated before the first part opens a sink, so a refused
/// upload never creates a file.
pub(super) fn upload(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    let authorized = ctx.gate.allows(req);
    let boundary = match parse_boundary(req.content_type()) {
        Ok(b) => b,
        Err(e) => {
            if !authorized {
                return Err(RequestError::AuthRequired);
            }
            warn!(request_id = %req.id, error = %e, "upload without multipart body");
            return Err(RequestError::BadRequest("BAD ARGS"));
        }
    };

    let root = ctx.files.base_dir().to_path_buf();
    let chunk_size = ctx.config.upload_chunk_size;
    let yield_now = ctx.yield_now;
    let mut driver = ReceiverDriver::new(
        &mut ctx.uploads,
        &mut ctx.progress,
        authorized,
        declared_upload_size(req),
        |meta: &UploadMeta| {
            FileSink::open(&root, &meta.target).map(|s| Box::new(s) as Box<dyn UploadSink>)
        },
        yield_now,
    );
    if let Err(e) =
        MultipartReader::new(Cursor::new(req.body.as_slice()), &boundary, chunk_size).run(&mut driver)
    {
        driver.abandon(&UploadError::from(e));
    }
    let outcome = driver.outcome.take();

    match outcome {
        Some(Ok(bytes)) => {
            info!(request_id = %req.id, bytes, "file upload stored");
            transport.header("Location: /config/hasp");
            transport.send(302, "text/plain", b"")?;
            Ok(())
        }
        Some(Err(UploadError::Unauthorized)) => Err(RequestError::AuthRequired),
        Some(Err(e)) => text(transport, 500, &e.to_string()),
        None if !authorized => Err(RequestError::AuthRequired),
        None => Err(RequestError::BadRequest("BAD ARGS")),
    }
}
