use crate::context::{AppContext, PendingAction};
use crate::error::RequestError;
use crate::handlers;
use crate::router::RouteTable;
use crate::security::send_challenge;
use crate::server::{BufferedTransport, Request, Transport};
use std::time::Instant;
use tracing::{debug, error, trace, warn};

/// Signature every route handler has.
pub type Handler =
    fn(&mut AppContext, &Request, &mut dyn Transport) -> Result<(), RequestError>;

/// The context plus the table that routes into it.
pub struct Application {
    pub ctx: AppContext,
    routes: RouteTable<Handler>,
}

impl Application {
    /// Application with the full panel route table.
    #[must_use]
    pub fn new(ctx: AppContext) -> Self {
        Self::with_routes(ctx, handlers::route_table())
    }

    #[must_use]
    pub fn with_routes(ctx: AppContext, routes: RouteTable<Handler>) -> Self {
        routes.log_routes();
        Self { ctx, routes }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable<Handler> {
        &self.routes
    }

    /// Handle one request, always leaving a complete response in `transport`.
    pub fn dispatch(&mut self, req: &Request, transport: &mut BufferedTransport) {
        let start = Instant::now();
        let resolved = self
            .routes
            .resolve(&req.method, &req.path)
            .map(|r| (r.handler_name, r.handler));

        let result = match resolved {
            Some((name, handler)) => {
                trace!(handler = name, request_id = %req.id, "dispatching");
                handler(&mut self.ctx, req, transport)
            }
            None => self.fallback(req, transport),
        };

        if let Err(e) = result {
            self.answer_error(req, &e, transport);
        }
        debug!(
            request_id = %req.id,
            status = ?transport.status,
            bytes = transport.body.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "request handled"
        );
    }

    /// Actions the last requests deferred until their responses are sent.
    pub fn take_pending(&mut self) -> Vec<PendingAction> {
        self.ctx.take_pending()
    }

    fn fallback(&mut self, req: &Request, transport: &mut dyn Transport) -> Result<(), RequestError> {
        if let Some(file) = self.ctx.files.resolve(&req.path) {
            self.ctx.gate.check(req, "fileread")?;
            let sent = self
                .ctx
                .files
                .serve(&file, transport, self.ctx.config.upload_chunk_size)?;
            debug!(path = %file.path.display(), bytes = sent, gzipped = file.gzipped, "static file sent");
            return Ok(());
        }
        Err(RequestError::NotFound)
    }

    fn answer_error(&self, req: &Request, e: &RequestError, transport: &mut BufferedTransport) {
        if transport.is_started() {
            error!(request_id = %req.id, error = %e, "handler failed after the response started");
            return;
        }
        let sent = match e {
            RequestError::AuthRequired => send_challenge(transport),
            RequestError::BadRequest(reason) => {
                warn!(request_id = %req.id, reason, "bad request");
                transport.send(400, "text/plain", reason.as_bytes())
            }
            RequestError::NotFound => {
                trace!(request_id = %req.id, path = %req.path, "Sending 404");
                transport.send(404, "text/plain", not_found_body(req).as_bytes())
            }
            RequestError::Io(io) => {
                error!(request_id = %req.id, error = %io, "request failed");
                transport.send(500, "text/plain", b"")
            }
        };
        if let Err(io) = sent {
            error!(request_id = %req.id, error = %io, "error response not sent");
        }
    }
}

/// Diagnostic body of the 404 page: path, method and every argument.
#[must_use]
pub fn not_found_body(req: &Request) -> String {
    let mut out = format!(
        "File Not Found\n\nURI: {}\nMethod: {}\nArguments: {}\n",
        req.path,
        req.method,
        req.args.len()
    );
    for (name, value) in &req.args {
        out.push_str(&format!(" {name}: {value}\n"));
    }
    out
}
