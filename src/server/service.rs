use super::request::parse_request;
use super::response::{flush_into, BufferedTransport, Transport};
use crate::context::PendingAction;
use crate::dispatcher::Application;
use crate::updater::web_update;
use may::sync::{Mutex, MutexGuard};
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, info_span, warn};

/// `may_minihttp` service in front of the shared [`Application`].
///
/// One request is handled at a time: the whole dispatch runs under the
/// application lock, the way the panel serves one client per loop pass.
#[derive(Clone)]
pub struct AppService {
    pub app: Arc<Mutex<Application>>,
}

impl AppService {
    #[must_use]
    pub fn new(app: Application) -> Self {
        Self {
            app: Arc::new(Mutex::new(app)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Application> {
        self.app.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_pending(&self, actions: Vec<PendingAction>) {
        for action in actions {
            let app = Arc::clone(&self.app);
            let spawned = thread::Builder::new()
                .name("panelweb-action".to_string())
                .spawn(move || run_action(&app, action));
            if let Err(e) = spawned {
                error!(error = %e, "could not start deferred action");
            }
        }
    }
}

fn run_action(app: &Mutex<Application>, action: PendingAction) {
    match action {
        PendingAction::Restart { save, grace } => {
            thread::sleep(grace);
            info!(save, "restarting");
            app.lock()
                .unwrap_or_else(|e| e.into_inner())
                .ctx
                .restart(save);
        }
        PendingAction::WebUpdate(url) => match web_update(app, &url) {
            Ok(bytes) => {
                let grace = app
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .ctx
                    .config
                    .restart_grace_ms;
                thread::sleep(Duration::from_millis(grace));
                info!(bytes, "restarting into the downloaded firmware");
                app.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .ctx
                    .restart(true);
            }
            Err(e) => warn!(url, error = %e, "remote firmware update failed"),
        },
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut transport = BufferedTransport::new();
        let req = match parse_request(req) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "request rejected before dispatch");
                transport.send(400, "text/plain", b"BAD REQUEST")?;
                flush_into(transport, res);
                return Ok(());
            }
        };

        let span = info_span!(
            "request",
            id = %req.id,
            method = %req.method,
            path = %req.path
        );
        let _entered = span.enter();

        let pending = {
            let mut app = self.lock();
            app.dispatch(&req, &mut transport);
            app.take_pending()
        };
        flush_into(transport, res);
        self.run_pending(pending);
        Ok(())
    }
}
