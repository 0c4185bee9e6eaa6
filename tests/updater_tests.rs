mod common;

use common::http_fixtures::payload;
use common::mock_flash::{self, MockFlash};
use common::test_panel::TestPanel;
use common::test_server::{free_port, setup_may_runtime};
use may::sync::Mutex;
use may_minihttp::{HttpService, Request, Response};
use panelweb::dispatcher::Application;
use panelweb::handlers::APPLYING_UPDATE;
use panelweb::server::{HttpServer, ServerHandle};
use panelweb::updater::web_update;
use panelweb::upload::UploadStatus;
use panelweb::UploadError;
use std::io;
use std::sync::Arc;
use tempfile::TempDir;

/// Serves one firmware image at `/fw.bin` and 404 everywhere else.
#[derive(Clone)]
struct ImageServer {
    image: Arc<Vec<u8>>,
}

impl HttpService for ImageServer {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        if req.path() == "/fw.bin" {
            res.header("Content-Type: application/octet-stream");
            res.body_vec(self.image.to_vec());
        } else {
            res.status_code(404, "Not Found");
            res.body_vec(b"missing".to_vec());
        }
        Ok(())
    }
}

fn serve_image(image: Vec<u8>) -> (ServerHandle, u16) {
    setup_may_runtime();
    let port = free_port();
    let handle = HttpServer(ImageServer {
        image: Arc::new(image),
    })
    .start(("127.0.0.1", port))
    .unwrap();
    handle.wait_ready().unwrap();
    (handle, port)
}

/// The panel's application behind the lock the updater takes, plus the
/// directory that has to outlive it.
fn flash_panel(flash: &MockFlash) -> (TempDir, Mutex<Application>) {
    let TestPanel { dir, app, .. } = TestPanel::build(|_| {}, mock_flash::wire(flash.clone()));
    (dir, Mutex::new(app))
}

#[test]
fn test_web_update_flashes_downloaded_image() {
    let image = payload(3000);
    let (server, port) = serve_image(image.clone());
    let flash = MockFlash::new(0x10_0000);
    let (_dir, app) = flash_panel(&flash);

    let result = web_update(&app, &format!("http://127.0.0.1:{port}/fw.bin"));
    server.stop();

    assert_eq!(result, Ok(3000));
    {
        let state = flash.state();
        assert_eq!(state.committed, Some(3000));
        assert_eq!(state.image, image);
        assert_eq!(state.aborts, 0);
    }
    let app = app.lock().unwrap();
    assert_eq!(app.ctx.uploads.status(), UploadStatus::End);
    assert_eq!(app.ctx.progress.snapshot().message, APPLYING_UPDATE);
    assert_eq!(app.ctx.progress.snapshot().percent, Some(100));
}

#[test]
fn test_web_update_error_status_opens_no_session() {
    let (server, port) = serve_image(payload(16));
    let flash = MockFlash::new(0x10_0000);
    let (_dir, app) = flash_panel(&flash);

    let result = web_update(&app, &format!("http://127.0.0.1:{port}/missing.bin"));
    server.stop();

    assert!(matches!(result, Err(UploadError::OpenFailed { .. })), "{result:?}");
    assert_eq!(flash.state().begun, 0);
    let app = app.lock().unwrap();
    assert_eq!(app.ctx.uploads.status(), UploadStatus::Idle);
    assert!(app.ctx.progress.snapshot().message.starts_with("failed to open"));
}
