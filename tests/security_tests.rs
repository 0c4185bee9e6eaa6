mod common;

use common::http_fixtures::{basic, multipart_upload, payload};
use common::mock_flash::{self, MockFlash};
use common::test_panel::{form_request, TestPanel};
use http::Method;
use panelweb::security::CHALLENGE_HEADER;
use panelweb::server::Request;
use panelweb::settings::Subsystem;
use panelweb::upload::{FirmwareSink, UploadMeta, UploadSink, UploadStatus};
use std::time::Instant;

#[test]
fn test_pages_challenge_without_credentials() {
    let mut panel = TestPanel::protected();
    for path in ["/", "/config", "/info", "/screenshot?q=1", "/list?dir=/", "/page/?page=3"] {
        let t = panel.get(path);
        assert_eq!(t.status, Some(401), "{path}");
        assert!(t.has_header(CHALLENGE_HEADER), "{path}");
        assert!(t.length_matches(), "{path}");
    }
    assert_eq!(panel.app.ctx.device.page(), 1);
}

#[test]
fn test_valid_credentials_pass() {
    let mut panel = TestPanel::protected();
    let req = Request::new(Method::GET, "/config").with_header("Authorization", &basic("admin", "secret"));
    assert_eq!(panel.send(req).status, Some(200));

    let req = Request::new(Method::GET, "/config").with_header("Authorization", &basic("admin", "wrong"));
    assert_eq!(panel.send(req).status, Some(401));
}

#[test]
fn test_refused_settings_form_changes_nothing() {
    let mut panel = TestPanel::protected();
    let t = panel.post_form("/config", "save=mqtt&host=evil.example");
    assert_eq!(t.status, Some(401));
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Mqtt, "host"), "");
}

#[test]
fn test_refused_upload_creates_no_file() {
    let mut panel = TestPanel::protected();
    let t = panel.send(multipart_upload("/edit", "pages.jsonl", b"payload"));
    assert_eq!(t.status, Some(401));
    assert!(t.has_header(CHALLENGE_HEADER));
    assert!(!panel.data_file("pages.jsonl").exists());
}

#[test]
fn test_refused_firmware_upload_is_challenged() {
    let mut panel = TestPanel::protected();
    let req = Request::new(Method::POST, "/update")
        .with_body("application/octet-stream", vec![0u8; 128]);
    let t = panel.send(req);
    assert_eq!(t.status, Some(401));
    assert!(panel.app.take_pending().is_empty());
}

#[test]
fn test_refused_file_create_and_delete() {
    let mut panel = TestPanel::protected();
    std::fs::write(panel.data_file("keep.txt"), b"x").unwrap();

    let t = panel.send(Request::new(Method::PUT, "/edit?path=/new.txt"));
    assert_eq!(t.status, Some(401));
    assert!(!panel.data_file("new.txt").exists());

    let t = panel.send(Request::new(Method::DELETE, "/edit?path=/keep.txt"));
    assert_eq!(t.status, Some(401));
    assert!(panel.data_file("keep.txt").exists());
}

#[test]
fn test_refused_reset_keeps_settings() {
    let mut panel = TestPanel::protected();
    let t = panel.get("/resetConfig?confirm=yes");
    assert_eq!(t.status, Some(401));
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Http, "pass"), "secret");
    assert!(panel.app.take_pending().is_empty());
}

#[test]
fn test_new_password_applies_to_the_same_request() {
    let mut panel = TestPanel::protected();
    let req = form_request("/config", "save=http&user=admin&pass=changed")
        .with_header("Authorization", &basic("admin", "secret"));
    let t = panel.send(req);
    assert_eq!(t.status, Some(401));
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Http, "pass"), "changed");

    let req = Request::new(Method::GET, "/").with_header("Authorization", &basic("admin", "changed"));
    assert_eq!(panel.send(req).status, Some(200));
}

#[test]
fn test_open_panel_needs_no_credentials() {
    let mut panel = TestPanel::new();
    assert!(!panel.app.ctx.gate.is_enabled());
    assert_eq!(panel.get("/config").status, Some(200));
}

#[test]
fn test_refused_upload_leaves_running_firmware_session_alone() {
    let flash = MockFlash::new(0x10_0000);
    let mut panel = TestPanel::build(
        |settings| {
            settings.apply(Subsystem::Http, [("user", "admin"), ("pass", "secret")]);
        },
        mock_flash::wire(flash.clone()),
    );
    let meta = UploadMeta {
        target: "firmware.bin".to_string(),
        declared_size: Some(100),
    };
    let ctx = &mut panel.app.ctx;
    let writer = ctx.flash_writer();
    let session = ctx
        .uploads
        .start(
            &meta,
            true,
            move |m: &UploadMeta| {
                FirmwareSink::open(&m.target, writer, m.declared_size)
                    .map(|s| Box::new(s) as Box<dyn UploadSink>)
            },
            &mut ctx.progress,
        )
        .unwrap();
    ctx.uploads
        .chunk(session, &payload(40), &mut ctx.progress, Instant::now())
        .unwrap();
    let before = ctx.progress.snapshot();

    let t = panel.send(multipart_upload("/edit", "x.txt", b"evil"));
    assert_eq!(t.status, Some(401));
    let req = Request::new(Method::POST, "/update")
        .with_body("application/octet-stream", vec![0u8; 16]);
    assert_eq!(panel.send(req).status, Some(401));

    assert!(!panel.data_file("x.txt").exists());
    let ctx = &mut panel.app.ctx;
    assert_eq!(ctx.uploads.status(), UploadStatus::Writing);
    assert_eq!(ctx.uploads.bytes_written(), 40);
    assert_eq!(ctx.progress.snapshot(), before);
    assert_eq!(flash.state().aborts, 0);

    ctx.uploads
        .chunk(session, &payload(60), &mut ctx.progress, Instant::now())
        .unwrap();
    assert_eq!(ctx.uploads.end(session, &mut ctx.progress), Ok(100));
    assert_eq!(flash.state().committed, Some(100));
}
