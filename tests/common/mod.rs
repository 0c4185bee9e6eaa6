#![allow(dead_code)]

pub mod test_panel {
    use http::Method;
    use panelweb::config::AppConfig;
    use panelweb::context::AppContext;
    use panelweb::device::{HostDevice, RestartSignal};
    use panelweb::dispatcher::Application;
    use panelweb::server::{BufferedTransport, Request};
    use panelweb::settings::{SettingsStore, Subsystem};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// One panel application over a throwaway data directory.
    pub struct TestPanel {
        pub dir: TempDir,
        pub app: Application,
        pub restart: RestartSignal,
    }

    impl TestPanel {
        pub fn new() -> Self {
            Self::build(|_| {}, |ctx| ctx)
        }

        /// Panel with HTTP Basic enabled for `admin` / `secret`.
        pub fn protected() -> Self {
            Self::build(
                |settings| {
                    settings.apply(Subsystem::Http, [("user", "admin"), ("pass", "secret")]);
                },
                |ctx| ctx,
            )
        }

        pub fn build(
            seed: impl FnOnce(&mut SettingsStore),
            wire: impl FnOnce(AppContext) -> AppContext,
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = AppConfig {
                data_dir: dir.path().join("data"),
                settings_file: dir.path().join("data/config.json"),
                firmware: panelweb::config::FirmwareConfig {
                    image: dir.path().join("firmware.bin"),
                    capacity: 0x10_0000,
                },
                screen: panelweb::config::ScreenConfig {
                    width: 32,
                    height: 16,
                },
                upload_chunk_size: 64,
                restart_grace_ms: 0,
                ..AppConfig::default()
            };
            std::fs::create_dir_all(&config.data_dir).unwrap();
            let mut settings = SettingsStore::load(&config.settings_file).unwrap();
            seed(&mut settings);
            let restart = RestartSignal::new();
            let device = HostDevice::new("plate01", 32, 16, restart.clone());
            let ctx = wire(AppContext::new(config, settings, Box::new(device)));
            Self {
                dir,
                app: Application::new(ctx),
                restart,
            }
        }

        pub fn data_dir(&self) -> PathBuf {
            self.app.ctx.config.data_dir.clone()
        }

        pub fn data_file(&self, name: &str) -> PathBuf {
            self.data_dir().join(name)
        }

        pub fn settings_path(&self) -> &Path {
            &self.app.ctx.config.settings_file
        }

        pub fn send(&mut self, req: Request) -> BufferedTransport {
            let mut t = BufferedTransport::new();
            self.app.dispatch(&req, &mut t);
            t
        }

        pub fn get(&mut self, path: &str) -> BufferedTransport {
            self.send(Request::new(Method::GET, path))
        }

        pub fn post_form(&mut self, path: &str, form: &str) -> BufferedTransport {
            self.send(form_request(path, form))
        }
    }

    pub fn form_request(path: &str, form: &str) -> Request {
        Request::new(Method::POST, path).with_body(
            "application/x-www-form-urlencoded",
            form.as_bytes().to_vec(),
        )
    }
}

pub mod http_fixtures {
    use base64::{engine::general_purpose, Engine as _};
    use http::Method;
    use panelweb::server::Request;

    pub const BOUNDARY: &str = "----panelwebTestBoundary";

    /// `Authorization` header value for Basic credentials.
    pub fn basic(user: &str, pass: &str) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{user}:{pass}"))
        )
    }

    pub fn multipart_body(filename: &str, payload: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        b.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"filename\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        b.extend_from_slice(payload);
        b.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        b
    }

    pub fn multipart_upload(path: &str, filename: &str, payload: &[u8]) -> Request {
        Request::new(Method::POST, path).with_body(
            &format!("multipart/form-data; boundary={BOUNDARY}"),
            multipart_body(filename, payload),
        )
    }

    pub fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }
}

pub mod mock_flash {
    use panelweb::config::AppConfig;
    use panelweb::context::AppContext;
    use panelweb::upload::FlashWriter;
    use std::sync::{Arc, Mutex};

    /// Context wiring that hands every firmware session a clone of `flash`.
    pub fn wire(flash: MockFlash) -> impl FnOnce(AppContext) -> AppContext {
        move |ctx| {
            ctx.with_flash(Box::new(move |_: &AppConfig| {
                Box::new(flash.clone()) as Box<dyn FlashWriter>
            }))
        }
    }

    #[derive(Debug, Default)]
    pub struct FlashState {
        pub image: Vec<u8>,
        pub committed: Option<u64>,
        pub aborts: usize,
        pub begun: usize,
    }

    /// In-memory flash; `accept_limit` makes writes past that many bytes short.
    #[derive(Clone)]
    pub struct MockFlash {
        pub state: Arc<Mutex<FlashState>>,
        pub free: u64,
        pub accept_limit: Option<usize>,
    }

    impl MockFlash {
        pub fn new(free: u64) -> Self {
            Self {
                state: Arc::new(Mutex::new(FlashState::default())),
                free,
                accept_limit: None,
            }
        }

        pub fn short_after(mut self, bytes: usize) -> Self {
            self.accept_limit = Some(bytes);
            self
        }

        pub fn state(&self) -> std::sync::MutexGuard<'_, FlashState> {
            self.state.lock().unwrap()
        }
    }

    impl FlashWriter for MockFlash {
        fn free_space(&self) -> u64 {
            self.free
        }

        fn begin(&mut self, _max_size: u64) -> Result<(), String> {
            let mut s = self.state.lock().unwrap();
            s.begun += 1;
            s.image.clear();
            Ok(())
        }

        fn write(&mut self, chunk: &[u8]) -> usize {
            let mut s = self.state.lock().unwrap();
            let take = match self.accept_limit {
                Some(limit) => chunk.len().min(limit.saturating_sub(s.image.len())),
                None => chunk.len(),
            };
            s.image.extend_from_slice(&chunk[..take]);
            take
        }

        fn commit(&mut self) -> Result<u64, String> {
            let mut s = self.state.lock().unwrap();
            let len = s.image.len() as u64;
            s.committed = Some(len);
            Ok(len)
        }

        fn abort(&mut self) {
            self.state.lock().unwrap().aborts += 1;
        }
    }
}

pub mod progress_log {
    use panelweb::progress::{ProgressListener, ProgressRecord};
    use std::sync::{Arc, Mutex};

    /// Records every progress update the reporter publishes.
    #[derive(Clone, Default)]
    pub struct Recorder(pub Arc<Mutex<Vec<ProgressRecord>>>);

    impl ProgressListener for Recorder {
        fn on_progress(&mut self, record: &ProgressRecord) {
            self.0.lock().unwrap().push(record.clone());
        }
    }

    impl Recorder {
        pub fn percents(&self) -> Vec<u8> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|r| r.percent)
                .collect()
        }
    }
}

pub mod test_server {
    use std::net::TcpListener;
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    pub fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }
}
