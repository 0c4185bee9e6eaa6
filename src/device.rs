//! The panel the web front-end controls.
//!
//! Handlers only see the [`Device`] trait. [`HostDevice`] is the desktop
//! stand-in used by the binary: it keeps an RGB565 framebuffer per page and
//! turns a restart into a flag the serve loop polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pages the panel cycles through.
pub const PAGE_COUNT: u8 = 12;

pub trait Device: Send {
    fn hostname(&self) -> &str;
    fn version(&self) -> &str;
    fn uptime(&self) -> Duration;

    /// Horizontal and vertical resolution in pixels.
    fn screen_size(&self) -> (u16, u16);

    /// Copy one framebuffer row as RGB565. `row` is `width` pixels long.
    fn read_row(&self, y: u16, row: &mut [u16]);

    fn page(&self) -> u8;
    fn set_page(&mut self, page: u8);
    fn next_page(&mut self);
    fn prev_page(&mut self);

    /// Run a text command as typed on the console or sent over MQTT.
    fn dispatch_text(&mut self, command: &str);

    /// Physical memory in use by the process, if known.
    fn memory_in_use(&self) -> Option<u64>;

    /// Schedule a restart; `save` persists settings first.
    fn restart(&mut self, save: bool);
}

/// Shared flag the serve loop watches for restart requests.
#[derive(Debug, Clone, Default)]
pub struct RestartSignal {
    requested: Arc<AtomicBool>,
}

impl RestartSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request.
    #[must_use]
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

pub struct HostDevice {
    hostname: String,
    version: String,
    started: Instant,
    width: u16,
    height: u16,
    page: u8,
    restart: RestartSignal,
    commands: Vec<String>,
}

impl HostDevice {
    pub fn new(hostname: impl Into<String>, width: u16, height: u16, restart: RestartSignal) -> Self {
        Self {
            hostname: hostname.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started: Instant::now(),
            width,
            height,
            page: 1,
            restart,
            commands: Vec::new(),
        }
    }

    /// Text commands received so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    fn page_colour(&self) -> u16 {
        // Hue steps around the colour wheel, one per page.
        const PALETTE: [u16; PAGE_COUNT as usize] = [
            0xF800, 0xFC00, 0xFFE0, 0x87E0, 0x07E0, 0x07F0, 0x07FF, 0x041F, 0x001F, 0x801F,
            0xF81F, 0xF810,
        ];
        PALETTE[usize::from(self.page.saturating_sub(1)) % PALETTE.len()]
    }
}

impl Device for HostDevice {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    fn screen_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn read_row(&self, y: u16, row: &mut [u16]) {
        let colour = self.page_colour();
        let band = self.height / 8;
        for (x, px) in row.iter_mut().enumerate() {
            // Header band plus a diagonal stripe so orientation is visible.
            *px = if y < band || (x as u16 + y) % 64 < 4 {
                colour
            } else {
                0x0000
            };
        }
    }

    fn page(&self) -> u8 {
        self.page
    }

    fn set_page(&mut self, page: u8) {
        if (1..=PAGE_COUNT).contains(&page) {
            self.page = page;
            info!(page, "page changed");
        } else {
            warn!(page, "page out of range");
        }
    }

    fn next_page(&mut self) {
        self.page = if self.page >= PAGE_COUNT { 1 } else { self.page + 1 };
        info!(page = self.page, "page changed");
    }

    fn prev_page(&mut self) {
        self.page = if self.page <= 1 { PAGE_COUNT } else { self.page - 1 };
        info!(page = self.page, "page changed");
    }

    fn dispatch_text(&mut self, command: &str) {
        info!(command, "text command");
        let command = command.trim();
        if let Some(arg) = command.strip_prefix("page ") {
            if let Ok(page) = arg.trim().parse() {
                self.set_page(page);
            }
        } else if command == "page next" {
            self.next_page();
        }
        self.commands.push(command.to_string());
    }

    fn memory_in_use(&self) -> Option<u64> {
        memory_stats::memory_stats().map(|m| m.physical_mem as u64)
    }

    fn restart(&mut self, save: bool) {
        warn!(save, "restart requested");
        self.restart.request();
    }
}
