//! State shared by every handler.

use crate::config::AppConfig;
use crate::device::Device;
use crate::error::{ConfigError, RequestError};
use crate::page::PageEnvelope;
use crate::progress::ProgressReporter;
use crate::security::AccessGate;
use crate::server::Transport;
use crate::settings::SettingsStore;
use crate::static_files::StaticFiles;
use crate::upload::{FlashWriter, ImageFlash, UploadReceiver};
use std::time::Duration;
use tracing::{error, info};

/// Work that has to wait until the response is on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Restart after `grace`, persisting settings first when `save` is set.
    Restart { save: bool, grace: Duration },
    /// Fetch a firmware image and flash it.
    WebUpdate(String),
}

/// Creates the flash writer for one firmware session.
pub type FlashFactory = Box<dyn Fn(&AppConfig) -> Box<dyn FlashWriter> + Send>;

pub struct AppContext {
    pub config: AppConfig,
    pub settings: SettingsStore,
    pub gate: AccessGate,
    pub device: Box<dyn Device>,
    pub files: StaticFiles,
    pub uploads: UploadReceiver,
    pub progress: ProgressReporter,
    pub flash: FlashFactory,
    /// Lets other coroutines run between upload chunks.
    pub yield_now: fn(),
    pending: Vec<PendingAction>,
}

fn no_yield() {}

impl AppContext {
    /// Context backed by the configured image file for firmware updates.
    pub fn new(config: AppConfig, settings: SettingsStore, device: Box<dyn Device>) -> Self {
        let gate = AccessGate::from_settings(&settings);
        let files = StaticFiles::new(config.data_dir.clone());
        Self {
            config,
            settings,
            gate,
            device,
            files,
            uploads: UploadReceiver::new(),
            progress: ProgressReporter::new(),
            flash: Box::new(|cfg: &AppConfig| {
                Box::new(ImageFlash::new(&cfg.firmware.image, cfg.firmware.capacity))
                    as Box<dyn FlashWriter>
            }),
            yield_now: no_yield,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_flash(mut self, flash: FlashFactory) -> Self {
        self.flash = flash;
        self
    }

    #[must_use]
    pub fn with_yield(mut self, yield_now: fn()) -> Self {
        self.yield_now = yield_now;
        self
    }

    #[must_use]
    pub fn flash_writer(&self) -> Box<dyn FlashWriter> {
        (self.flash)(&self.config)
    }

    pub fn defer(&mut self, action: PendingAction) {
        info!(?action, "action deferred until the response is sent");
        self.pending.push(action);
    }

    /// Schedule a restart after the configured grace delay.
    pub fn defer_restart(&mut self, save: bool, grace: Duration) {
        self.defer(PendingAction::Restart { save, grace });
    }

    pub fn take_pending(&mut self) -> Vec<PendingAction> {
        std::mem::take(&mut self.pending)
    }

    /// Persist the settings store.
    ///
    /// # Errors
    ///
    /// The [`ConfigError`] from writing the settings file.
    pub fn save_settings(&self) -> Result<(), ConfigError> {
        self.settings.save()
    }

    /// Carry out a restart now.
    pub fn restart(&mut self, save: bool) {
        if save {
            if let Err(e) = self.save_settings() {
                error!(error = %e, "settings not saved before restart");
            }
        }
        self.device.restart(save);
    }

    /// Send one HTML page around an already rendered body.
    ///
    /// # Errors
    ///
    /// [`RequestError::Io`] when the transport fails or the emitted length
    /// differs from the declared one.
    pub fn send_page(
        &self,
        transport: &mut dyn Transport,
        body: &str,
        go_home: bool,
    ) -> Result<(), RequestError> {
        PageEnvelope::new(self.device.hostname(), self.device.version())
            .with_refresh(go_home)
            .send(transport, body)?;
        Ok(())
    }
}
