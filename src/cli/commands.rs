use crate::config::AppConfig;
use crate::context::AppContext;
use crate::device::{HostDevice, RestartSignal};
use crate::dispatcher::Application;
use crate::progress::LogListener;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};
use crate::settings::SettingsStore;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;

/// How often the serve loop looks for a restart request.
const RESTART_POLL: Duration = Duration::from_millis(100);

/// Command-line interface for panelweb
#[derive(Parser)]
#[command(name = "panelweb")]
#[command(about = "Web front-end for a touch panel controller", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web front-end
    Serve {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured listen address
        #[arg(long)]
        listen: Option<String>,
    },
    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Parse the command line and run the chosen command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the settings file
/// is unreadable, or the server fails to start.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { config, listen } => {
            let mut cfg = AppConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            if let Some(listen) = listen {
                cfg.listen = listen;
            }
            let _guard = crate::cli::init_logging(&cfg.logging)?;
            RuntimeConfig::from_env().apply();
            serve(&cfg)
        }
        Commands::CheckConfig { config } => {
            let cfg = AppConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            SettingsStore::load(&cfg.settings_file)
                .with_context(|| format!("loading {}", cfg.settings_file.display()))?;
            println!("listen:      {}", cfg.listen);
            println!("hostname:    {}", cfg.hostname);
            println!("data_dir:    {}", cfg.data_dir.display());
            println!("settings:    {}", cfg.settings_file.display());
            println!(
                "firmware:    {} ({} bytes)",
                cfg.firmware.image.display(),
                cfg.firmware.capacity
            );
            println!("screen:      {}x{}", cfg.screen.width, cfg.screen.height);
            Ok(())
        }
    }
}

/// Build the application the server runs, with a host device wired to
/// `restart`.
///
/// # Errors
///
/// Fails when the data directory cannot be created or the settings file
/// cannot be read.
pub fn build_application(cfg: &AppConfig, restart: RestartSignal) -> anyhow::Result<Application> {
    fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("creating {}", cfg.data_dir.display()))?;
    let settings = SettingsStore::load(&cfg.settings_file)?;
    let device = HostDevice::new(
        cfg.hostname.clone(),
        cfg.screen.width,
        cfg.screen.height,
        restart,
    );
    let mut ctx = AppContext::new(cfg.clone(), settings, Box::new(device))
        .with_yield(may::coroutine::yield_now);
    ctx.progress.set_listener(Box::new(LogListener));
    Ok(Application::new(ctx))
}

fn serve(cfg: &AppConfig) -> anyhow::Result<()> {
    loop {
        let restart = RestartSignal::new();
        let app = build_application(cfg, restart.clone())?;
        let handle = HttpServer(AppService::new(app))
            .start(cfg.listen.as_str())
            .with_context(|| format!("binding {}", cfg.listen))?;
        handle.wait_ready()?;
        info!(addr = %handle.addr(), hostname = %cfg.hostname, "panel web front-end ready");

        while !restart.take() {
            thread::sleep(RESTART_POLL);
        }
        info!("restart requested, rebuilding the application");
        handle.stop();
    }
}
