//! # CLI Module
//!
//! Command-line entry points of the `panelweb` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the panel web front-end:
//!
//! ```bash
//! panelweb serve --config panelweb.yaml
//! panelweb serve --config panelweb.yaml --listen 127.0.0.1:8081
//! ```
//!
//! The server is rebuilt from the configuration whenever the panel restarts
//! (reboot page, confirmed factory reset, finished firmware update).
//!
//! ### `check-config`
//!
//! Validate a configuration file and the settings file it points at, then
//! print a summary:
//!
//! ```bash
//! panelweb check-config --config panelweb.yaml
//! ```
//!
//! ## Logging
//!
//! `RUST_LOG` selects the filter (default `panelweb=info`). With
//! `logging.dir` set, a daily rolling file is written next to stdout;
//! `logging.json` switches stdout to JSON lines.

mod commands;
mod logging;


pub use commands::{build_application, run_cli, Cli, Commands};
pub use logging::init_logging;
