//! # panelweb
//!
//! **panelweb** is the web front-end of a touch panel controller: the menu,
//! configuration, firmware and file pages, screenshots, and the upload engine
//! behind them, served from a `may` coroutine HTTP server.
//!
//! ## Architecture
//!
//! - **[`server`]** - `may_minihttp` service, request parsing and the
//!   [`server::Transport`] output side
//! - **[`dispatcher`]** - route resolution, handler invocation and error
//!   responses
//! - **[`router`]** - the route table and its method precedence
//! - **[`handlers`]** - every page and action
//! - **[`page`]** - the page composer, which declares the exact length of a
//!   page before its first byte
//! - **[`upload`]** - the single-session upload receiver, its sinks and the
//!   streaming multipart reader
//! - **[`progress`]** - throttled progress reporting
//! - **[`security`]** - the HTTP Basic access gate
//! - **[`settings`]** - the persisted settings store
//! - **[`static_files`]** - file-store serving with `.gz` variants
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Service as AppService<br/>(may_minihttp)
//!     participant App as Application
//!     participant Gate as AccessGate
//!     participant Handler
//!     participant Composer as PageEnvelope
//!
//!     Client->>Service: HTTP request
//!     Service->>Service: parse_request
//!     Service->>App: dispatch (under the lock)
//!     App->>App: RouteTable::resolve(method, path)
//!     App->>Handler: handler(ctx, req, transport)
//!     Handler->>Gate: check(req, page)
//!     alt No valid credential
//!         Gate-->>App: AuthRequired
//!         App-->>Client: 401 + WWW-Authenticate
//!     end
//!     Handler->>Composer: send(transport, body)
//!     Composer-->>Service: declared length, head, body, tail
//!     Service-->>Client: HTTP response
//!     Service->>Service: run deferred actions (restart, web update)
//! ```
//!
//! ## Uploads
//!
//! File and firmware uploads share one [`upload::UploadReceiver`]:
//! `IDLE -> START -> WRITING -> END`, or `ABORTED` on the first fatal
//! condition. A sink is released exactly once per session and a refused
//! request never opens one.

pub mod cli;
pub mod config;
pub mod context;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod page;
pub mod progress;
pub mod router;
pub mod runtime_config;
pub mod screenshot;
pub mod security;
pub mod server;
pub mod settings;
pub mod static_files;
pub mod updater;
pub mod upload;

pub use config::AppConfig;
pub use context::{AppContext, PendingAction};
pub use dispatcher::Application;
pub use error::{ConfigError, RequestError, UploadError};
pub use runtime_config::RuntimeConfig;
