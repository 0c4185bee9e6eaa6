//! HTTP plumbing: request parsing, the [`Transport`] output side and the
//! `may_minihttp` server that carries both.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, Request};
pub use response::{BufferedTransport, Transport};
pub use service::AppService;
