//! # Dispatcher
//!
//! Runs one request against the [`AppContext`](crate::context::AppContext):
//!
//! 1. the route table resolves `(method, path)` to a handler;
//! 2. unmatched requests try the static file store (`path`, then `path.gz`);
//! 3. anything still unresolved gets the diagnostic 404 page.
//!
//! Handlers return [`RequestError`](crate::error::RequestError) and never
//! write error responses themselves; the dispatcher maps every variant to the
//! response the client sees, unless the handler already started one.

mod core;

pub use self::core::{not_found_body, Application, Handler};
