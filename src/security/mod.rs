//! # Access gate
//!
//! Every handler that reads or mutates device state asks the gate first. The
//! gate holds at most one [`SecurityProvider`]; with none installed every
//! request passes. The only provider the panel ships is HTTP Basic
//! ([`BasicAuthProvider`]) built from the `http` settings, and it is rebuilt
//! whenever those settings are saved so a new password applies to the very
//! next request.
//!
//! A refused request surfaces as [`RequestError::AuthRequired`]; the
//! dispatcher answers it with [`send_challenge`] and nothing else happens.

use crate::error::RequestError;
use crate::server::{Request, Transport};
use crate::settings::SettingsStore;
use std::io;
use tracing::{debug, info, trace};

mod basic;

pub use basic::BasicAuthProvider;

/// Header line sent with every 401.
pub const CHALLENGE_HEADER: &str = "WWW-Authenticate: Basic realm=\"Login Required\"";

/// Credential check for one request.
pub trait SecurityProvider: Send + Sync {
    /// `true` when the request carries acceptable credentials.
    fn validate(&self, req: &Request) -> bool;
}

/// Decides whether a request may see or change device state.
#[derive(Default)]
pub struct AccessGate {
    provider: Option<Box<dyn SecurityProvider>>,
}

impl AccessGate {
    /// Gate that lets everything through.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Gate configured from the `http` settings.
    #[must_use]
    pub fn from_settings(settings: &SettingsStore) -> Self {
        let mut gate = Self::open();
        gate.reload(settings);
        gate
    }

    #[must_use]
    pub fn with_provider(provider: Box<dyn SecurityProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Re-read the credential; an empty password disables the check.
    pub fn reload(&mut self, settings: &SettingsStore) {
        self.provider = BasicAuthProvider::from_settings(settings)
            .map(|p| Box::new(p) as Box<dyn SecurityProvider>);
        info!(enabled = self.is_enabled(), "access gate configured");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Boolean form of [`AccessGate::check`], for upload callbacks that
    /// cannot return a response themselves.
    #[must_use]
    pub fn allows(&self, req: &Request) -> bool {
        self.provider.as_ref().map_or(true, |p| p.validate(req))
    }

    /// Authorize `req` for the page named `page`.
    ///
    /// # Errors
    ///
    /// [`RequestError::AuthRequired`] when a provider is installed and the
    /// credentials are missing or wrong.
    pub fn check(&self, req: &Request, page: &str) -> Result<(), RequestError> {
        if self.allows(req) {
            trace!(page, request_id = %req.id, "Sending page");
            Ok(())
        } else {
            debug!(page, request_id = %req.id, "credentials rejected");
            Err(RequestError::AuthRequired)
        }
    }
}

/// Answer with `401` and the Basic challenge.
///
/// # Errors
///
/// Propagates transport failures.
pub fn send_challenge<T: Transport + ?Sized>(transport: &mut T) -> io::Result<()> {
    const BODY: &[u8] = b"401 Unauthorized";
    transport.set_content_length(BODY.len());
    transport.header(CHALLENGE_HEADER);
    transport.begin(401, "text/plain")?;
    transport.write_content(BODY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::BufferedTransport;
    use crate::settings::Subsystem;
    use http::Method;

    #[test]
    fn test_empty_password_disables_gate() {
        let settings = SettingsStore::in_memory();
        let gate = AccessGate::from_settings(&settings);
        assert!(!gate.is_enabled());
        assert!(gate.check(&Request::new(Method::GET, "/"), "Main").is_ok());
    }

    #[test]
    fn test_reload_applies_new_password() {
        let mut settings = SettingsStore::in_memory();
        let mut gate = AccessGate::from_settings(&settings);
        settings.apply(Subsystem::Http, [("pass", "s3cret")]);
        gate.reload(&settings);
        let err = gate
            .check(&Request::new(Method::GET, "/info"), "Info")
            .unwrap_err();
        assert!(matches!(err, RequestError::AuthRequired));
    }

    #[test]
    fn test_challenge_declares_length_and_realm() {
        let mut t = BufferedTransport::new();
        send_challenge(&mut t).unwrap();
        assert_eq!(t.status, Some(401));
        assert!(t.has_header(CHALLENGE_HEADER));
        assert!(t.length_matches());
    }
}
