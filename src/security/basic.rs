use crate::security::SecurityProvider;
use crate::server::Request;
use crate::settings::{SettingsStore, Subsystem};
use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

/// HTTP Basic credential check against the configured user and password.
pub struct BasicAuthProvider {
    user: String,
    pass: String,
}

impl BasicAuthProvider {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Provider for the `http` settings, or `None` when no password is set.
    #[must_use]
    pub fn from_settings(settings: &SettingsStore) -> Option<Self> {
        let pass = settings.text(Subsystem::Http, "pass");
        if pass.is_empty() {
            return None;
        }
        Some(Self::new(settings.text(Subsystem::Http, "user"), pass))
    }

    fn decode(&self, header: &str) -> Option<(String, String)> {
        let encoded = header
            .strip_prefix("Basic ")
            .or_else(|| header.strip_prefix("basic "))?
            .trim();
        let raw = match general_purpose::STANDARD.decode(encoded) {
            Ok(b) => b,
            Err(e) => {
                debug!("Basic credentials rejected: invalid base64 - {:?}", e);
                return None;
            }
        };
        let text = match String::from_utf8(raw) {
            Ok(t) => t,
            Err(e) => {
                debug!("Basic credentials rejected: not UTF-8 - {:?}", e);
                return None;
            }
        };
        let (user, pass) = text.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }
}

impl SecurityProvider for BasicAuthProvider {
    fn validate(&self, req: &Request) -> bool {
        let Some(header) = req.header("authorization") else {
            debug!("Basic credentials missing");
            return false;
        };
        match self.decode(header) {
            Some((user, pass)) => user == self.user && pass == self.pass,
            None => false,
        }
    }
}
