//! Error types shared by the handlers and the upload engine.
//!
//! Handlers return [`RequestError`]; the dispatcher owns the mapping from each
//! variant to the response the client sees, so a handler never has to emit a
//! challenge or a 404 body itself. Upload failures are [`UploadError`]s and are
//! always terminal for the session that raised them.

use std::fmt;
use std::io;

/// Failure of a single request, converted into a response by the dispatcher.
#[derive(Debug)]
pub enum RequestError {
    /// Credentials missing or wrong; a challenge is sent and nothing was mutated.
    AuthRequired,
    /// A required argument was missing or malformed.
    BadRequest(&'static str),
    /// Nothing is registered for the path and no file resolves it.
    NotFound,
    /// The transport failed while the response was being written.
    Io(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::AuthRequired => write!(f, "authentication required"),
            RequestError::BadRequest(reason) => write!(f, "bad request: {reason}"),
            RequestError::NotFound => write!(f, "not found"),
            RequestError::Io(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        RequestError::Io(e)
    }
}

/// Fatal condition of an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The access gate refused the request before a sink was opened.
    Unauthorized,
    /// Target file name exceeds the file-store name limit.
    NameTooLong { name: String, max: usize },
    /// The sink could not be opened.
    OpenFailed { target: String, reason: String },
    /// Not enough program space for the declared image.
    InsufficientSpace { required: u64, available: u64 },
    /// The sink accepted fewer bytes than offered.
    ShortWrite { offered: usize, accepted: usize },
    /// Flushing or committing the sink failed.
    Finalize(String),
    /// The committed byte count differs from the declared size.
    SizeMismatch { declared: u64, committed: u64 },
    /// The upload body could not be parsed.
    Malformed(String),
    /// `chunk`/`end` was called without an active session.
    NotActive,
    /// A newer session replaced the one this caller opened.
    Superseded,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Unauthorized => write!(f, "upload rejected: authentication required"),
            UploadError::NameTooLong { name, max } => {
                write!(f, "filename {name} is too long (max {max} characters)")
            }
            UploadError::OpenFailed { target, reason } => {
                write!(f, "failed to open {target}: {reason}")
            }
            UploadError::InsufficientSpace {
                required,
                available,
            } => write!(
                f,
                "not enough space: {required} bytes required, {available} bytes available"
            ),
            UploadError::ShortWrite { offered, accepted } => write!(
                f,
                "failed to write received data: {accepted} of {offered} bytes accepted"
            ),
            UploadError::Finalize(reason) => write!(f, "failed to finish upload: {reason}"),
            UploadError::SizeMismatch {
                declared,
                committed,
            } => write!(
                f,
                "size mismatch: {declared} bytes declared, {committed} bytes committed"
            ),
            UploadError::Malformed(reason) => write!(f, "malformed upload: {reason}"),
            UploadError::NotActive => write!(f, "no upload in progress"),
            UploadError::Superseded => write!(f, "upload superseded by a newer one"),
        }
    }
}

impl std::error::Error for UploadError {}

/// Failure while reading a `multipart/form-data` body.
#[derive(Debug)]
pub enum MultipartError {
    /// No boundary in the Content-Type header.
    MissingBoundary,
    /// Empty or over-long boundary.
    InvalidBoundary,
    /// Part headers missing, too large or not parseable.
    InvalidPartHeaders(String),
    /// A plain form field exceeded the field size limit.
    FieldTooLarge { name: String, max: usize },
    /// The body ended before the closing delimiter.
    UnexpectedEof,
    /// Reading the body failed.
    Io(io::Error),
    /// The upload receiver refused the data.
    Rejected(UploadError),
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::MissingBoundary => write!(f, "missing boundary in multipart Content-Type"),
            MultipartError::InvalidBoundary => write!(f, "invalid multipart boundary"),
            MultipartError::InvalidPartHeaders(detail) => write!(f, "invalid part headers: {detail}"),
            MultipartError::FieldTooLarge { name, max } => {
                write!(f, "form field {name} exceeds {max} bytes")
            }
            MultipartError::UnexpectedEof => write!(f, "unexpected end of multipart data"),
            MultipartError::Io(e) => write!(f, "multipart I/O error: {e}"),
            MultipartError::Rejected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MultipartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MultipartError::Io(e) => Some(e),
            MultipartError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MultipartError {
    fn from(e: io::Error) -> Self {
        MultipartError::Io(e)
    }
}

impl From<UploadError> for MultipartError {
    fn from(e: UploadError) -> Self {
        MultipartError::Rejected(e)
    }
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        match e {
            MultipartError::Rejected(inner) => inner,
            other => UploadError::Malformed(other.to_string()),
        }
    }
}

/// Configuration or settings-store loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: String, source: io::Error },
    Parse { path: String, detail: String },
    Write { path: String, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => write!(f, "cannot read {path}: {source}"),
            ConfigError::Parse { path, detail } => write!(f, "cannot parse {path}: {detail}"),
            ConfigError::Write { path, source } => write!(f, "cannot write {path}: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } | ConfigError::Write { source, .. } => Some(source),
            ConfigError::Parse { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_write_message_names_counts() {
        let e = UploadError::ShortWrite {
            offered: 1436,
            accepted: 512,
        };
        assert_eq!(
            e.to_string(),
            "failed to write received data: 512 of 1436 bytes accepted"
        );
    }

    #[test]
    fn test_io_error_converts_into_request_error() {
        let e: RequestError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(e, RequestError::Io(_)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
