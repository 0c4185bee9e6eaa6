use std::io;
use tracing::error;

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Output side of one HTTP exchange.
///
/// The body length is declared with [`Transport::set_content_length`] before
/// [`Transport::begin`]; the constrained device stack falls back to chunked
/// framing otherwise, so every response in this crate declares it.
pub trait Transport {
    /// Declare the exact number of body bytes that will follow.
    fn set_content_length(&mut self, len: usize);

    /// Start the response with a status and content type.
    fn begin(&mut self, status: u16, content_type: &'static str) -> io::Result<()>;

    /// Add a full header line, e.g. `"Location: /config/hasp"`.
    fn header(&mut self, line: &'static str);

    /// Append body bytes.
    fn write_content(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Send a complete response whose body is already in hand.
    fn send(&mut self, status: u16, content_type: &'static str, body: &[u8]) -> io::Result<()> {
        self.set_content_length(body.len());
        self.begin(status, content_type)?;
        if !body.is_empty() {
            self.write_content(body)?;
        }
        Ok(())
    }
}

/// Transport that keeps the whole exchange in memory.
///
/// `AppService` renders into one of these and hands the bytes to
/// `may_minihttp`; tests inspect it directly.
#[derive(Debug, Default, Clone)]
pub struct BufferedTransport {
    pub status: Option<u16>,
    pub content_type: Option<&'static str>,
    pub headers: Vec<&'static str>,
    pub declared_len: Option<usize>,
    pub body: Vec<u8>,
}

impl BufferedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a response was started at all.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.status.is_some()
    }

    /// `true` when the declared length equals the bytes actually written.
    #[must_use]
    pub fn length_matches(&self) -> bool {
        self.declared_len == Some(self.body.len())
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn has_header(&self, line: &str) -> bool {
        self.headers.iter().any(|h| *h == line)
    }
}

impl Transport for BufferedTransport {
    fn set_content_length(&mut self, len: usize) {
        self.declared_len = Some(len);
    }

    fn begin(&mut self, status: u16, content_type: &'static str) -> io::Result<()> {
        if self.status.is_some() {
            return Err(io::Error::other("response already started"));
        }
        if self.declared_len.is_none() {
            error!(status, "response started without a declared length");
        }
        self.status = Some(status);
        self.content_type = Some(content_type);
        Ok(())
    }

    fn header(&mut self, line: &'static str) {
        self.headers.push(line);
    }

    fn write_content(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.status.is_none() {
            return Err(io::Error::other("body written before response start"));
        }
        self.body.extend_from_slice(bytes);
        Ok(())
    }
}

/// Copy a finished exchange into the `may_minihttp` response.
pub(crate) fn flush_into(buffered: BufferedTransport, res: &mut may_minihttp::Response) {
    let status = buffered.status.unwrap_or(500);
    if !buffered.length_matches() {
        error!(
            status,
            declared = ?buffered.declared_len,
            written = buffered.body.len(),
            "declared content length does not match the emitted body"
        );
    }
    res.status_code(status as usize, status_reason(status));
    res.header(content_type_header(buffered.content_type.unwrap_or("text/plain")));
    for &line in &buffered.headers {
        res.header(line);
    }
    res.body_vec(buffered.body);
}

fn content_type_header(content_type: &'static str) -> &'static str {
    match content_type {
        "text/html" => "Content-Type: text/html",
        "text/css" => "Content-Type: text/css",
        "application/javascript" => "Content-Type: application/javascript",
        "application/json" => "Content-Type: application/json",
        "text/json" => "Content-Type: text/json",
        "image/bmp" => "Content-Type: image/bmp",
        "image/png" => "Content-Type: image/png",
        "image/gif" => "Content-Type: image/gif",
        "image/jpeg" => "Content-Type: image/jpeg",
        "image/x-icon" => "Content-Type: image/x-icon",
        "text/xml" => "Content-Type: text/xml",
        "application/pdf" => "Content-Type: application/pdf",
        "application/zip" => "Content-Type: application/zip",
        "application/x-gzip" => "Content-Type: application/x-gzip",
        "application/octet-stream" => "Content-Type: application/octet-stream",
        _ => "Content-Type: text/plain",
    }
}
