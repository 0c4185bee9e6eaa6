use crate::error::RequestError;
use crate::ids::RequestId;
use http::Method;
use smallvec::SmallVec;
use std::io::Read;
use tracing::{debug, info, warn};

/// Most panel requests carry fewer headers than this; more spill to the heap.
pub const MAX_INLINE_HEADERS: usize = 16;
/// Config forms post up to a dozen fields.
pub const MAX_INLINE_ARGS: usize = 16;

/// Lower-cased header name / value pairs in arrival order.
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;
/// Argument name / value pairs, query string first, then form body fields.
pub type ArgVec = SmallVec<[(String, String); MAX_INLINE_ARGS]>;

/// One parsed HTTP request as seen by the handlers.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub method: Method,
    /// Percent-decoded path without the query string.
    pub path: String,
    pub headers: HeaderVec,
    pub args: ArgVec,
    /// Raw body, kept for upload routes.
    pub body: Vec<u8>,
}

impl Request {
    /// Build a request from a method and a path that may carry a query string.
    #[must_use]
    pub fn new(method: Method, raw_path: &str) -> Self {
        let (path, query) = match raw_path.find('?') {
            Some(pos) => (&raw_path[..pos], Some(&raw_path[pos + 1..])),
            None => (raw_path, None),
        };
        let mut args = ArgVec::new();
        if let Some(query) = query {
            args.extend(parse_form(query.as_bytes()));
        }
        Self {
            id: RequestId::new(),
            method,
            path: decode_path(if path.is_empty() { "/" } else { path }),
            headers: HeaderVec::new(),
            args,
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Attach a body; url-encoded form fields are merged into the args.
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        if !self.headers.iter().any(|(k, _)| k == "content-type") {
            self.headers
                .push(("content-type".to_string(), content_type.to_string()));
        }
        if content_type.starts_with("application/x-www-form-urlencoded") {
            self.args.extend(parse_form(&body));
        }
        self.body = body;
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First argument with this name, as the device web server resolves it.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_arg(&self, name: &str) -> bool {
        self.args.iter().any(|(k, _)| k == name)
    }

    /// Argument parsed as an integer; missing or malformed reads as zero.
    #[must_use]
    pub fn arg_int(&self, name: &str) -> i64 {
        self.arg(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Parse `a=1&b=2` pairs (also used for url-encoded bodies).
pub fn parse_form(input: &[u8]) -> impl Iterator<Item = (String, String)> + '_ {
    url::form_urlencoded::parse(input).map(|(k, v)| (k.into_owned(), v.into_owned()))
}

/// Percent-decode a request path. Invalid escapes are kept verbatim.
#[must_use]
pub fn decode_path(path: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned()
}

/// Convert a `may_minihttp` request into a [`Request`].
///
/// # Errors
///
/// Returns [`RequestError::BadRequest`] for a method token `http` rejects,
/// and [`RequestError::Io`] if the body cannot be read.
pub fn parse_request(req: may_minihttp::Request) -> Result<Request, RequestError> {
    let method = Method::from_bytes(req.method().as_bytes()).map_err(|_| {
        warn!(method = req.method(), "unparseable request method");
        RequestError::BadRequest("BAD METHOD")
    })?;
    let raw_path = req.path().to_string();

    let mut headers = HeaderVec::new();
    for h in req.headers().iter() {
        headers.push((
            h.name.to_ascii_lowercase(),
            String::from_utf8_lossy(h.value).into_owned(),
        ));
    }
    debug!(
        header_count = headers.len(),
        header_names = ?headers.iter().map(|(k, _)| k.as_str()).take(20).collect::<Vec<_>>(),
        "Headers extracted"
    );

    let mut body = Vec::new();
    let size = req.body().read_to_end(&mut body)?;

    let mut parsed = Request::new(method, &raw_path);
    parsed.id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k == "x-request-id")
            .map(|(_, v)| v.as_str()),
    );
    let content_type = headers
        .iter()
        .find(|(k, _)| k == "content-type")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    parsed.headers = headers;
    if size > 0 {
        info!(
            body_size_bytes = size,
            content_type = %content_type,
            "Request body read"
        );
        parsed = parsed.with_body(&content_type, body);
    }

    info!(
        method = %parsed.method,
        path = %parsed.path,
        args = parsed.args.len(),
        "HTTP request parsed"
    );
    Ok(parsed)
}
