//! Streaming `multipart/form-data` reader.
//!
//! The body is pulled from a [`Read`] one chunk at a time. At most one chunk
//! plus one delimiter is held in memory, so file parts of any size pass
//! through to the visitor in bounded pieces.

use crate::error::MultipartError;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

/// RFC 2046 limits boundaries to 70 characters.
const MAX_BOUNDARY_LEN: usize = 70;
const MAX_HEADER_BLOCK: usize = 4096;
/// Plain form fields are buffered whole; config forms stay far below this.
pub const MAX_FIELD_LEN: usize = 4096;

/// Receives the parts of a multipart body in order.
pub trait PartVisitor {
    /// A complete plain form field.
    ///
    /// # Errors
    ///
    /// Stops the reader.
    fn field(&mut self, name: &str, value: &str) -> Result<(), MultipartError>;

    /// A file part begins.
    ///
    /// # Errors
    ///
    /// Stops the reader.
    fn file_start(&mut self, field: &str, filename: &str) -> Result<(), MultipartError>;

    /// The next piece of the current file, never longer than the chunk size.
    ///
    /// # Errors
    ///
    /// Stops the reader.
    fn file_chunk(&mut self, chunk: &[u8]) -> Result<(), MultipartError>;

    /// The current file is complete.
    ///
    /// # Errors
    ///
    /// Stops the reader.
    fn file_end(&mut self) -> Result<(), MultipartError>;
}

/// Extract the boundary from a `multipart/form-data` Content-Type.
///
/// # Errors
///
/// [`MultipartError::MissingBoundary`] or [`MultipartError::InvalidBoundary`].
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut parts = content_type.split(';');
    let main = parts.next().unwrap_or("").trim();
    if !main.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::MissingBoundary);
    }
    for part in parts {
        let Some((k, v)) = part.trim().split_once('=') else {
            continue;
        };
        if k.trim().eq_ignore_ascii_case("boundary") {
            let boundary = v.trim().trim_matches('"');
            if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
                return Err(MultipartError::InvalidBoundary);
            }
            return Ok(boundary.to_string());
        }
    }
    Err(MultipartError::MissingBoundary)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PartHeaders {
    name: String,
    filename: Option<String>,
}

fn parse_part_headers(block: &[u8]) -> Result<PartHeaders, MultipartError> {
    let text = std::str::from_utf8(block)
        .map_err(|_| MultipartError::InvalidPartHeaders("headers are not UTF-8".to_string()))?;
    for line in text.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        let mut headers = PartHeaders::default();
        for param in value.split(';').skip(1) {
            let Some((k, v)) = param.trim().split_once('=') else {
                continue;
            };
            let v = v.trim().trim_matches('"').to_string();
            match k.trim() {
                "name" => headers.name = v,
                "filename" => headers.filename = Some(v),
                _ => {}
            }
        }
        return Ok(headers);
    }
    Err(MultipartError::InvalidPartHeaders(
        "missing Content-Disposition".to_string(),
    ))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Pull-based multipart reader.
pub struct MultipartReader<R> {
    reader: R,
    /// `\r\n--boundary`; a CRLF is prepended to the body so the first
    /// delimiter has the same shape as the rest.
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    chunk_size: usize,
    eof: bool,
}

impl<R: Read> MultipartReader<R> {
    #[must_use]
    pub fn new(reader: R, boundary: &str, chunk_size: usize) -> Self {
        let mut delimiter = b"\r\n--".to_vec();
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            reader,
            delimiter,
            buf: b"\r\n".to_vec(),
            chunk_size: chunk_size.max(1),
            eof: false,
        }
    }

    /// Read the whole body, handing every part to `visitor`.
    ///
    /// # Errors
    ///
    /// Malformed input, read failures and visitor refusals.
    pub fn run<V: PartVisitor + ?Sized>(mut self, visitor: &mut V) -> Result<(), MultipartError> {
        self.skip_preamble()?;
        loop {
            self.fill_to(2)?;
            if self.buf.len() < 2 {
                return Err(MultipartError::UnexpectedEof);
            }
            if self.buf.starts_with(b"--") {
                debug!("multipart body complete");
                return Ok(());
            }
            if !self.buf.starts_with(b"\r\n") {
                return Err(MultipartError::InvalidPartHeaders(
                    "expected CRLF after boundary".to_string(),
                ));
            }
            self.buf.drain(..2);
            let headers = self.read_headers()?;
            match headers.filename {
                Some(filename) => {
                    trace!(field = %headers.name, %filename, "multipart file part");
                    visitor.file_start(&headers.name, &filename)?;
                    self.stream_part(|chunk| visitor.file_chunk(chunk))?;
                    visitor.file_end()?;
                }
                None => {
                    let mut value = Vec::new();
                    let name = headers.name;
                    self.stream_part(|chunk| {
                        if value.len() + chunk.len() > MAX_FIELD_LEN {
                            return Err(MultipartError::FieldTooLarge {
                                name: name.clone(),
                                max: MAX_FIELD_LEN,
                            });
                        }
                        value.extend_from_slice(chunk);
                        Ok(())
                    })?;
                    visitor.field(&name, &String::from_utf8_lossy(&value))?;
                }
            }
        }
    }

    /// Read one more chunk into the buffer. Returns the bytes added.
    fn fill(&mut self) -> Result<usize, MultipartError> {
        if self.eof {
            return Ok(0);
        }
        let old = self.buf.len();
        self.buf.resize(old + self.chunk_size, 0);
        let n = loop {
            match self.reader.read(&mut self.buf[old..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(old);
                    return Err(e.into());
                }
            }
        };
        self.buf.truncate(old + n);
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    fn fill_to(&mut self, len: usize) -> Result<(), MultipartError> {
        while self.buf.len() < len {
            if self.fill()? == 0 {
                break;
            }
        }
        Ok(())
    }

    fn skip_preamble(&mut self) -> Result<(), MultipartError> {
        loop {
            if let Some(pos) = find(&self.buf, &self.delimiter) {
                self.buf.drain(..pos + self.delimiter.len());
                return Ok(());
            }
            let keep = self.delimiter.len() - 1;
            if self.buf.len() > keep {
                self.buf.drain(..self.buf.len() - keep);
            }
            if self.fill()? == 0 {
                return Err(MultipartError::UnexpectedEof);
            }
        }
    }

    fn read_headers(&mut self) -> Result<PartHeaders, MultipartError> {
        loop {
            if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                let headers = parse_part_headers(&self.buf[..pos])?;
                self.buf.drain(..pos + 4);
                return Ok(headers);
            }
            if self.buf.len() > MAX_HEADER_BLOCK {
                return Err(MultipartError::InvalidPartHeaders(
                    "header block too large".to_string(),
                ));
            }
            if self.fill()? == 0 {
                return Err(MultipartError::UnexpectedEof);
            }
        }
    }

    /// Pass the part body to `sink` in pieces of at most `chunk_size` bytes,
    /// consuming the delimiter that ends it.
    fn stream_part<F>(&mut self, mut sink: F) -> Result<(), MultipartError>
    where
        F: FnMut(&[u8]) -> Result<(), MultipartError>,
    {
        loop {
            if let Some(pos) = find(&self.buf, &self.delimiter) {
                for piece in self.buf[..pos].chunks(self.chunk_size) {
                    sink(piece)?;
                }
                self.buf.drain(..pos + self.delimiter.len());
                return Ok(());
            }
            let safe = self.buf.len().saturating_sub(self.delimiter.len() - 1);
            if safe > 0 {
                for piece in self.buf[..safe].chunks(self.chunk_size) {
                    sink(piece)?;
                }
                self.buf.drain(..safe);
            }
            if self.fill()? == 0 {
                return Err(MultipartError::UnexpectedEof);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Collect {
        fields: Vec<(String, String)>,
        files: Vec<(String, Vec<u8>)>,
        max_chunk: usize,
    }

    impl PartVisitor for Collect {
        fn field(&mut self, name: &str, value: &str) -> Result<(), MultipartError> {
            self.fields.push((name.to_string(), value.to_string()));
            Ok(())
        }
        fn file_start(&mut self, _field: &str, filename: &str) -> Result<(), MultipartError> {
            self.files.push((filename.to_string(), Vec::new()));
            Ok(())
        }
        fn file_chunk(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
            self.max_chunk = self.max_chunk.max(chunk.len());
            self.files.last_mut().unwrap().1.extend_from_slice(chunk);
            Ok(())
        }
        fn file_end(&mut self) -> Result<(), MultipartError> {
            Ok(())
        }
    }

    fn body(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"save\"\r\n\r\nhasp\r\n");
        b.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        b.extend_from_slice(
            b"Content-Disposition: form-data; name=\"filename\"; filename=\"pages.jsonl\"\r\n\
Content-Type: application/octet-stream\r\n\r\n",
        );
        b.extend_from_slice(payload);
        b.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        b
    }

    #[test]
    fn test_parse_boundary() {
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=----abc").unwrap(),
            "----abc"
        );
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=\"q\"").unwrap(),
            "q"
        );
        assert!(matches!(
            parse_boundary("text/plain"),
            Err(MultipartError::MissingBoundary)
        ));
    }

    #[test]
    fn test_fields_and_file_in_small_chunks() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let data = body("XyZ", &payload);
        let mut v = Collect::default();
        MultipartReader::new(Cursor::new(data), "XyZ", 64)
            .run(&mut v)
            .unwrap();
        assert_eq!(v.fields, vec![("save".to_string(), "hasp".to_string())]);
        assert_eq!(v.files.len(), 1);
        assert_eq!(v.files[0].0, "pages.jsonl");
        assert_eq!(v.files[0].1, payload);
        assert!(v.max_chunk <= 64);
    }

    #[test]
    fn test_payload_containing_crlf_dashes_survives() {
        let payload = b"line\r\n--Xy not the boundary\r\n-".to_vec();
        let data = body("XyZ", &payload);
        let mut v = Collect::default();
        MultipartReader::new(Cursor::new(data), "XyZ", 7)
            .run(&mut v)
            .unwrap();
        assert_eq!(v.files[0].1, payload);
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut data = body("b", b"0123456789");
        data.truncate(data.len() - 12);
        let mut v = Collect::default();
        let err = MultipartReader::new(Cursor::new(data), "b", 16)
            .run(&mut v)
            .unwrap_err();
        assert!(matches!(err, MultipartError::UnexpectedEof));
    }
}
