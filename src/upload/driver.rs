use super::multipart::PartVisitor;
use super::receiver::{SessionId, UploadMeta, UploadReceiver};
use super::sink::UploadSink;
use crate::error::{MultipartError, UploadError};
use crate::progress::ProgressReporter;
use crate::server::request::ArgVec;
use std::io::{ErrorKind, Read};
use std::time::Instant;

/// Header carrying the total upload size for multipart bodies.
pub const UPLOAD_SIZE_HEADER: &str = "x-upload-size";

/// Connects parsed upload data to the [`UploadReceiver`].
///
/// Plain fields are collected into `fields`; every file part becomes one
/// session. The yield hook runs after each chunk so other coroutines get a
/// turn during long uploads.
pub struct ReceiverDriver<'a, F>
where
    F: FnMut(&UploadMeta) -> Result<Box<dyn UploadSink>, UploadError>,
{
    receiver: &'a mut UploadReceiver,
    progress: &'a mut ProgressReporter,
    authorized: bool,
    declared_size: Option<u64>,
    open: F,
    yield_now: fn(),
    session: Option<SessionId>,
    pub fields: ArgVec,
    /// Result of the last finished session.
    pub outcome: Option<Result<u64, UploadError>>,
}

impl<'a, F> ReceiverDriver<'a, F>
where
    F: FnMut(&UploadMeta) -> Result<Box<dyn UploadSink>, UploadError>,
{
    pub fn new(
        receiver: &'a mut UploadReceiver,
        progress: &'a mut ProgressReporter,
        authorized: bool,
        declared_size: Option<u64>,
        open: F,
        yield_now: fn(),
    ) -> Self {
        Self {
            receiver,
            progress,
            authorized,
            declared_size,
            open,
            yield_now,
            session: None,
            fields: ArgVec::new(),
            outcome: None,
        }
    }

    /// Abort this driver's session if it is still open after the body
    /// stopped early.
    pub fn abandon(&mut self, reason: &UploadError) {
        if let Some(id) = self.session {
            self.receiver.cancel(id, reason.clone(), self.progress);
        }
        if self.outcome.is_none() {
            self.outcome = Some(Err(reason.clone()));
        }
    }

    /// Feed a raw (non-multipart) body as a single file.
    ///
    /// # Errors
    ///
    /// The error that ended the session.
    pub fn feed_raw<R: Read>(
        &mut self,
        target: &str,
        mut body: R,
        chunk_size: usize,
    ) -> Result<u64, UploadError> {
        self.file_start("", target).map_err(UploadError::from)?;
        let mut buf = vec![0u8; chunk_size.max(1)];
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    let reason = UploadError::Malformed(e.to_string());
                    self.abandon(&reason);
                    return Err(reason);
                }
            };
            self.file_chunk(&buf[..n]).map_err(UploadError::from)?;
        }
        self.file_end().map_err(UploadError::from)?;
        self.outcome
            .clone()
            .unwrap_or(Err(UploadError::NotActive))
    }
}

impl<F> PartVisitor for ReceiverDriver<'_, F>
where
    F: FnMut(&UploadMeta) -> Result<Box<dyn UploadSink>, UploadError>,
{
    fn field(&mut self, name: &str, value: &str) -> Result<(), MultipartError> {
        self.fields.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn file_start(&mut self, _field: &str, filename: &str) -> Result<(), MultipartError> {
        let meta = UploadMeta {
            target: filename.to_string(),
            declared_size: self.declared_size,
        };
        let open = &mut self.open;
        let result = self
            .receiver
            .start(&meta, self.authorized, |m| open(m), self.progress);
        match result {
            Ok(id) => {
                self.session = Some(id);
                Ok(())
            }
            Err(e) => {
                self.outcome = Some(Err(e.clone()));
                Err(MultipartError::Rejected(e))
            }
        }
    }

    fn file_chunk(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        let Some(id) = self.session else {
            return Err(MultipartError::Rejected(UploadError::NotActive));
        };
        let result = self.receiver.chunk(id, chunk, self.progress, Instant::now());
        (self.yield_now)();
        if let Err(e) = &result {
            self.outcome = Some(Err(e.clone()));
        }
        result.map_err(MultipartError::Rejected)
    }

    fn file_end(&mut self) -> Result<(), MultipartError> {
        let Some(id) = self.session else {
            return Err(MultipartError::Rejected(UploadError::NotActive));
        };
        let result = self.receiver.end(id, self.progress);
        self.outcome = Some(result.clone());
        result.map(|_| ()).map_err(MultipartError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{MultipartReader, UploadStatus};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl UploadSink for Shared {
        fn label(&self) -> &str {
            "shared"
        }
        fn write(&mut self, chunk: &[u8]) -> usize {
            self.0.lock().unwrap().extend_from_slice(chunk);
            chunk.len()
        }
        fn finalize(&mut self, _d: Option<u64>, written: u64) -> Result<u64, UploadError> {
            Ok(written)
        }
        fn release(&mut self, _completed: bool) {}
    }

    fn no_yield() {}

    #[test]
    fn test_raw_body_feeds_one_session() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let mut rx = UploadReceiver::new();
        let mut p = ProgressReporter::new();
        let payload = vec![7u8; 3000];
        let s = Arc::clone(&store);
        let mut driver = ReceiverDriver::new(
            &mut rx,
            &mut p,
            true,
            Some(3000),
            move |_: &UploadMeta| Ok(Box::new(Shared(Arc::clone(&s))) as Box<dyn UploadSink>),
            no_yield,
        );
        let committed = driver
            .feed_raw("firmware.bin", Cursor::new(payload.clone()), 1436)
            .unwrap();
        assert_eq!(committed, 3000);
        assert_eq!(*store.lock().unwrap(), payload);
        assert_eq!(rx.status(), UploadStatus::End);
        assert_eq!(p.snapshot().percent, Some(100));
    }

    #[test]
    fn test_multipart_fields_are_collected() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"path\"\r\n\r\n/x\r\n\
--b\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\r\nhello\r\n--b--\r\n"
            .to_vec();
        let store = Arc::new(Mutex::new(Vec::new()));
        let mut rx = UploadReceiver::new();
        let mut p = ProgressReporter::new();
        let s = Arc::clone(&store);
        let mut driver = ReceiverDriver::new(
            &mut rx,
            &mut p,
            true,
            None,
            move |_: &UploadMeta| Ok(Box::new(Shared(Arc::clone(&s))) as Box<dyn UploadSink>),
            no_yield,
        );
        MultipartReader::new(Cursor::new(body), "b", 1436)
            .run(&mut driver)
            .unwrap();
        assert_eq!(driver.fields[0], ("path".to_string(), "/x".to_string()));
        assert_eq!(driver.outcome, Some(Ok(5)));
        assert_eq!(*store.lock().unwrap(), b"hello");
    }
}
