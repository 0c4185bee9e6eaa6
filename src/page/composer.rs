use super::fragments::{
    DOCTYPE, FOOTER_CLOSE, FOOTER_OPEN, HEADER_END, META_GO_BACK, PAGE_BUFFER_SIZE, SCRIPT, STYLE,
    TITLE_CLOSE, TITLE_OPEN,
};
use crate::server::Transport;
use std::io;
use tracing::{error, warn};

/// Fixed chrome around one HTML page.
///
/// [`PageEnvelope::total_len`] adds up the same slices that
/// [`PageEnvelope::compose`] and [`PageWriter::finish`] write, so the declared
/// length cannot drift from what goes on the wire.
#[derive(Debug, Clone, Copy)]
pub struct PageEnvelope<'a> {
    hostname: &'a str,
    version: &'a str,
    go_home: bool,
}

impl<'a> PageEnvelope<'a> {
    #[must_use]
    pub fn new(hostname: &'a str, version: &'a str) -> Self {
        Self {
            hostname,
            version,
            go_home: false,
        }
    }

    /// Include the meta refresh that returns the browser to the menu.
    #[must_use]
    pub fn with_refresh(mut self, go_home: bool) -> Self {
        self.go_home = go_home;
        self
    }

    #[must_use]
    pub fn head_fragments(&self) -> Vec<&'a str> {
        let mut head = vec![
            DOCTYPE,
            TITLE_OPEN,
            self.hostname,
            TITLE_CLOSE,
            SCRIPT,
            STYLE,
        ];
        if self.go_home {
            head.push(META_GO_BACK);
        }
        head.push(HEADER_END);
        head
    }

    #[must_use]
    pub fn tail_fragments(&self) -> [&'a str; 3] {
        [FOOTER_OPEN, self.version, FOOTER_CLOSE]
    }

    /// Exact response length for a dynamic body of `body_len` bytes.
    #[must_use]
    pub fn total_len(&self, body_len: usize) -> usize {
        let head: usize = self.head_fragments().iter().map(|f| f.len()).sum();
        let tail: usize = self.tail_fragments().iter().map(|f| f.len()).sum();
        head + body_len + tail
    }

    /// Declare the page length, start a `200 text/html` response and write the head.
    ///
    /// The caller then appends exactly `body_len` bytes through the returned
    /// writer and closes it with [`PageWriter::finish`].
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn compose<'t, T: Transport + ?Sized>(
        &self,
        transport: &'t mut T,
        body_len: usize,
    ) -> io::Result<PageWriter<'a, 't, T>> {
        let declared = self.total_len(body_len);
        if body_len > PAGE_BUFFER_SIZE {
            warn!(
                static_bytes = declared - body_len,
                dynamic_bytes = body_len,
                "Sending page with oversized dynamic body"
            );
        }
        transport.set_content_length(declared);
        transport.begin(200, "text/html")?;
        let mut writer = PageWriter {
            transport,
            tail: self.tail_fragments(),
            declared,
            emitted: 0,
        };
        for fragment in self.head_fragments() {
            writer.emit(fragment)?;
        }
        Ok(writer)
    }

    /// Compose and send a page whose body is already rendered.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and length mismatches.
    pub fn send<T: Transport + ?Sized>(&self, transport: &mut T, body: &str) -> io::Result<usize> {
        let mut writer = self.compose(transport, body.len())?;
        writer.append(body)?;
        writer.finish()
    }
}

/// Body stage of a composed page.
pub struct PageWriter<'a, 't, T: Transport + ?Sized> {
    transport: &'t mut T,
    tail: [&'a str; 3],
    declared: usize,
    emitted: usize,
}

impl<T: Transport + ?Sized> PageWriter<'_, '_, T> {
    /// Append a piece of the dynamic body.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn append(&mut self, fragment: &str) -> io::Result<()> {
        self.emit(fragment)
    }

    #[must_use]
    pub fn declared(&self) -> usize {
        self.declared
    }

    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Write the footer and check the byte count against the declaration.
    ///
    /// # Errors
    ///
    /// `InvalidData` when the emitted total differs from the declared length.
    pub fn finish(mut self) -> io::Result<usize> {
        for fragment in self.tail {
            self.emit(fragment)?;
        }
        if self.emitted != self.declared {
            error!(
                declared = self.declared,
                emitted = self.emitted,
                "page length mismatch"
            );
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "page declared {} bytes but emitted {}",
                    self.declared, self.emitted
                ),
            ));
        }
        Ok(self.emitted)
    }

    fn emit(&mut self, fragment: &str) -> io::Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        self.transport.write_content(fragment.as_bytes())?;
        self.emitted += fragment.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::BufferedTransport;

    #[test]
    fn test_declared_length_matches_emitted_bytes() {
        for go_home in [false, true] {
            let env = PageEnvelope::new("plate01", "0.3.0").with_refresh(go_home);
            let mut t = BufferedTransport::new();
            let body = "<h1>plate01</h1><hr>hello";
            let sent = env.send(&mut t, body).unwrap();
            assert_eq!(t.declared_len, Some(sent));
            assert!(t.length_matches());
            assert_eq!(t.body.len(), env.total_len(body.len()));
        }
    }

    #[test]
    fn test_refresh_meta_only_when_requested() {
        let mut t = BufferedTransport::new();
        PageEnvelope::new("p", "v").send(&mut t, "").unwrap();
        assert!(!t.body_text().contains("http-equiv='refresh'"));

        let mut t = BufferedTransport::new();
        PageEnvelope::new("p", "v")
            .with_refresh(true)
            .send(&mut t, "")
            .unwrap();
        assert!(t.body_text().contains("http-equiv='refresh'"));
    }

    #[test]
    fn test_multibyte_hostname_is_measured_in_bytes() {
        let env = PageEnvelope::new("pläte", "1.0");
        let mut t = BufferedTransport::new();
        env.send(&mut t, "é").unwrap();
        assert!(t.length_matches());
    }

    #[test]
    fn test_short_body_is_reported() {
        let env = PageEnvelope::new("p", "v");
        let mut t = BufferedTransport::new();
        let mut w = env.compose(&mut t, 10).unwrap();
        w.append("12345").unwrap();
        let err = w.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_page_order_is_head_body_tail() {
        let env = PageEnvelope::new("host", "9.9.9");
        let mut t = BufferedTransport::new();
        env.send(&mut t, "BODY").unwrap();
        let text = t.body_text();
        let title = text.find("<title>host</title>").unwrap();
        let body = text.find("BODY").unwrap();
        let version = text.find("9.9.9").unwrap();
        assert!(title < body && body < version);
        assert!(text.ends_with("</html>"));
    }
}
