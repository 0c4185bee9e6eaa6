//! Static file fallback for paths no handler claims.

use crate::server::Transport;
use crate::upload::MAX_FILE_NAME_LEN;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// A file chosen to answer a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub path: PathBuf,
    pub content_type: &'static str,
    /// Served from the `.gz` sibling; sent with `Content-Encoding: gzip`.
    pub gzipped: bool,
    pub len: u64,
}

pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Content type by extension, as the file store names them.
    #[must_use]
    pub fn content_type(url_path: &str) -> &'static str {
        if url_path == "/edit.htm.gz" {
            return "text/html";
        }
        let ext = url_path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "htm" | "html" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" | "jsonl" => "application/json",
            "png" => "image/png",
            "gif" => "image/gif",
            "jpg" | "jpeg" => "image/jpeg",
            "ico" => "image/x-icon",
            "bmp" => "image/bmp",
            "xml" => "text/xml",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" => "application/x-gzip",
            "bin" => "application/octet-stream",
            _ => "text/plain",
        }
    }

    /// Resolve a request path to a file: `path`, then `path.gz`.
    ///
    /// A trailing `/` maps to `index.htm` and names longer than the file
    /// store allows are cut to its limit first.
    #[must_use]
    pub fn resolve(&self, url_path: &str) -> Option<StaticFile> {
        let mut name = url_path.to_string();
        if name.ends_with('/') {
            name.push_str("index.htm");
        }
        if name.chars().count() > MAX_FILE_NAME_LEN {
            name = name.chars().take(MAX_FILE_NAME_LEN).collect();
        }
        let content_type = Self::content_type(&name);
        let plain = self.map_path(&name)?;
        // A stored `.gz` served as its inner type still needs the encoding header.
        let pre_compressed = name.ends_with(".gz") && content_type != "application/x-gzip";
        if let Some(file) = Self::open_variant(plain, content_type, pre_compressed) {
            return Some(file);
        }
        let gz = self.map_path(&format!("{name}.gz"))?;
        Self::open_variant(gz, content_type, true)
    }

    fn open_variant(path: PathBuf, content_type: &'static str, gzipped: bool) -> Option<StaticFile> {
        let meta = std::fs::metadata(&path).ok()?;
        if !meta.is_file() {
            return None;
        }
        Some(StaticFile {
            path,
            content_type,
            gzipped,
            len: meta.len(),
        })
    }

    /// Stream a resolved file with its exact length declared up front.
    ///
    /// # Errors
    ///
    /// Propagates open, read and transport failures.
    pub fn serve<T: Transport + ?Sized>(
        &self,
        file: &StaticFile,
        transport: &mut T,
        chunk_size: usize,
    ) -> io::Result<u64> {
        let mut source = File::open(&file.path)?;
        let len = usize::try_from(file.len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
        transport.set_content_length(len);
        if file.gzipped {
            transport.header("Content-Encoding: gzip");
        }
        transport.begin(200, file.content_type)?;
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut sent = 0u64;
        while sent < file.len {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let n = n.min(usize::try_from(file.len - sent).unwrap_or(n));
            transport.write_content(&buf[..n])?;
            sent += n as u64;
        }
        if sent != file.len {
            warn!(path = %file.path.display(), sent, expected = file.len, "file shrank while serving");
        }
        debug!(path = %file.path.display(), bytes = sent, gzipped = file.gzipped, "static file served");
        Ok(sent)
    }
}
