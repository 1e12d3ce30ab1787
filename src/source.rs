//! Byte sources for the parser.
//!
//! Uploads may arrive gzip- or zstd-compressed. The codec is chosen from the
//! content encoding, then the content type, then the file extension, and
//! decoding happens in-stream so the parser still pulls incrementally.

use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};

const SOURCE_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct SourceMeta {
    /// e.g. "text/csv" or "application/gzip"
    pub content_type: String,
    /// e.g. "gzip", empty when not declared
    pub content_encoding: String,
    /// File name as supplied by the client, used for extension fallback.
    pub name_hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl SourceMeta {
    pub fn compression(&self) -> Compression {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        let name = self.name_hint.to_ascii_lowercase();

        if ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || name.ends_with(".gz")
        {
            Compression::Gzip
        } else if ce.split(',').any(|s| s.trim() == "zstd")
            || ct == "application/zstd"
            || name.ends_with(".zst")
        {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Wrap a raw reader with buffering and, if needed, decompression.
pub fn decode_source<'a, R>(raw: R, meta: &SourceMeta) -> Box<dyn AsyncRead + Unpin + Send + 'a>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    let buf = BufReader::with_capacity(SOURCE_BUFFER_BYTES, raw);
    match meta.compression() {
        Compression::Gzip => Box::new(GzipDecoder::new(buf)),
        Compression::Zstd => Box::new(ZstdDecoder::new(buf)),
        Compression::None => Box::new(buf),
    }
}

/// Open a local CSV file, inferring compression from its extension.
pub async fn open_file(path: &Path) -> std::io::Result<Box<dyn AsyncRead + Unpin + Send>> {
    let file = File::open(path).await?;
    let meta = SourceMeta {
        name_hint: path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
        ..Default::default()
    };
    Ok(decode_source(file, &meta))
}
