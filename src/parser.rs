//! Streaming CSV parser.
//!
//! [`CsvRowStream`] decodes a byte source into [`Document`]s one row at a
//! time. It is pull-based: the underlying reader is only polled while the
//! consumer awaits [`CsvRowStream::next_row`], so a consumer that stops
//! pulling (for example while a batch is being written) also stops the
//! source. Memory use is bounded by the reader buffers plus one record.
//!
//! The first record is the header line. Quoting follows RFC 4180: `"` quotes
//! a field, `""` escapes a quote, and quoted fields may contain delimiters
//! and newlines. Trimming only touches whitespace around unquoted fields; a
//! quoted field keeps its exact unescaped text. Every header maps to a value,
//! with missing trailing cells read as `""`. Rows whose cells are all blank
//! are skipped.
//!
//! The sequence is finite and non-restartable: after the end of input or the
//! first error, every further call returns `Ok(None)`.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::ParseError;
use crate::models::Document;

const READ_BUFFER_BYTES: usize = 64 * 1024;
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const QUOTE: u8 = b'"';

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Trim leading/trailing whitespace around unquoted headers and cells.
    pub trim: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { trim: true }
    }
}

pub struct CsvRowStream<R> {
    reader: AsyncReader<Prescan<R>>,
    headers: Option<Vec<String>>,
    record: StringRecord,
    rows_emitted: u64,
    finished: bool,
}

impl<R> CsvRowStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(source: R, options: &ParserOptions) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .buffer_capacity(READ_BUFFER_BYTES)
            .create_reader(Prescan::new(source, options.trim));

        Self {
            reader,
            headers: None,
            record: StringRecord::new(),
            rows_emitted: 0,
            finished: false,
        }
    }

    /// Column names from the header line. Reads it on first call.
    pub async fn headers(&mut self) -> Result<&[String], ParseError> {
        if self.headers.is_none() {
            let headers = match read_headers(&mut self.reader).await {
                Ok(h) => h,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };
            self.headers = Some(headers);
        }
        Ok(self.headers.as_deref().unwrap_or_default())
    }

    /// Pull the next non-empty row.
    pub async fn next_row(&mut self) -> Result<Option<Document>, ParseError> {
        if self.finished {
            return Ok(None);
        }
        match self.read_next().await {
            Ok(Some(doc)) => {
                self.rows_emitted += 1;
                Ok(Some(doc))
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Rows returned by [`next_row`](Self::next_row) so far.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    async fn read_next(&mut self) -> Result<Option<Document>, ParseError> {
        self.headers().await?;
        let headers = self.headers.as_deref().unwrap_or_default();

        loop {
            if !self.reader.read_record(&mut self.record).await? {
                return Ok(None);
            }
            if self.record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            if self.record.len() > headers.len() {
                return Err(ParseError::ColumnMismatch {
                    line: self.record.position().map(|p| p.line()).unwrap_or(0),
                    expected: headers.len(),
                    got: self.record.len(),
                });
            }

            let doc: Document = headers
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = self.record.get(i).unwrap_or_default();
                    (name.clone(), Value::String(value.to_string()))
                })
                .collect();
            return Ok(Some(doc));
        }
    }
}

async fn read_headers<R>(reader: &mut AsyncReader<R>) -> Result<Vec<String>, ParseError>
where
    R: AsyncRead + Unpin + Send,
{
    let record = reader.headers().await?;
    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(record.len());
    for name in record.iter() {
        if !seen.insert(name) {
            return Err(ParseError::DuplicateHeader(name.to_string()));
        }
        headers.push(name.to_string());
    }
    Ok(headers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    AfterQuote,
}

/// Byte filter in front of the CSV reader.
///
/// Drops a leading UTF-8 BOM and, when trimming, the spaces and tabs around
/// unquoted fields. It tracks quoting itself because the reader only reports
/// unescaped cell text, which cannot tell `"  x"` from `  x`.
struct Prescan<R> {
    inner: R,
    trim: bool,
    state: FieldState,
    /// Blanks inside an unquoted field, held until the next byte shows they
    /// are not trailing.
    pending: Vec<u8>,
    /// Leading bytes held for the BOM check; `None` once it is done.
    head: Option<Vec<u8>>,
    scratch: Box<[u8]>,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R> Prescan<R> {
    fn new(inner: R, trim: bool) -> Self {
        Self {
            inner,
            trim,
            state: FieldState::Start,
            pending: Vec::new(),
            head: Some(Vec::with_capacity(BOM.len())),
            scratch: vec![0; READ_BUFFER_BYTES].into_boxed_slice(),
            out: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        if let Some(head) = &mut self.head {
            head.extend_from_slice(chunk);
            if head.len() < BOM.len() && !self.eof {
                return;
            }
            if let Some(head) = self.head.take() {
                let body = head.strip_prefix(BOM).unwrap_or(&head[..]);
                self.scan(body);
            }
        } else {
            self.scan(chunk);
        }
    }

    fn scan(&mut self, bytes: &[u8]) {
        if !self.trim {
            self.out.extend_from_slice(bytes);
            return;
        }
        for &b in bytes {
            self.state = match self.state {
                FieldState::Quoted => {
                    self.out.push(b);
                    if b == QUOTE {
                        FieldState::AfterQuote
                    } else {
                        FieldState::Quoted
                    }
                }
                state if b == b' ' || b == b'\t' => {
                    if state == FieldState::Unquoted {
                        self.pending.push(b);
                    }
                    state
                }
                _ if matches!(b, b',' | b'\n' | b'\r') => {
                    self.pending.clear();
                    self.out.push(b);
                    FieldState::Start
                }
                FieldState::Start | FieldState::AfterQuote if b == QUOTE => {
                    self.out.push(b);
                    FieldState::Quoted
                }
                _ => {
                    self.out.append(&mut self.pending);
                    self.out.push(b);
                    FieldState::Unquoted
                }
            };
        }
    }
}

impl<R> AsyncRead for Prescan<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.out_pos < this.out.len() {
                let n = buf.remaining().min(this.out.len() - this.out_pos);
                buf.put_slice(&this.out[this.out_pos..this.out_pos + n]);
                this.out_pos += n;
                if this.out_pos == this.out.len() {
                    this.out.clear();
                    this.out_pos = 0;
                }
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            let mut scratch = std::mem::take(&mut this.scratch);
            let polled = {
                let mut read_buf = ReadBuf::new(&mut scratch);
                match Pin::new(&mut this.inner).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
                    Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                    Poll::Pending => Poll::Pending,
                }
            };
            let n = match polled {
                Poll::Ready(Ok(n)) => n,
                Poll::Ready(Err(e)) => {
                    this.scratch = scratch;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => {
                    this.scratch = scratch;
                    return Poll::Pending;
                }
            };

            if n == 0 {
                // Trailing blanks of the last unquoted field are dropped here.
                this.eof = true;
                this.feed(&[]);
            } else {
                this.feed(&scratch[..n]);
            }
            this.scratch = scratch;
        }
    }
}
