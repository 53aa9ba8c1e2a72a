//! Purpose: Split byte streams into documents and write documents back with native framing.
//! Exports: `ContentType`, `ContentTyped`, `FrameReader`, `FrameWriter`, `FrameLimits`,
//! Exports: `StreamFrameReader`, `StreamFrameWriter`.
//! Role: Multi-document framing for the two reference formats; no custom framing header.
//! Invariants: A stream's content type is fixed for its lifetime.
//! Invariants: End-of-stream or a read error releases the underlying reader; later reads report end-of-stream.
//! Invariants: Per-document buffering is capped by `FrameLimits::max_frame_bytes`.
//! Invariants: JSON values are split by one streaming parse over the source, never re-scanned.

use std::fmt;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bstr::ByteSlice;
use serde_json::StreamDeserializer;
use serde_json::de::IoRead;
use serde_json::value::RawValue;
use tracing::trace;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ContentType {
    Json,
    Yaml,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Yaml => "application/yaml",
        }
    }

    /// Only YAML carries comments worth preserving.
    pub fn supports_comments(self) -> bool {
        matches!(self, ContentType::Yaml)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "application/json" | "json" => Ok(ContentType::Json),
            "application/yaml" | "application/x-yaml" | "yaml" | "yml" => Ok(ContentType::Yaml),
            other => Err(Error::new(ErrorKind::UnsupportedContentType)
                .with_message(format!("unsupported content type {other:?}"))),
        }
    }
}

pub trait ContentTyped {
    fn content_type(&self) -> ContentType;
}

pub trait FrameReader: ContentTyped {
    /// Next raw document, or `None` once the stream is exhausted or closed.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, Error>;
    /// Releases the underlying reader. Idempotent.
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

pub trait FrameWriter: ContentTyped {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error>;
}

pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameLimits {
    pub max_frame_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

fn too_large(limits: FrameLimits) -> Error {
    Error::new(ErrorKind::FrameTooLarge)
        .with_message(format!(
            "document exceeds size limit of {} bytes",
            limits.max_frame_bytes
        ))
        .with_hint("Raise FrameLimits::max_frame_bytes or split the input.")
}

/// Bytes pulled from the source for the document being read; shared with the metered source.
#[derive(Debug)]
struct FrameMeter {
    limit: AtomicUsize,
    consumed: AtomicUsize,
    exceeded: AtomicBool,
}

impl FrameMeter {
    fn new(limits: FrameLimits) -> Self {
        Self {
            limit: AtomicUsize::new(limits.max_frame_bytes),
            consumed: AtomicUsize::new(0),
            exceeded: AtomicBool::new(false),
        }
    }

    fn start_frame(&self) {
        self.consumed.store(0, Ordering::Relaxed);
    }
}

/// Refuses to read more than one byte past the frame limit for the current document. The
/// extra byte is the lookahead that ends the previous value.
struct Metered<R> {
    inner: R,
    meter: Arc<FrameMeter>,
}

impl<R: Read> Read for Metered<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.meter.limit.load(Ordering::Relaxed);
        let consumed = self.meter.consumed.load(Ordering::Relaxed);
        let room = limit.saturating_add(1).saturating_sub(consumed);
        if room == 0 {
            self.meter.exceeded.store(true, Ordering::Relaxed);
            return Err(io::Error::other("document exceeds frame limit"));
        }
        let len = buf.len().min(room);
        let read = self.inner.read(&mut buf[..len])?;
        self.meter.consumed.fetch_add(read, Ordering::Relaxed);
        Ok(read)
    }
}

type JsonValues<R> = StreamDeserializer<'static, IoRead<Metered<BufReader<R>>>, Box<RawValue>>;

enum Source<R: Read> {
    /// YAML is framed line by line.
    Lines(BufReader<R>),
    /// JSON values are delimited by the parser itself, in a single pass.
    Values(JsonValues<R>),
}

pub struct StreamFrameReader<R: Read> {
    content_type: ContentType,
    inner: Option<Source<R>>,
    /// Content that followed a YAML document marker on the same line (`--- key: v`).
    pending: Vec<u8>,
    limits: FrameLimits,
    meter: Arc<FrameMeter>,
    frames_read: u64,
}

impl StreamFrameReader<Cursor<Vec<u8>>> {
    pub fn from_bytes(content_type: ContentType, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(content_type, Cursor::new(bytes.into()))
    }
}

impl<R: Read> StreamFrameReader<R> {
    pub fn from_reader(content_type: ContentType, reader: R) -> Self {
        let limits = FrameLimits::default();
        let meter = Arc::new(FrameMeter::new(limits));
        let reader = BufReader::new(reader);
        let source = match content_type {
            ContentType::Yaml => Source::Lines(reader),
            ContentType::Json => {
                let metered = Metered {
                    inner: reader,
                    meter: Arc::clone(&meter),
                };
                Source::Values(serde_json::Deserializer::from_reader(metered).into_iter())
            }
        };
        Self {
            content_type,
            inner: Some(source),
            pending: Vec::new(),
            limits,
            meter,
            frames_read: 0,
        }
    }

    pub fn with_limits(mut self, limits: FrameLimits) -> Self {
        self.limits = limits;
        self.meter
            .limit
            .store(limits.max_frame_bytes, Ordering::Relaxed);
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn next_yaml_frame(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let limits = self.limits;
        let mut doc = std::mem::take(&mut self.pending);
        let mut has_content = has_yaml_content(&doc);
        let Some(Source::Lines(lines)) = self.inner.as_mut() else {
            return Ok(has_content.then_some(doc));
        };
        let mut line = Vec::new();
        loop {
            line.clear();
            let budget = limits.max_frame_bytes.saturating_sub(doc.len());
            if read_line_within(lines, &mut line, budget, limits)? == 0 {
                self.inner = None;
                return Ok(has_content.then_some(doc));
            }
            match yaml_document_start(&line) {
                Some(rest) if has_content => {
                    self.pending = rest.to_vec();
                    return Ok(Some(doc));
                }
                Some(rest) => {
                    doc.clear();
                    doc.extend_from_slice(rest);
                    has_content = has_yaml_content(rest);
                }
                None => {
                    has_content |= has_yaml_content(&line);
                    doc.extend_from_slice(&line);
                }
            }
        }
    }

    fn next_json_frame(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let Some(Source::Values(values)) = self.inner.as_mut() else {
            return Ok(None);
        };
        self.meter.start_frame();
        match values.next() {
            None => {
                self.inner = None;
                Ok(None)
            }
            Some(Ok(raw)) => {
                let frame = raw.get().as_bytes().to_vec();
                if frame.len() > self.limits.max_frame_bytes {
                    return Err(too_large(self.limits));
                }
                Ok(Some(frame))
            }
            Some(Err(err)) => Err(self.json_error(err)),
        }
    }

    fn json_error(&self, err: serde_json::Error) -> Error {
        if err.is_io() {
            if self.meter.exceeded.load(Ordering::Relaxed) {
                return too_large(self.limits);
            }
            return Error::new(ErrorKind::Io)
                .with_message("failed to read document stream")
                .with_source(err);
        }
        let message = if err.is_eof() {
            "unexpected end of JSON document"
        } else {
            "invalid JSON document"
        };
        Error::new(ErrorKind::Malformed)
            .with_message(message)
            .with_source(err)
    }
}

/// Appends the next line (through its newline) to `line`, failing with `FrameTooLarge` as soon
/// as it would grow past `budget`. Returns the bytes consumed; zero at end of input.
fn read_line_within<B: BufRead>(
    reader: &mut B,
    line: &mut Vec<u8>,
    budget: usize,
    limits: FrameLimits,
) -> Result<usize, Error> {
    let mut total = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error(err, "failed to read document stream")),
        };
        if available.is_empty() {
            return Ok(total);
        }
        let (chunk, done) = match available.find_byte(b'\n') {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        if line.len() + chunk.len() > budget {
            return Err(too_large(limits));
        }
        line.extend_from_slice(chunk);
        let used = chunk.len();
        reader.consume(used);
        total += used;
        if done {
            return Ok(total);
        }
    }
}

/// `Some(rest)` when the line is a document marker (`---` alone or followed by whitespace);
/// `rest` is the content after it, empty when only a comment follows. Inside block scalars
/// a marker at column zero still ends the document, as YAML forbids it there.
fn yaml_document_start(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(b"---")?;
    if rest.first().is_some_and(|b| !b.is_ascii_whitespace()) {
        return None;
    }
    let rest = rest.trim_start();
    if rest.starts_with(b"#") {
        Some(&rest[..0])
    } else {
        Some(rest)
    }
}

fn has_yaml_content(text: &[u8]) -> bool {
    ByteSlice::lines(text).any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with(b"#")
    })
}

impl<R: Read> ContentTyped for StreamFrameReader<R> {
    fn content_type(&self) -> ContentType {
        self.content_type
    }
}

impl<R: Read> FrameReader for StreamFrameReader<R> {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if self.is_closed() {
            return Ok(None);
        }
        let result = match self.content_type {
            ContentType::Yaml => self.next_yaml_frame(),
            ContentType::Json => self.next_json_frame(),
        };
        match &result {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                trace!(index = self.frames_read, bytes = frame.len(), "read frame");
            }
            Ok(None) | Err(_) => self.close(),
        }
        result
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            trace!(frames = self.frames_read, "closed frame reader");
        }
        self.pending = Vec::new();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_none() && self.pending.is_empty()
    }
}

pub struct StreamFrameWriter<W> {
    content_type: ContentType,
    inner: W,
    frames_written: u64,
}

impl StreamFrameWriter<Vec<u8>> {
    /// Writer collecting frames into memory.
    pub fn buffer(content_type: ContentType) -> Self {
        Self::new(content_type, Vec::new())
    }
}

impl<W: Write> StreamFrameWriter<W> {
    pub fn new(content_type: ContentType, inner: W) -> Self {
        Self {
            content_type,
            inner,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> ContentTyped for StreamFrameWriter<W> {
    fn content_type(&self) -> ContentType {
        self.content_type
    }
}

impl<W: Write> FrameWriter for StreamFrameWriter<W> {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        let separator = self.content_type == ContentType::Yaml && self.frames_written > 0;
        write_document(&mut self.inner, separator, frame)
            .map_err(|err| io_error(err, "failed to write document"))?;
        self.frames_written += 1;
        trace!(index = self.frames_written, bytes = frame.len(), "wrote frame");
        Ok(())
    }
}

fn write_document<W: Write>(inner: &mut W, separator: bool, frame: &[u8]) -> io::Result<()> {
    if separator {
        inner.write_all(b"---\n")?;
    }
    inner.write_all(frame)?;
    if !frame.ends_with(b"\n") {
        inner.write_all(b"\n")?;
    }
    inner.flush()
}
