use std::fs::File;
use std::io::{Read, Write};
use std::time::Instant;

use tracing::debug;
use uplink_status::ProgressSnapshot;

use crate::TransferError;

/// Default copy chunk size: 8 KiB, the granularity a buffered sink flushes
/// at, so the copy loop never buffers the payload a second time.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Listener attached to a body's private progress stream.
pub type StreamListener = Box<dyn Fn(&StreamEvent) + Send>;

/// Events on a [`StreamingBody`]'s private progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Another chunk has been flushed to the sink.
    Progress(ProgressSnapshot),
    /// End of source reached and final flush done. Emitted exactly once,
    /// after the last `Progress`.
    Completed,
    /// A read or write fault ended the stream. Emitted exactly once; nothing
    /// follows it.
    Failed(String),
}

/// A request body that streams an already-open source into a sink chunk by
/// chunk, reporting progress as it goes.
///
/// The sink is flushed before every progress emission, so a reported byte
/// count never runs ahead of what was actually handed to the transport.
pub struct StreamingBody {
    source: Box<dyn Read + Send>,
    content_length: i64,
    content_type: String,
    chunk_size: usize,
    listeners: Vec<StreamListener>,
}

impl StreamingBody {
    /// Wraps an open source of `content_length` bytes.
    ///
    /// Pass -1 when the size is unknown; progress events then carry an
    /// unknown total and read as complete.
    pub fn new(
        source: Box<dyn Read + Send>,
        content_length: i64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            source,
            content_length,
            content_type: content_type.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            listeners: Vec::new(),
        }
    }

    /// Opens a body over a file, taking the length from its metadata.
    pub fn from_file(file: File, content_type: impl Into<String>) -> Result<Self, TransferError> {
        let len = file.metadata()?.len() as i64;
        Ok(Self::new(Box::new(file), len, content_type))
    }

    /// Overrides the copy chunk size, e.g. to match a transport's native
    /// buffer granularity.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Total body size in bytes, or -1 when unknown.
    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    /// Content-type label for the transport's request framing.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Attaches a listener to the private progress stream.
    ///
    /// Attach before [`write_to`](Self::write_to); events emitted earlier
    /// are not replayed.
    pub fn on_event(&mut self, listener: impl Fn(&StreamEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Streams the whole source into `sink`. Returns the bytes written.
    ///
    /// Consumes the body, so the source is closed on every exit path
    /// exactly once. A fault reaches both parties: the stream sees one
    /// terminal `Failed` event and the caller gets the `Err`.
    pub fn write_to<W: Write>(mut self, sink: &mut W) -> Result<i64, TransferError> {
        let result = self.copy(sink);
        match &result {
            Ok(written) => {
                self.emit(&StreamEvent::Completed);
                debug!(bytes = *written, "body streamed");
            }
            Err(e) => self.emit(&StreamEvent::Failed(e.to_string())),
        }
        result
    }

    fn copy<W: Write>(&mut self, sink: &mut W) -> Result<i64, TransferError> {
        let started_at = Instant::now();
        let mut buf = vec![0u8; self.chunk_size];
        let mut transferred: i64 = 0;

        loop {
            let n = self.source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
            // Flush before reporting: progress must never run ahead of the
            // transport.
            sink.flush()?;

            transferred += n as i64;
            self.emit(&StreamEvent::Progress(ProgressSnapshot::new(
                transferred,
                self.content_length,
                started_at,
            )));
        }

        sink.flush()?;
        Ok(transferred)
    }

    fn emit(&self, event: &StreamEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}
