use std::sync::Arc;

use tracing::warn;

use super::protocol::AppendProtocol;
use super::transport::AppendFuture;
use super::WriteError;
use crate::filler::RowEncoder;
use crate::value::Record;

/// Buffered bytes above which rows are flushed.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 9_000_000;

/// Buffers serialized rows and flushes them through an [`AppendProtocol`].
pub struct StreamSession {
    encoder: Arc<RowEncoder>,
    protocol: AppendProtocol,
    threshold: usize,
    buffer: Vec<Vec<u8>>,
    buffered_bytes: usize,
    total_bytes: usize,
    total_rows: usize,
    pending: Vec<AppendFuture>,
}

impl StreamSession {
    pub fn new(encoder: Arc<RowEncoder>, protocol: AppendProtocol, threshold: usize) -> Self {
        Self {
            encoder,
            protocol,
            threshold,
            buffer: Vec::new(),
            buffered_bytes: 0,
            total_bytes: 0,
            total_rows: 0,
            pending: Vec::new(),
        }
    }

    /// Encode and buffer `rows`, flushing whenever the buffer grows past
    /// the threshold. Returns the number of serialized bytes produced.
    ///
    /// A row larger than the threshold is still buffered; it is flushed
    /// right after.
    pub fn append<'a, I>(&mut self, rows: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut appended = 0;
        for row in rows {
            let bytes = self.encoder.encode(row)?;
            appended += bytes.len();
            self.buffered_bytes += bytes.len();
            self.buffer.push(bytes);
            if self.buffered_bytes > self.threshold {
                self.submit()?;
            }
        }
        Ok(appended)
    }

    /// Send all buffered rows as one request. No-op when the buffer is empty.
    pub fn submit(&mut self) -> Result<(), WriteError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        let size = std::mem::take(&mut self.buffered_bytes);
        let count = rows.len();

        let future = self.protocol.send(rows)?;
        self.pending.push(future);
        self.total_rows += count;
        self.total_bytes += size;
        Ok(())
    }

    /// Flush, wait for every outstanding request in submission order and
    /// close the connection. Returns the first failure; later failures are
    /// logged and still drained.
    pub async fn drain(&mut self) -> Result<(), WriteError> {
        let mut first = self.submit().err();

        for (idx, future) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            if let Err(e) = future.await {
                if first.is_none() {
                    first = Some(e.into());
                } else {
                    warn!(
                        stream = %self.protocol.write_stream(),
                        request = idx,
                        error = %e,
                        "append request failed after an earlier failure"
                    );
                }
            }
        }

        self.protocol.close();
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Bytes handed to the transport so far.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn protocol(&self) -> &AppendProtocol {
        &self.protocol
    }
}
