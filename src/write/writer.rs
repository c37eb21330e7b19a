use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::handle::{CloseSummary, StreamHandle};
use super::options::WriterOptions;
use super::transport::{TableMetadata, WriteClient};
use super::WriteError;
use crate::value::Record;

/// Exactly-once batch writer: rows become visible when `close` commits.
pub struct BatchWriter {
    handle: StreamHandle,
}

impl BatchWriter {
    /// `options.exactly_once` is ignored; batch writes are always exactly-once.
    pub async fn create(
        table: &str,
        client: Arc<dyn WriteClient>,
        metadata: &dyn TableMetadata,
        options: WriterOptions,
    ) -> Result<Self, WriteError> {
        let options = WriterOptions {
            exactly_once: true,
            ..options
        };
        let handle = StreamHandle::create(table, client, metadata, true, options).await?;
        Ok(Self { handle })
    }

    pub fn open(&mut self, offset: i64) -> Result<(), WriteError> {
        self.handle.open(offset)
    }

    pub fn append<'a, I>(&mut self, rows: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.handle.append(rows)
    }

    pub fn submit(&mut self) -> Result<(), WriteError> {
        self.handle.submit()
    }

    pub async fn close(&mut self) -> Result<CloseSummary, WriteError> {
        self.handle.close().await
    }

    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }
}

/// Streaming writer: rows are visible once their request is accepted.
pub struct StreamWriter {
    handle: StreamHandle,
}

impl StreamWriter {
    pub async fn create(
        table: &str,
        client: Arc<dyn WriteClient>,
        metadata: &dyn TableMetadata,
        options: WriterOptions,
    ) -> Result<Self, WriteError> {
        let handle = StreamHandle::create(table, client, metadata, false, options).await?;
        Ok(Self { handle })
    }

    pub fn open(&mut self, offset: i64) -> Result<(), WriteError> {
        self.handle.open(offset)
    }

    pub fn append<'a, I>(&mut self, rows: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.handle.append(rows)
    }

    pub fn submit(&mut self) -> Result<(), WriteError> {
        self.handle.submit()
    }

    /// Append `rows` and submit them right away.
    pub fn send<'a, I>(&mut self, rows: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let bytes = self.handle.append(rows)?;
        self.handle.submit()?;
        Ok(bytes)
    }

    pub async fn close(&mut self) -> Result<CloseSummary, WriteError> {
        self.handle.close().await
    }

    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }
}

/// Write `rows` to `table` in one committed batch.
pub async fn write_single_batch(
    table: &str,
    client: Arc<dyn WriteClient>,
    metadata: &dyn TableMetadata,
    rows: &[Record],
    options: WriterOptions,
) -> Result<CloseSummary, WriteError> {
    let start = Instant::now();
    let mut writer = BatchWriter::create(table, client, metadata, options).await?;
    writer.open(0)?;
    writer.append(rows)?;
    let summary = writer.close().await?;
    info!(
        table,
        rows = summary.rows,
        bytes = summary.bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "wrote batch"
    );
    Ok(summary)
}

/// Stream `rows` to `table` through a single send.
pub async fn stream_single_batch(
    table: &str,
    client: Arc<dyn WriteClient>,
    metadata: &dyn TableMetadata,
    rows: &[Record],
    options: WriterOptions,
) -> Result<CloseSummary, WriteError> {
    let start = Instant::now();
    let mut writer = StreamWriter::create(table, client, metadata, options).await?;
    writer.open(0)?;
    writer.send(rows)?;
    let summary = writer.close().await?;
    info!(
        table,
        rows = summary.rows,
        bytes = summary.bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "streamed batch"
    );
    Ok(summary)
}
