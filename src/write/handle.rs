use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::options::WriterOptions;
use super::protocol::AppendProtocol;
use super::session::StreamSession;
use super::transport::{TableMetadata, WriteClient, WriteStreamType};
use super::WriteError;
use crate::filler::RowEncoder;
use crate::schema::{ColumnSchema, TableId};
use crate::value::Record;

/// Lifecycle of a [`StreamHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Created,
    Open,
    Finalized,
    Committed,
    Closed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleState::Created => "created",
            HandleState::Open => "open",
            HandleState::Finalized => "finalized",
            HandleState::Committed => "committed",
            HandleState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Delivery mode of the underlying write stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Batch, exactly-once: rows are visible after finalize and commit.
    Pending,
    /// Streaming, exactly-once: rows are visible on append.
    Committed,
    /// Streaming, at-least-once, on the table's `_default` stream.
    Default,
}

impl StreamKind {
    pub fn for_mode(batch: bool, exactly_once: bool) -> Self {
        match (batch, exactly_once) {
            (true, _) => StreamKind::Pending,
            (false, true) => StreamKind::Committed,
            (false, false) => StreamKind::Default,
        }
    }

    pub fn is_exactly_once(self) -> bool {
        !matches!(self, StreamKind::Default)
    }
}

/// What a closed handle delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseSummary {
    pub rows: usize,
    pub bytes: usize,
    pub requests: usize,
    /// Rows are visible to readers.
    pub committed: bool,
}

/// Owns one write stream from creation to commit.
pub struct StreamHandle {
    table: TableId,
    client: Arc<dyn WriteClient>,
    kind: StreamKind,
    write_stream: String,
    options: WriterOptions,
    encoder: Arc<RowEncoder>,
    session: Option<StreamSession>,
    state: HandleState,
    summary: Option<CloseSummary>,
}

impl StreamHandle {
    /// Fetch the table schema, compile the row encoder and resolve the
    /// write stream. The table id is validated before any request is made.
    pub async fn create(
        table: &str,
        client: Arc<dyn WriteClient>,
        metadata: &dyn TableMetadata,
        batch: bool,
        options: WriterOptions,
    ) -> Result<Self, WriteError> {
        let table: TableId = table.parse()?;
        let columns = metadata.table_schema(&table).await?;
        let encoder = RowEncoder::compile(
            &columns,
            &options.registry,
            &options.root_name,
            options.missing_required,
        )?;

        let kind = StreamKind::for_mode(batch, options.exactly_once);
        let write_stream = match (&options.write_stream, kind) {
            (Some(name), _) => name.clone(),
            (None, StreamKind::Default) => table.default_stream(),
            (None, StreamKind::Pending) => {
                client
                    .create_write_stream(&table, WriteStreamType::Pending)
                    .await?
                    .name
            }
            (None, StreamKind::Committed) => {
                client
                    .create_write_stream(&table, WriteStreamType::Committed)
                    .await?
                    .name
            }
        };
        info!(
            %table,
            stream = %write_stream,
            ?kind,
            columns = columns.len(),
            "created stream handle"
        );

        Ok(Self {
            table,
            client,
            kind,
            write_stream,
            options,
            encoder: Arc::new(encoder),
            session: None,
            state: HandleState::Created,
            summary: None,
        })
    }

    /// Recompile against a new column schema. Only valid before `open`.
    pub fn update_schema(&mut self, columns: &[ColumnSchema]) -> Result<(), WriteError> {
        self.expect_state(HandleState::Created, "update the schema of")?;
        let encoder = RowEncoder::compile(
            columns,
            &self.options.registry,
            &self.options.root_name,
            self.options.missing_required,
        )?;
        self.encoder = Arc::new(encoder);
        Ok(())
    }

    /// Connect to the write stream. Under exactly-once delivery the first
    /// request carries `offset`.
    pub fn open(&mut self, offset: i64) -> Result<(), WriteError> {
        self.expect_state(HandleState::Created, "open")?;
        let connection = self.client.open_append_stream(&self.write_stream)?;
        let protocol = AppendProtocol::new(
            self.write_stream.clone(),
            connection,
            self.encoder.row_type().descriptor_proto().clone(),
            self.kind.is_exactly_once().then_some(offset),
        );
        self.session = Some(StreamSession::new(
            Arc::clone(&self.encoder),
            protocol,
            self.options.flush_threshold,
        ));
        self.state = HandleState::Open;
        Ok(())
    }

    pub fn append<'a, I>(&mut self, rows: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.session_mut("append to")?.append(rows)
    }

    pub fn submit(&mut self) -> Result<(), WriteError> {
        self.session_mut("submit to")?.submit()
    }

    /// Flush, wait for outstanding requests and complete the stream:
    /// pending streams are finalized then committed, committed streams are
    /// finalized best-effort, the default stream is left as is.
    ///
    /// Calling `close` again returns the first summary without any request.
    pub async fn close(&mut self) -> Result<CloseSummary, WriteError> {
        let mut session = match (self.state, self.session.take()) {
            (HandleState::Open, Some(session)) => session,
            _ => {
                self.state = HandleState::Closed;
                return Ok(self.summary.clone().unwrap_or_default());
            }
        };

        let drained = session.drain().await;
        let mut summary = CloseSummary {
            rows: session.total_rows(),
            bytes: session.total_bytes(),
            requests: session.protocol().requests(),
            committed: false,
        };

        let result = match drained {
            Ok(()) => self.complete(&mut summary).await,
            Err(e) => Err(e),
        };
        self.state = HandleState::Closed;
        self.summary = Some(summary.clone());
        result.map(|()| summary)
    }

    async fn complete(&mut self, summary: &mut CloseSummary) -> Result<(), WriteError> {
        match self.kind {
            StreamKind::Pending => {
                let finalized = self.client.finalize_write_stream(&self.write_stream).await?;
                self.state = HandleState::Finalized;
                info!(
                    stream = %self.write_stream,
                    rows = finalized.row_count,
                    "finalized write stream"
                );

                let parent = self.table.table_path();
                let response = self
                    .client
                    .batch_commit_write_streams(&parent, std::slice::from_ref(&self.write_stream))
                    .await?;
                if !response.stream_errors.is_empty() {
                    return Err(WriteError::Commit {
                        stream: self.write_stream.clone(),
                        errors: response.stream_errors,
                    });
                }
                self.state = HandleState::Committed;
                info!(
                    stream = %self.write_stream,
                    commit_time = ?response.commit_time,
                    "committed write stream"
                );
            }
            StreamKind::Committed => {
                match self.client.finalize_write_stream(&self.write_stream).await {
                    Ok(finalized) => {
                        self.state = HandleState::Finalized;
                        info!(
                            stream = %self.write_stream,
                            rows = finalized.row_count,
                            "finalized write stream"
                        );
                    }
                    Err(e) => {
                        warn!(
                            stream = %self.write_stream,
                            error = %e,
                            "finalize failed; rows are already visible"
                        );
                    }
                }
            }
            StreamKind::Default => {}
        }
        summary.committed = true;
        Ok(())
    }

    fn expect_state(
        &self,
        expected: HandleState,
        operation: &'static str,
    ) -> Result<(), WriteError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WriteError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn session_mut(&mut self, operation: &'static str) -> Result<&mut StreamSession, WriteError> {
        let state = self.state;
        match (state, self.session.as_mut()) {
            (HandleState::Open, Some(session)) => Ok(session),
            _ => Err(WriteError::InvalidState { operation, state }),
        }
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn write_stream(&self) -> &str {
        &self.write_stream
    }

    pub fn encoder(&self) -> &RowEncoder {
        &self.encoder
    }
}
