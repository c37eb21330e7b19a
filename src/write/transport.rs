//! Interface to the table write service.
//!
//! The wire transport, credentials and table metadata lookup live outside
//! this crate; callers plug them in through [`WriteClient`] and
//! [`TableMetadata`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use prost_types::DescriptorProto;
use thiserror::Error;

use crate::schema::{ColumnSchema, TableId};

/// One batch of serialized rows for a write stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRowsRequest {
    pub write_stream: String,
    /// Row offset of the first row, set under exactly-once delivery.
    pub offset: Option<i64>,
    /// Writer schema; present on the first request of a connection only.
    pub writer_schema: Option<DescriptorProto>,
    pub serialized_rows: Vec<Vec<u8>>,
}

impl AppendRowsRequest {
    pub fn row_count(&self) -> usize {
        self.serialized_rows.len()
    }

    pub fn byte_size(&self) -> usize {
        self.serialized_rows.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendRowsResponse {
    /// Offset the rows were written at, when the stream tracks offsets.
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStreamType {
    /// Rows become visible after finalize and commit.
    Pending,
    /// Rows become visible as soon as they are appended.
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStream {
    pub name: String,
    pub stream_type: WriteStreamType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeResponse {
    pub row_count: i64,
}

/// Per-stream failure reported inside a commit response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResponse {
    pub commit_time: Option<DateTime<Utc>>,
    pub stream_errors: Vec<StreamError>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection closed")]
    Closed,
}

/// Completion of one append request.
pub type AppendFuture = BoxFuture<'static, Result<AppendRowsResponse, TransportError>>;

/// A bidirectional append connection bound to one write stream.
pub trait AppendRowsStream: Send {
    /// Hand `request` to the transport. The request is in flight once this
    /// returns; the future only resolves its response.
    fn send(&mut self, request: AppendRowsRequest) -> AppendFuture;

    /// Half-close the connection. No further requests are sent.
    fn close(&mut self);
}

#[async_trait]
pub trait WriteClient: Send + Sync {
    async fn create_write_stream(
        &self,
        table: &TableId,
        stream_type: WriteStreamType,
    ) -> Result<WriteStream, TransportError>;

    fn open_append_stream(
        &self,
        write_stream: &str,
    ) -> Result<Box<dyn AppendRowsStream>, TransportError>;

    async fn finalize_write_stream(
        &self,
        write_stream: &str,
    ) -> Result<FinalizeResponse, TransportError>;

    /// Commit finalized pending streams of the table at `parent`.
    async fn batch_commit_write_streams(
        &self,
        parent: &str,
        write_streams: &[String],
    ) -> Result<CommitResponse, TransportError>;
}

/// Source of a table's ordered column schema.
#[async_trait]
pub trait TableMetadata: Send + Sync {
    async fn table_schema(&self, table: &TableId) -> Result<Vec<ColumnSchema>, TransportError>;
}
