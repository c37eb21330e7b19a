use prost_types::DescriptorProto;
use tracing::debug;

use super::transport::{AppendFuture, AppendRowsRequest, AppendRowsStream, TransportError};

/// Sequences append requests onto one connection.
///
/// The writer schema rides on the first request only. Under exactly-once
/// delivery each request carries the offset of its first row and the offset
/// advances by the row count.
pub struct AppendProtocol {
    write_stream: String,
    connection: Box<dyn AppendRowsStream>,
    schema: Option<DescriptorProto>,
    offset: Option<i64>,
    requests: usize,
    closed: bool,
}

impl AppendProtocol {
    /// `offset` is `None` when the stream does not track offsets.
    pub fn new(
        write_stream: impl Into<String>,
        connection: Box<dyn AppendRowsStream>,
        schema: DescriptorProto,
        offset: Option<i64>,
    ) -> Self {
        Self {
            write_stream: write_stream.into(),
            connection,
            schema: Some(schema),
            offset,
            requests: 0,
            closed: false,
        }
    }

    pub fn send(&mut self, serialized_rows: Vec<Vec<u8>>) -> Result<AppendFuture, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let request = AppendRowsRequest {
            write_stream: self.write_stream.clone(),
            offset: self.offset,
            writer_schema: self.schema.take(),
            serialized_rows,
        };
        debug!(
            stream = %self.write_stream,
            rows = request.row_count(),
            bytes = request.byte_size(),
            offset = ?request.offset,
            with_schema = request.writer_schema.is_some(),
            "sending append request"
        );

        if let Some(offset) = self.offset.as_mut() {
            *offset += request.row_count() as i64;
        }
        self.requests += 1;
        Ok(self.connection.send(request))
    }

    pub fn write_stream(&self) -> &str {
        &self.write_stream
    }

    /// Offset the next request will carry.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.connection.close();
            self.closed = true;
        }
    }
}
