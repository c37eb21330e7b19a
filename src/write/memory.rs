//! In-process write service.
//!
//! `MemoryWriteClient` accepts appends, tracks per-stream row counts and
//! offsets, and records every call it receives. Failures can be injected
//! for append requests, finalize and commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures::future;

use super::transport::{
    AppendFuture, AppendRowsRequest, AppendRowsResponse, AppendRowsStream, CommitResponse,
    FinalizeResponse, StreamError, TableMetadata, TransportError, WriteClient, WriteStream,
    WriteStreamType,
};
use crate::schema::{ColumnSchema, TableId};

/// A call received by [`MemoryWriteClient`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateWriteStream {
        table: String,
        stream_type: WriteStreamType,
        name: String,
    },
    OpenAppendStream {
        write_stream: String,
    },
    Append(AppendRowsRequest),
    CloseAppendStream {
        write_stream: String,
    },
    Finalize {
        write_stream: String,
    },
    Commit {
        parent: String,
        write_streams: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<Call>,
    tables: HashMap<String, Vec<ColumnSchema>>,
    next_stream: usize,
    appends: usize,
    row_counts: HashMap<String, i64>,
    finalized: HashSet<String>,
    failing_appends: HashSet<usize>,
    fail_finalize: bool,
    fail_commit: bool,
    commit_errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWriteClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWriteClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the column schema of `table` (`project.dataset.table`).
    pub fn with_table(self, table: &str, columns: Vec<ColumnSchema>) -> Self {
        self.lock().tables.insert(table.to_string(), columns);
        self
    }

    /// Fail the append request with this index (0-based, across streams).
    pub fn fail_append(&self, request: usize) {
        self.lock().failing_appends.insert(request);
    }

    pub fn fail_finalize(&self) {
        self.lock().fail_finalize = true;
    }

    pub fn fail_commit(&self) {
        self.lock().fail_commit = true;
    }

    /// Report a per-stream error in the next commit responses.
    pub fn reject_commit(&self, message: &str) {
        self.lock().commit_errors.push(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn appends(&self) -> Vec<AppendRowsRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Append(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rows accepted on `write_stream`.
    pub fn row_count(&self, write_stream: &str) -> i64 {
        self.lock().row_counts.get(write_stream).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WriteClient for MemoryWriteClient {
    async fn create_write_stream(
        &self,
        table: &TableId,
        stream_type: WriteStreamType,
    ) -> Result<WriteStream, TransportError> {
        let mut inner = self.lock();
        inner.next_stream += 1;
        let name = format!("{}/streams/stream{}", table.table_path(), inner.next_stream);
        inner.calls.push(Call::CreateWriteStream {
            table: table.to_string(),
            stream_type,
            name: name.clone(),
        });
        Ok(WriteStream { name, stream_type })
    }

    fn open_append_stream(
        &self,
        write_stream: &str,
    ) -> Result<Box<dyn AppendRowsStream>, TransportError> {
        self.lock().calls.push(Call::OpenAppendStream {
            write_stream: write_stream.to_string(),
        });
        Ok(Box::new(MemoryAppendStream {
            write_stream: write_stream.to_string(),
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }

    async fn finalize_write_stream(
        &self,
        write_stream: &str,
    ) -> Result<FinalizeResponse, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Finalize {
            write_stream: write_stream.to_string(),
        });
        if inner.fail_finalize {
            return Err(TransportError::Unavailable("finalize failed".into()));
        }
        inner.finalized.insert(write_stream.to_string());
        Ok(FinalizeResponse {
            row_count: inner.row_counts.get(write_stream).copied().unwrap_or(0),
        })
    }

    async fn batch_commit_write_streams(
        &self,
        parent: &str,
        write_streams: &[String],
    ) -> Result<CommitResponse, TransportError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Commit {
            parent: parent.to_string(),
            write_streams: write_streams.to_vec(),
        });
        if inner.fail_commit {
            return Err(TransportError::Unavailable("commit failed".into()));
        }

        let mut stream_errors = Vec::new();
        for stream in write_streams {
            for message in &inner.commit_errors {
                stream_errors.push(StreamError {
                    entity: stream.clone(),
                    message: message.clone(),
                });
            }
            if !inner.finalized.contains(stream) {
                stream_errors.push(StreamError {
                    entity: stream.clone(),
                    message: "stream is not finalized".into(),
                });
            }
        }
        let commit_time = stream_errors.is_empty().then(Utc::now);
        Ok(CommitResponse {
            commit_time,
            stream_errors,
        })
    }
}

#[async_trait]
impl TableMetadata for MemoryWriteClient {
    async fn table_schema(&self, table: &TableId) -> Result<Vec<ColumnSchema>, TransportError> {
        self.lock()
            .tables
            .get(&table.to_string())
            .cloned()
            .ok_or_else(|| TransportError::NotFound(table.to_string()))
    }
}

struct MemoryAppendStream {
    write_stream: String,
    inner: Arc<Mutex<Inner>>,
    closed: bool,
}

impl MemoryAppendStream {
    fn accept(
        &self,
        inner: &mut Inner,
        request: &AppendRowsRequest,
    ) -> Result<AppendRowsResponse, TransportError> {
        let index = inner.appends;
        inner.appends += 1;

        if self.closed {
            return Err(TransportError::Closed);
        }
        if inner.failing_appends.contains(&index) {
            return Err(TransportError::Unavailable(format!(
                "append request {} failed",
                index
            )));
        }
        if inner.finalized.contains(&self.write_stream) {
            return Err(TransportError::Rejected(format!(
                "{} is finalized",
                self.write_stream
            )));
        }

        let count = inner.row_counts.entry(self.write_stream.clone()).or_insert(0);
        if let Some(offset) = request.offset {
            if offset != *count {
                return Err(TransportError::Rejected(format!(
                    "offset {} does not match {} rows on {}",
                    offset, count, self.write_stream
                )));
            }
        }
        let written_at = request.offset.map(|_| *count);
        *count += request.row_count() as i64;
        Ok(AppendRowsResponse { offset: written_at })
    }
}

impl AppendRowsStream for MemoryAppendStream {
    fn send(&mut self, request: AppendRowsRequest) -> AppendFuture {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let result = self.accept(&mut guard, &request);
        guard.calls.push(Call::Append(request));
        Box::pin(future::ready(result))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.calls.push(Call::CloseAppendStream {
            write_stream: self.write_stream.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(offset: Option<i64>, rows: usize) -> AppendRowsRequest {
        AppendRowsRequest {
            write_stream: "s".into(),
            offset,
            writer_schema: None,
            serialized_rows: vec![vec![0]; rows],
        }
    }

    #[tokio::test]
    async fn test_offsets_are_checked() {
        let client = MemoryWriteClient::new();
        let mut stream = client.open_append_stream("s").unwrap();
        assert_eq!(stream.send(request(Some(0), 2)).await.unwrap().offset, Some(0));
        assert!(matches!(
            stream.send(request(Some(5), 1)).await,
            Err(TransportError::Rejected(_))
        ));
        assert_eq!(stream.send(request(Some(2), 1)).await.unwrap().offset, Some(2));
        assert_eq!(client.row_count("s"), 3);
    }

    #[tokio::test]
    async fn test_appends_after_finalize_are_rejected() {
        let client = MemoryWriteClient::new();
        let mut stream = client.open_append_stream("s").unwrap();
        stream.send(request(None, 1)).await.unwrap();
        let finalized = client.finalize_write_stream("s").await.unwrap();
        assert_eq!(finalized.row_count, 1);
        assert!(matches!(
            stream.send(request(None, 1)).await,
            Err(TransportError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_requires_finalize() {
        let client = MemoryWriteClient::new();
        let response = client
            .batch_commit_write_streams("projects/p/datasets/d/tables/t", &["s".to_string()])
            .await
            .unwrap();
        assert_eq!(response.stream_errors.len(), 1);
        assert!(response.commit_time.is_none());

        client.finalize_write_stream("s").await.unwrap();
        let response = client
            .batch_commit_write_streams("projects/p/datasets/d/tables/t", &["s".to_string()])
            .await
            .unwrap();
        assert!(response.stream_errors.is_empty());
        assert!(response.commit_time.is_some());
    }

    #[tokio::test]
    async fn test_created_streams_are_named_under_the_table() {
        let client = MemoryWriteClient::new();
        let table: TableId = "p.d.t".parse().unwrap();
        let stream = client
            .create_write_stream(&table, WriteStreamType::Pending)
            .await
            .unwrap();
        assert_eq!(stream.name, "projects/p/datasets/d/tables/t/streams/stream1");
    }
}
