//! Append protocol, stream lifecycle and writers.

mod error;
mod handle;
pub mod memory;
mod options;
mod protocol;
mod session;
mod transport;
mod writer;

pub use error::WriteError;
pub use handle::{CloseSummary, HandleState, StreamHandle, StreamKind};
pub use options::WriterOptions;
pub use protocol::AppendProtocol;
pub use session::{StreamSession, DEFAULT_FLUSH_THRESHOLD};
pub use transport::{
    AppendFuture, AppendRowsRequest, AppendRowsResponse, AppendRowsStream, CommitResponse,
    FinalizeResponse, StreamError, TableMetadata, TransportError, WriteClient, WriteStream,
    WriteStreamType,
};
pub use writer::{stream_single_batch, write_single_batch, BatchWriter, StreamWriter};
