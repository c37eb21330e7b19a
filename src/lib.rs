//! Stream arbitrary nested records into a columnar table write service.
//!
//! The table schema is only known at run time, so rows are encoded through a
//! protobuf descriptor compiled from the column schema:
//!
//! ```text
//! columns ──compile_descriptor──▶ Descriptor ──MessageFactory──▶ RowType
//! columns + TypeRegistry ──Filler::compile──▶ Filler
//! Record ──Filler──▶ RowMessage ──encode──▶ bytes ──StreamHandle──▶ transport
//! ```
//!
//! The transport and the table metadata lookup are collaborators supplied by
//! the caller through [`write::WriteClient`] and [`write::TableMetadata`].

pub mod arrow;
pub mod filler;
pub mod protobuf;
pub mod schema;
pub mod types;
pub mod value;
pub mod write;

pub use filler::{Filler, FillError, MissingRequired, RowEncoder};
pub use protobuf::{MessageFactory, RowMessage, RowType};
pub use schema::{compile_descriptor, ColumnSchema, Descriptor, Mode, TableId};
pub use types::{build_converters, build_type_map, TypeRegistry};
pub use value::{Record, Value};
pub use write::{
    stream_single_batch, write_single_batch, BatchWriter, CloseSummary, StreamHandle,
    StreamWriter, WriteError, WriterOptions,
};
