//! Run-time protobuf row types.
//!
//! A compiled `Descriptor` is loaded into a `prost-reflect` descriptor pool to
//! get a `RowType`; its instances are filled by name and serialized by a
//! reflection-free writer.

mod factory;
mod message;
mod writer;

pub use factory::{FactoryError, MessageFactory, RowType, PACKAGE};
pub use message::{FieldValue, MessageError, RowMessage};
