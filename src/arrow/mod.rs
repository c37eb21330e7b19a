//! Arrow record batches as a row source.

mod source;

pub use source::{records_from_batch, ArrowSourceError};
