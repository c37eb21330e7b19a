use thiserror::Error;

use super::handle::HandleState;
use super::transport::{StreamError, TransportError};
use crate::filler::FillError;
use crate::protobuf::FactoryError;
use crate::schema::TableIdError;

/// Errors that can occur while writing rows to a table.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid table id: {0}")]
    TableId(#[from] TableIdError),

    #[error("row type compile error: {0}")]
    Compile(#[from] FactoryError),

    #[error("row encode error: {0}")]
    Fill(#[from] FillError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot {operation} a stream that is {state}")]
    InvalidState {
        operation: &'static str,
        state: HandleState,
    },

    #[error("commit of {stream} reported {} stream error(s)", .errors.len())]
    Commit {
        stream: String,
        errors: Vec<StreamError>,
    },
}
