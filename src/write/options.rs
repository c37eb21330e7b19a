use crate::filler::MissingRequired;
use crate::schema::ROOT_MESSAGE_NAME;
use crate::types::TypeRegistry;

use super::session::DEFAULT_FLUSH_THRESHOLD;

/// Options for opening a write stream on a table.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Stamp every request with its row offset. Stream writers without it
    /// use the table's default stream.
    pub exactly_once: bool,
    /// Buffered bytes above which rows are flushed.
    pub flush_threshold: usize,
    /// Name of the root message type.
    pub root_name: String,
    /// How REQUIRED columns without a value are handled.
    pub missing_required: MissingRequired,
    /// Existing write stream to append to. If None, one is created.
    pub write_stream: Option<String>,
    /// Type tags, protobuf types and converters.
    pub registry: TypeRegistry,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            exactly_once: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            root_name: ROOT_MESSAGE_NAME.to_string(),
            missing_required: MissingRequired::Convert,
            write_stream: None,
            registry: TypeRegistry::new(),
        }
    }
}

impl WriterOptions {
    /// Options for at-least-once streaming into the default stream.
    pub fn at_least_once() -> Self {
        Self {
            exactly_once: false,
            ..Default::default()
        }
    }

    /// Options that reject rows missing a REQUIRED column before conversion.
    pub fn strict() -> Self {
        Self {
            missing_required: MissingRequired::Reject,
            ..Default::default()
        }
    }
}
