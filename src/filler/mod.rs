//! Compiled row fillers.
//!
//! A [`Filler`] is compiled once per schema into a flat list of
//! [`FieldAction`]s and then applied to every row: it looks up each column
//! in the source record, converts the value and assigns it to the row
//! instance, recursing into nested fillers for structured columns.

mod encoder;

use std::fmt;

use thiserror::Error;

use crate::protobuf::{MessageError, RowMessage};
use crate::schema::{ColumnSchema, Mode};
use crate::types::{passthrough, ConvertError, Converter, ConverterMap};
use crate::value::{Record, Value};

pub use encoder::RowEncoder;

/// What to do with a REQUIRED column that has no value in the source record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingRequired {
    /// Run the converter against `Value::Null` and let it decide.
    #[default]
    Convert,
    /// Fail before conversion.
    Reject,
}

/// Errors that can occur while filling a row.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("column {column}: {source}")]
    Convert {
        column: String,
        source: ConvertError,
    },

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("required column {0} has no value")]
    MissingRequired(String),

    #[error("column {column} expects a record, got {got}")]
    NotARecord { column: String, got: &'static str },

    #[error("column {column} expects a list, got {got}")]
    NotAList { column: String, got: &'static str },
}

/// One compiled step of a filler, bound to a column.
#[derive(Clone)]
pub enum FieldAction {
    Scalar {
        name: String,
        mode: Mode,
        convert: Converter,
    },
    Nested {
        name: String,
        mode: Mode,
        filler: Filler,
    },
}

impl FieldAction {
    pub fn name(&self) -> &str {
        match self {
            FieldAction::Scalar { name, .. } | FieldAction::Nested { name, .. } => name,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            FieldAction::Scalar { mode, .. } | FieldAction::Nested { mode, .. } => *mode,
        }
    }
}

impl fmt::Debug for FieldAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldAction::Scalar { name, mode, .. } => f
                .debug_struct("Scalar")
                .field("name", name)
                .field("mode", mode)
                .finish_non_exhaustive(),
            FieldAction::Nested { name, mode, filler } => f
                .debug_struct("Nested")
                .field("name", name)
                .field("mode", mode)
                .field("filler", filler)
                .finish(),
        }
    }
}

/// Populates a row instance from a source record.
#[derive(Debug, Clone)]
pub struct Filler {
    actions: Vec<FieldAction>,
    policy: MissingRequired,
}

impl Filler {
    /// Compile with the default [`MissingRequired::Convert`] policy.
    pub fn compile(columns: &[ColumnSchema], converters: &ConverterMap) -> Self {
        Self::compile_with_policy(columns, converters, MissingRequired::default())
    }

    pub fn compile_with_policy(
        columns: &[ColumnSchema],
        converters: &ConverterMap,
        policy: MissingRequired,
    ) -> Self {
        let actions = columns
            .iter()
            .map(|column| {
                if column.is_structured() {
                    FieldAction::Nested {
                        name: column.name.clone(),
                        mode: column.mode,
                        filler: Self::compile_with_policy(&column.fields, converters, policy),
                    }
                } else {
                    FieldAction::Scalar {
                        name: column.name.clone(),
                        mode: column.mode,
                        convert: converters
                            .get(&column.field_type)
                            .cloned()
                            .unwrap_or_else(passthrough),
                    }
                }
            })
            .collect();
        Self { actions, policy }
    }

    pub fn actions(&self) -> &[FieldAction] {
        &self.actions
    }

    pub fn policy(&self) -> MissingRequired {
        self.policy
    }

    /// Fill `message` from `record`. A column whose value is missing or
    /// `Value::Null` counts as absent.
    pub fn apply(&self, message: &mut RowMessage, record: &Record) -> Result<(), FillError> {
        for action in &self.actions {
            let value = record.get(action.name()).filter(|v| !v.is_null());
            match action {
                FieldAction::Scalar {
                    name,
                    mode,
                    convert,
                } => self.apply_scalar(message, name, *mode, convert, value)?,
                FieldAction::Nested { name, mode, filler } => {
                    self.apply_nested(message, name, *mode, filler, value)?
                }
            }
        }
        Ok(())
    }

    fn apply_scalar(
        &self,
        message: &mut RowMessage,
        name: &str,
        mode: Mode,
        convert: &Converter,
        value: Option<&Value>,
    ) -> Result<(), FillError> {
        let run = |v: &Value| {
            convert(v).map_err(|source| FillError::Convert {
                column: name.to_string(),
                source,
            })
        };

        match (mode, value) {
            (Mode::Required, None) => {
                if self.policy == MissingRequired::Reject {
                    return Err(FillError::MissingRequired(name.to_string()));
                }
                message.set(name, &run(&Value::Null)?)?;
            }
            (Mode::Required | Mode::Nullable, Some(v)) => message.set(name, &run(v)?)?,
            (Mode::Nullable | Mode::Repeated, None) => {}
            (Mode::Repeated, Some(v)) => {
                for item in as_list(name, v)? {
                    message.push(name, &run(item)?)?;
                }
            }
        }
        Ok(())
    }

    fn apply_nested(
        &self,
        message: &mut RowMessage,
        name: &str,
        mode: Mode,
        filler: &Filler,
        value: Option<&Value>,
    ) -> Result<(), FillError> {
        match (mode, value) {
            (Mode::Required, None) => {
                if self.policy == MissingRequired::Reject {
                    return Err(FillError::MissingRequired(name.to_string()));
                }
                filler.apply(message.message_mut(name)?, &Record::new())?;
            }
            (Mode::Required | Mode::Nullable, Some(v)) => {
                filler.apply(message.message_mut(name)?, as_record(name, v)?)?;
            }
            (Mode::Nullable | Mode::Repeated, None) => {}
            (Mode::Repeated, Some(v)) => {
                for item in as_list(name, v)? {
                    let record = as_record(name, item)?;
                    filler.apply(message.add_message(name)?, record)?;
                }
            }
        }
        Ok(())
    }
}

fn as_list<'a>(column: &str, value: &'a Value) -> Result<&'a [Value], FillError> {
    value.as_list().ok_or_else(|| FillError::NotAList {
        column: column.to_string(),
        got: value.type_name(),
    })
}

fn as_record<'a>(column: &str, value: &'a Value) -> Result<&'a Record, FillError> {
    value.as_record().ok_or_else(|| FillError::NotARecord {
        column: column.to_string(),
        got: value.type_name(),
    })
}
