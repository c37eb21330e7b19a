//! Dynamic row instances addressed by field name.

use std::collections::BTreeMap;

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use thiserror::Error;

use super::writer::MessageWriter;
use crate::value::Value;

/// Errors raised while filling or serializing a row instance.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageError {
    #[error("message {message} has no field named {field}")]
    UnknownField { message: String, field: String },

    #[error("field {field} is not a {expected} field")]
    WrongShape {
        field: String,
        expected: &'static str,
    },

    #[error("field {field} expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("value for field {field} is out of range for {expected}")]
    OutOfRange {
        field: String,
        expected: &'static str,
    },

    #[error("required field {message}.{field} is not set")]
    MissingRequired { message: String, field: String },
}

/// A scalar already coerced to its field's wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Single(FieldValue),
    List(Vec<FieldValue>),
    Message(Box<RowMessage>),
    Messages(Vec<RowMessage>),
}

/// An instance of a row type. Unset fields are omitted from the wire output.
#[derive(Debug, Clone)]
pub struct RowMessage {
    descriptor: MessageDescriptor,
    /// Keyed by field number so serialization walks fields in order.
    slots: BTreeMap<u32, Slot>,
}

impl RowMessage {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self {
            descriptor,
            slots: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    fn field(&self, name: &str) -> Result<FieldDescriptor, MessageError> {
        self.descriptor
            .get_field_by_name(name)
            .ok_or_else(|| MessageError::UnknownField {
                message: self.descriptor.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Assign a singular scalar field. `Value::Null` leaves the field unset.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<(), MessageError> {
        let field = self.field(name)?;
        if field.is_list() || matches!(field.kind(), Kind::Message(_)) {
            return Err(wrong_shape(&field, "singular scalar"));
        }
        if value.is_null() {
            self.slots.remove(&field.number());
            return Ok(());
        }
        let v = coerce(&field, value)?;
        self.slots.insert(field.number(), Slot::Single(v));
        Ok(())
    }

    /// Append to a repeated scalar field.
    pub fn push(&mut self, name: &str, value: &Value) -> Result<(), MessageError> {
        let field = self.field(name)?;
        if !field.is_list() || matches!(field.kind(), Kind::Message(_)) {
            return Err(wrong_shape(&field, "repeated scalar"));
        }
        let v = coerce(&field, value)?;
        match self
            .slots
            .entry(field.number())
            .or_insert_with(|| Slot::List(Vec::new()))
        {
            Slot::List(items) => items.push(v),
            _ => return Err(wrong_shape(&field, "repeated scalar")),
        }
        Ok(())
    }

    /// The sub-instance of a singular message field, allocated on first use.
    pub fn message_mut(&mut self, name: &str) -> Result<&mut RowMessage, MessageError> {
        let field = self.field(name)?;
        let Kind::Message(nested) = field.kind() else {
            return Err(wrong_shape(&field, "message"));
        };
        if field.is_list() {
            return Err(wrong_shape(&field, "singular message"));
        }
        match self
            .slots
            .entry(field.number())
            .or_insert_with(|| Slot::Message(Box::new(RowMessage::new(nested))))
        {
            Slot::Message(m) => Ok(&mut **m),
            _ => Err(wrong_shape(&field, "singular message")),
        }
    }

    /// Allocate and append a new sub-instance to a repeated message field.
    pub fn add_message(&mut self, name: &str) -> Result<&mut RowMessage, MessageError> {
        let field = self.field(name)?;
        let Kind::Message(nested) = field.kind() else {
            return Err(wrong_shape(&field, "message"));
        };
        if !field.is_list() {
            return Err(wrong_shape(&field, "repeated message"));
        }
        match self
            .slots
            .entry(field.number())
            .or_insert_with(|| Slot::Messages(Vec::new()))
        {
            Slot::Messages(items) => {
                items.push(RowMessage::new(nested));
                let last = items.len() - 1;
                Ok(&mut items[last])
            }
            _ => Err(wrong_shape(&field, "repeated message")),
        }
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        let field = self.descriptor.get_field_by_name(name)?;
        self.slots.get(&field.number())
    }

    pub(crate) fn slot_by_number(&self, number: u32) -> Option<&Slot> {
        self.slots.get(&number)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match self.slot(name) {
            Some(Slot::Single(v)) => Some(v),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> &[FieldValue] {
        match self.slot(name) {
            Some(Slot::List(items)) => items,
            _ => &[],
        }
    }

    pub fn message(&self, name: &str) -> Option<&RowMessage> {
        match self.slot(name) {
            Some(Slot::Message(m)) => Some(&**m),
            _ => None,
        }
    }

    pub fn messages(&self, name: &str) -> &[RowMessage] {
        match self.slot(name) {
            Some(Slot::Messages(items)) => items,
            _ => &[],
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Serialize to protobuf binary. Fails if a required field is unset.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, MessageError> {
        let mut writer = MessageWriter::new();
        writer.write_message(self)?;
        Ok(writer.into_bytes())
    }
}

fn wrong_shape(field: &FieldDescriptor, expected: &'static str) -> MessageError {
    MessageError::WrongShape {
        field: field.name().to_string(),
        expected,
    }
}

fn kind_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Message(_) => "message",
        Kind::Enum(_) => "enum",
    }
}

/// Coerce a converted value into the representation of `field`.
fn coerce(field: &FieldDescriptor, value: &Value) -> Result<FieldValue, MessageError> {
    let kind = field.kind();
    let out_of_range = || MessageError::OutOfRange {
        field: field.name().to_string(),
        expected: kind_name(&kind),
    };

    let v = match (&kind, value) {
        (Kind::Bool, Value::Bool(b)) => FieldValue::Bool(*b),
        (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Enum(_), Value::Int(i)) => {
            FieldValue::I32(i32::try_from(*i).map_err(|_| out_of_range())?)
        }
        (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Value::Int(i)) => FieldValue::I64(*i),
        (Kind::Uint32 | Kind::Fixed32, Value::Int(i)) => {
            FieldValue::U32(u32::try_from(*i).map_err(|_| out_of_range())?)
        }
        (Kind::Uint64 | Kind::Fixed64, Value::Int(i)) => {
            FieldValue::U64(u64::try_from(*i).map_err(|_| out_of_range())?)
        }
        (Kind::Float, Value::Float(f)) => FieldValue::F32(*f as f32),
        (Kind::Float, Value::Int(i)) => FieldValue::F32(*i as f32),
        (Kind::Double, Value::Float(f)) => FieldValue::F64(*f),
        (Kind::Double, Value::Int(i)) => FieldValue::F64(*i as f64),
        (Kind::String, Value::String(s) | Value::Decimal(s)) => FieldValue::String(s.clone()),
        (Kind::Bytes, Value::Bytes(b)) => FieldValue::Bytes(b.clone()),
        (Kind::Bytes, Value::String(s)) => FieldValue::Bytes(s.clone().into_bytes()),
        _ => {
            return Err(MessageError::TypeMismatch {
                field: field.name().to_string(),
                expected: kind_name(&kind),
                got: value.type_name(),
            })
        }
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protobuf::MessageFactory;
    use crate::schema::{compile_descriptor, ColumnSchema, Mode};
    use crate::types::{build_type_map, TypeMap};

    fn instance() -> RowMessage {
        let columns = vec![
            ColumnSchema::new("id", "INT64"),
            ColumnSchema::nullable("day", "DATE"),
            ColumnSchema::nullable("score", "FLOAT64"),
            ColumnSchema::repeated("tags", "STRING"),
            ColumnSchema::record(
                "meta",
                Mode::Nullable,
                vec![ColumnSchema::nullable("k", "STRING")],
            ),
        ];
        let desc = compile_descriptor(&columns, &build_type_map(TypeMap::new()), "Row");
        MessageFactory::build(&desc).unwrap().new_instance()
    }

    #[test]
    fn test_set_and_get() {
        let mut row = instance();
        row.set("id", &Value::Int(3)).unwrap();
        row.set("score", &Value::Int(2)).unwrap();
        assert_eq!(row.get("id"), Some(&FieldValue::I64(3)));
        assert_eq!(row.get("score"), Some(&FieldValue::F64(2.0)));
        assert!(!row.has("day"));
    }

    #[test]
    fn test_null_unsets() {
        let mut row = instance();
        row.set("day", &Value::Int(1)).unwrap();
        assert!(row.has("day"));
        row.set("day", &Value::Null).unwrap();
        assert!(!row.has("day"));
    }

    #[test]
    fn test_push_keeps_order() {
        let mut row = instance();
        for tag in ["b", "a", "c"] {
            row.push("tags", &Value::from(tag)).unwrap();
        }
        let tags: Vec<_> = row.list("tags").to_vec();
        assert_eq!(
            tags,
            vec![
                FieldValue::String("b".into()),
                FieldValue::String("a".into()),
                FieldValue::String("c".into()),
            ]
        );
    }

    #[test]
    fn test_message_mut_reuses_instance() {
        let mut row = instance();
        row.message_mut("meta").unwrap().set("k", &Value::from("x")).unwrap();
        assert!(row.message_mut("meta").unwrap().has("k"));
        assert_eq!(
            row.message("meta").unwrap().get("k"),
            Some(&FieldValue::String("x".into()))
        );
    }

    #[test]
    fn test_shape_and_type_errors() {
        let mut row = instance();
        assert!(matches!(
            row.set("nope", &Value::Int(1)),
            Err(MessageError::UnknownField { .. })
        ));
        assert!(matches!(
            row.set("tags", &Value::from("a")),
            Err(MessageError::WrongShape { .. })
        ));
        assert!(matches!(
            row.push("id", &Value::Int(1)),
            Err(MessageError::WrongShape { .. })
        ));
        assert!(matches!(
            row.add_message("meta"),
            Err(MessageError::WrongShape { .. })
        ));
        assert!(matches!(
            row.set("id", &Value::from("7")),
            Err(MessageError::TypeMismatch { got: "string", .. })
        ));
        assert!(matches!(
            row.set("day", &Value::Int(i64::MAX)),
            Err(MessageError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_encode_requires_required_fields() {
        let row = instance();
        assert_eq!(
            row.encode_to_vec(),
            Err(MessageError::MissingRequired {
                message: "Row".into(),
                field: "id".into(),
            })
        );
    }
}
