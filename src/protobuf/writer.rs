//! Reflection-free protobuf serialization of `RowMessage` instances.
//!
//! Fields are written in field-number order. Repeated scalars are written
//! unpacked (proto2 default) and nested messages are length-prefixed.

use prost::encoding::{encode_varint, WireType};
use prost_reflect::{Cardinality, FieldDescriptor, Kind};

use super::message::{FieldValue, MessageError, RowMessage, Slot};

/// Serializes row instances into an internal buffer.
pub(crate) struct MessageWriter {
    buffer: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Serialize every set field of `message`.
    pub fn write_message(&mut self, message: &RowMessage) -> Result<(), MessageError> {
        for field in message.descriptor().fields() {
            self.write_field(message, &field)?;
        }
        Ok(())
    }

    fn write_field(
        &mut self,
        message: &RowMessage,
        field: &FieldDescriptor,
    ) -> Result<(), MessageError> {
        let number = field.number();
        let kind = field.kind();

        match message.slot_by_number(number) {
            None => {
                if field.cardinality() == Cardinality::Required {
                    return Err(MessageError::MissingRequired {
                        message: message.descriptor().name().to_string(),
                        field: field.name().to_string(),
                    });
                }
            }
            Some(Slot::Single(value)) => {
                self.write_tag(number, kind_to_wire_type(&kind));
                self.write_value(value, &kind);
            }
            Some(Slot::List(values)) => {
                let wire_type = kind_to_wire_type(&kind);
                for value in values {
                    self.write_tag(number, wire_type);
                    self.write_value(value, &kind);
                }
            }
            Some(Slot::Message(nested)) => {
                self.write_tag(number, WireType::LengthDelimited);
                self.write_nested(nested)?;
            }
            Some(Slot::Messages(nested)) => {
                for item in nested {
                    self.write_tag(number, WireType::LengthDelimited);
                    self.write_nested(item)?;
                }
            }
        }
        Ok(())
    }

    /// Serialize a nested message to a temp buffer, then write it
    /// length-prefixed.
    fn write_nested(&mut self, message: &RowMessage) -> Result<(), MessageError> {
        let mut msg_buf = Vec::new();
        std::mem::swap(&mut self.buffer, &mut msg_buf);

        let result = self.write_message(message);

        let nested_data = std::mem::replace(&mut self.buffer, msg_buf);
        result?;

        encode_varint(nested_data.len() as u64, &mut self.buffer);
        self.buffer.extend_from_slice(&nested_data);
        Ok(())
    }

    fn write_value(&mut self, value: &FieldValue, kind: &Kind) {
        match value {
            FieldValue::Bool(v) => self.buffer.push(u8::from(*v)),
            FieldValue::I32(v) => self.write_i32(*v, kind),
            FieldValue::I64(v) => self.write_i64(*v, kind),
            FieldValue::U32(v) => match kind {
                Kind::Fixed32 => self.buffer.extend_from_slice(&v.to_le_bytes()),
                _ => encode_varint(*v as u64, &mut self.buffer),
            },
            FieldValue::U64(v) => match kind {
                Kind::Fixed64 => self.buffer.extend_from_slice(&v.to_le_bytes()),
                _ => encode_varint(*v, &mut self.buffer),
            },
            FieldValue::F32(v) => self.buffer.extend_from_slice(&v.to_le_bytes()),
            FieldValue::F64(v) => self.buffer.extend_from_slice(&v.to_le_bytes()),
            FieldValue::String(v) => self.write_bytes(v.as_bytes()),
            FieldValue::Bytes(v) => self.write_bytes(v),
        }
    }

    /// Write a tag (field number + wire type).
    fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        let tag = (field_number << 3) | (wire_type as u32);
        encode_varint(tag as u64, &mut self.buffer);
    }

    fn write_i32(&mut self, value: i32, kind: &Kind) {
        match kind {
            Kind::Sint32 => {
                // ZigZag encoding
                let encoded = ((value << 1) ^ (value >> 31)) as u32;
                encode_varint(encoded as u64, &mut self.buffer);
            }
            Kind::Sfixed32 => {
                self.buffer.extend_from_slice(&value.to_le_bytes());
            }
            _ => {
                // Negative values sign-extend to ten bytes
                encode_varint(value as u64, &mut self.buffer);
            }
        }
    }

    fn write_i64(&mut self, value: i64, kind: &Kind) {
        match kind {
            Kind::Sint64 => {
                // ZigZag encoding
                let encoded = ((value << 1) ^ (value >> 63)) as u64;
                encode_varint(encoded, &mut self.buffer);
            }
            Kind::Sfixed64 => {
                self.buffer.extend_from_slice(&value.to_le_bytes());
            }
            _ => {
                encode_varint(value as u64, &mut self.buffer);
            }
        }
    }

    fn write_bytes(&mut self, value: &[u8]) {
        encode_varint(value.len() as u64, &mut self.buffer);
        self.buffer.extend_from_slice(value);
    }
}

/// Get the wire type for a protobuf kind.
fn kind_to_wire_type(kind: &Kind) -> WireType {
    match kind {
        Kind::Bool
        | Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Enum(_) => WireType::Varint,
        Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::ThirtyTwoBit,
        Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::SixtyFourBit,
        Kind::String | Kind::Bytes | Kind::Message(_) => WireType::LengthDelimited,
    }
}
