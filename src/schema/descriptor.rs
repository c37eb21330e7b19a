//! Message descriptor tree produced by the schema compiler.

use std::fmt;

use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto};

use super::Mode;

/// Protobuf scalar or message type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtoType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Uint32,
    Sint32,
    Sint64,
    Bool,
    String,
    Bytes,
    Message,
}

impl ProtoType {
    pub fn to_proto(self) -> Type {
        match self {
            ProtoType::Double => Type::Double,
            ProtoType::Float => Type::Float,
            ProtoType::Int64 => Type::Int64,
            ProtoType::Uint64 => Type::Uint64,
            ProtoType::Int32 => Type::Int32,
            ProtoType::Uint32 => Type::Uint32,
            ProtoType::Sint32 => Type::Sint32,
            ProtoType::Sint64 => Type::Sint64,
            ProtoType::Bool => Type::Bool,
            ProtoType::String => Type::String,
            ProtoType::Bytes => Type::Bytes,
            ProtoType::Message => Type::Message,
        }
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtoType::Double => "double",
            ProtoType::Float => "float",
            ProtoType::Int64 => "int64",
            ProtoType::Uint64 => "uint64",
            ProtoType::Int32 => "int32",
            ProtoType::Uint32 => "uint32",
            ProtoType::Sint32 => "sint32",
            ProtoType::Sint64 => "sint64",
            ProtoType::Bool => "bool",
            ProtoType::String => "string",
            ProtoType::Bytes => "bytes",
            ProtoType::Message => "message",
        };
        write!(f, "{}", s)
    }
}

/// Field cardinality in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

impl From<Mode> for Label {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Nullable => Label::Optional,
            Mode::Repeated => Label::Repeated,
            Mode::Required => Label::Required,
        }
    }
}

impl Label {
    pub fn to_proto(self) -> ProtoLabel {
        match self {
            Label::Optional => ProtoLabel::Optional,
            Label::Required => ProtoLabel::Required,
            Label::Repeated => ProtoLabel::Repeated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: u32,
    pub proto_type: ProtoType,
    pub label: Label,
    /// Name of a nested type of the owning descriptor, for message fields.
    pub type_name: Option<String>,
}

/// Structural description of a message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub nested_types: Vec<Descriptor>,
}

impl Descriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn nested_type(&self, name: &str) -> Option<&Descriptor> {
        self.nested_types.iter().find(|d| d.name == name)
    }

    /// Convert to a `DescriptorProto` with type names relative to the
    /// enclosing message. This is the self-contained form sent as the
    /// writer schema.
    pub fn to_proto(&self) -> DescriptorProto {
        self.build_proto(&|type_name| type_name.to_string())
    }

    /// Convert to a `DescriptorProto` whose message references are fully
    /// qualified under `scope` (e.g. `.bqwrite`), for loading into a
    /// descriptor pool.
    pub(crate) fn to_qualified_proto(&self, scope: &str) -> DescriptorProto {
        let full_name = format!("{}.{}", scope, self.name);
        let mut proto = self.build_proto(&|type_name| format!("{}.{}", full_name, type_name));
        proto.nested_type = self
            .nested_types
            .iter()
            .map(|nested| nested.to_qualified_proto(&full_name))
            .collect();
        proto
    }

    fn build_proto(&self, resolve: &dyn Fn(&str) -> String) -> DescriptorProto {
        let field = self
            .fields
            .iter()
            .map(|f| FieldDescriptorProto {
                name: Some(f.name.clone()),
                number: Some(f.number as i32),
                label: Some(f.label.to_proto() as i32),
                r#type: Some(f.proto_type.to_proto() as i32),
                type_name: f.type_name.as_deref().map(resolve),
                ..Default::default()
            })
            .collect();

        DescriptorProto {
            name: Some(self.name.clone()),
            field,
            nested_type: self.nested_types.iter().map(Descriptor::to_proto).collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_descriptor() -> Descriptor {
        Descriptor {
            name: "Row".into(),
            fields: vec![
                FieldDescriptor {
                    name: "name".into(),
                    number: 1,
                    proto_type: ProtoType::String,
                    label: Label::Optional,
                    type_name: None,
                },
                FieldDescriptor {
                    name: "address".into(),
                    number: 2,
                    proto_type: ProtoType::Message,
                    label: Label::Repeated,
                    type_name: Some("RowAddress".into()),
                },
            ],
            nested_types: vec![Descriptor {
                name: "RowAddress".into(),
                fields: vec![FieldDescriptor {
                    name: "city".into(),
                    number: 1,
                    proto_type: ProtoType::String,
                    label: Label::Required,
                    type_name: None,
                }],
                nested_types: vec![],
            }],
        }
    }

    #[test]
    fn test_to_proto_uses_relative_type_names() {
        let proto = address_descriptor().to_proto();
        assert_eq!(proto.name(), "Row");
        assert_eq!(proto.field.len(), 2);
        assert_eq!(proto.field[0].r#type(), Type::String);
        assert_eq!(proto.field[0].label(), ProtoLabel::Optional);
        assert_eq!(proto.field[1].type_name(), "RowAddress");
        assert_eq!(proto.field[1].label(), ProtoLabel::Repeated);
        assert_eq!(proto.nested_type[0].name(), "RowAddress");
        assert_eq!(proto.nested_type[0].field[0].label(), ProtoLabel::Required);
    }

    #[test]
    fn test_qualified_proto() {
        let proto = address_descriptor().to_qualified_proto(".bqwrite");
        assert_eq!(proto.field[1].type_name(), ".bqwrite.Row.RowAddress");
        assert_eq!(proto.nested_type[0].name(), "RowAddress");
    }

    #[test]
    fn test_lookup() {
        let desc = address_descriptor();
        assert_eq!(desc.field("address").unwrap().number, 2);
        assert!(desc.field("zip").is_none());
        assert!(desc.nested_type("RowAddress").is_some());
    }
}
