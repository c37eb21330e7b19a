//! Run-time realization of a compiled `Descriptor` into an instantiable row
//! type.

use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::{DescriptorProto, FileDescriptorProto};
use thiserror::Error;

use super::RowMessage;
use crate::schema::Descriptor;

/// Package every synthesized row type lives in.
pub const PACKAGE: &str = "bqwrite";

/// Name of the synthetic file wrapping the root descriptor.
const FILE_NAME: &str = "bqwrite_row.proto";

/// Errors that can occur while realizing a descriptor.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] prost_reflect::DescriptorError),

    #[error("message type not found: {0}")]
    MessageNotFound(String),
}

/// Builds row types from compiled descriptors.
pub struct MessageFactory;

impl MessageFactory {
    /// Wrap `descriptor` in a single proto2 file under [`PACKAGE`] and load
    /// it into a fresh descriptor pool.
    pub fn build(descriptor: &Descriptor) -> Result<RowType, FactoryError> {
        let scope = format!(".{}", PACKAGE);
        let file = FileDescriptorProto {
            name: Some(FILE_NAME.to_string()),
            package: Some(PACKAGE.to_string()),
            message_type: vec![descriptor.to_qualified_proto(&scope)],
            syntax: Some("proto2".to_string()),
            ..Default::default()
        };

        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_proto(file)?;

        let full_name = format!("{}.{}", PACKAGE, descriptor.name);
        let message = pool
            .get_message_by_name(&full_name)
            .ok_or(FactoryError::MessageNotFound(full_name))?;

        Ok(RowType {
            message,
            proto: descriptor.to_proto(),
        })
    }
}

/// A concrete row type: allocates instances and carries the schema
/// announcement sent with the first append request.
#[derive(Debug, Clone)]
pub struct RowType {
    message: MessageDescriptor,
    proto: DescriptorProto,
}

impl RowType {
    /// Allocate an empty instance.
    pub fn new_instance(&self) -> RowMessage {
        RowMessage::new(self.message.clone())
    }

    pub fn name(&self) -> &str {
        self.message.name()
    }

    pub fn message_descriptor(&self) -> &MessageDescriptor {
        &self.message
    }

    /// Self-contained descriptor with relative nested type names.
    pub fn descriptor_proto(&self) -> &DescriptorProto {
        &self.proto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{compile_descriptor, ColumnSchema, Mode};
    use crate::types::{build_type_map, TypeMap};
    use crate::value::Value;
    use prost_reflect::DynamicMessage;

    fn row_type() -> RowType {
        let columns = vec![
            ColumnSchema::new("id", "INT64"),
            ColumnSchema::nullable("name", "STRING"),
            ColumnSchema::record(
                "address",
                Mode::Repeated,
                vec![ColumnSchema::nullable("city", "STRING")],
            ),
        ];
        let desc = compile_descriptor(&columns, &build_type_map(TypeMap::new()), "Row");
        MessageFactory::build(&desc).unwrap()
    }

    #[test]
    fn test_build_resolves_nested_types() {
        let ty = row_type();
        assert_eq!(ty.name(), "Row");
        assert_eq!(ty.message_descriptor().full_name(), "bqwrite.Row");

        let address = ty.message_descriptor().get_field_by_name("address").unwrap();
        assert!(address.is_list());
        match address.kind() {
            prost_reflect::Kind::Message(m) => assert_eq!(m.full_name(), "bqwrite.Row.RowAddress"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_proto_is_relative() {
        let ty = row_type();
        let proto = ty.descriptor_proto();
        assert_eq!(proto.name(), "Row");
        assert_eq!(proto.field[2].type_name(), "RowAddress");
    }

    #[test]
    fn test_instance_round_trips_through_reflection() {
        let ty = row_type();
        let mut row = ty.new_instance();
        row.set("id", &Value::Int(7)).unwrap();
        row.set("name", &Value::from("ada")).unwrap();
        row.add_message("address")
            .unwrap()
            .set("city", &Value::from("Paris"))
            .unwrap();
        let bytes = row.encode_to_vec().unwrap();

        let decoded =
            DynamicMessage::decode(ty.message_descriptor().clone(), bytes.as_slice()).unwrap();
        assert_eq!(decoded.get_field_by_name("id").unwrap().as_i64(), Some(7));
        assert_eq!(decoded.get_field_by_name("name").unwrap().as_str(), Some("ada"));
        let addresses = decoded.get_field_by_name("address").unwrap();
        let addresses = addresses.as_list().unwrap();
        assert_eq!(addresses.len(), 1);
        let city = addresses[0].as_message().unwrap().get_field_by_name("city").unwrap();
        assert_eq!(city.as_str(), Some("Paris"));
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        let columns = vec![
            ColumnSchema::nullable("a", "STRING"),
            ColumnSchema::nullable("a", "INT64"),
        ];
        let desc = compile_descriptor(&columns, &build_type_map(TypeMap::new()), "Row");
        assert!(matches!(
            MessageFactory::build(&desc),
            Err(FactoryError::Descriptor(_))
        ));
    }
}
