use crate::protobuf::{FactoryError, MessageFactory, RowType};
use crate::schema::{compile_descriptor, ColumnSchema, Descriptor};
use crate::types::TypeRegistry;
use crate::value::Record;

use super::{FillError, Filler, MissingRequired};

/// Everything compiled from one table schema: descriptor, row type and
/// filler. Immutable and shared by every row written through a handle.
#[derive(Debug, Clone)]
pub struct RowEncoder {
    descriptor: Descriptor,
    row_type: RowType,
    filler: Filler,
}

impl RowEncoder {
    pub fn compile(
        columns: &[ColumnSchema],
        registry: &TypeRegistry,
        root_name: &str,
        policy: MissingRequired,
    ) -> Result<Self, FactoryError> {
        let descriptor = compile_descriptor(columns, registry.types(), root_name);
        let row_type = MessageFactory::build(&descriptor)?;
        let filler = Filler::compile_with_policy(columns, registry.converters(), policy);
        Ok(Self {
            descriptor,
            row_type,
            filler,
        })
    }

    /// Allocate an instance, fill it from `record` and serialize it.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>, FillError> {
        let mut message = self.row_type.new_instance();
        self.filler.apply(&mut message, record)?;
        Ok(message.encode_to_vec()?)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn row_type(&self) -> &RowType {
        &self.row_type
    }

    pub fn filler(&self) -> &Filler {
        &self.filler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Mode, ProtoType};
    use crate::value::Value;
    use chrono::{NaiveDate, NaiveTime};
    use prost_reflect::DynamicMessage;

    fn customer() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::nullable("first_name", "STRING"),
            ColumnSchema::nullable("signup", "DATE"),
            ColumnSchema::nullable("alarm", "TIME"),
            ColumnSchema::nullable("balance", "NUMERIC"),
            ColumnSchema::record(
                "addresses",
                Mode::Repeated,
                vec![
                    ColumnSchema::nullable("city", "STRING"),
                    ColumnSchema::repeated("lines", "STRING"),
                ],
            ),
        ]
    }

    #[test]
    fn test_encode_decodes_with_reflection() {
        let encoder = RowEncoder::compile(
            &customer(),
            &TypeRegistry::new(),
            "Row",
            MissingRequired::Convert,
        )
        .unwrap();

        let address = |city: &str, lines: &[&str]| {
            let mut r = Record::new();
            r.insert("city".into(), Value::from(city));
            r.insert(
                "lines".into(),
                Value::List(lines.iter().map(|l| Value::from(*l)).collect()),
            );
            Value::Record(r)
        };
        let mut row = Record::new();
        row.insert("first_name".into(), Value::from("Grace"));
        row.insert(
            "signup".into(),
            NaiveDate::from_ymd_opt(1970, 1, 3).unwrap().into(),
        );
        row.insert(
            "alarm".into(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap().into(),
        );
        row.insert("balance".into(), Value::Decimal("10.50".into()));
        row.insert(
            "addresses".into(),
            Value::List(vec![address("Rome", &["a", "b"]), address("Lima", &[])]),
        );

        let bytes = encoder.encode(&row).unwrap();
        let desc = encoder.row_type().message_descriptor().clone();
        let decoded = DynamicMessage::decode(desc, bytes.as_slice()).unwrap();

        assert_eq!(decoded.get_field_by_name("first_name").unwrap().as_str(), Some("Grace"));
        assert_eq!(decoded.get_field_by_name("signup").unwrap().as_i32(), Some(2));
        assert_eq!(
            decoded.get_field_by_name("alarm").unwrap().as_str(),
            Some("07:30:00.000000")
        );
        assert_eq!(decoded.get_field_by_name("balance").unwrap().as_str(), Some("10.5"));

        let addresses = decoded.get_field_by_name("addresses").unwrap();
        let addresses = addresses.as_list().unwrap();
        assert_eq!(addresses.len(), 2);
        let first = addresses[0].as_message().unwrap();
        assert_eq!(first.get_field_by_name("city").unwrap().as_str(), Some("Rome"));
        assert_eq!(first.get_field_by_name("lines").unwrap().as_list().unwrap().len(), 2);
        let second = addresses[1].as_message().unwrap();
        assert!(second.get_field_by_name("lines").unwrap().as_list().unwrap().is_empty());
    }

    #[test]
    fn test_record_beside_field_named_like_its_type() {
        let columns = vec![
            ColumnSchema::nullable("RowNote", "STRING"),
            ColumnSchema::record(
                "note",
                Mode::Nullable,
                vec![ColumnSchema::nullable("x", "STRING")],
            ),
        ];
        let encoder =
            RowEncoder::compile(&columns, &TypeRegistry::new(), "Row", MissingRequired::Convert)
                .unwrap();

        let mut note = Record::new();
        note.insert("x".into(), Value::from("inner"));
        let mut row = Record::new();
        row.insert("RowNote".into(), Value::from("outer"));
        row.insert("note".into(), Value::Record(note));

        let bytes = encoder.encode(&row).unwrap();
        let desc = encoder.row_type().message_descriptor().clone();
        let decoded = DynamicMessage::decode(desc, bytes.as_slice()).unwrap();
        assert_eq!(decoded.get_field_by_name("RowNote").unwrap().as_str(), Some("outer"));
        let note = decoded.get_field_by_name("note").unwrap();
        let x = note.as_message().unwrap().get_field_by_name("x").unwrap();
        assert_eq!(x.as_str(), Some("inner"));
    }

    #[test]
    fn test_registry_overrides_flow_through() {
        let registry = TypeRegistry::new()
            .with_type("DATE", ProtoType::String)
            .with_converter("DATE", |v: &Value| crate::types::convert::to_string(v));
        let columns = vec![ColumnSchema::nullable("d", "DATE")];
        let encoder =
            RowEncoder::compile(&columns, &registry, "Row", MissingRequired::Convert).unwrap();

        let mut row = Record::new();
        row.insert("d".into(), Value::from("2024-01-01"));
        let bytes = encoder.encode(&row).unwrap();
        assert_eq!(bytes, [&[0x0A, 10][..], &b"2024-01-01"[..]].concat());
    }

    #[test]
    fn test_required_nested_record_is_always_present() {
        let columns = vec![ColumnSchema::record(
            "meta",
            Mode::Required,
            vec![ColumnSchema::nullable("k", "STRING")],
        )];
        let encoder = RowEncoder::compile(
            &columns,
            &TypeRegistry::new(),
            "Row",
            MissingRequired::Convert,
        )
        .unwrap();
        // an empty sub-message: tag for field 1, length 0
        assert_eq!(encoder.encode(&Record::new()).unwrap(), vec![0x0A, 0x00]);
    }

    #[test]
    fn test_custom_root_name() {
        let encoder = RowEncoder::compile(
            &customer(),
            &TypeRegistry::new(),
            "Customer",
            MissingRequired::Convert,
        )
        .unwrap();
        assert_eq!(encoder.row_type().name(), "Customer");
        assert!(encoder.descriptor().nested_type("CustomerAddresses").is_some());
    }
}
