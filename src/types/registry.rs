//! Logical type tag registry: tag → (protobuf type, converter).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::convert::{self, ConvertError};
use crate::schema::ProtoType;
use crate::value::Value;

/// Converts a source value into a value assignable to the column's field.
pub type Converter = Arc<dyn Fn(&Value) -> Result<Value, ConvertError> + Send + Sync>;

pub type TypeMap = HashMap<String, ProtoType>;
pub type ConverterMap = HashMap<String, Converter>;

fn builtin_types() -> TypeMap {
    [
        ("STRING", ProtoType::String),
        ("BYTES", ProtoType::Bytes),
        ("INTEGER", ProtoType::Int64),
        ("INT64", ProtoType::Int64),
        ("FLOAT", ProtoType::Double),
        ("FLOAT64", ProtoType::Double),
        ("BOOLEAN", ProtoType::Bool),
        ("BOOL", ProtoType::Bool),
        ("RECORD", ProtoType::Message),
        ("STRUCT", ProtoType::Message),
        ("TIME", ProtoType::String),
        ("DATETIME", ProtoType::String),
        ("DATE", ProtoType::Int32),
        ("GEOGRAPHY", ProtoType::String),
        ("JSON", ProtoType::String),
        ("TIMESTAMP", ProtoType::Int64),
        ("NUMERIC", ProtoType::String),
        ("BIGNUMERIC", ProtoType::String),
    ]
    .into_iter()
    .map(|(tag, ty)| (tag.to_string(), ty))
    .collect()
}

fn builtin_converters() -> ConverterMap {
    let table: [(&str, fn(&Value) -> Result<Value, ConvertError>); 15] = [
        ("STRING", convert::to_string),
        ("BOOL", convert::to_bool),
        ("BOOLEAN", convert::to_bool),
        ("INTEGER", convert::to_int64),
        ("INT64", convert::to_int64),
        ("FLOAT", convert::to_float64),
        ("FLOAT64", convert::to_float64),
        ("TIME", convert::to_time),
        ("DATETIME", convert::to_datetime),
        ("DATE", convert::to_date),
        ("TIMESTAMP", convert::to_timestamp),
        ("JSON", convert::to_json),
        ("GEOGRAPHY", convert::to_string),
        ("NUMERIC", convert::to_numeric),
        ("BIGNUMERIC", convert::to_bignumeric),
    ];
    table
        .into_iter()
        .map(|(tag, f)| (tag.to_string(), Arc::new(f) as Converter))
        .collect()
}

/// Built-in tag → protobuf type table merged with `overrides`.
///
/// A fresh table is built on every call; overrides win on collision.
pub fn build_type_map<I, K>(overrides: I) -> TypeMap
where
    I: IntoIterator<Item = (K, ProtoType)>,
    K: Into<String>,
{
    let mut types = builtin_types();
    types.extend(overrides.into_iter().map(|(k, v)| (k.into(), v)));
    types
}

/// Built-in tag → converter table merged with `overrides`.
///
/// A fresh table is built on every call; overrides win on collision.
pub fn build_converters<I, K>(overrides: I) -> ConverterMap
where
    I: IntoIterator<Item = (K, Converter)>,
    K: Into<String>,
{
    let mut converters = builtin_converters();
    converters.extend(overrides.into_iter().map(|(k, v)| (k.into(), v)));
    converters
}

/// Converter used for tags without an entry: returns the value unchanged.
pub fn passthrough() -> Converter {
    Arc::new(convert::passthrough)
}

/// Both tables, ready to hand to the schema and row encoder compilers.
#[derive(Clone)]
pub struct TypeRegistry {
    types: TypeMap,
    converters: ConverterMap,
}

impl TypeRegistry {
    /// The built-in tables.
    pub fn new() -> Self {
        Self {
            types: build_type_map(TypeMap::new()),
            converters: build_converters(ConverterMap::new()),
        }
    }

    /// Override the protobuf type of a tag.
    pub fn with_type(mut self, tag: impl AsRef<str>, ty: ProtoType) -> Self {
        self.types.insert(tag.as_ref().to_ascii_uppercase(), ty);
        self
    }

    /// Override the converter of a tag.
    pub fn with_converter<F>(mut self, tag: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    {
        self.converters
            .insert(tag.as_ref().to_ascii_uppercase(), Arc::new(f));
        self
    }

    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    pub fn converters(&self) -> &ConverterMap {
        &self.converters
    }

    /// Protobuf type for a tag; unknown tags are strings.
    pub fn proto_type(&self, tag: &str) -> ProtoType {
        self.types.get(tag).copied().unwrap_or(ProtoType::String)
    }

    /// Converter for a tag; unknown tags pass values through.
    pub fn converter(&self, tag: &str) -> Converter {
        self.converters.get(tag).cloned().unwrap_or_else(passthrough)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converters: Vec<&String> = self.converters.keys().collect();
        converters.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &self.types)
            .field("converters", &converters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let types = build_type_map(TypeMap::new());
        assert_eq!(types["INTEGER"], ProtoType::Int64);
        assert_eq!(types["DATE"], ProtoType::Int32);
        assert_eq!(types["TIMESTAMP"], ProtoType::Int64);
        assert_eq!(types["BIGNUMERIC"], ProtoType::String);
        assert_eq!(types["RECORD"], ProtoType::Message);
    }

    #[test]
    fn test_type_override_wins() {
        let types = build_type_map([("TIMESTAMP", ProtoType::String), ("UUID", ProtoType::Bytes)]);
        assert_eq!(types["TIMESTAMP"], ProtoType::String);
        assert_eq!(types["UUID"], ProtoType::Bytes);
        assert_eq!(types["STRING"], ProtoType::String);
    }

    #[test]
    fn test_tables_are_fresh_per_call() {
        let mut first = build_type_map(TypeMap::new());
        first.insert("DATE".to_string(), ProtoType::String);
        let second = build_type_map(TypeMap::new());
        assert_eq!(second["DATE"], ProtoType::Int32);
    }

    #[test]
    fn test_converter_override_wins() {
        let upper: Converter = Arc::new(|v: &Value| match v {
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            _ => Err(ConvertError::Custom("expected string".into())),
        });
        let converters = build_converters([("STRING", upper)]);
        let out = (converters["STRING"])(&Value::from("abc")).unwrap();
        assert_eq!(out, Value::from("ABC"));
        // Untouched entries keep their built-in behaviour
        assert_eq!((converters["INT64"])(&Value::from("7")).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_registry_fallbacks() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.proto_type("RANGE"), ProtoType::String);
        let v = Value::Int(3);
        // BYTES has no built-in converter
        assert_eq!((registry.converter("BYTES"))(&v).unwrap(), v);
    }

    #[test]
    fn test_registry_builders() {
        let registry = TypeRegistry::new()
            .with_type("date", ProtoType::String)
            .with_converter("date", |_: &Value| Ok(Value::from("fixed")));
        assert_eq!(registry.proto_type("DATE"), ProtoType::String);
        assert_eq!(
            (registry.converter("DATE"))(&Value::Null).unwrap(),
            Value::from("fixed")
        );
    }
}
