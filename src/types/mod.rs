//! Type tags, their protobuf types and the value converters behind them.

pub mod convert;
mod decimal;
mod registry;

pub use convert::ConvertError;
pub use decimal::{round_decimal, truncate_decimal, DecimalError};
pub use registry::{
    build_converters, build_type_map, passthrough, Converter, ConverterMap, TypeMap, TypeRegistry,
};
