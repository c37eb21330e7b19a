//! Table column schemas and their compilation into protobuf descriptors.

mod column;
mod compiler;
mod descriptor;

pub use column::{ColumnSchema, Mode, TableId, TableIdError};
pub use compiler::{compile_descriptor, nested_type_name, ROOT_MESSAGE_NAME};
pub use descriptor::{Descriptor, FieldDescriptor, Label, ProtoType};
