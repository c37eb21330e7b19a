//! Column schema to descriptor compilation.

use std::collections::HashSet;

use crate::types::TypeMap;

use super::{ColumnSchema, Descriptor, FieldDescriptor, Label, ProtoType};

/// Name of the root message when the caller does not pick one.
pub const ROOT_MESSAGE_NAME: &str = "Row";

/// Compile an ordered column schema into a message descriptor.
///
/// Field numbers are assigned `1..=N` in column order at every level. Tags
/// missing from `types` are encoded as strings. Structured columns become
/// nested types named by [`nested_type_name`]; a name that collides with a
/// sibling field or nested type gets a `_2`, `_3`, ... suffix.
pub fn compile_descriptor(columns: &[ColumnSchema], types: &TypeMap, name: &str) -> Descriptor {
    let mut fields = Vec::with_capacity(columns.len());
    let mut nested_types = Vec::new();
    // Nested types share a scope with the fields of the enclosing message.
    let mut taken: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();

    for (idx, column) in columns.iter().enumerate() {
        let number = idx as u32 + 1;
        let label = Label::from(column.mode);

        if column.is_structured() {
            let type_name = unique_name(nested_type_name(name, &column.name), &mut taken);
            nested_types.push(compile_descriptor(&column.fields, types, &type_name));
            fields.push(FieldDescriptor {
                name: column.name.clone(),
                number,
                proto_type: ProtoType::Message,
                label,
                type_name: Some(type_name),
            });
        } else {
            let proto_type = types
                .get(&column.field_type)
                .copied()
                .unwrap_or(ProtoType::String);
            fields.push(FieldDescriptor {
                name: column.name.clone(),
                number,
                proto_type,
                label,
                type_name: None,
            });
        }
    }

    Descriptor {
        name: name.to_string(),
        fields,
        nested_types,
    }
}

/// Name of the nested type synthesized for `column` inside `parent`.
///
/// `("Row", "home_address")` gives `"RowHome_Address"`.
pub fn nested_type_name(parent: &str, column: &str) -> String {
    format!("{}{}", parent, title_case(column))
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
