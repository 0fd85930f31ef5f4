// Go type mapping for proto fields.

use prost_reflect::{Cardinality, FieldDescriptor, Kind, Syntax};
use serde::Serialize;

use crate::wire::WireKind;

/// Reflection class of a field; selects the encode/decode templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Scalar,
    Map,
    List,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoType {
    /// Declared type including `*`, `[]` or `map[..]` decoration.
    pub full: String,
    /// Undecorated element type; the value type for maps.
    pub base: String,
    pub key_base: String,
    pub value_base: String,
    pub kind: FieldKind,
    pub key_kind: Option<FieldKind>,
    pub value_kind: Option<FieldKind>,
    pub key_wire: Option<WireKind>,
    pub value_wire: Option<WireKind>,
}

/// proto2 `optional` outside a oneof, or proto3 `optional`.
pub fn has_optional_keyword(field: &FieldDescriptor) -> bool {
    if field.field_descriptor_proto().proto3_optional == Some(true) {
        return true;
    }
    matches!(field.parent_file().syntax(), Syntax::Proto2)
        && field.cardinality() == Cardinality::Optional
        && field.containing_oneof().is_none()
}

/// Undecorated Go type of a single value of `field`.
pub fn base_type(field: &FieldDescriptor) -> String {
    match (WireKind::of(field), field.kind()) {
        (WireKind::Group, _) => "interface{}".to_string(),
        (_, Kind::Message(message)) => message.name().to_string(),
        (_, Kind::Enum(enum_)) => enum_.name().to_string(),
        (wire, _) => scalar_base(wire).to_string(),
    }
}

pub fn scalar_base(wire: WireKind) -> &'static str {
    match wire {
        WireKind::Bool => "bool",
        WireKind::Int32 | WireKind::Sint32 | WireKind::Sfixed32 | WireKind::Fixed32 => "int",
        WireKind::Uint32 => "uint",
        WireKind::Int64 | WireKind::Sint64 | WireKind::Sfixed64 | WireKind::Fixed64 => "int64",
        WireKind::Uint64 => "uint64",
        WireKind::Float => "float32",
        WireKind::Double => "float64",
        WireKind::String => "string",
        WireKind::Bytes => "[]byte",
        WireKind::Group => "interface{}",
        WireKind::Enum | WireKind::Message => "",
    }
}

/// Applies `*` and `[]` decoration to a base type.
pub fn decorate(base: &str, wire: WireKind, optional: bool, repeated: bool) -> String {
    match wire {
        WireKind::Group => base.to_string(),
        WireKind::Message if repeated => format!("[]*{base}"),
        WireKind::Message => format!("*{base}"),
        _ if repeated => format!("[]{base}"),
        // A nil slice already records absence.
        WireKind::Bytes => base.to_string(),
        _ if optional => format!("*{base}"),
        _ => base.to_string(),
    }
}

fn value_kind(wire: WireKind) -> FieldKind {
    match wire {
        WireKind::Message => FieldKind::Struct,
        _ => FieldKind::Scalar,
    }
}

pub fn go_type(field: &FieldDescriptor) -> GoType {
    let wire = WireKind::of(field);

    if let (true, Kind::Message(entry)) = (field.is_map(), field.kind()) {
        let key = entry.map_entry_key_field();
        let value = entry.map_entry_value_field();
        let key_wire = WireKind::of(&key);
        let value_wire = WireKind::of(&value);
        let key_base = base_type(&key);
        let value_base = base_type(&value);
        let value_full = decorate(&value_base, value_wire, false, false);

        return GoType {
            full: format!("map[{key_base}]{value_full}"),
            base: value_base.clone(),
            key_base,
            value_base,
            kind: FieldKind::Map,
            key_kind: Some(FieldKind::Scalar),
            value_kind: Some(value_kind(value_wire)),
            key_wire: Some(key_wire),
            value_wire: Some(value_wire),
        };
    }

    let base = base_type(field);
    let repeated = field.is_list();
    let full = decorate(&base, wire, has_optional_keyword(field), repeated);

    let kind = if repeated {
        FieldKind::List
    } else if wire == WireKind::Message {
        FieldKind::Struct
    } else {
        FieldKind::Scalar
    };

    GoType {
        full,
        base,
        key_base: String::new(),
        value_base: String::new(),
        kind,
        key_kind: None,
        value_kind: repeated.then(|| value_kind(wire)),
        key_wire: None,
        value_wire: repeated.then_some(wire),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_family_mapping() {
        assert_eq!(scalar_base(WireKind::Sfixed32), "int");
        assert_eq!(scalar_base(WireKind::Uint32), "uint");
        assert_eq!(scalar_base(WireKind::Fixed64), "int64");
        assert_eq!(scalar_base(WireKind::Float), "float32");
        assert_eq!(scalar_base(WireKind::Double), "float64");
        assert_eq!(scalar_base(WireKind::Bytes), "[]byte");
    }

    #[test]
    fn decoration() {
        assert_eq!(decorate("int64", WireKind::Int64, true, false), "*int64");
        assert_eq!(decorate("string", WireKind::String, false, true), "[]string");
        assert_eq!(decorate("User", WireKind::Message, false, false), "*User");
        assert_eq!(decorate("User", WireKind::Message, false, true), "[]*User");
        assert_eq!(decorate("[]byte", WireKind::Bytes, true, false), "[]byte");
        assert_eq!(decorate("[]byte", WireKind::Bytes, false, true), "[][]byte");
        assert_eq!(decorate("interface{}", WireKind::Group, true, true), "interface{}");
        assert_eq!(decorate("Status", WireKind::Enum, false, false), "Status");
    }
}
