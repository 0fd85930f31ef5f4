//! Wire tag strings in the protobuf struct-tag layout.
//!
//! A tag is a comma-joined token list in fixed order: wire class, number,
//! cardinality, `packed`, `name=`, `json=`, `proto3`, `enum=`, `oneof`,
//! and `def=`. Commas inside `def=` are not escaped, so it must stay last.

use prost_reflect::{Cardinality as ReflectCardinality, FieldDescriptor, Kind, Syntax, Value};
use serde::Serialize;

use crate::error::LowerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireKind {
    Bool,
    Enum,
    Int32,
    Sint32,
    Uint32,
    Int64,
    Sint64,
    Uint64,
    Sfixed32,
    Fixed32,
    Float,
    Sfixed64,
    Fixed64,
    Double,
    String,
    Bytes,
    Message,
    Group,
}

impl WireKind {
    pub fn of(field: &FieldDescriptor) -> WireKind {
        if field.is_group() {
            return WireKind::Group;
        }
        match field.kind() {
            Kind::Bool => WireKind::Bool,
            Kind::Enum(_) => WireKind::Enum,
            Kind::Int32 => WireKind::Int32,
            Kind::Sint32 => WireKind::Sint32,
            Kind::Uint32 => WireKind::Uint32,
            Kind::Int64 => WireKind::Int64,
            Kind::Sint64 => WireKind::Sint64,
            Kind::Uint64 => WireKind::Uint64,
            Kind::Sfixed32 => WireKind::Sfixed32,
            Kind::Fixed32 => WireKind::Fixed32,
            Kind::Float => WireKind::Float,
            Kind::Sfixed64 => WireKind::Sfixed64,
            Kind::Fixed64 => WireKind::Fixed64,
            Kind::Double => WireKind::Double,
            Kind::String => WireKind::String,
            Kind::Bytes => WireKind::Bytes,
            Kind::Message(_) => WireKind::Message,
        }
    }

    /// Encoding class token that leads the tag.
    pub fn wire_class(self) -> &'static str {
        match self {
            WireKind::Bool
            | WireKind::Enum
            | WireKind::Int32
            | WireKind::Uint32
            | WireKind::Int64
            | WireKind::Uint64 => "varint",
            WireKind::Sint32 => "zigzag32",
            WireKind::Sint64 => "zigzag64",
            WireKind::Sfixed32 | WireKind::Fixed32 | WireKind::Float => "fixed32",
            WireKind::Sfixed64 | WireKind::Fixed64 | WireKind::Double => "fixed64",
            WireKind::String | WireKind::Bytes | WireKind::Message => "bytes",
            WireKind::Group => "group",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireKind::Bool => "bool",
            WireKind::Enum => "enum",
            WireKind::Int32 => "int32",
            WireKind::Sint32 => "sint32",
            WireKind::Uint32 => "uint32",
            WireKind::Int64 => "int64",
            WireKind::Sint64 => "sint64",
            WireKind::Uint64 => "uint64",
            WireKind::Sfixed32 => "sfixed32",
            WireKind::Fixed32 => "fixed32",
            WireKind::Float => "float",
            WireKind::Sfixed64 => "sfixed64",
            WireKind::Fixed64 => "fixed64",
            WireKind::Double => "double",
            WireKind::String => "string",
            WireKind::Bytes => "bytes",
            WireKind::Message => "message",
            WireKind::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

impl Cardinality {
    fn token(self) -> &'static str {
        match self {
            Cardinality::Optional => "opt",
            Cardinality::Required => "req",
            Cardinality::Repeated => "rep",
        }
    }
}

/// Everything the tag depends on, detached from the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireField {
    pub kind: WireKind,
    pub number: u32,
    pub cardinality: Cardinality,
    pub packed: bool,
    pub name: String,
    pub json_name: String,
    pub proto3: bool,
    pub extension: bool,
    pub enum_name: Option<String>,
    pub oneof: bool,
    /// Already in struct-tag format.
    pub default: Option<String>,
}

impl WireField {
    pub fn from_descriptor(field: &FieldDescriptor) -> Result<WireField, LowerError> {
        let kind = WireKind::of(field);
        let name = match (kind, field.kind()) {
            // Group fields are lowercased; the message keeps the spelling.
            (WireKind::Group, Kind::Message(message)) => message.name().to_string(),
            _ => field.name().to_string(),
        };
        let enum_name = match field.kind() {
            Kind::Enum(enum_) => Some(enum_.full_name().to_string()),
            _ => None,
        };
        let default = match &field.field_descriptor_proto().default_value {
            Some(raw) => Some(format_default(raw, &field.kind())?),
            None => None,
        };

        Ok(WireField {
            kind,
            number: field.number(),
            cardinality: match field.cardinality() {
                ReflectCardinality::Optional => Cardinality::Optional,
                ReflectCardinality::Required => Cardinality::Required,
                ReflectCardinality::Repeated => Cardinality::Repeated,
            },
            packed: field.is_packed(),
            name,
            json_name: field.json_name().to_string(),
            proto3: matches!(field.parent_file().syntax(), Syntax::Proto3),
            extension: false,
            enum_name,
            oneof: field.containing_oneof().is_some(),
            default,
        })
    }

    /// The comma-joined tag. `skip_syntax` drops the `proto3` marker, as
    /// done for map key and value tags.
    pub fn tag(&self, skip_syntax: bool) -> String {
        let mut tags: Vec<String> = Vec::with_capacity(10);

        tags.push(self.kind.wire_class().to_string());
        tags.push(self.number.to_string());
        tags.push(self.cardinality.token().to_string());

        if self.packed {
            tags.push("packed".to_string());
        }

        tags.push(format!("name={}", self.name));

        if !self.json_name.is_empty() && self.json_name != self.name && !self.extension {
            tags.push(format!("json={}", self.json_name));
        }

        if !skip_syntax && self.proto3 && !self.extension {
            tags.push("proto3".to_string());
        }

        if let Some(enum_name) = &self.enum_name {
            tags.push(format!("enum={enum_name}"));
        }

        if self.oneof {
            tags.push("oneof".to_string());
        }

        if let Some(default) = &self.default {
            tags.push(format!("def={default}"));
        }

        tags.join(",")
    }
}

/// Full struct tag: `protobuf:"…"`, optional `json:"…"`, and for maps the
/// `protobuf_key:"…"` / `protobuf_val:"…"` pair.
pub fn struct_tag(field: &FieldDescriptor) -> Result<String, LowerError> {
    let mut buf = String::new();

    buf.push_str("protobuf:\"");
    buf.push_str(&WireField::from_descriptor(field)?.tag(false));
    buf.push('"');

    if field.field_descriptor_proto().json_name.is_some() {
        buf.push_str(" json:\"");
        buf.push_str(field.json_name());
        buf.push('"');
    }

    if let (true, Kind::Message(entry)) = (field.is_map(), field.kind()) {
        buf.push_str(" protobuf_key:\"");
        buf.push_str(&WireField::from_descriptor(&entry.map_entry_key_field())?.tag(true));
        buf.push_str("\" protobuf_val:\"");
        buf.push_str(&WireField::from_descriptor(&entry.map_entry_value_field())?.tag(true));
        buf.push('"');
    }

    Ok(buf)
}

/// One `scope.name:"value"` tag per scalar extension set on the field's
/// options. `scope` is the last segment of the extension's parent.
pub fn extension_tags(field: &FieldDescriptor) -> Vec<String> {
    let mut tags = Vec::new();
    for (extension, value) in field.options().extensions() {
        let rendered = match value {
            Value::Bool(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::EnumNumber(v) => v.to_string(),
            _ => continue,
        };
        let full_name = extension.full_name();
        let scope = full_name
            .rsplit_once('.')
            .map(|(parent, _)| parent.rsplit('.').next().unwrap_or(parent))
            .unwrap_or_default();
        tags.push(format!("{scope}.{}:\"{}\"", extension.name(), rendered.replace('"', "\\\"")));
    }
    tags
}

/// Converts a descriptor default (protoc text form) to struct-tag form.
pub fn format_default(raw: &str, kind: &Kind) -> Result<String, LowerError> {
    let malformed = |kind: &'static str| LowerError::Default { value: raw.to_string(), kind };

    match kind {
        Kind::Bool => match raw {
            "true" => Ok("1".to_string()),
            "false" => Ok("0".to_string()),
            _ => Err(malformed("bool")),
        },
        Kind::Enum(enum_) => enum_
            .get_value_by_name(raw)
            .map(|value| value.number().to_string())
            .ok_or_else(|| malformed("enum")),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            raw.parse::<i64>().map(|v| v.to_string()).map_err(|_| malformed("signed integer"))
        }
        Kind::Uint32 | Kind::Fixed32 | Kind::Uint64 | Kind::Fixed64 => {
            raw.parse::<u64>().map(|v| v.to_string()).map_err(|_| malformed("unsigned integer"))
        }
        Kind::Float | Kind::Double => {
            let value = match raw {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                _ => raw.parse::<f64>().map_err(|_| malformed("float"))?,
            };
            Ok(format_float(value, matches!(kind, Kind::Float)))
        }
        Kind::String => Ok(raw.to_string()),
        Kind::Bytes => Ok(marshal_bytes(&unescape(raw))),
        Kind::Message(_) => Err(malformed("message")),
    }
}

/// Shortest `%g` formatting with Go's exponent layout (`1e+06`).
pub fn format_float(value: f64, single: bool) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let sci = if single { format!("{:e}", value as f32) } else { format!("{:e}", value) };
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.trim_start_matches('-').chars().filter(|c| *c != '.').collect();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if digits.bytes().all(|b| b == b'0') {
        out.push('0');
        return out;
    }

    let nd = digits.len() as i32;
    if exp < -4 || exp >= 6 {
        out.push_str(&digits[..1]);
        if nd > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.abs()));
        return out;
    }

    let dp = exp + 1;
    if dp <= 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat((-dp) as usize));
        out.push_str(&digits);
    } else if dp >= nd {
        out.push_str(&digits);
        out.push_str(&"0".repeat((dp - nd) as usize));
    } else {
        out.push_str(&digits[..dp as usize]);
        out.push('.');
        out.push_str(&digits[dp as usize..]);
    }
    out
}

/// Escapes bytes for a struct tag; non-printables become `\ooo`.
pub fn marshal_bytes(bytes: &[u8]) -> String {
    let mut buf = String::with_capacity(bytes.len());
    for &c in bytes {
        match c {
            b'\n' => buf.push_str("\\n"),
            b'\r' => buf.push_str("\\r"),
            b'\t' => buf.push_str("\\t"),
            b'"' => buf.push_str("\\\""),
            b'\'' => buf.push_str("\\'"),
            b'\\' => buf.push_str("\\\\"),
            0x20..=0x7e => buf.push(c as char),
            _ => buf.push_str(&format!("\\{c:03o}")),
        }
    }
    buf
}

/// Reverses protoc's C escaping of bytes defaults.
fn unescape(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        i += 1;
        if c != b'\\' || i >= bytes.len() {
            out.push(c);
            continue;
        }

        let escaped = bytes[i];
        i += 1;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                let mut taken = 1;
                while taken < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(value as u8);
            }
            b'x' | b'X' => {
                let mut value = 0u32;
                let mut taken = 0;
                while taken < 2 && i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                    value = value * 16 + (bytes[i] as char).to_digit(16).unwrap_or(0);
                    i += 1;
                    taken += 1;
                }
                out.push(value as u8);
            }
            other => out.push(other),
        }
    }
    out
}
