//! Custom option values.
//!
//! Extension values arrive from the linker as dynamic messages. They are
//! first copied into [`RawValue`], a plain tree that still remembers field
//! numbers, and then unwrapped into [`OptionValue`], the shape templates
//! consume: maps keyed by capitalized field names, lists, and scalars.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use prost_reflect::{DynamicMessage, MapKey, Value};
use serde::Serialize;

use crate::comments::{Comments, EMBED, render_path};
use crate::error::EmbedError;
use crate::names::capitalize;

/// Bytes per line in an embedded byte-array literal.
const LITERAL_WIDTH: usize = 16;

pub type OptionMap = BTreeMap<String, OptionValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Source text emitted verbatim, e.g. an embedded byte-array literal.
    Literal(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int64",
            Scalar::Uint(_) => "uint64",
            Scalar::Float(_) => "float64",
            Scalar::String(_) => "string",
            Scalar::Bytes(_) => "[]byte",
            Scalar::Literal(_) => "literal",
        }
    }

    /// Zero value for a name returned by [`Scalar::type_name`].
    pub fn zero(type_name: &str) -> Scalar {
        match type_name {
            "bool" => Scalar::Bool(false),
            "int64" => Scalar::Int(0),
            "uint64" => Scalar::Uint(0),
            "float64" => Scalar::Float(0.0),
            "[]byte" => Scalar::Bytes(Vec::new()),
            "literal" => Scalar::Literal("nil".to_string()),
            _ => Scalar::String(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Scalar(Scalar),
    List(Vec<OptionValue>),
    Map(OptionMap),
}

impl OptionValue {
    pub fn as_map(&self) -> Option<&OptionMap> {
        match self {
            OptionValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            OptionValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }
}

impl From<Scalar> for OptionValue {
    fn from(scalar: Scalar) -> Self {
        OptionValue::Scalar(scalar)
    }
}

/// A set field of a message-typed option value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub number: u32,
    pub name: String,
    pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Scalar(Scalar),
    List(Vec<RawValue>),
    Message(Vec<RawField>),
    Map(BTreeMap<String, RawValue>),
}

impl RawValue {
    pub fn from_reflect(value: &Value) -> RawValue {
        match value {
            Value::Bool(v) => RawValue::Scalar(Scalar::Bool(*v)),
            Value::I32(v) => RawValue::Scalar(Scalar::Int(i64::from(*v))),
            Value::I64(v) => RawValue::Scalar(Scalar::Int(*v)),
            Value::U32(v) => RawValue::Scalar(Scalar::Uint(u64::from(*v))),
            Value::U64(v) => RawValue::Scalar(Scalar::Uint(*v)),
            Value::F32(v) => RawValue::Scalar(Scalar::Float(f64::from(*v))),
            Value::F64(v) => RawValue::Scalar(Scalar::Float(*v)),
            Value::String(v) => RawValue::Scalar(Scalar::String(v.clone())),
            Value::Bytes(v) => RawValue::Scalar(Scalar::Bytes(v.to_vec())),
            Value::EnumNumber(v) => RawValue::Scalar(Scalar::Int(i64::from(*v))),
            Value::Message(message) => RawValue::from_message(message),
            Value::List(values) => RawValue::List(values.iter().map(RawValue::from_reflect).collect()),
            Value::Map(entries) => RawValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| (map_key(key), RawValue::from_reflect(value)))
                    .collect(),
            ),
        }
    }

    pub fn from_message(message: &DynamicMessage) -> RawValue {
        RawValue::Message(
            message
                .fields()
                .map(|(field, value)| RawField {
                    number: field.number(),
                    name: field.name().to_string(),
                    value: RawValue::from_reflect(value),
                })
                .collect(),
        )
    }
}

fn map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

/// Converts raw option values to [`OptionValue`], replacing scalars tagged
/// with `@embed <path>` by the bytes of that file.
pub struct Unwrapper<'a> {
    comments: &'a Comments,
    base_dir: &'a Path,
    embedded: Vec<PathBuf>,
}

impl<'a> Unwrapper<'a> {
    pub fn new(comments: &'a Comments, base_dir: &'a Path) -> Self {
        Unwrapper { comments, base_dir, embedded: Vec::new() }
    }

    /// Files read for `@embed` so far.
    pub fn embedded(&self) -> &[PathBuf] {
        &self.embedded
    }

    pub fn into_embedded(self) -> Vec<PathBuf> {
        self.embedded
    }

    /// Unwraps every extension set on an options message. `path` is the
    /// SourceCodeInfo path of the options field itself.
    pub fn options(&mut self, options: &DynamicMessage, path: &[i32]) -> Result<OptionMap, EmbedError> {
        let mut out = OptionMap::new();
        for (extension, value) in options.extensions() {
            let mut path = path.to_vec();
            path.push(extension.number() as i32);
            let value = self.unwrap(&RawValue::from_reflect(value), &mut path)?;
            out.insert(capitalize(extension.name()), value);
        }
        Ok(out)
    }

    pub fn unwrap(&mut self, value: &RawValue, path: &mut Vec<i32>) -> Result<OptionValue, EmbedError> {
        match value {
            RawValue::Message(fields) => {
                let mut map = OptionMap::new();
                for field in fields {
                    path.push(field.number as i32);
                    let value = self.unwrap(&field.value, path);
                    path.pop();
                    map.insert(capitalize(&field.name), value?);
                }
                Ok(OptionValue::Map(map))
            }
            RawValue::List(values) => {
                let mut list = Vec::with_capacity(values.len());
                for (i, value) in values.iter().enumerate() {
                    path.push(i as i32);
                    let value = self.unwrap(value, path);
                    path.pop();
                    list.push(value?);
                }
                Ok(OptionValue::List(list))
            }
            RawValue::Map(entries) => {
                let mut map = OptionMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.unwrap(value, path)?);
                }
                Ok(OptionValue::Map(map))
            }
            RawValue::Scalar(scalar) => self.scalar(scalar, path),
        }
    }

    fn scalar(&mut self, scalar: &Scalar, path: &[i32]) -> Result<OptionValue, EmbedError> {
        let rendered = render_path(path);
        let Some(relative) = self.comments.directive_values(&rendered, EMBED).into_iter().next() else {
            return Ok(OptionValue::Scalar(scalar.clone()));
        };

        let file = self.base_dir.join(&relative);
        let data = std::fs::read(&file).map_err(|source| EmbedError { path: file.clone(), source })?;
        tracing::debug!(path = %rendered, file = %file.display(), bytes = data.len(), "embedded option value");
        self.embedded.push(file);
        Ok(OptionValue::Scalar(Scalar::Literal(byte_literal(&data))))
    }
}

/// Go `[]byte{...}` literal with 16 bytes per line.
pub fn byte_literal(data: &[u8]) -> String {
    if data.is_empty() {
        return "[]byte{}".to_string();
    }
    let mut out = String::from("[]byte{\n");
    for chunk in data.chunks(LITERAL_WIDTH) {
        out.push('\t');
        let line: Vec<String> = chunk.iter().map(|b| format!("0x{b:02x},")).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out.push('}');
    out
}
