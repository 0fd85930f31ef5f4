// Leading comments and `@` directives
//
// Leading comments are keyed by a structural path rendered from the
// numeric SourceCodeInfo path, e.g. `.service[2].method[0].options.7`.
// Fields known to descriptor.proto are named; anything past an unknown
// number (extensions and their payloads) stays numeric.

use std::collections::BTreeMap;
use std::fmt::Write;

use prost_reflect::{Kind, MessageDescriptor, ReflectMessage};
use prost_types::FileDescriptorProto;
use serde::Serialize;

pub const GENERATE: &str = "generate";
pub const EMBED: &str = "embed";

/// An `@name value` line inside a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub value: String,
}

/// Leading comments of one schema file keyed by rendered path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Comments(BTreeMap<String, String>);

impl Comments {
    pub fn extract(file: &FileDescriptorProto) -> Self {
        let mut comments = BTreeMap::new();

        let Some(source_code_info) = &file.source_code_info else {
            return Comments(comments);
        };

        for location in &source_code_info.location {
            let Some(comment) = &location.leading_comments else {
                continue;
            };
            if location.path.is_empty() {
                continue;
            }
            comments.insert(render_path(&location.path), comment.clone());
        }

        Comments(comments)
    }

    pub fn insert(&mut self, path: impl Into<String>, comment: impl Into<String>) {
        self.0.insert(path.into(), comment.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values of every `@name` directive attached to `path`, in order.
    pub fn directive_values(&self, path: &str, name: &str) -> Vec<String> {
        self.get(path)
            .map(|comment| {
                directives(comment)
                    .filter(|d| d.name == name)
                    .map(|d| d.value)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parses the directive lines of a comment. Lines whose first token does
/// not start with `@` are ignored.
pub fn directives(comment: &str) -> impl Iterator<Item = Directive> + '_ {
    comment.lines().filter_map(|line| {
        let line = line.trim();
        let name = line.strip_prefix('@')?;
        let (name, value) = match name.split_once(char::is_whitespace) {
            Some((name, value)) => (name, value.trim()),
            None => (name, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Directive { name: name.to_string(), value: value.to_string() })
    })
}

/// Renders a SourceCodeInfo path against the shape of FileDescriptorProto.
pub fn render_path(path: &[i32]) -> String {
    let mut current: Option<MessageDescriptor> = Some(FileDescriptorProto::default().descriptor());
    let mut out = String::new();
    let mut i = 0;

    while i < path.len() {
        let number = path[i];
        i += 1;

        let field = current
            .as_ref()
            .and_then(|message| u32::try_from(number).ok().and_then(|n| message.get_field(n)));

        let Some(field) = field else {
            let _ = write!(out, ".{number}");
            current = None;
            continue;
        };

        out.push('.');
        out.push_str(field.name());
        if field.is_list() && i < path.len() {
            let _ = write!(out, "[{}]", path[i]);
            i += 1;
        }
        current = match field.kind() {
            Kind::Message(message) => Some(message),
            _ => None,
        };
    }

    out
}
