//! Intermediate representation handed to the emitters.
//!
//! Nodes serialize with PascalCase keys; that is the context user
//! templates see. Back-references to the owning file are [`FileId`]
//! indices into [`Ast::files`] and are not serialized.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::comments::Comments;
use crate::options::OptionMap;
use crate::types::FieldKind;
use crate::wire::WireKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ast {
    pub files: Vec<File>,
}

impl Ast {
    pub fn file(&self, id: FileId) -> Option<&File> {
        self.files.get(id.0)
    }

    pub fn next_id(&self) -> FileId {
        FileId(self.files.len())
    }

    /// Schema sources followed by files pulled in through `@embed`.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let sources = self.files.iter().map(|f| PathBuf::from(&f.dir).join(&f.source));
        let embedded = self.files.iter().flat_map(|f| f.embedded_files.iter().cloned());
        for path in sources.chain(embedded) {
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
        out
    }
}

/// Names of nested messages that are not emitted (map entries).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ignorables(BTreeSet<String>);

impl Ignorables {
    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct File {
    #[serde(skip)]
    pub id: FileId,
    /// Directory of the compiled input.
    pub dir: String,
    /// Import name of the input relative to `dir`.
    pub source: String,
    /// Lowercase stem used for the primary output.
    pub file_name: String,
    /// Import path from `go_package`.
    pub file_path: String,
    pub package_name: String,
    /// Proto package, e.g. `dashboard.users`.
    pub package: String,
    pub options: OptionMap,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub services: Vec<Service>,
    pub comments: Comments,
    #[serde(skip)]
    pub embedded_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub fields: Vec<Field>,
    pub ignorables: Ignorables,
    pub options: OptionMap,
    /// Base64 of the protojson-encoded DescriptorProto.
    pub descriptor: String,
    #[serde(skip)]
    pub file: FileId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Field {
    /// Exported Go name.
    pub name: String,
    pub proto_name: String,
    pub json_name: String,
    #[serde(rename = "Type")]
    pub ty: String,
    pub base_type: String,
    pub key_base_type: String,
    pub index_base_type: String,
    pub number: u32,
    pub wire: WireKind,
    pub key_wire: Option<WireKind>,
    pub value_wire: Option<WireKind>,
    /// Declared with an explicit `optional`.
    pub optional: bool,
    pub oneof: Option<String>,
    pub tag: String,
    pub struct_tag: String,
    /// Scalar extension values on the field, in struct-tag form.
    pub extension_tags: Vec<String>,
    pub kind: FieldKind,
    pub key_kind: Option<FieldKind>,
    pub value_kind: Option<FieldKind>,
    pub options: OptionMap,
}

impl Field {
    pub fn is_pointer(&self) -> bool {
        self.ty.starts_with('*')
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    pub values: Vec<EnumValue>,
    pub options: OptionMap,
    #[serde(skip)]
    pub file: FileId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub options: OptionMap,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    pub name: String,
    pub full_name: String,
    pub options: OptionMap,
    pub rpcs: Vec<Rpc>,
    /// Template paths from `@generate` directives.
    pub code_generation: Vec<String>,
    #[serde(skip)]
    pub file: FileId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rpc {
    pub name: String,
    pub input: String,
    pub output: String,
    pub input_full_name: String,
    pub output_full_name: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: OptionMap,
    /// Name of the owning service.
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: usize, dir: &str, source: &str, embedded: &[&str]) -> File {
        File {
            id: FileId(id),
            dir: dir.to_string(),
            source: source.to_string(),
            file_name: String::new(),
            file_path: String::new(),
            package_name: String::new(),
            package: String::new(),
            options: OptionMap::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            services: Vec::new(),
            comments: Comments::default(),
            embedded_files: embedded.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn dependencies_are_sources_then_embeds_without_duplicates() {
        let ast = Ast {
            files: vec![
                file(0, "/p/", "a.proto", &["/p/logo.png"]),
                file(1, "/p/", "b.proto", &["/p/logo.png", "/p/key.pem"]),
            ],
        };
        assert_eq!(
            ast.dependencies(),
            vec![
                PathBuf::from("/p/a.proto"),
                PathBuf::from("/p/b.proto"),
                PathBuf::from("/p/logo.png"),
                PathBuf::from("/p/key.pem"),
            ]
        );
    }

    #[test]
    fn serializes_with_pascal_case_keys() {
        let ast = Ast { files: vec![file(0, "/p/", "a.proto", &[])] };
        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(json["Files"][0]["Source"], "a.proto");
        assert!(json["Files"][0].get("EmbeddedFiles").is_none());
        assert!(json["Files"][0].get("Id").is_none());
        assert_eq!(ast.file(FileId(0)).map(|f| f.source.as_str()), Some("a.proto"));
        assert!(ast.file(FileId(1)).is_none());
    }
}
