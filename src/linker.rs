//! Descriptor linking.
//!
//! Parsing and symbol resolution are delegated to `protox`; this module
//! wires the schema resolver into it and collects the warnings we care
//! about (missing `syntax`, unused imports) without blocking the compile.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use prost::Message;
use prost_reflect::{DescriptorPool, FileDescriptor, Kind, MessageDescriptor};
use prost_types::FileDescriptorSet;
use protox::file::{ChainFileResolver, GoogleFileResolver};

use crate::error::{Error, Result};
use crate::resolver::SchemaResolver;

/// `FileDescriptorProto.syntax` field number.
const SYNTAX_FIELD: i32 = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub syntax_missing: BTreeSet<String>,
    pub unused_imports: BTreeMap<String, BTreeSet<String>>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.syntax_missing.is_empty() && self.unused_imports.is_empty()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.syntax_missing.extend(other.syntax_missing);
        for (file, imports) in other.unused_imports {
            self.unused_imports.entry(file).or_default().extend(imports);
        }
    }
}

/// One compiled input and the pool it was linked into.
#[derive(Debug, Clone)]
pub struct LinkedFile {
    pub pool: DescriptorPool,
    pub file: FileDescriptor,
    /// Directory `@embed` paths are resolved against.
    pub dir: PathBuf,
    pub diagnostics: Diagnostics,
}

impl LinkedFile {
    /// Encoded `FileDescriptorSet` of the input and everything it imports.
    pub fn descriptor_set(&self) -> Vec<u8> {
        let set = FileDescriptorSet { file: self.pool.file_descriptor_protos().cloned().collect() };
        set.encode_to_vec()
    }
}

pub fn link(path: &Path, include_dir: &Path) -> Result<LinkedFile> {
    let (resolver, name) = SchemaResolver::for_file(path, include_dir);
    let dir = PathBuf::from(resolver.dir());

    let mut chain = ChainFileResolver::new();
    chain.add(resolver);
    chain.add(GoogleFileResolver::new());

    let mut compiler = protox::Compiler::with_file_resolver(chain);
    compiler.include_source_info(true);
    compiler.open_file(&name)?;

    let pool = compiler.descriptor_pool();
    let file = pool
        .get_file_by_name(&name)
        .ok_or_else(|| Error::MissingFile { file: name.clone() })?;

    let diagnostics = diagnose(&file);
    for missing in &diagnostics.syntax_missing {
        tracing::warn!(file = %missing, "no syntax specified; defaulting to proto2");
    }
    for (file, imports) in &diagnostics.unused_imports {
        for import in imports {
            tracing::warn!(%file, %import, "import is unused");
        }
    }

    Ok(LinkedFile { pool, file, dir, diagnostics })
}

pub fn diagnose(file: &FileDescriptor) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    if syntax_missing(file) {
        diagnostics.syntax_missing.insert(file.name().to_string());
    }
    let unused = unused_imports(file);
    if !unused.is_empty() {
        diagnostics.unused_imports.insert(file.name().to_string(), unused);
    }
    diagnostics
}

fn syntax_missing(file: &FileDescriptor) -> bool {
    let proto = file.file_descriptor_proto();
    let declared = proto.syntax.as_deref().is_some_and(|s| !s.is_empty());
    let located = proto
        .source_code_info
        .as_ref()
        .is_some_and(|info| info.location.iter().any(|l| l.path == [SYNTAX_FIELD]));
    !declared && !located
}

fn unused_imports(file: &FileDescriptor) -> BTreeSet<String> {
    let public: BTreeSet<usize> = file
        .file_descriptor_proto()
        .public_dependency
        .iter()
        .map(|&i| i as usize)
        .collect();

    let mut used = BTreeSet::new();
    collect_option_uses(&file.options(), &mut used);
    for message in file.messages() {
        collect_message_uses(&message, &mut used);
    }
    for extension in file.extensions() {
        used.insert(extension.containing_message().parent_file().name().to_string());
        collect_kind_use(&extension.kind(), &mut used);
    }
    for enum_ in file.enums() {
        collect_option_uses(&enum_.options(), &mut used);
    }
    for service in file.services() {
        collect_option_uses(&service.options(), &mut used);
        for method in service.methods() {
            used.insert(method.input().parent_file().name().to_string());
            used.insert(method.output().parent_file().name().to_string());
            collect_option_uses(&method.options(), &mut used);
        }
    }

    file.dependencies()
        .enumerate()
        .filter(|(i, _)| !public.contains(i))
        .map(|(_, dep)| dep.name().to_string())
        .filter(|name| !used.contains(name))
        .collect()
}

fn collect_message_uses(message: &MessageDescriptor, used: &mut BTreeSet<String>) {
    collect_option_uses(&message.options(), used);
    for field in message.fields() {
        collect_kind_use(&field.kind(), used);
        collect_option_uses(&field.options(), used);
    }
    for extension in message.child_extensions() {
        used.insert(extension.containing_message().parent_file().name().to_string());
        collect_kind_use(&extension.kind(), used);
    }
    for enum_ in message.child_enums() {
        collect_option_uses(&enum_.options(), used);
    }
    for nested in message.child_messages() {
        collect_message_uses(&nested, used);
    }
}

fn collect_kind_use(kind: &Kind, used: &mut BTreeSet<String>) {
    match kind {
        Kind::Message(message) => {
            used.insert(message.parent_file().name().to_string());
        }
        Kind::Enum(enum_) => {
            used.insert(enum_.parent_file().name().to_string());
        }
        _ => {}
    }
}

fn collect_option_uses(options: &prost_reflect::DynamicMessage, used: &mut BTreeSet<String>) {
    for (extension, _) in options.extensions() {
        used.insert(extension.parent_file().name().to_string());
    }
}
