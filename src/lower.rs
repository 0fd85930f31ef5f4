//! Lowering of linked descriptors into the IR.
//!
//! Messages are flattened depth-first into one list. Map-entry messages
//! are recorded in their parent's [`Ignorables`] and skipped when the
//! parent's nested messages are walked. Every option map is unwrapped
//! with the SourceCodeInfo path of its options field so `@embed`
//! directives can be matched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use prost_reflect::{
    EnumDescriptor, FieldDescriptor, FileDescriptor, Kind, MessageDescriptor, MethodDescriptor,
    ReflectMessage, ServiceDescriptor,
};

use crate::comments::{Comments, GENERATE, render_path};
use crate::error::LowerError;
use crate::ir::{Enum, EnumValue, Field, File, FileId, Ignorables, Message, Rpc, Service};
use crate::linker::LinkedFile;
use crate::names::{field_name, file_stem};
use crate::normalize::normalize_service;
use crate::options::Unwrapper;
use crate::types::{go_type, has_optional_keyword};
use crate::wire::{WireField, extension_tags, struct_tag};

// FileDescriptorProto
const MESSAGE_TYPE: i32 = 4;
const ENUM_TYPE: i32 = 5;
const SERVICE: i32 = 6;
const FILE_OPTIONS: i32 = 8;
// DescriptorProto
const FIELD: i32 = 2;
const NESTED_TYPE: i32 = 3;
const NESTED_ENUM: i32 = 4;
const MESSAGE_OPTIONS: i32 = 7;
// FieldDescriptorProto
const FIELD_OPTIONS: i32 = 8;
// EnumDescriptorProto / EnumValueDescriptorProto
const ENUM_VALUE: i32 = 2;
const ENUM_OPTIONS: i32 = 3;
const ENUM_VALUE_OPTIONS: i32 = 3;
// ServiceDescriptorProto / MethodDescriptorProto
const METHOD: i32 = 2;
const SERVICE_OPTIONS: i32 = 3;
const METHOD_OPTIONS: i32 = 4;

/// Splits `go_package` into import path and package name.
///
/// `example.com/users;userspb` names the package explicitly; otherwise the
/// last path segment is used.
pub fn parse_go_package(go_package: &str) -> (String, String) {
    if let Some((path, name)) = go_package.split_once(';') {
        return (path.to_string(), name.to_string());
    }
    let name = go_package.rsplit('/').next().unwrap_or(go_package);
    (go_package.to_string(), name.to_string())
}

pub fn lower_file(linked: &LinkedFile, id: FileId) -> Result<File, LowerError> {
    let descriptor = &linked.file;
    let proto = descriptor.file_descriptor_proto();
    let comments = Comments::extract(proto);

    let go_package = proto
        .options
        .as_ref()
        .and_then(|options| options.go_package.as_deref())
        .unwrap_or_default();
    if go_package.is_empty() {
        tracing::debug!(file = descriptor.name(), "no go_package option");
    }
    let (file_path, package_name) = parse_go_package(go_package);

    let mut lowering = Lowering { comments: &comments, unwrapper: Unwrapper::new(&comments, &linked.dir), id };

    let options = lowering.unwrapper.options(&descriptor.options(), &[FILE_OPTIONS])?;
    let mut messages = Vec::new();
    lowering.messages(descriptor.messages(), &Ignorables::default(), &[], MESSAGE_TYPE, &mut messages)?;
    let enums = lowering.enums(descriptor)?;
    let services = descriptor
        .services()
        .enumerate()
        .map(|(i, service)| lowering.service(&service, i).map_err(|e| e.in_service(service.full_name())))
        .collect::<Result<Vec<_>, _>>()?;

    let embedded_files = lowering.unwrapper.into_embedded();
    tracing::debug!(
        file = descriptor.name(),
        messages = messages.len(),
        enums = enums.len(),
        services = services.len(),
        "lowered file"
    );

    Ok(File {
        id,
        dir: linked.dir.to_string_lossy().into_owned(),
        source: descriptor.name().to_string(),
        file_name: file_stem(descriptor.name()),
        file_path,
        package_name,
        package: descriptor.package_name().to_string(),
        options,
        messages,
        enums,
        services,
        comments,
        embedded_files,
    })
}

struct Lowering<'a> {
    comments: &'a Comments,
    unwrapper: Unwrapper<'a>,
    id: FileId,
}

fn child(path: &[i32], field: i32, index: usize) -> Vec<i32> {
    let mut path = path.to_vec();
    path.push(field);
    path.push(index as i32);
    path
}

fn with(path: &[i32], field: i32) -> Vec<i32> {
    let mut path = path.to_vec();
    path.push(field);
    path
}

impl Lowering<'_> {
    fn messages(
        &mut self,
        messages: impl Iterator<Item = MessageDescriptor>,
        ignore: &Ignorables,
        parent: &[i32],
        field: i32,
        out: &mut Vec<Message>,
    ) -> Result<(), LowerError> {
        for (i, message) in messages.enumerate() {
            if ignore.contains(message.name()) {
                continue;
            }
            let path = child(parent, field, i);
            let lowered = self.message(&message, &path).map_err(|e| e.in_message(message.full_name()))?;
            let ignorables = lowered.ignorables.clone();
            out.push(lowered);
            self.messages(message.child_messages(), &ignorables, &path, NESTED_TYPE, out)?;
        }
        Ok(())
    }

    fn message(&mut self, message: &MessageDescriptor, path: &[i32]) -> Result<Message, LowerError> {
        let mut ignorables = Ignorables::default();
        let mut fields = Vec::new();

        for (i, field) in message.fields().enumerate() {
            if let (true, Kind::Message(entry)) = (field.is_map(), field.kind()) {
                ignorables.insert(entry.name());
            }
            let lowered = self
                .field(&field, &child(path, FIELD, i))
                .map_err(|e| e.in_field(field.name()))?;
            fields.push(lowered);
        }

        let options = self.unwrapper.options(&message.options(), &with(path, MESSAGE_OPTIONS))?;
        let json = serde_json::to_vec(&message.descriptor_proto().transcode_to_dynamic())?;

        Ok(Message {
            name: message.name().to_string(),
            full_name: message.full_name().to_string(),
            fields,
            ignorables,
            options,
            descriptor: STANDARD.encode(json),
            file: self.id,
        })
    }

    fn field(&mut self, field: &FieldDescriptor, path: &[i32]) -> Result<Field, LowerError> {
        let go = go_type(field);
        let wire = WireField::from_descriptor(field)?;

        Ok(Field {
            name: field_name(field.name()),
            proto_name: field.name().to_string(),
            json_name: field.json_name().to_string(),
            ty: go.full,
            base_type: go.base,
            key_base_type: go.key_base,
            index_base_type: go.value_base,
            number: field.number(),
            wire: wire.kind,
            key_wire: go.key_wire,
            value_wire: go.value_wire,
            optional: has_optional_keyword(field),
            oneof: field.containing_oneof().map(|oneof| oneof.name().to_string()),
            tag: wire.tag(false),
            struct_tag: struct_tag(field)?,
            extension_tags: extension_tags(field),
            kind: go.kind,
            key_kind: go.key_kind,
            value_kind: go.value_kind,
            options: self.unwrapper.options(&field.options(), &with(path, FIELD_OPTIONS))?,
        })
    }

    /// Top-level enums followed by enums nested in emitted messages.
    fn enums(&mut self, file: &FileDescriptor) -> Result<Vec<Enum>, LowerError> {
        let mut out = Vec::new();
        for (i, enum_) in file.enums().enumerate() {
            let lowered = self
                .enum_(&enum_, &child(&[], ENUM_TYPE, i))
                .map_err(|e| e.in_enum(enum_.full_name()))?;
            out.push(lowered);
        }
        self.nested_enums(file.messages(), &Ignorables::default(), &[], MESSAGE_TYPE, &mut out)?;
        Ok(out)
    }

    fn nested_enums(
        &mut self,
        messages: impl Iterator<Item = MessageDescriptor>,
        ignore: &Ignorables,
        parent: &[i32],
        field: i32,
        out: &mut Vec<Enum>,
    ) -> Result<(), LowerError> {
        for (i, message) in messages.enumerate() {
            if ignore.contains(message.name()) {
                continue;
            }
            let path = child(parent, field, i);
            for (j, enum_) in message.child_enums().enumerate() {
                let lowered = self
                    .enum_(&enum_, &child(&path, NESTED_ENUM, j))
                    .map_err(|e| e.in_enum(enum_.full_name()))?;
                out.push(lowered);
            }

            let mut ignorables = Ignorables::default();
            for field in message.fields() {
                if let (true, Kind::Message(entry)) = (field.is_map(), field.kind()) {
                    ignorables.insert(entry.name());
                }
            }
            self.nested_enums(message.child_messages(), &ignorables, &path, NESTED_TYPE, out)?;
        }
        Ok(())
    }

    fn enum_(&mut self, enum_: &EnumDescriptor, path: &[i32]) -> Result<Enum, LowerError> {
        let mut values = Vec::new();
        for (i, value) in enum_.values().enumerate() {
            let value_path = child(path, ENUM_VALUE, i);
            values.push(EnumValue {
                name: value.name().to_string(),
                number: value.number(),
                options: self.unwrapper.options(&value.options(), &with(&value_path, ENUM_VALUE_OPTIONS))?,
            });
        }

        Ok(Enum {
            name: enum_.name().to_string(),
            full_name: enum_.full_name().to_string(),
            values,
            options: self.unwrapper.options(&enum_.options(), &with(path, ENUM_OPTIONS))?,
            file: self.id,
        })
    }

    fn service(&mut self, service: &ServiceDescriptor, index: usize) -> Result<Service, LowerError> {
        let path = child(&[], SERVICE, index);

        let mut rpcs = Vec::new();
        for (i, method) in service.methods().enumerate() {
            let rpc = self
                .rpc(service, &method, &child(&path, METHOD, i))
                .map_err(|e| e.in_rpc(method.name()))?;
            rpcs.push(rpc);
        }

        let mut lowered = Service {
            name: service.name().to_string(),
            full_name: service.full_name().to_string(),
            options: self.unwrapper.options(&service.options(), &with(&path, SERVICE_OPTIONS))?,
            rpcs,
            code_generation: self.comments.directive_values(&render_path(&path), GENERATE),
            file: self.id,
        };
        normalize_service(&mut lowered);
        Ok(lowered)
    }

    fn rpc(
        &mut self,
        service: &ServiceDescriptor,
        method: &MethodDescriptor,
        path: &[i32],
    ) -> Result<Rpc, LowerError> {
        let input = method.input();
        let output = method.output();
        Ok(Rpc {
            name: method.name().to_string(),
            input: input.name().to_string(),
            output: output.name().to_string(),
            input_full_name: input.full_name().to_string(),
            output_full_name: output.full_name().to_string(),
            client_streaming: method.is_client_streaming(),
            server_streaming: method.is_server_streaming(),
            options: self.unwrapper.options(&method.options(), &with(path, METHOD_OPTIONS))?,
            service: service.name().to_string(),
        })
    }
}
