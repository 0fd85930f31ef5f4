// Go source templates.
//
// Each method below is one named template. Nested templates write into
// the caller's buffer; a failure is reported under the name of the
// template that produced it.

use std::collections::BTreeSet;

use super::{TemplateName, Writer};
use crate::error::TemplateError;
use crate::ir::{Enum, Field, File, Message, Rpc, Service};
use crate::names::{exported, sanitize_local};
use crate::types::FieldKind;
use crate::wire::WireKind;

const HEADER: &str = "// Code generated by protov. DO NOT EDIT.";

/// Runtime codec entry points for a scalar wire kind, and the Go type the
/// encoder takes when it is not the field's own type.
struct Codec {
    encoder: &'static str,
    decoder: &'static str,
    cast: Option<&'static str>,
}

fn codec(wire: WireKind) -> Option<Codec> {
    let (encoder, decoder, cast) = match wire {
        WireKind::Bool => ("BoolEncoder", "BoolDecoder", None),
        WireKind::Enum
        | WireKind::Int32
        | WireKind::Sint32
        | WireKind::Sfixed32
        | WireKind::Int64
        | WireKind::Sint64
        | WireKind::Sfixed64 => ("SignedNumberEncoder", "SignedNumberDecoder", Some("int64")),
        WireKind::Uint32 | WireKind::Uint64 | WireKind::Fixed32 | WireKind::Fixed64 => {
            ("UnsignedNumberEncoder", "UnsignedNumberDecoder", Some("uint64"))
        }
        WireKind::Float => ("Float32Encoder", "Float32Decoder", None),
        WireKind::Double => ("Float64Encoder", "Float64Decoder", None),
        WireKind::String => ("StringEncoder", "StringDecoder", None),
        WireKind::Bytes => ("BytesEncoder", "BytesDecoder", None),
        WireKind::Message | WireKind::Group => return None,
    };
    Some(Codec { encoder, decoder, cast })
}

pub struct GoEmitter {
    runtime_import: String,
    /// Package identifier of the runtime import.
    rt: String,
}

impl GoEmitter {
    pub fn new(runtime_import: &str) -> Self {
        let rt = runtime_import.rsplit('/').next().unwrap_or(runtime_import).replace(['-', '.'], "_");
        GoEmitter { runtime_import: runtime_import.to_string(), rt }
    }

    pub fn render_file(&self, file: &File) -> Result<Vec<u8>, TemplateError> {
        let mut out = String::new();
        self.file(&mut out, file)?;
        Ok(out.into_bytes())
    }

    fn file(&self, out: &mut String, file: &File) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::File);

        emit!(w, "{HEADER}");
        emit!(w, "// source: {}", file.source);
        emit!(w);
        emit!(w, "package {}", package_name(file));

        let mut std_imports = BTreeSet::new();
        if !file.messages.is_empty() {
            std_imports.insert("bytes");
            std_imports.insert("fmt");
        }
        if !file.enums.is_empty() {
            std_imports.insert("strconv");
        }
        if !file.services.is_empty() {
            std_imports.insert("context");
        }
        let runtime = !file.messages.is_empty();

        if !std_imports.is_empty() || runtime {
            emit!(w);
            emit!(w, "import (");
            for import in &std_imports {
                emit!(w, "\t\"{import}\"");
            }
            if runtime {
                if !std_imports.is_empty() {
                    emit!(w);
                }
                emit!(w, "\t\"{}\"", self.runtime_import);
            }
            emit!(w, ")");
        }

        for enum_ in &file.enums {
            self.enum_(w.buf(), enum_)?;
        }
        for message in &file.messages {
            self.message(w.buf(), message)?;
        }
        for service in &file.services {
            self.service(w.buf(), service)?;
        }
        Ok(())
    }

    fn enum_(&self, out: &mut String, enum_: &Enum) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::Enum);
        let name = &enum_.name;

        emit!(w);
        emit!(w, "type {name} int32");
        emit!(w);
        emit!(w, "const (");
        for value in &enum_.values {
            emit!(w, "\t{name}_{} {name} = {}", value.name, value.number);
        }
        emit!(w, ")");

        // Aliased numbers keep their first name.
        let mut seen = BTreeSet::new();
        emit!(w);
        emit!(w, "var {name}_name = map[int32]string{{");
        for value in &enum_.values {
            if seen.insert(value.number) {
                emit!(w, "\t{}: \"{}\",", value.number, value.name);
            }
        }
        emit!(w, "}}");
        emit!(w);
        emit!(w, "var {name}_value = map[string]int32{{");
        for value in &enum_.values {
            emit!(w, "\t\"{}\": {},", value.name, value.number);
        }
        emit!(w, "}}");
        emit!(w);
        emit!(w, "func (x {name}) String() string {{");
        emit!(w, "\tif name, ok := {name}_name[int32(x)]; ok {{");
        emit!(w, "\t\treturn name");
        emit!(w, "\t}}");
        emit!(w, "\treturn strconv.Itoa(int(x))");
        emit!(w, "}}");
        Ok(())
    }

    fn message(&self, out: &mut String, message: &Message) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::Message);
        let name = &message.name;
        let rt = &self.rt;

        emit!(w);
        emit!(w, "type {name} struct {{");
        for field in &message.fields {
            let mut tag = field.struct_tag.clone();
            for extra in &field.extension_tags {
                tag.push(' ');
                tag.push_str(extra);
            }
            emit!(w, "\t{} {} `{}`", field.name, field.ty, tag);
        }
        emit!(w, "}}");

        emit!(w);
        emit!(w, "func (x *{name}) New() {rt}.Reflected {{");
        emit!(w, "\treturn new({name})");
        emit!(w, "}}");
        emit!(w);
        emit!(w, "func (x *{name}) Type() {rt}.Type {{");
        emit!(w, "\treturn *{rt}.CaptureTypeByName(\"{}\")", message.full_name);
        emit!(w, "}}");
        emit!(w);
        emit!(w, "func (x *{name}) Descriptor() string {{");
        emit!(w, "\treturn \"{}\"", message.descriptor);
        emit!(w, "}}");

        emit!(w);
        emit!(w, "func (x *{name}) Encode(field *{rt}.Field, buffer *bytes.Buffer) error {{");
        emit!(w, "\tswitch field.Tags.Protobuf.FieldNum {{");
        for field in &message.fields {
            emit!(w, "\tcase {}:", field.number);
            self.encode(w.buf(), field)?;
        }
        emit!(w, "\tdefault:");
        emit!(w, "\t\treturn fmt.Errorf(\"invalid field %d\", field.Tags.Protobuf.FieldNum)");
        emit!(w, "\t}}");
        emit!(w, "}}");

        emit!(w);
        emit!(w, "func (x *{name}) Decode(field *{rt}.Field, buffer *bytes.Buffer) error {{");
        emit!(w, "\tswitch field.Tags.Protobuf.FieldNum {{");
        for field in &message.fields {
            emit!(w, "\tcase {}:", field.number);
            self.decode(w.buf(), field)?;
        }
        emit!(w, "\tdefault:");
        emit!(w, "\t\treturn fmt.Errorf(\"invalid field %d\", field.Tags.Protobuf.FieldNum)");
        emit!(w, "\t}}");
        emit!(w, "}}");

        emit!(w);
        emit!(w, "func (x *{name}) IsZero(field *{rt}.Field) bool {{");
        emit!(w, "\tswitch field.Tags.Protobuf.FieldNum {{");
        for field in &message.fields {
            emit!(w, "\tcase {}:", field.number);
            self.is_zero(w.buf(), field)?;
        }
        emit!(w, "\tdefault:");
        emit!(w, "\t\treturn true");
        emit!(w, "\t}}");
        emit!(w, "}}");
        Ok(())
    }

    fn encode(&self, out: &mut String, field: &Field) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::encode(field.kind));
        let rt = &self.rt;
        let target = format!("x.{}", field.name);

        match field.kind {
            FieldKind::Scalar => {
                let Some(codec) = codec(field.wire) else {
                    emit!(
                        w,
                        "\t\treturn fmt.Errorf(\"field %d: {} fields are not supported\", field.Tags.Protobuf.FieldNum)",
                        field.wire.name()
                    );
                    return Ok(());
                };
                let value = if field.is_pointer() {
                    emit!(w, "\t\tif {target} == nil {{");
                    emit!(w, "\t\t\treturn nil");
                    emit!(w, "\t\t}}");
                    format!("*{target}")
                } else {
                    target
                };
                let arg = match codec.cast {
                    Some(cast) => format!("{cast}({value})"),
                    None => value,
                };
                emit!(w, "\t\tdata, err := {rt}.{}({arg}, field)", codec.encoder);
                emit!(w, "\t\tif err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\tdefer {rt}.Dealloc(data)");
                emit!(w, "\t\t_, err = data.WriteTo(buffer)");
                emit!(w, "\t\treturn err");
            }
            FieldKind::Struct => {
                emit!(w, "\t\tif {target} == nil {{");
                emit!(w, "\t\t\treturn nil");
                emit!(w, "\t\t}}");
                emit!(w, "\t\tdata, err := {rt}.FastMarshal({target})");
                emit!(w, "\t\tif err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\t_, err = buffer.Write(data)");
                emit!(w, "\t\treturn err");
            }
            FieldKind::Map => {
                emit!(w, "\t\treturn {rt}.MapEncoder({target}, field, buffer)");
            }
            FieldKind::List => {
                emit!(w, "\t\treturn {rt}.RepeatedEncoder({target}, field, buffer)");
            }
        }
        Ok(())
    }

    fn decode(&self, out: &mut String, field: &Field) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::decode(field.kind));
        let rt = &self.rt;
        let target = format!("x.{}", field.name);

        match field.kind {
            FieldKind::Scalar => {
                let Some(codec) = codec(field.wire) else {
                    emit!(
                        w,
                        "\t\treturn fmt.Errorf(\"field %d: {} fields are not supported\", field.Tags.Protobuf.FieldNum)",
                        field.wire.name()
                    );
                    return Ok(());
                };
                emit!(w, "\t\tvalue, err := {rt}.{}(field, buffer)", codec.decoder);
                emit!(w, "\t\tif err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\tv := {}(value)", field.base_type);
                if field.is_pointer() {
                    emit!(w, "\t\t{target} = &v");
                } else {
                    emit!(w, "\t\t{target} = v");
                }
                emit!(w, "\t\treturn nil");
            }
            FieldKind::Struct => {
                emit!(w, "\t\tdata, err := {rt}.DecodeBytes(field, buffer)");
                emit!(w, "\t\tif err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\tvalue := new({})", field.base_type);
                emit!(w, "\t\tif err := {rt}.FastUnmarshal(value, data); err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\t{target} = value");
                emit!(w, "\t\treturn nil");
            }
            FieldKind::Map => {
                emit!(w, "\t\tif {target} == nil {{");
                emit!(w, "\t\t\t{target} = make({})", field.ty);
                emit!(w, "\t\t}}");
                emit!(w, "\t\treturn {rt}.MapDecoder({target}, field, buffer)");
            }
            FieldKind::List => {
                let element = field.ty.strip_prefix("[]").unwrap_or(&field.ty);
                emit!(w, "\t\tvalues, err := {rt}.RepeatedDecoder[{element}](field, buffer)");
                emit!(w, "\t\tif err != nil {{");
                emit!(w, "\t\t\treturn err");
                emit!(w, "\t\t}}");
                emit!(w, "\t\t{target} = append({target}, values...)");
                emit!(w, "\t\treturn nil");
            }
        }
        Ok(())
    }

    fn is_zero(&self, out: &mut String, field: &Field) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::IsZero);
        let target = format!("x.{}", field.name);

        match (field.kind, field.wire) {
            (FieldKind::Map | FieldKind::List, _) => emit!(w, "\t\treturn len({target}) == 0"),
            (FieldKind::Struct, _) | (_, WireKind::Group) => emit!(w, "\t\treturn {target} == nil"),
            _ if field.is_pointer() => emit!(w, "\t\treturn {target} == nil"),
            (_, WireKind::String | WireKind::Bytes) => emit!(w, "\t\treturn len({target}) == 0"),
            (_, WireKind::Bool) => emit!(w, "\t\treturn !{target}"),
            _ => emit!(w, "\t\treturn {target} == 0"),
        }
        Ok(())
    }

    fn service(&self, out: &mut String, service: &Service) -> Result<(), TemplateError> {
        let mut w = Writer::new(out, TemplateName::Service);
        let name = exported(&service.name);

        emit!(w);
        emit!(w, "const {name}ServiceName = \"{}\"", service.full_name);
        emit!(w);
        emit!(w, "type {name}Service interface {{");
        for rpc in &service.rpcs {
            emit!(w, "\t{}", signature(rpc));
        }
        emit!(w, "}}");
        Ok(())
    }
}

fn signature(rpc: &Rpc) -> String {
    let (name, input, output) = (&rpc.name, &rpc.input, &rpc.output);
    match (rpc.client_streaming, rpc.server_streaming) {
        (false, false) => format!("{name}(ctx context.Context, req *{input}) (*{output}, error)"),
        (false, true) => format!("{name}(ctx context.Context, req *{input}, send func(*{output}) error) error"),
        (true, false) => format!("{name}(ctx context.Context, recv func() (*{input}, error)) (*{output}, error)"),
        (true, true) => format!(
            "{name}(ctx context.Context, recv func() (*{input}, error), send func(*{output}) error) error"
        ),
    }
}

/// `go_package` name, or the file stem when the option is absent.
fn package_name(file: &File) -> String {
    if !file.package_name.is_empty() {
        return file.package_name.clone();
    }
    let stem: String = file
        .file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    sanitize_local(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::Comments;
    use crate::ir::{EnumValue, FileId, Ignorables};
    use crate::options::OptionMap;

    fn field(name: &str, number: u32, ty: &str, wire: WireKind, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            proto_name: name.to_lowercase(),
            json_name: name.to_lowercase(),
            ty: ty.to_string(),
            base_type: ty.trim_start_matches(['*', '[', ']']).to_string(),
            key_base_type: String::new(),
            index_base_type: String::new(),
            number,
            wire,
            key_wire: None,
            value_wire: None,
            optional: ty.starts_with('*'),
            oneof: None,
            tag: String::new(),
            struct_tag: format!("protobuf:\"{},{number}\"", wire.wire_class()),
            extension_tags: Vec::new(),
            kind,
            key_kind: None,
            value_kind: None,
            options: OptionMap::new(),
        }
    }

    fn user_file() -> File {
        let mut counts = field("Counts", 5, "map[string]int", WireKind::Message, FieldKind::Map);
        counts.base_type = "int".to_string();
        File {
            id: FileId(0),
            dir: "/p/".to_string(),
            source: "user.proto".to_string(),
            file_name: "user".to_string(),
            file_path: "example.com/users".to_string(),
            package_name: "users".to_string(),
            package: "dashboard.users".to_string(),
            options: OptionMap::new(),
            messages: vec![Message {
                name: "User".to_string(),
                full_name: "dashboard.users.User".to_string(),
                fields: vec![
                    field("Id", 1, "*int64", WireKind::Int64, FieldKind::Scalar),
                    field("Name", 2, "string", WireKind::String, FieldKind::Scalar),
                    field("Friends", 3, "[]*User", WireKind::Message, FieldKind::List),
                    field("Manager", 4, "*User", WireKind::Message, FieldKind::Struct),
                    counts,
                    field("Active", 6, "bool", WireKind::Bool, FieldKind::Scalar),
                ],
                ignorables: Ignorables::default(),
                options: OptionMap::new(),
                descriptor: "e30=".to_string(),
                file: FileId(0),
            }],
            enums: vec![Enum {
                name: "Status".to_string(),
                full_name: "dashboard.users.Status".to_string(),
                values: vec![
                    EnumValue { name: "UNKNOWN".to_string(), number: 0, options: OptionMap::new() },
                    EnumValue { name: "ACTIVE".to_string(), number: 1, options: OptionMap::new() },
                    EnumValue { name: "ENABLED".to_string(), number: 1, options: OptionMap::new() },
                ],
                options: OptionMap::new(),
                file: FileId(0),
            }],
            services: vec![Service {
                name: "Users".to_string(),
                full_name: "dashboard.users.Users".to_string(),
                options: OptionMap::new(),
                rpcs: vec![Rpc {
                    name: "Get".to_string(),
                    input: "GetReq".to_string(),
                    output: "GetRes".to_string(),
                    input_full_name: "dashboard.users.GetReq".to_string(),
                    output_full_name: "dashboard.users.GetRes".to_string(),
                    client_streaming: false,
                    server_streaming: false,
                    options: OptionMap::new(),
                    service: "Users".to_string(),
                }],
                code_generation: Vec::new(),
                file: FileId(0),
            }],
            comments: Comments::default(),
            embedded_files: Vec::new(),
        }
    }

    fn render(file: &File) -> String {
        let emitter = GoEmitter::new("github.com/vedadiyan/protolizer");
        String::from_utf8(emitter.render_file(file).unwrap()).unwrap()
    }

    #[test]
    fn header_package_and_imports() {
        let out = render(&user_file());
        assert!(out.starts_with("// Code generated by protov. DO NOT EDIT.\n// source: user.proto\n\npackage users\n"));
        assert!(out.contains(
            "import (\n\t\"bytes\"\n\t\"context\"\n\t\"fmt\"\n\t\"strconv\"\n\n\t\"github.com/vedadiyan/protolizer\"\n)\n"
        ));
    }

    #[test]
    fn fields_dispatch_to_their_templates() {
        let out = render(&user_file());
        assert!(out.contains("\tId *int64 `protobuf:\"varint,1\"`"));
        assert!(out.contains("return *protolizer.CaptureTypeByName(\"dashboard.users.User\")"));
        assert!(out.contains("\t\tif x.Id == nil {\n\t\t\treturn nil\n\t\t}\n\t\tdata, err := protolizer.SignedNumberEncoder(int64(*x.Id), field)"));
        assert!(out.contains("\t\tv := int64(value)\n\t\tx.Id = &v"));
        assert!(out.contains("protolizer.StringEncoder(x.Name, field)"));
        assert!(out.contains("return protolizer.RepeatedEncoder(x.Friends, field, buffer)"));
        assert!(out.contains("protolizer.RepeatedDecoder[*User](field, buffer)"));
        assert!(out.contains("protolizer.FastMarshal(x.Manager)"));
        assert!(out.contains("value := new(User)"));
        assert!(out.contains("x.Counts = make(map[string]int)"));
        assert!(out.contains("return protolizer.MapDecoder(x.Counts, field, buffer)"));
    }

    #[test]
    fn is_zero_per_field() {
        let out = render(&user_file());
        assert!(out.contains("\tcase 1:\n\t\treturn x.Id == nil"));
        assert!(out.contains("\tcase 2:\n\t\treturn len(x.Name) == 0"));
        assert!(out.contains("\tcase 3:\n\t\treturn len(x.Friends) == 0"));
        assert!(out.contains("\tcase 4:\n\t\treturn x.Manager == nil"));
        assert!(out.contains("\tcase 6:\n\t\treturn !x.Active"));
        assert!(out.contains("\tdefault:\n\t\treturn true"));
    }

    #[test]
    fn enums_skip_aliased_names() {
        let out = render(&user_file());
        assert!(out.contains("\tStatus_ENABLED Status = 1\n"));
        assert!(out.contains("var Status_name = map[int32]string{\n\t0: \"UNKNOWN\",\n\t1: \"ACTIVE\",\n}"));
        assert!(out.contains("\t\"ENABLED\": 1,\n"));
    }

    #[test]
    fn services_become_interfaces() {
        let mut file = user_file();
        let out = render(&file);
        assert!(out.contains("const UsersServiceName = \"dashboard.users.Users\""));
        assert!(out.contains("\tGet(ctx context.Context, req *GetReq) (*GetRes, error)\n"));

        file.services[0].rpcs[0].server_streaming = true;
        let out = render(&file);
        assert!(out.contains("\tGet(ctx context.Context, req *GetReq, send func(*GetRes) error) error\n"));
    }

    #[test]
    fn output_is_deterministic() {
        let file = user_file();
        assert_eq!(render(&file), render(&file));
    }

    #[test]
    fn empty_file_has_no_imports() {
        let mut file = user_file();
        file.messages.clear();
        file.enums.clear();
        file.services.clear();
        file.package_name.clear();
        file.file_name = "user.v1".to_string();
        let out = render(&file);
        assert_eq!(out, "// Code generated by protov. DO NOT EDIT.\n// source: user.proto\n\npackage user_v1\n");
    }
}
