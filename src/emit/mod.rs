//! Source emission.
//!
//! The primary output of each file is produced by [`go::GoEmitter`], a set
//! of named templates that call into each other: the file template walks
//! messages, enums and services, and each message dispatches its fields to
//! the encode/decode template for their [`FieldKind`]. Auxiliary outputs
//! requested with `@generate` are rendered by [`user`] from template files.

use std::fmt::{self, Write as _};

use crate::error::TemplateError;
use crate::types::FieldKind;

// Writes one formatted line through a `Writer`, returning early on failure.
macro_rules! emit {
    ($w:expr) => {
        $w.line(format_args!(""))?
    };
    ($w:expr, $($arg:tt)*) => {
        $w.line(format_args!($($arg)*))?
    };
}
pub(crate) use emit;

pub mod go;
pub mod user;

pub use go::GoEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    File,
    Message,
    Enum,
    Service,
    EncodeScalar,
    EncodeStruct,
    EncodeMap,
    EncodeRepeated,
    DecodeScalar,
    DecodeStruct,
    DecodeMap,
    DecodeRepeated,
    IsZero,
}

impl TemplateName {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateName::File => "file",
            TemplateName::Message => "message",
            TemplateName::Enum => "enum",
            TemplateName::Service => "service",
            TemplateName::EncodeScalar => "encode_scalar",
            TemplateName::EncodeStruct => "encode_struct",
            TemplateName::EncodeMap => "encode_map",
            TemplateName::EncodeRepeated => "encode_repeated",
            TemplateName::DecodeScalar => "decode_scalar",
            TemplateName::DecodeStruct => "decode_struct",
            TemplateName::DecodeMap => "decode_map",
            TemplateName::DecodeRepeated => "decode_repeated",
            TemplateName::IsZero => "is_zero",
        }
    }

    pub fn encode(kind: FieldKind) -> TemplateName {
        match kind {
            FieldKind::Scalar => TemplateName::EncodeScalar,
            FieldKind::Struct => TemplateName::EncodeStruct,
            FieldKind::Map => TemplateName::EncodeMap,
            FieldKind::List => TemplateName::EncodeRepeated,
        }
    }

    pub fn decode(kind: FieldKind) -> TemplateName {
        match kind {
            FieldKind::Scalar => TemplateName::DecodeScalar,
            FieldKind::Struct => TemplateName::DecodeStruct,
            FieldKind::Map => TemplateName::DecodeMap,
            FieldKind::List => TemplateName::DecodeRepeated,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output buffer scoped to one template; write failures carry its name.
pub(crate) struct Writer<'a> {
    out: &'a mut String,
    template: TemplateName,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(out: &'a mut String, template: TemplateName) -> Self {
        Writer { out, template }
    }

    pub(crate) fn line(&mut self, args: fmt::Arguments<'_>) -> Result<(), TemplateError> {
        let name = self.template.as_str();
        writeln!(self.out, "{args}").map_err(|source| TemplateError::Render { name, source })
    }

    /// Buffer for a nested template call.
    pub(crate) fn buf(&mut self) -> &mut String {
        &mut *self.out
    }
}
