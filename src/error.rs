use std::path::PathBuf;

/// An import could not be found locally nor under the include directory.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {import} from {} or {}: {source}", local.display(), fallback.display())]
pub struct ResolveError {
    pub import: String,
    pub local: PathBuf,
    pub fallback: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A file named by an `@embed` directive could not be read.
#[derive(Debug, thiserror::Error)]
#[error("failed to embed {}: {source}", path.display())]
pub struct EmbedError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("message {name}: {source}")]
    Message {
        name: String,
        #[source]
        source: Box<LowerError>,
    },
    #[error("field {name}: {source}")]
    Field {
        name: String,
        #[source]
        source: Box<LowerError>,
    },
    #[error("enum {name}: {source}")]
    Enum {
        name: String,
        #[source]
        source: Box<LowerError>,
    },
    #[error("service {name}: {source}")]
    Service {
        name: String,
        #[source]
        source: Box<LowerError>,
    },
    #[error("rpc {name}: {source}")]
    Rpc {
        name: String,
        #[source]
        source: Box<LowerError>,
    },
    #[error("malformed default value {value:?} for {kind}")]
    Default { value: String, kind: &'static str },
    #[error("failed to encode descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

impl LowerError {
    pub(crate) fn in_message(self, name: &str) -> Self {
        LowerError::Message { name: name.to_string(), source: Box::new(self) }
    }

    pub(crate) fn in_field(self, name: &str) -> Self {
        LowerError::Field { name: name.to_string(), source: Box::new(self) }
    }

    pub(crate) fn in_enum(self, name: &str) -> Self {
        LowerError::Enum { name: name.to_string(), source: Box::new(self) }
    }

    pub(crate) fn in_service(self, name: &str) -> Self {
        LowerError::Service { name: name.to_string(), source: Box::new(self) }
    }

    pub(crate) fn in_rpc(self, name: &str) -> Self {
        LowerError::Rpc { name: name.to_string(), source: Box::new(self) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {name} failed to render: {source}")]
    Render {
        name: &'static str,
        #[source]
        source: std::fmt::Error,
    },
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template {} is relative but no template root is configured", path.display())]
    NoTemplateRoot { path: PathBuf },
    #[error("template {}: {source}", path.display())]
    User {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },
    #[error("template {} produced no output", path.display())]
    Empty { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("link failed: {0}")]
    Link(#[from] protox::Error),
    #[error("{file} is not part of the linked descriptor pool")]
    MissingFile { file: String },
    #[error("lowering {file}: {source}")]
    Lower {
        file: String,
        #[source]
        source: LowerError,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("reading config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
