//! Compiles protobuf schemas into Go sources.
//!
//! Each input schema is linked with its imports, lowered into an
//! intermediate representation ([`ir`]) and rendered by the Go emitter.
//! Services may request extra outputs with `@generate <template>` comment
//! directives, and option values may pull file contents in with
//! `@embed <path>`.
//!
//! ```no_run
//! use protov::{Compiler, CompilerConfig};
//!
//! let compiler = Compiler::new(CompilerConfig::new("/opt/protov"));
//! compiler.compile(&["schema/users.proto"], "gen".as_ref())?;
//! # Ok::<(), protov::Error>(())
//! ```

pub mod comments;
pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod ir;
pub mod linker;
pub mod lower;
pub mod names;
pub mod normalize;
pub mod options;
pub mod resolver;
pub mod types;
pub mod wire;

pub use compiler::{Compiler, GeneratedFile};
pub use config::{CompilerConfig, WriteMode};
pub use error::{Error, Result};
pub use ir::Ast;
