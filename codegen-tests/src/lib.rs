//! End-to-end checks of the compiler against the schemas in `fixtures/`.

use std::path::{Path, PathBuf};

use protov::{Compiler, CompilerConfig};

pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Schema with custom options, an include-dir import and `@embed`.
pub fn users_schema() -> PathBuf {
    fixtures().join("schema/users.proto")
}

pub fn compiler() -> Compiler {
    Compiler::new(CompilerConfig::new(fixtures().join("home")))
}
