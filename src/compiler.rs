//! The compile pipeline: link each input, lower it, emit Go sources and
//! write them below an output directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use prost::Message;
use prost_types::FileDescriptorSet;

use crate::config::{CompilerConfig, WriteMode};
use crate::emit::GoEmitter;
use crate::emit::user::{output_name, render_template, resolve_template};
use crate::error::{Error, Result};
use crate::ir::{Ast, File, FileId};
use crate::linker::{self, Diagnostics};
use crate::lower::lower_file;

/// A rendered output, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Where rendered outputs go. Write-through puts each one on disk as soon
/// as it is rendered; staged holds them until everything has rendered.
enum Output<'a> {
    Through { dir: &'a Path, written: Vec<PathBuf> },
    Staged { dir: &'a Path, pending: Vec<GeneratedFile> },
}

impl<'a> Output<'a> {
    fn new(mode: WriteMode, dir: &'a Path) -> Self {
        match mode {
            WriteMode::WriteThrough => Output::Through { dir, written: Vec::new() },
            WriteMode::Staged => Output::Staged { dir, pending: Vec::new() },
        }
    }

    fn push(&mut self, generated: GeneratedFile) -> Result<()> {
        match self {
            Output::Through { dir, written } => written.push(write_generated(*dir, &generated)?),
            Output::Staged { pending, .. } => pending.push(generated),
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<PathBuf>> {
        match self {
            Output::Through { written, .. } => Ok(written),
            Output::Staged { dir, pending } => {
                pending.iter().map(|generated| write_generated(dir, generated)).collect()
            }
        }
    }
}

pub struct Compiler {
    config: CompilerConfig,
    emitter: GoEmitter,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let emitter = GoEmitter::new(&config.runtime_import);
        Compiler { config, emitter }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Links one input against its own directory and lowers it under `id`.
    fn lower_input(&self, input: &Path, id: FileId) -> Result<(File, Diagnostics)> {
        tracing::info!(input = %input.display(), "compiling");
        let linked = linker::link(input, &self.config.include_dir())?;
        let file = lower_file(&linked, id)
            .map_err(|source| Error::Lower { file: linked.file.name().to_string(), source })?;
        Ok((file, linked.diagnostics))
    }

    /// Links and lowers every input into one AST. Inputs are linked
    /// independently, each against its own directory.
    pub fn parse<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<(Ast, Diagnostics)> {
        let mut ast = Ast::default();
        let mut diagnostics = Diagnostics::default();

        for input in inputs {
            let (file, found) = self.lower_input(input.as_ref(), ast.next_id())?;
            diagnostics.merge(found);
            ast.files.push(file);
        }

        Ok((ast, diagnostics))
    }

    /// Primary Go source for one file.
    pub fn emit(&self, file: &File) -> Result<Vec<u8>> {
        Ok(self.emitter.render_file(file)?)
    }

    /// Path of the primary output relative to the output directory.
    pub fn primary_path(&self, file: &File) -> PathBuf {
        Path::new(&file.file_path).join(format!("{}{}", file.file_name, self.config.output_extension))
    }

    /// Hands the primary output of `file` to `sink`, then one output per
    /// `@generate` template of each service, rendered against `ast`.
    fn emit_into(
        &self,
        ast: &Ast,
        file: &File,
        sink: &mut dyn FnMut(GeneratedFile) -> Result<()>,
    ) -> Result<()> {
        sink(GeneratedFile { path: self.primary_path(file), contents: self.emit(file)? })?;

        let templates_dir = self.config.templates_dir();
        for service in &file.services {
            for template in &service.code_generation {
                let path = resolve_template(template, templates_dir.as_deref())?;
                tracing::debug!(service = %service.name, template = %path.display(), "auxiliary output");
                sink(GeneratedFile {
                    path: Path::new(&file.file_path).join(output_name(template)),
                    contents: render_template(&path, ast)?,
                })?;
            }
        }
        Ok(())
    }

    /// Primary output followed by one output per `@generate` template of
    /// each service.
    pub fn generate_file(&self, ast: &Ast, file: &File) -> Result<Vec<GeneratedFile>> {
        let mut out = Vec::new();
        self.emit_into(ast, file, &mut |generated| {
            out.push(generated);
            Ok(())
        })?;
        Ok(out)
    }

    pub fn generate(&self, ast: &Ast) -> Result<Vec<GeneratedFile>> {
        let mut out = Vec::new();
        for file in &ast.files {
            out.extend(self.generate_file(ast, file)?);
        }
        Ok(out)
    }

    /// Renders and writes every output of an already parsed AST, in file
    /// order. Returns the written paths.
    pub fn write(&self, ast: &Ast, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut output = Output::new(self.config.write_mode, out_dir);
        for file in &ast.files {
            self.emit_into(ast, file, &mut |generated| output.push(generated))?;
        }
        output.finish()
    }

    /// Encoded `FileDescriptorSet` covering every input and its imports.
    pub fn descriptor_set<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<u8>> {
        let include_dir = self.config.include_dir();
        let mut seen = BTreeSet::new();
        let mut set = FileDescriptorSet::default();
        for input in inputs {
            let linked = linker::link(input.as_ref(), &include_dir)?;
            for file in linked.pool.file_descriptor_protos() {
                if seen.insert(file.name().to_string()) {
                    set.file.push(file.clone());
                }
            }
        }
        Ok(set.encode_to_vec())
    }

    /// Compiles the inputs one at a time. Each input gets its own AST, and
    /// its `@generate` templates render against that AST. In write-through
    /// mode an input's outputs are on disk before the next input is linked,
    /// so a failure leaves everything produced before it.
    pub fn compile<P: AsRef<Path>>(&self, inputs: &[P], out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut output = Output::new(self.config.write_mode, out_dir);
        for input in inputs {
            let (file, _) = self.lower_input(input.as_ref(), FileId(0))?;
            let ast = Ast { files: vec![file] };
            for dependency in ast.dependencies() {
                tracing::debug!(dependency = %dependency.display(), "input");
            }
            self.emit_into(&ast, &ast.files[0], &mut |generated| output.push(generated))?;
        }
        output.finish()
    }
}

fn write_generated(out_dir: &Path, generated: &GeneratedFile) -> Result<PathBuf> {
    let path = out_dir.join(&generated.path);
    let write_err = |source| Error::Write { path: path.clone(), source };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(&path, &generated.contents).map_err(write_err)?;
    tracing::info!(path = %path.display(), bytes = generated.contents.len(), "wrote");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"syntax = "proto3";
package demo;
option go_package = "example.com/demo;demo";

message Req { string id = 1; }
message Res { string name = 1; }

// @generate client.go.tmpl
service Users {
  rpc Get(Req) returns (Res);
}
"#;

    fn setup(template: Option<&str>) -> (tempfile::TempDir, PathBuf, CompilerConfig) {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema");
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&schema).unwrap();
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(schema.join("svc.proto"), SERVICE).unwrap();
        if let Some(template) = template {
            std::fs::write(templates.join("client.go.tmpl"), template).unwrap();
        }
        let config = CompilerConfig::new(dir.path());
        (dir, schema.join("svc.proto"), config)
    }

    #[test]
    fn generate_produces_primary_and_auxiliary_outputs() {
        let (_dir, input, config) = setup(Some("package {{ Files[0].PackageName }}\n"));
        let compiler = Compiler::new(config);
        let (ast, diagnostics) = compiler.parse(&[&input]).unwrap();
        assert!(diagnostics.is_empty());

        let generated = compiler.generate(&ast).unwrap();
        let paths: Vec<_> = generated.iter().map(|g| g.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("example.com/demo/svc.pb.go"), PathBuf::from("example.com/demo/client.go")]
        );
        assert_eq!(generated[1].contents, b"package demo\n");
    }

    #[test]
    fn write_through_keeps_earlier_outputs_on_failure() {
        let (dir, input, config) = setup(None);
        let compiler = Compiler::new(config);
        let out = dir.path().join("out");

        assert!(compiler.compile(&[&input], &out).is_err());
        assert!(out.join("example.com/demo/svc.pb.go").exists());
    }

    #[test]
    fn staged_writes_nothing_on_failure() {
        let (dir, input, config) = setup(None);
        let compiler = Compiler::new(config.with_write_mode(WriteMode::Staged));
        let out = dir.path().join("out");

        assert!(compiler.compile(&[&input], &out).is_err());
        assert!(!out.join("example.com/demo/svc.pb.go").exists());
    }

    /// `svc.proto` followed by a second input whose import cannot resolve.
    fn with_broken_second_input(dir: &Path) -> PathBuf {
        let broken = dir.join("schema/broken.proto");
        std::fs::write(
            &broken,
            "syntax = \"proto3\";\noption go_package = \"example.com/broken;broken\";\nimport \"missing.proto\";\n",
        )
        .unwrap();
        broken
    }

    #[test]
    fn write_through_keeps_earlier_inputs_when_a_later_one_fails() {
        let (dir, input, config) = setup(Some("// {{ Files[0].Package }}\n"));
        let broken = with_broken_second_input(dir.path());
        let compiler = Compiler::new(config);
        let out = dir.path().join("out");

        let err = compiler.compile(&[&input, &broken], &out).unwrap_err();
        assert!(matches!(err, Error::Link(_)));
        assert!(out.join("example.com/demo/svc.pb.go").exists());
        assert!(out.join("example.com/demo/client.go").exists());
        assert!(!out.join("example.com/broken").exists());
    }

    #[test]
    fn staged_keeps_nothing_when_a_later_input_fails() {
        let (dir, input, config) = setup(Some("// {{ Files[0].Package }}\n"));
        let broken = with_broken_second_input(dir.path());
        let compiler = Compiler::new(config.with_write_mode(WriteMode::Staged));
        let out = dir.path().join("out");

        assert!(compiler.compile(&[&input, &broken], &out).is_err());
        assert!(!out.join("example.com/demo/svc.pb.go").exists());
    }

    #[test]
    fn templates_render_against_their_own_input() {
        let (dir, input, config) = setup(Some("{{ Files | length }} {{ Files[0].Source }}\n"));
        let other = dir.path().join("schema/other.proto");
        std::fs::write(&other, "syntax = \"proto3\";\npackage other;\nmessage O {}\n").unwrap();
        let compiler = Compiler::new(config);
        let out = dir.path().join("out");

        compiler.compile(&[&other, &input], &out).unwrap();
        let client = std::fs::read_to_string(out.join("example.com/demo/client.go")).unwrap();
        assert_eq!(client, "1 svc.proto\n");
    }

    #[test]
    fn emission_is_deterministic() {
        let (dir, input, config) = setup(Some("// {{ Files[0].Services[0].Name }}\n"));
        let compiler = Compiler::new(config);
        let out = dir.path().join("out");

        let first = compiler.compile(&[&input], &out).unwrap();
        let before: Vec<Vec<u8>> = first.iter().map(|p| std::fs::read(p).unwrap()).collect();
        let second = compiler.compile(&[&input], &out).unwrap();
        let after: Vec<Vec<u8>> = second.iter().map(|p| std::fs::read(p).unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(before, after);
    }

    #[test]
    fn descriptor_set_includes_the_input() {
        let (_dir, input, config) = setup(None);
        let compiler = Compiler::new(config);
        let bytes = compiler.descriptor_set(&[&input, &input]).unwrap();
        let set = FileDescriptorSet::decode(bytes.as_slice()).unwrap();
        assert_eq!(set.file.len(), 1);
        assert_eq!(set.file[0].name(), "svc.proto");
    }

    #[test]
    fn dependencies_list_the_schema() {
        let (_dir, input, config) = setup(Some("x\n"));
        let compiler = Compiler::new(config);
        let (ast, _) = compiler.parse(&[&input]).unwrap();
        let deps = ast.dependencies();
        assert_eq!(deps.len(), 1);
        assert!(deps[0].ends_with("svc.proto"));
    }
}
