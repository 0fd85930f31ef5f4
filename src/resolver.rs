//! Schema source lookup.
//!
//! An import is looked up relative to the directory of the file being
//! compiled first, then under the toolchain include directory.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use protox::file::{File, FileResolver};

use crate::error::ResolveError;

const BUNDLED_PREFIX: &str = "google/protobuf/";

#[derive(Debug, Clone)]
pub struct SchemaResolver {
    /// Directory of the compiling file, `/`-separated with a trailing `/`.
    dir: String,
    include_dir: PathBuf,
}

impl SchemaResolver {
    pub fn new(dir: impl AsRef<Path>, include_dir: impl Into<PathBuf>) -> Self {
        let mut dir = normalize(&dir.as_ref().to_string_lossy());
        if !dir.is_empty() && !dir.ends_with('/') {
            dir.push('/');
        }
        SchemaResolver { dir, include_dir: include_dir.into() }
    }

    /// Resolver rooted at the directory containing `file`, together with the
    /// import name `file` is known by.
    pub fn for_file(file: &Path, include_dir: impl Into<PathBuf>) -> (Self, String) {
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        let resolver = SchemaResolver::new(dir, include_dir);
        let name = resolver.import_name(&file.to_string_lossy());
        (resolver, name)
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Normalizes separators and strips the compiling directory prefix.
    pub fn import_name(&self, path: &str) -> String {
        let path = normalize(path);
        let path = if self.dir.is_empty() {
            path.as_str()
        } else {
            path.strip_prefix(self.dir.as_str()).unwrap_or(&path)
        };
        path.trim_start_matches('/').to_string()
    }

    /// Opens `import` as a readable stream.
    pub fn open(&self, import: &str) -> Result<Cursor<Vec<u8>>, ResolveError> {
        self.read(import).map(Cursor::new)
    }

    pub fn read(&self, import: &str) -> Result<Vec<u8>, ResolveError> {
        let name = self.import_name(import);
        let local = Path::new(&self.dir).join(&name);
        match std::fs::read(&local) {
            Ok(data) => Ok(data),
            Err(_) => {
                let fallback = self.include_dir.join(&name);
                std::fs::read(&fallback).map_err(|source| ResolveError {
                    import: import.to_string(),
                    local,
                    fallback,
                    source,
                })
            }
        }
    }

    fn read_source(&self, import: &str) -> Result<String, ResolveError> {
        let data = self.read(import)?;
        String::from_utf8(data).map_err(|err| ResolveError {
            import: import.to_string(),
            local: Path::new(&self.dir).join(import),
            fallback: self.include_dir.join(import),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })
    }
}

impl FileResolver for SchemaResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        path.to_str().map(|path| self.import_name(path))
    }

    fn open_file(&self, name: &str) -> Result<File, protox::Error> {
        match self.read_source(name) {
            Ok(source) => {
                tracing::debug!(import = name, "resolved schema source");
                File::from_source(name, &source)
            }
            // Let the bundled well-known types answer.
            Err(_) if name.starts_with(BUNDLED_PREFIX) => Err(protox::Error::file_not_found(name)),
            Err(err) => Err(protox::Error::new(err)),
        }
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn strips_redundant_directory_prefix() {
        let resolver = SchemaResolver::new("C:\\work\\users", "/opt/protov/include");
        assert_eq!(resolver.dir(), "C:/work/users/");
        assert_eq!(resolver.import_name("C:\\work\\users\\model.proto"), "model.proto");
        assert_eq!(resolver.import_name("common/types.proto"), "common/types.proto");
    }

    #[test]
    fn reads_local_file_first() {
        let local = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();
        std::fs::write(local.path().join("a.proto"), "local").unwrap();
        std::fs::write(include.path().join("a.proto"), "include").unwrap();

        let resolver = SchemaResolver::new(local.path(), include.path());
        let mut text = String::new();
        resolver.open("a.proto").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "local");
    }

    #[test]
    fn falls_back_to_include_dir() {
        let local = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(include.path().join("shared")).unwrap();
        std::fs::write(include.path().join("shared/b.proto"), "include").unwrap();

        let resolver = SchemaResolver::new(local.path(), include.path());
        assert_eq!(resolver.read("shared/b.proto").unwrap(), b"include");
    }

    #[test]
    fn missing_everywhere_names_both_paths() {
        let local = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();

        let resolver = SchemaResolver::new(local.path(), include.path());
        let err = resolver.read("missing.proto").unwrap_err();
        assert_eq!(err.local, local.path().join("missing.proto"));
        assert_eq!(err.fallback, include.path().join("missing.proto"));

        let message = err.to_string();
        assert!(message.contains(&local.path().join("missing.proto").display().to_string()));
        assert!(message.contains(&include.path().join("missing.proto").display().to_string()));
    }

    #[test]
    fn for_file_splits_directory_and_name() {
        let (resolver, name) =
            SchemaResolver::for_file(Path::new("/schemas/users/model.proto"), "/inc");
        assert_eq!(resolver.dir(), "/schemas/users/");
        assert_eq!(name, "model.proto");
    }
}
