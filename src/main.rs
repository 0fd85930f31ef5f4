use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use protov::{Compiler, CompilerConfig, WriteMode};

/// Compile protobuf schemas into Go sources.
#[derive(Parser, Debug)]
#[command(name = "protov", version)]
struct Cli {
    /// Schema files to compile
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Toolchain root holding `include/` and `templates/`
    #[arg(long, env = "PROTOV_HOME")]
    install_root: Option<PathBuf>,

    /// Render everything before writing anything
    #[arg(long)]
    staged: bool,

    /// Also write the linked FileDescriptorSet here
    #[arg(long)]
    descriptor_set_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    if let Some(root) = cli.install_root {
        config.install_root = root;
    }
    if cli.staged {
        config = config.with_write_mode(WriteMode::Staged);
    }

    let compiler = Compiler::new(config);

    if let Some(path) = &cli.descriptor_set_out {
        let set = compiler.descriptor_set(&cli.files)?;
        std::fs::write(path, set).with_context(|| format!("writing {}", path.display()))?;
    }

    let written = compiler
        .compile(&cli.files, &cli.out)
        .with_context(|| format!("generating into {}", cli.out.display()))?;
    eprintln!("Generated {} file(s) in {}", written.len(), cli.out.display());

    Ok(())
}
