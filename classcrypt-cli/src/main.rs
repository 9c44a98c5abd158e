//! `classcrypt` CLI tool for root key management and one-off field operations.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use classcrypt::prelude::*;
use classcrypt_key_file::FileRootKeySource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "classcrypt")]
#[command(about = "classcrypt key management CLI", long_about = None)]
struct Cli {
    /// Directory holding root key files
    #[arg(short, long, global = true, default_value = "./keys")]
    keys: PathBuf,

    /// Engine configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a key directory with a fresh root key
    Keygen,
    /// Generate a new root key version and make it active
    RotateRoot,
    /// Print the key fingerprint of every classification
    Fingerprints,
    /// List the classifications
    Classifications,
    /// Encrypt a value
    Encrypt {
        /// Classification label
        #[arg(short = 'l', long)]
        label: String,
        /// Plaintext value
        value: String,
    },
    /// Decrypt a value
    Decrypt {
        /// Classification label
        #[arg(short = 'l', long)]
        label: String,
        /// Security state to evaluate the access policy against
        #[arg(short, long, default_value = "normal")]
        state: SecurityState,
        /// Ciphertext value
        value: String,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let source = FileRootKeySource::init(&cli.keys)
                .with_context(|| format!("initializing {}", cli.keys.display()))?;
            println!("Root key v1 written to {}", source.key_dir().display());
        }
        Commands::RotateRoot => {
            let version = open_source(&cli.keys)?
                .rotate_root_key()
                .context("rotating root key")?;
            println!("Active root key is now v{version}");
        }
        Commands::Fingerprints => {
            let (engine, _) = bootstrap(&cli.keys, cli.config.as_deref())?;
            for (classification, fingerprint) in engine.registry().fingerprints() {
                println!("{classification:<12} {fingerprint}");
            }
        }
        Commands::Classifications => {
            for classification in Classification::ALL {
                println!("{:>2}  {classification}", classification.id());
            }
        }
        Commands::Encrypt { label, value } => {
            let (engine, _) = bootstrap(&cli.keys, cli.config.as_deref())?;
            println!("{}", engine.encrypt_labeled(&value, &label)?);
        }
        Commands::Decrypt { label, state, value } => {
            let (engine, _) = bootstrap(&cli.keys, cli.config.as_deref())?;
            println!("{}", engine.decrypt_labeled(&value, &label, state)?);
        }
    }

    Ok(())
}

fn open_source(keys: &Path) -> Result<FileRootKeySource> {
    FileRootKeySource::new(keys).with_context(|| format!("opening {}", keys.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn bootstrap(keys: &Path, config: Option<&Path>) -> Result<(Engine, SecurityController)> {
    let config = load_config(config)?;
    let source = Arc::new(open_source(keys)?);
    Engine::bootstrap(source, &config).context("starting engine")
}
