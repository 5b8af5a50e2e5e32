//! segscope CLI
//!
//! - `segscope open <index>`: interactive shell, or `-e` commands in order
//! - `segscope build <source.jsonl> <index>`: build the sample index
//! - `segscope config`: print a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use segscope::config::{generate_default_config, Config, LoggingConfig};
use segscope::sample::SampleIndexBuilder;
use segscope::session::{Session, SessionError, SessionOptions};
use segscope::shell::Shell;
use segscope::store::types::Codec;
use segscope::store::FsDirectory;

#[derive(Parser)]
#[command(name = "segscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive admin shell for segmented indexes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: searched in the usual locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an index in the shell
    Open {
        /// Index directory
        index: PathBuf,
        /// Start with write access instead of read-only
        #[arg(long)]
        read_write: bool,
        /// Run these commands instead of prompting
        #[arg(short = 'e', long = "exec")]
        exec: Vec<String>,
    },

    /// Build a sample index from a JSON-lines file
    Build {
        /// JSON-lines source, one document per line
        source: PathBuf,
        /// Index directory to create (replaced if it exists)
        index: PathBuf,
        /// Segment codec: binary or text
        #[arg(long)]
        codec: Option<Codec>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "segscope failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;
    tracing::debug!("segscope v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Open {
            index,
            read_write,
            exec,
        } => open(&config, index, read_write, exec),
        Commands::Build {
            source,
            index,
            codec,
        } => {
            let codec = match codec {
                Some(codec) => codec,
                None => config.store.codec()?,
            };
            let count = SampleIndexBuilder::new()
                .with_codec(codec)
                .with_max_buffered_docs(config.store.max_buffered_docs)
                .build(&source, &index)?;
            println!("{} docs indexed", count);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn open(config: &Config, index: PathBuf, read_write: bool, exec: Vec<String>) -> Result<()> {
    let directory = FsDirectory::open(&index)
        .map_err(|e| SessionError::StartupFailure(e.to_string()))?
        .with_codec(config.store.codec()?)
        .with_max_buffered_docs(config.store.max_buffered_docs);

    let options = SessionOptions {
        read_only: config.shell.read_only && !read_write,
        term_display: config.shell.term_display,
    };
    let session = Session::open(Box::new(directory), options)?;
    let mut shell = Shell::new(session, &config.shell);

    let result = if exec.is_empty() {
        shell.run_interactive()
    } else {
        shell.run_script(&exec, &mut io::stdout().lock());
        Ok(())
    };
    shell.finish(&mut io::stdout().lock());
    result
}

/// Install the tracing subscriber; logs go to stderr, and to a file if set
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("segscope={}", config.level)));

    let json = config.format == "json";
    let pretty_layer = (!json).then(|| fmt::layer().with_writer(io::stderr));
    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .with(file_layer)
        .init();
    Ok(())
}
