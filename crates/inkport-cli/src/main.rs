//! `inkport` command-line entry point.

use clap::{Parser, Subcommand};
use inkport_core::config::ConfigError;
use inkport_core::{
    DocumentHandle, FileTransport, MemoryBlobStore, PortConfig, PortError, PortWarning, Porter,
    SchemeRouter, TransportError, Whiteboard, classify, inspect,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use url::Url;

/// Export and import portable whiteboard snapshots
#[derive(Parser, Debug)]
#[command(name = "inkport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a board and its assets into a versioned container
    Export {
        /// Board file
        board: PathBuf,

        /// Output directory (defaults to the local data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// File name prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Resolve assets one at a time
        #[arg(long)]
        sequential: bool,

        /// Per-asset fetch timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Replace a board's content with an exported artifact
    Import {
        /// Board file, created if missing
        board: PathBuf,

        /// Container or legacy snapshot to load
        artifact: PathBuf,
    },

    /// Describe an artifact without importing it
    Inspect {
        artifact: PathBuf,
    },

    /// Remove every shape and every page but the current one
    Clear {
        board: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{path}: {message}")]
    File { path: String, message: String },
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn file_error(path: &Path, message: impl ToString) -> CliError {
    CliError::File {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn load_board(path: &Path, create: bool) -> Result<Whiteboard, CliError> {
    if create && !path.exists() {
        log::info!("Creating new board at {}", path.display());
        return Ok(Whiteboard::new());
    }
    let json = std::fs::read_to_string(path).map_err(|e| file_error(path, e))?;
    Whiteboard::from_json(&json).map_err(|e| file_error(path, e))
}

fn save_board(path: &Path, board: &Whiteboard) -> Result<(), CliError> {
    let json = board.to_json().map_err(|e| file_error(path, e))?;
    std::fs::write(path, json).map_err(|e| file_error(path, e))
}

/// Directory of `board` as a URL, for relative asset references.
fn base_url(board: &Path) -> Option<Url> {
    let dir = board.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let dir = dir.canonicalize().ok()?;
    Url::from_directory_path(dir).ok()
}

fn print_warnings(warnings: &[PortWarning]) {
    for warning in warnings {
        println!("  warning: {}", warning);
    }
}

fn load_config(cli: &Cli) -> Result<PortConfig, CliError> {
    match &cli.config {
        Some(path) => Ok(PortConfig::from_json_file(path)?),
        None => Ok(PortConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Export {
            board,
            out,
            prefix,
            sequential,
            timeout_ms,
        } => {
            if let Some(prefix) = prefix {
                config.file_prefix = prefix;
            }
            if sequential {
                config.concurrent_resolution = false;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.asset_timeout_ms = timeout_ms;
            }

            let document = load_board(&board, false)?;
            let transport = match out {
                Some(dir) => FileTransport::new(dir)?,
                None => FileTransport::default_location()?,
            };
            let out_dir = transport.base_path().to_path_buf();
            let fetcher = SchemeRouter::standard(MemoryBlobStore::new(), config.asset_timeout());
            let mut porter = Porter::new(fetcher, transport, config);
            if let Some(base) = base_url(&board) {
                porter = porter.with_base_url(base);
            }

            let outcome = porter.export(&DocumentHandle::new(document)).await?;
            println!(
                "Exported {} ({} assets embedded, {} bytes)",
                out_dir.join(&outcome.file_name).display(),
                outcome.container.assets().len(),
                outcome.bytes_written
            );
            print_warnings(&outcome.warnings);
        }

        Command::Import { board, artifact } => {
            let handle = DocumentHandle::new(load_board(&board, true)?);
            let fetcher = SchemeRouter::standard(MemoryBlobStore::new(), config.asset_timeout());
            let porter = Porter::new(fetcher, FileTransport::new(PathBuf::from("."))?, config);

            let source = artifact.to_string_lossy();
            let outcome = porter.import(&handle, &source).await?;

            handle.write(|document| {
                document.flush_refit();
                save_board(&board, document)
            })?;

            println!(
                "Imported {} records into {} ({} assets restored)",
                outcome.records,
                board.display(),
                outcome.restored_assets
            );
            print_warnings(&outcome.warnings);
        }

        Command::Inspect { artifact } => {
            let bytes = std::fs::read(&artifact).map_err(|e| file_error(&artifact, e))?;
            let inspection = inspect(classify(&bytes)).map_err(PortError::from)?;

            println!("Format:      {}", inspection.format);
            if let Some(version) = &inspection.version {
                println!("Version:     {}", version);
            }
            if let Some(exported_at) = &inspection.exported_at {
                println!("Exported at: {}", exported_at);
            }
            let counts = inspection.counts;
            println!("Pages:       {}", counts.pages);
            println!("Shapes:      {}", counts.shapes);
            println!("Bindings:    {}", counts.bindings);
            if counts.others > 0 {
                println!("Other:       {}", counts.others);
            }
            println!(
                "Assets:      {} ({} inline, {} in asset map, {} bytes)",
                counts.assets, counts.embedded_assets, inspection.payloads, inspection.payload_bytes
            );
            print_warnings(&inspection.warnings);
        }

        Command::Clear { board } => {
            let mut document = load_board(&board, false)?;
            let summary = document.clear_canvas();
            save_board(&board, &document)?;
            println!(
                "Removed {} shapes, {} pages and {} bindings",
                summary.shapes_removed, summary.pages_removed, summary.bindings_removed
            );
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
