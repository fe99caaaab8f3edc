//! # Arcade CLI
//!
//! Builds and plays agent-authored games from a local directory.
//!
//! Usage:
//!   arcade build <dir> [--entry <file>] [--out <file>]
//!   arcade play <dir> --state <json> [--update <json>]...
//!
//! Examples:
//!   arcade build ./tictactoe --out game.js
//!   arcade play ./tictactoe --state '{"board":[]}' --update '{"board":["X"]}'
//!   arcade -v -c arcade.json play ./snake --state '{}'

use arcade_service::{GameFrame, GameService, StartRequest, UpdateRequest, Viewer};
use arcade_vm::{ArcadeConfig, Result, TargetId};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// File extensions loaded from a game directory.
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "json"];

#[derive(Parser)]
#[command(name = "arcade")]
#[command(author, version, about = "Arcade - compile and run agent-authored games")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a game directory and print the artifact
    Build {
        /// Directory holding the game's sources
        dir: PathBuf,

        /// Entry file, overriding main.tsx / main.ts
        #[arg(short, long)]
        entry: Option<String>,

        /// Write the artifact here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Compile a game, then render its states in a local sandbox
    Play {
        /// Directory holding the game's sources
        dir: PathBuf,

        /// Initial state as JSON text
        #[arg(short, long, default_value = "{}")]
        state: String,

        /// Further states, applied in order
        #[arg(short, long)]
        update: Vec<String>,

        /// Entry file, overriding main.tsx / main.ts
        #[arg(short, long)]
        entry: Option<String>,

        /// Print container markup instead of text
        #[arg(long)]
        html: bool,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Read every source file under `dir` into `path -> source`, with paths
/// relative to `dir` and `/`-separated. Hidden entries and `node_modules`
/// are skipped.
fn load_dir(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || name == "node_modules" {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let wanted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
            if !wanted {
                continue;
            }
            let relative = path.strip_prefix(dir).unwrap_or(&path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, std::fs::read_to_string(&path)?);
        }
    }

    debug!(dir = %dir.display(), files = files.len(), "loaded game directory");
    Ok(files)
}

fn title_of(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "game".to_string())
}

async fn build(config: &ArcadeConfig, dir: &Path, entry: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let service = GameService::new(config);
    let mut request = StartRequest::new(title_of(dir), "null");
    request.files = load_dir(dir)?;
    request.entry = entry;

    let frame = service.start_game(request).await?;
    match out {
        Some(path) => {
            std::fs::write(&path, frame.artifact.code())?;
            eprintln!("wrote {} ({} bytes, ref {})", path.display(), frame.artifact.len(), frame.artifact.artifact_ref());
        }
        None => println!("{}", frame.artifact.code()),
    }
    Ok(())
}

async fn play(
    config: &ArcadeConfig,
    dir: &Path,
    state: String,
    updates: Vec<String>,
    entry: Option<String>,
    html: bool,
) -> Result<()> {
    let service = GameService::new(config);
    let viewer = Viewer::boa(config);
    let target = TargetId::from("cli");

    let mut request = StartRequest::new(title_of(dir), state);
    request.files = load_dir(dir)?;
    request.entry = entry;
    let frame = service.start_game(request).await?;
    println!("# {} ({})", frame.title, frame.session_id);
    show(&viewer, &target, &frame, 0, html).await;

    for (step, text) in updates.iter().enumerate() {
        let state = serde_json::from_str(text)
            .map_err(|e| arcade_vm::error::parse_error(format!("update {} is not valid JSON: {}", step + 1, e)))?;
        let frame = service
            .update_state(UpdateRequest { session_id: frame.session_id.clone(), state })
            .await?;
        show(&viewer, &target, &frame, step + 1, html).await;
    }

    viewer.shutdown().await;
    Ok(())
}

/// Render one frame. Render errors are printed and play continues, since the
/// next state is the retry.
async fn show(viewer: &Viewer, target: &TargetId, frame: &GameFrame, step: usize, html: bool) {
    let result = match viewer.present(target, frame).await {
        Ok(outcome) => outcome.into_output().await,
        Err(err) => Err(err),
    };
    match result {
        Ok(output) => println!("[{}] {}", step, if html { output.html } else { output.text }),
        Err(err) => println!("[{}] error: {}", step, err.message()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => ArcadeConfig::from_file(path),
        None => Ok(ArcadeConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err.message());
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Build { dir, entry, out } => build(&config, &dir, entry, out).await,
        Commands::Play { dir, state, update, entry, html } => play(&config, &dir, state, update, entry, html).await,
    };

    if let Err(err) = result {
        debug!(error = %err, "command failed");
        eprintln!("{}", err.message());
        std::process::exit(1);
    }
}
