use anyhow::{Context, Result};
use autoimport::action::missing_symbol;
use autoimport::config::load_config;
use autoimport::scanner::{ImportScanner, ScanRequest, ScanSummary};
use autoimport::server::run_stdio_server;
use autoimport::synth::{Document, ImportSynthesizer};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "autoimport")]
#[command(version)]
#[command(about = "Index exported JavaScript symbols and add missing imports")]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Render imports with double quotes (overrides `doubleQuotes`)
    #[arg(long, global = true)]
    double_quotes: bool,

    /// Render `{a}` instead of `{ a }` (overrides `spaceBetweenBraces`)
    #[arg(long, global = true)]
    tight_braces: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index every file matched by `filesToScan`
    Scan {
        /// Drop the existing index first
        #[arg(long)]
        fresh: bool,
    },
    /// Re-index one created or changed file
    Edit { file: PathBuf },
    /// Remove a deleted file from the index
    Delete { file: PathBuf },
    /// List the providers of a symbol
    Lookup { name: String },
    /// Add the import for a missing symbol to DOCUMENT
    Fix {
        document: PathBuf,
        /// Symbol to import
        #[arg(long, required_unless_present = "message")]
        symbol: Option<String>,
        /// Undefined-symbol diagnostic to take the symbol from
        #[arg(long, conflicts_with = "symbol")]
        message: Option<String>,
        /// Which provider to use when several files export the symbol
        #[arg(long, default_value_t = 0)]
        pick: usize,
        /// Apply the edit to DOCUMENT instead of printing it
        #[arg(long)]
        write: bool,
    },
    /// Index a module outside the workspace, imported by its bare SPECIFIER
    Ingest {
        specifier: String,
        /// Source of the module's entry point
        file: PathBuf,
    },
    /// Print the index size (names plus files)
    Count,
    /// Serve scan / lookup / codeActions / fixImport requests as JSON-RPC over stdio
    Serve,
}

fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg);
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = match cli.root.clone() {
        Some(r) => r,
        None => std::env::current_dir().context("Failed to get current dir")?,
    };
    let root = root.canonicalize().unwrap_or(root);

    let mut cfg = load_config(&root);
    if cli.double_quotes {
        cfg.formatting.double_quotes = true;
    }
    if cli.tight_braces {
        cfg.formatting.space_between_braces = false;
    }
    let notify = cfg.show_notifications;

    let scanner = ImportScanner::open(&root, cfg.clone()).with_observer(move |s: &ScanSummary| {
        if notify {
            eprintln!("Importable: {}", s.entries);
        }
    });

    match cli.cmd {
        Command::Scan { fresh } => {
            if fresh {
                scanner.index().clear()?;
            }
            let pb = notify.then(|| spinner("building import cache..."));
            let summary = scanner.handle(&ScanRequest::Full)?;
            if let Some(pb) = pb {
                pb.finish_with_message(format!(
                    "[AutoImport] cache creation complete - ({}ms)",
                    summary.elapsed_ms
                ));
            }
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Edit { file } => {
            let summary = scanner.handle(&ScanRequest::Edit { file })?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Delete { file } => {
            let summary = scanner.handle(&ScanRequest::Delete { file })?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Lookup { name } => match scanner.index().get_import(&name) {
            Ok(found) => println!("{}", serde_json::to_string_pretty(&found)?),
            Err(e) if e.is_lookup_miss() => eprintln!("{e}"),
            Err(e) => return Err(e.into()),
        },
        Command::Fix {
            document,
            symbol,
            message,
            pick,
            write,
        } => {
            let symbol = match (symbol, message) {
                (Some(s), _) => s,
                (None, Some(m)) => missing_symbol(&m)?,
                (None, None) => anyhow::bail!("Provide --symbol or --message"),
            };
            let mut candidates = match scanner.index().get_import(&symbol) {
                Ok(found) => found,
                Err(e) if e.is_lookup_miss() => {
                    eprintln!("no suggestion available for `{symbol}`");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            if pick >= candidates.len() {
                anyhow::bail!("--pick {pick} out of range ({} candidates)", candidates.len());
            }
            let chosen = candidates.remove(pick);
            candidates.insert(0, chosen);

            let abs = if document.is_absolute() { document } else { root.join(document) };
            let doc = Document::load(&abs).with_context(|| format!("Failed to read {}", abs.display()))?;
            let edit = ImportSynthesizer::new(cfg.formatting).synthesize(&doc, &symbol, &candidates)?;

            if write {
                if !edit.is_unchanged() {
                    std::fs::write(&abs, edit.apply(&doc.text))
                        .with_context(|| format!("Failed to write {}", abs.display()))?;
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&edit)?);
            }
        }
        Command::Ingest { specifier, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let stored = scanner.ingest_discovered(&specifier, &text)?;
            println!("{stored}");
        }
        Command::Count => println!("{}", scanner.index().count()?),
        Command::Serve => return run_stdio_server(Some(&root)),
    }

    Ok(())
}
