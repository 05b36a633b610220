//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tran_core::{config, interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "tran")]
#[command(version)]
#[command(about = "Translate text in place with a streaming LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Translates text through a simulated editing surface
    Translate {
        /// Text to translate (read from stdin when omitted)
        #[arg(short, long)]
        text: Option<String>,

        /// Selected char range, e.g. 0..5 (default: everything)
        #[arg(long, value_name = "START..END", value_parser = parse_selection, conflicts_with = "caret")]
        select: Option<(usize, usize)>,

        /// Caret position; translates the text before it
        #[arg(long, value_name = "OFFSET")]
        caret: Option<usize>,

        /// Kind of editing surface to simulate
        #[arg(long, value_enum, default_value_t = SurfaceKind::Textarea)]
        surface: SurfaceKind,

        /// Document origin, used for framework detection
        #[arg(long, default_value = "localhost")]
        origin: String,

        /// Override the target language from config
        #[arg(long, value_name = "LANGUAGE")]
        to: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print the effective configuration
    Show,
}

/// Editing surface simulated by `translate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SurfaceKind {
    /// A `<textarea>` flat buffer
    Textarea,
    /// A single-line `<input type="text">`
    Input,
    /// A contenteditable host with one text node
    Editable,
    /// A contenteditable host whose text spans several nodes
    Rich,
}

fn parse_selection(raw: &str) -> Result<(usize, usize), String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("Invalid selection '{raw}'. Use START..END"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|err| format!("Invalid selection start '{start}': {err}"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|err| format!("Invalid selection end '{end}': {err}"))?;
    if start > end {
        return Err(format!("Selection start {start} is after end {end}"));
    }
    Ok((start, end))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init_tracing(cli.verbose, cli.log_file.as_deref())?;
    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli.command).await })
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Translate {
            text,
            select,
            caret,
            surface,
            origin,
            to,
            model,
        } => {
            let mut config = config::Config::load().context("load config")?;
            if let Some(language) = to {
                config.target_language = language;
            }
            if let Some(model) = model {
                config.model = model;
            }
            commands::translate::run(commands::translate::TranslateOptions {
                config: &config,
                text,
                cursor: match (select, caret) {
                    (Some((start, end)), _) => commands::translate::Cursor::Select(start, end),
                    (None, Some(offset)) => commands::translate::Cursor::Caret(offset),
                    (None, None) => commands::translate::Cursor::All,
                },
                surface,
                origin: &origin,
            })
            .await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Show => commands::config::show(),
        },
    }
}
