mod cli;

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use cli::{Cli, Command};
use clipxfer::clipboard::{ClipboardData, ClipboardEngine, ClipboardError, PastePayload};
use clipxfer::config::{Config, ConfigError};
use clipxfer::platform::{Platform, PlatformError};
use tracing_subscriber::EnvFilter;

/// Failures of one CLI invocation.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("failed to read {what}: {source}")]
    Input {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("nothing to paste")]
    EmptyPaste,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let name = cli.command.name();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, command = name, "command failed");
        eprintln!("clipxfer {name}: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.transfer.apply(&mut config.transfer);

    let engine = ClipboardEngine::new(Platform::native()?, config.transfer)?;

    match cli.command {
        Command::Copy { cut } => {
            println!("{}", engine.copy(cut)?);
        }
        Command::Paste { text, stdin, formats } => {
            let text = if stdin {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|source| RunError::Input {
                        what: "stdin".into(),
                        source,
                    })?;
                Some(buf)
            } else {
                text
            };
            engine.paste(paste_payload(text, formats)?)?;
        }
        Command::Get => match engine.get_text()? {
            Some(text) => println!("{text}"),
            None => return Err(ClipboardError::NoData.into()),
        },
        Command::Set { text } => engine.set_text(&text)?,
        Command::Clear => engine.clear()?,
        Command::Formats => {
            for report in engine.describe_formats()? {
                println!("{report}");
            }
        }
    }
    Ok(())
}

/// Plain text when no extra formats are given, multi-format data otherwise.
fn paste_payload(text: Option<String>, formats: Vec<(String, PathBuf)>) -> Result<PastePayload, RunError> {
    if formats.is_empty() {
        return match text {
            Some(text) if !text.is_empty() => Ok(PastePayload::Text(text)),
            _ => Err(RunError::EmptyPaste),
        };
    }

    let mut data = ClipboardData::new();
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        data = data.add_text(&text);
    }
    for (name, path) in formats {
        let bytes = std::fs::read(&path).map_err(|source| RunError::Input {
            what: path.display().to_string(),
            source,
        })?;
        data = data.add_format(name, bytes);
    }
    Ok(data.into())
}
