use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clipxfer::config::{SnapshotPolicy, TransferOptions};

#[derive(Parser)]
#[command(name = "clipxfer", about = "Copy from and paste into the focused app through the clipboard")]
pub struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log protocol steps (debug level unless RUST_LOG is set)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub transfer: TransferFlags,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `[transfer]` table of the config file.
#[derive(Args)]
pub struct TransferFlags {
    /// Leave the transferred data on the clipboard
    #[arg(long, global = true)]
    pub no_restore: bool,

    /// Which formats to save and restore around a transfer
    #[arg(long, global = true, value_enum)]
    pub snapshot: Option<SnapshotPolicy>,

    /// Do not block user input during a transfer
    #[arg(long, global = true)]
    pub no_block_input: bool,

    /// Send Enter after pasting text that ends in a newline
    #[arg(long, global = true)]
    pub paste_enter: bool,
}

impl TransferFlags {
    pub fn apply(&self, options: &mut TransferOptions) {
        if self.no_restore {
            options.restore = false;
        }
        if let Some(policy) = self.snapshot {
            options.snapshot = policy;
        }
        if self.no_block_input {
            options.block_input = false;
        }
        if self.paste_enter {
            options.paste_enter = true;
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy the selection of the focused app and print it
    Copy {
        /// Cut instead of copy
        #[arg(long)]
        cut: bool,
    },

    /// Paste into the focused app
    Paste {
        /// Text to paste
        text: Option<String>,

        /// Read the text from stdin
        #[arg(long, conflicts_with = "text")]
        stdin: bool,

        /// Extra registered format, as NAME=FILE
        #[arg(long = "format", value_name = "NAME=FILE", value_parser = parse_format_arg)]
        formats: Vec<(String, PathBuf)>,
    },

    /// Print the clipboard text
    Get,

    /// Put text on the clipboard
    Set {
        text: String,
    },

    /// Empty the clipboard
    Clear,

    /// List the formats on the clipboard
    Formats,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Copy { .. } => "copy",
            Command::Paste { .. } => "paste",
            Command::Get => "get",
            Command::Set { .. } => "set",
            Command::Clear => "clear",
            Command::Formats => "formats",
        }
    }
}

fn parse_format_arg(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, file)) if !name.is_empty() && !file.is_empty() => Ok((name.to_string(), PathBuf::from(file))),
        _ => Err(format!("expected NAME=FILE, got {arg:?}")),
    }
}
