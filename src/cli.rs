use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::clipboard::{ClipboardConfig, ClipboardKind};

#[derive(Parser)]
#[command(name = "wlclipd", about = "Wayland clipboard and primary selection tool")]
pub struct Cli {
    /// Give up on a paste after this many milliseconds
    #[arg(long, global = true, default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Dispatch thread wake-up interval in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    pub poll_interval_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config(&self) -> ClipboardConfig {
        ClipboardConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Offer FILE (or stdin) on the clipboard until another client takes it
    Copy {
        /// Use the primary selection instead of the regular clipboard
        #[arg(long)]
        primary: bool,

        /// MIME type to offer, repeatable (default: text types for UTF-8
        /// input, application/octet-stream otherwise)
        #[arg(long = "type", value_name = "MIME")]
        types: Vec<String>,

        /// Input serial authorizing the claim (default: last keyboard serial)
        #[arg(long)]
        serial: Option<u32>,

        /// File to copy; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Write the current clipboard contents to stdout
    Paste {
        /// Use the primary selection instead of the regular clipboard
        #[arg(long)]
        primary: bool,

        /// MIME type to request (default: best text type offered)
        #[arg(long = "type", value_name = "MIME")]
        mime_type: Option<String>,
    },

    /// Print clipboard events until interrupted
    Watch {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
}

/// Clipboard selected by a `--primary` flag.
pub fn kind_for(primary: bool) -> ClipboardKind {
    if primary {
        ClipboardKind::PrimarySelection
    } else {
        ClipboardKind::Regular
    }
}
