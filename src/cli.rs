use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::eventlog::delivery::Method;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pagelog",
    about = "Log page events to local listeners and a remote collector",
    version,
    after_help = "Logs are written to: ~/.local/share/pagelog/logs/pagelog.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to pagelog.yaml config file")]
    pub config: Option<PathBuf>,

    /// Record requests and print them instead of sending. Each request is
    /// printed as one `dry-run <json>` line after the command finishes.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Page URL reported with each event (overrides config)
    #[arg(long, global = true)]
    pub page: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log a single event
    Emit {
        /// Event type (e.g. problem_check, edx.course.student_notes.viewed)
        event_type: String,

        /// Event payload JSON (a bare word is sent as a JSON string)
        #[arg(long, short = 'd')]
        data: Option<String>,

        /// Element the event concerns
        #[arg(long, short = 'e')]
        element: Option<String>,

        /// Override the delivery method
        #[arg(long, value_enum)]
        method: Option<Method>,

        /// Wait for the collector before returning
        #[arg(long)]
        blocking: bool,

        /// Override the delivery URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Replay a JSONL session of events, then send page_close
    Replay {
        /// Session file (reads stdin if not provided)
        file: Option<PathBuf>,

        /// Skip the closing page_close flush
        #[arg(long)]
        no_flush: bool,
    },

    /// List listeners declared in configuration
    Listeners {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Config key (e.g. collector.endpoint)
        key: String,
    },
}
