use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Create Markdown notes from pluggable templates.
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this settings record instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a protocol call: a URI, a query string, or key=value words.
    ///
    /// Example: stencil invoke 'stencil://create?type=wishlist&url=https%3A%2F%2Fx&title=Foo'
    Invoke {
        #[arg(required = true, num_args = 1..)]
        params: Vec<String>,
    },

    /// Create a file interactively, choosing the template when KEY is omitted.
    Create { key: Option<String> },

    /// Run a command from the command table by id.
    Run { id: String },

    /// Print the command table.
    Commands,

    /// List discovered templates.
    Templates {
        /// Show definitions that failed to load instead.
        #[arg(long)]
        errors: bool,

        /// Print key, export, path and descriptor as JSON.
        #[arg(long, conflicts_with = "errors")]
        json: bool,
    },

    /// Show or change settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current settings record.
    Show,
    /// Print where the settings record lives.
    Path,
    /// Set one KEY=VALUE entry and rewrite the record.
    Set { key: String, value: String },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
