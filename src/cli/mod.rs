//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// chatmirror CLI - incremental Crisp workspace mirroring
#[derive(Parser, Debug)]
#[command(name = "cm", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API identifier (basic auth user)
    #[arg(long, global = true, env = "CM_IDENTIFIER")]
    pub identifier: Option<String>,

    /// API key (basic auth password)
    #[arg(long, global = true, env = "CM_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Website (workspace) ID
    #[arg(long, global = true, env = "CM_SITE")]
    pub site: Option<String>,

    /// Archive directory (default: ~/.chatmirror)
    #[arg(long, global = true, env = "CM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// API root URL
    #[arg(
        long,
        global = true,
        env = "CM_BASE_URL",
        default_value = "https://api.crisp.chat/v1"
    )]
    pub base_url: String,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the workspace conversation list
    Conversations(ConversationsArgs),

    /// Mirror message history, conversation by conversation
    Messages(MessagesArgs),

    /// Mirror user profiles for emails seen in conversations
    People(PeopleArgs),

    /// Show archive contents and cursor positions
    Status,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ConversationsArgs {
    /// Maximum new conversations to add this run
    #[arg(long, default_value_t = 400)]
    pub count: usize,

    /// Delete the conversation store and its cursor before syncing
    #[arg(long)]
    pub reset: bool,
}

#[derive(Args, Debug)]
pub struct MessagesArgs {
    /// Maximum conversations to process this run
    #[arg(long, default_value_t = 50)]
    pub count: usize,

    /// Restart the conversation walk from the beginning
    #[arg(long)]
    pub reset: bool,
}

#[derive(Args, Debug)]
pub struct PeopleArgs {
    /// Maximum new profiles to add this run
    #[arg(long, default_value_t = 50)]
    pub count: usize,

    /// Delete the people store before syncing
    #[arg(long)]
    pub reset: bool,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
