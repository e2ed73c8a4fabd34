use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "teamhub")]
#[command(about = "Offline-first team workspace from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config profile
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip the connectivity probe and work offline
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync phase, connectivity and queue size
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage shared files
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },
    /// Read and post chat messages
    #[command(alias = "chat")]
    Messages {
        #[command(subcommand)]
        command: MessagesCommands,
    },
    /// Manage team members
    Members {
        #[command(subcommand)]
        command: MembersCommands,
    },
    /// List changes waiting to be synced
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued changes and refresh from the server
    Sync,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum FilesCommands {
    /// Share a file
    Add {
        /// File name
        name: String,
        /// Size in bytes
        #[arg(long, default_value = "0")]
        size: i64,
        /// MIME type
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        /// Uploader display name
        #[arg(long = "by", value_name = "NAME", default_value = "You")]
        uploaded_by: String,
        /// Optional download URL
        #[arg(long)]
        url: Option<String>,
    },
    /// List shared files
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a shared file
    #[command(alias = "delete")]
    Rm {
        /// File ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MessagesCommands {
    /// Post a message
    Send {
        /// Message content
        content: Vec<String>,
        /// Sender display name
        #[arg(long, value_name = "NAME", default_value = "You")]
        sender: String,
    },
    /// List recent messages
    List {
        /// Number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the content of a message
    Edit {
        /// Message ID or unique ID prefix
        id: String,
        /// New content
        content: Vec<String>,
    },
    /// Delete a message
    #[command(alias = "delete")]
    Rm {
        /// Message ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MembersCommands {
    /// List team members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a member
    Add {
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Role (owner, admin, member)
        #[arg(long, default_value = "member")]
        role: String,
    },
    /// Change a member's details
    Update {
        /// Member ID or unique ID prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Role (owner, admin, member)
        #[arg(long)]
        role: Option<String>,
        /// Status (active, invited, inactive)
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove a member
    #[command(alias = "delete")]
    Rm {
        /// Member ID or unique ID prefix
        id: String,
    },
}
