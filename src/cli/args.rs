//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--repo <owner/name>` or `--remote <url>`: Repository to operate on
//! - `--branch <name>` / `-b`: Branch (default from config, else `main`)
//! - `--api-base <url>`: API root override
//! - `--config <path>`: Use this config file only
//! - `--compare-and-swap`: Refuse to advance a branch that moved
//! - `--debug`: Enable debug logging

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// ghtree - edit files in a GitHub repository through the git data API
#[derive(Parser, Debug)]
#[command(name = "ghtree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository as owner/name
    #[arg(long, global = true, conflicts_with = "remote")]
    pub repo: Option<String>,

    /// Repository as a GitHub remote URL (SSH or HTTPS)
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Branch to operate on
    #[arg(short, long, global = true)]
    pub branch: Option<String>,

    /// API root, e.g. for GitHub Enterprise
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Read configuration from this file only
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Check the branch has not moved before advancing it
    #[arg(long, global = true)]
    pub compare_and_swap: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a file's content
    #[command(
        after_help = "\
EXAMPLES:
    ghtree --repo octocat/hello read README.md
    ghtree --repo octocat/hello -b dev read docs/guide.md > guide.md"
    )]
    Read {
        /// Path within the repository
        path: String,
    },

    /// Create or replace a file in one commit
    #[command(
        group(ArgGroup::new("source").required(true).args(["content", "file"])),
        after_help = "\
EXAMPLES:
    ghtree --repo octocat/hello write notes.txt --content 'hello' -m 'Add notes'
    ghtree --repo octocat/hello write logo.png --file ./logo.png -m 'Add logo'"
    )]
    Write {
        /// Path within the repository
        path: String,

        /// Literal file content
        #[arg(long)]
        content: Option<String>,

        /// Read content from a local file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Delete a file or directory in one commit
    Rm {
        /// Path within the repository
        path: String,

        /// Commit message (default: "Deleted <path>")
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move a file or directory in one commit
    Mv {
        /// Current path
        from: String,

        /// New path
        to: String,

        /// Commit message (default: "Moved <from> to <to>")
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the commit the branch points at
    Tip,

    /// List branches
    Branches,

    /// Create a branch from another branch's tip
    Branch {
        /// Name of the new branch
        name: String,

        /// Source branch (default: --branch, else the default branch)
        #[arg(long)]
        from: Option<String>,
    },

    /// Show commit history
    Log {
        /// Only commits touching this path
        #[arg(long)]
        path: Option<String>,

        /// Only commits after this ISO 8601 timestamp
        #[arg(long)]
        since: Option<String>,

        /// Only commits before this ISO 8601 timestamp
        #[arg(long)]
        until: Option<String>,

        /// Show at most this many commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}
