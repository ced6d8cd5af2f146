//! Command-line arguments.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use quire_core::{hash_path, NodeHash};

/// Quire - a virtual file tree kept in step with disk
#[derive(Debug, Parser)]
#[command(name = "quire", version)]
#[command(about = "Open folders as a virtual tree and edit them through atomic actions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.config/quire/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// File that remembers open roots (default: ~/.config/quire/roots.toml)
    #[arg(long, global = true)]
    pub roots_file: Option<PathBuf>,

    /// Open this folder as a root before running the command (repeatable)
    #[arg(long = "root", global = true)]
    pub roots: Vec<PathBuf>,

    /// Print change notifications as JSON lines
    #[arg(long, global = true)]
    pub watch: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print every open root as an indented tree
    Tree,
    /// Open a folder as a root and remember it
    Open { path: PathBuf },
    /// Create a directory
    Mkdir { dir: NodeRef, name: String },
    /// Create a file
    Touch {
        dir: NodeRef,
        /// File name; generated from the configured pattern if omitted
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Overwrite a file's content
    Save { file: NodeRef, content: String },
    /// Print a file's content
    Cat { file: NodeRef },
    /// Rename a file or directory
    Rename { node: NodeRef, name: String },
    /// Move a file or directory into another directory
    Mv { node: NodeRef, dir: NodeRef },
    /// Delete a file or directory from disk
    Rm { node: NodeRef },
    /// Close a root without touching disk
    Close { root: NodeRef },
    /// List the non-document files of a directory
    Attachments { dir: NodeRef },
    /// List available actions, optionally filtered by a fuzzy query
    Actions { query: Option<String> },
}

/// A node given on the command line, either as a 16-digit hash or as an
/// absolute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(pub NodeHash);

impl FromStr for NodeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('/') {
            return Ok(Self(hash_path(std::path::Path::new(s))));
        }
        s.parse::<NodeHash>()
            .map(Self)
            .map_err(|e| format!("expected an absolute path or a node hash: {e}"))
    }
}
