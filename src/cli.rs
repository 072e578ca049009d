use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "monkemod", version, about = "Install and remove BepInEx mods for Gorilla Tag")]
pub struct Cli {
    /// Game installation folder; saved to the config when given.
    #[arg(long, global = true)]
    pub game_path: Option<PathBuf>,

    /// Manifest URL to sync mods from.
    #[arg(long, global = true)]
    pub manifest_url: Option<String>,

    /// Local manifest JSON; takes precedence over `--manifest-url`.
    #[arg(long, global = true)]
    pub manifest_file: Option<PathBuf>,

    /// Where downloads are staged (defaults to ./downloads).
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Choose and save the game folder.
    Setup,
    /// Install BepInEx into the game folder if it is missing.
    Loader,
    /// List every mod in the manifest with its install status.
    List,
    /// Show the install status of one mod.
    Status { name: String },
    /// Install (or reinstall) mods by name.
    Install {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Remove installed mods by name.
    Uninstall {
        #[arg(required = true)]
        names: Vec<String>,
    },
}
