//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for roomforge-cli.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// roomforge CLI - headless room scanning and project management
#[derive(Parser, Debug, Clone)]
#[command(name = "roomforge-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (default: ~/.roomforge/settings.toml)
    #[arg(long, global = true, env = "ROOMFORGE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Override the project data directory from settings
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output results and events as JSON lines (for scripting/parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Only output final results (suppress progress)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Report whether room capture is available
    Capability {
        /// Check a capture recording instead of the platform source
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// List projects, newest first
    Projects,

    /// Create an empty project
    NewProject,

    /// Delete a project and all its files
    DeleteProject { id: String },

    /// Run a scan from a recorded capture
    Scan {
        /// Capture recording (JSON)
        #[arg(long)]
        replay: PathBuf,

        /// Add the room to this project instead of creating a new one
        #[arg(long)]
        project: Option<String>,

        /// Do not seed the capture with the stored world anchor
        #[arg(long)]
        no_relocalize: bool,
    },

    /// List the rooms stored in a project
    Rooms { project: String },

    /// List exported models in a project
    Artifacts { project: String },

    /// Print a room metadata file (path or file:// URI)
    Read { path: String },

    /// Open a model file in the system viewer
    Preview { path: String },

    /// Delete every exported model and room file in a project
    Clear { project: String },

    /// Import an external model
    Import {
        /// Model file (path or file:// URI)
        source: String,

        /// Copy into this project; otherwise a new Import_ project is created
        #[arg(long)]
        project: Option<String>,
    },

    /// Recompute a project's combined export from its rooms
    Rebuild { project: String },

    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Print the settings file path
    Path,
    /// Print a value by dot-notation key, e.g. merge.stitch_distance
    Get { key: String },
    /// Set a value by dot-notation key; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_flags() {
        let args = Args::parse_from(["roomforge-cli", "projects"]);
        assert_eq!(args.command, Command::Projects);
        assert!(!args.json);
        assert!(!args.quiet);
        assert!(!args.verbose);
        assert!(args.data_dir.is_none());
    }

    #[test]
    fn test_args_scan() {
        let args = Args::parse_from([
            "roomforge-cli",
            "scan",
            "--replay",
            "kitchen.json",
            "--project",
            "Room_1700000000000",
        ]);
        assert_eq!(
            args.command,
            Command::Scan {
                replay: PathBuf::from("kitchen.json"),
                project: Some("Room_1700000000000".to_string()),
                no_relocalize: false,
            }
        );
    }

    #[test]
    fn test_args_global_flags_after_subcommand() {
        let args = Args::parse_from(["roomforge-cli", "rooms", "Room_1", "--json", "-v"]);
        assert!(args.json);
        assert!(args.verbose);
    }

    #[test]
    fn test_args_scan_requires_replay() {
        assert!(Args::try_parse_from(["roomforge-cli", "scan"]).is_err());
    }

    #[test]
    fn test_args_config_set() {
        let args = Args::parse_from([
            "roomforge-cli",
            "config",
            "set",
            "merge.stitch_distance",
            "0.2",
        ]);
        assert_eq!(
            args.command,
            Command::Config {
                action: ConfigAction::Set {
                    key: "merge.stitch_distance".to_string(),
                    value: "0.2".to_string(),
                }
            }
        );
    }
}
