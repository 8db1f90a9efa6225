// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kbox")]
#[command(about = "Local development engine: provider VM and container lifecycle")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the provider VM up
    Up,

    /// Shut the provider VM down
    Down,

    /// Show whether the provider VM is up or down
    Status,

    /// Print the provider VM's IP address
    Ip,

    /// List this tool's containers
    Containers {
        /// Only containers belonging to this app
        #[arg(long)]
        app: Option<String>,
    },

    /// Show a container's identity, ports and running state
    Info {
        /// Container id or name
        container: String,
    },

    /// Run a command in a container and print its output
    Query {
        /// Container id or name
        container: String,

        #[arg(required = true, trailing_var_arg = true)]
        cmd: Vec<String>,
    },

    /// Open an interactive shell in a container
    Shell {
        /// Container id or name
        container: String,
    },

    /// Pull an image, or build it from its build-definition file
    Image {
        /// Image name, e.g. `web` or `kalabox/debian:stable`
        name: String,

        /// Build instead of pulling
        #[arg(long)]
        build: bool,

        /// Build-definition file to build from
        #[arg(long, requires = "build")]
        src: Option<PathBuf>,
    },

    /// Run a command in a throwaway container and exit with its status
    Run {
        image: String,

        #[arg(required = true, trailing_var_arg = true)]
        cmd: Vec<String>,
    },
}
