//! pipview CLI: run the PiP session host and talk to it.
//!
//! Usage:
//!   pipview serve [OPTIONS]          Run the session registry until Ctrl-C
//!   pipview send --title T --bbox .. Ask a running instance to open a window PiP
//!   pipview sources                  List capturable monitors and windows
//!   pipview check                    Check platform capabilities

use clap::{Parser, Subcommand};
use pipview_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "pipview",
    about = "Picture-in-picture viewer for monitors, windows and screen regions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session registry and remote ingress listener
    Serve {
        /// Open a session for this source id at startup (repeatable)
        #[arg(long = "open", value_name = "SOURCE_ID")]
        open: Vec<String>,

        /// Do not start the remote ingress listener
        #[arg(long)]
        no_ingress: bool,

        /// Override the ingress port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send a create_window_pip request to a running instance
    Send {
        /// Window title
        #[arg(long)]
        title: String,

        /// Window bounding box as x,y,w,h
        #[arg(long, value_parser = commands::send::parse_bbox)]
        bbox: [i64; 4],

        /// Native window handle
        #[arg(long)]
        hwnd: Option<u64>,

        /// Ingress port (defaults to the configured one)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List monitors and windows known to the capture backend
    Sources,

    /// Check platform capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    pipview_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve {
            open,
            no_ingress,
            port,
        } => commands::serve::run(config, open, !no_ingress, port).await,
        Commands::Send {
            title,
            bbox,
            hwnd,
            port,
        } => commands::send::run(&config, title, bbox, hwnd, port).await,
        Commands::Sources => commands::sources::run(&config).await,
        Commands::Check => commands::check::run(&config),
    }
}
