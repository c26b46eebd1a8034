//! otpkey - provisioning tool for otpkey hardware tokens
//!
//! Connects to the token over its serial port, sets its clock, and manages
//! the keys stored on it, either from an interactive menu or as one-shot
//! commands.

mod commands;
mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use otpkey_client::{list_ports, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "otpkey")]
#[command(about = "Provision and administer otpkey hardware tokens over serial")]
#[command(version)]
struct Cli {
    /// Serial port of the device (asked interactively when omitted)
    #[arg(short, long)]
    port: Option<String>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Line speed
    #[arg(long)]
    baud: Option<u32>,

    /// Maximum wait for a device reply, in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Port open attempts before giving up (0 = retry forever)
    #[arg(long)]
    retry_attempts: Option<u32>,

    /// Pause between port open attempts, in milliseconds
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Pause after opening the port before the first command, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply_to(&self, config: &mut Config) {
        if let Some(ref port) = self.port {
            config.device.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.device.baud_rate = baud;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.device.read_timeout_ms = ms;
        }
        if let Some(ms) = self.settle_ms {
            config.device.settle_ms = ms;
        }
        if let Some(n) = self.retry_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = self.retry_interval_ms {
            config.retry.interval_ms = ms;
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start the interactive menu
    Shell,

    /// List available serial ports
    Ports,

    /// Set the device clock to the current time
    Sync,

    /// List keys stored on the device
    List,

    /// Add a key
    Add {
        /// Key name (3 characters; longer names are truncated)
        #[arg(short, long)]
        name: String,

        /// Secret in base32
        #[arg(short, long)]
        secret: String,
    },

    /// Delete a key by its position in `list` (1-based)
    Delete {
        /// Position as shown by `list`
        position: u32,
    },

    /// Erase every key on the device
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate()?;

    match cli.command {
        Some(Commands::Shell) | None => repl::run(&config),
        Some(Commands::Ports) => {
            for (i, port) in list_ports()?.iter().enumerate() {
                println!("{}. {} {}", i + 1, port.name.cyan(), port.description.dimmed());
            }
            Ok(())
        }
        Some(cmd) => {
            if let Commands::Wipe { yes: false } = cmd {
                return Err("wipe erases every key on the device; pass --yes to confirm".into());
            }

            let port = match config.device.port.clone() {
                Some(port) => port,
                None => only_port()?,
            };

            let (mut session, sync) = Session::connect(config.connection_config(&port))?;
            if let Commands::Sync = cmd {
                // The handshake already synced the clock.
                session.close();
                println!("{}", commands::format_sync(&sync));
                return Ok(());
            }
            tracing::info!("Handshake reply: {}", sync.reply);

            let result = commands::execute(&mut session, cmd);
            session.close();
            println!("{}", result?);
            Ok(())
        }
    }
}

/// Picks the port when exactly one is present.
fn only_port() -> Result<String, Box<dyn std::error::Error>> {
    let mut ports = list_ports()?;
    if ports.len() == 1 {
        let port = ports.remove(0);
        tracing::info!("Using {}", port.name);
        return Ok(port.name);
    }
    Err(format!(
        "{} serial ports found; choose one with --port (see `otpkey ports`)",
        ports.len()
    )
    .into())
}
