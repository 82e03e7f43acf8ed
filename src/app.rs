//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::config::SourceKind;
use crate::logging;
use anyhow::anyhow;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// Checks if setup is needed (version mismatch or missing config) and runs setup if required.
///
/// This is called early in the startup sequence, before command handling.
/// It checks:
/// 1. If config file doesn't exist, runs full setup
/// 2. If config version is older than app version, runs setup and logs migration
/// 3. If config version matches app version, does nothing
async fn check_and_run_setup() -> Result<(), anyhow::Error> {
    let config_path = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("auscult")
        .join("auscult.toml");

    let needs_setup = !config_path.exists()
        || crate::setup::version::check_setup_needed(&config_path)?.is_some();

    if needs_setup {
        tracing::info!(
            "Setup needed - writing default config for version {}",
            env!("CARGO_PKG_VERSION")
        );
        crate::setup::run_setup().map_err(|e| {
            tracing::error!("Setup failed: {e}");
            anyhow!("Setup failed: {e}")
        })?;
        crate::setup::version::update_config_version(&config_path).map_err(|e| {
            tracing::error!("Failed to update config version: {e}");
            anyhow!("Failed to update config version: {e}")
        })?;
        tracing::info!("Setup completed successfully");
    } else {
        tracing::debug!("Config version up to date ({})", env!("CARGO_PKG_VERSION"));
    }

    Ok(())
}

/// A terminal-based clinical auscultation recorder with real-time waveform charting
#[derive(Parser)]
#[command(name = "auscult")]
#[command(version)]
#[command(about = "Terminal-based clinical auscultation recorder")]
#[command(
    long_about = "A terminal-based clinical auscultation recorder.\n\nCaptures acoustic sessions from a microphone or BLE stethoscope sensor,\ncharts the waveform in real time, and stores finished sessions alongside\npatient records with a WAV artifact per session.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Capture a session and save it interactively\n    $ auscult\n    $ auscult record\n    \n    # Capture for a known patient from the BLE sensor\n    $ auscult record --patient 3 --source ble\n    \n    # Browse a patient's saved sessions\n    $ auscult history\n    \n    # Review a saved session by id\n    $ auscult review 17\n    \n    # Register a patient\n    $ auscult patients add"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/auscult/auscult.toml\n    Database:           ~/.local/share/auscult/auscult.db\n    Recordings:         ~/.local/share/auscult/recordings/\n    Logs:               ~/.local/state/auscult/auscult.log.*"
)]
struct Cli {
    /// Patient id to preselect in the save flow (record default command)
    #[arg(short, long, global = true)]
    patient: Option<i64>,

    /// Capture source: mic or ble (record default command)
    #[arg(short, long, global = true)]
    source: Option<SourceKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a session with real-time waveform charting (default)
    ///
    /// Press Enter to stop and review, Escape/q to cancel.
    /// After stopping, the session can be played back and saved to a
    /// patient's record.
    #[command(visible_alias = "r")]
    Record {
        /// Patient id to preselect in the save flow
        #[arg(short, long)]
        patient: Option<i64>,

        /// Capture source: mic or ble
        #[arg(short, long)]
        source: Option<SourceKind>,
    },

    /// Review a saved metering
    ///
    /// Charts the full recording with horizontal scrolling, plays back the
    /// WAV artifact with a position cursor, and allows editing the clinical
    /// tag and observations.
    #[command(visible_alias = "v")]
    Review {
        /// Metering id (see 'auscult history')
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Manage patient records
    #[command(visible_alias = "p")]
    Patients {
        #[command(subcommand)]
        command: Option<PatientsCommand>,
    },

    /// Browse a patient's saved meterings
    ///
    /// Use arrow keys to navigate, Enter to review, Esc to exit.
    #[command(visible_alias = "h")]
    History {
        /// Patient id; prompted for interactively when omitted
        #[arg(value_name = "PATIENT")]
        patient: Option<i64>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio, chart, and sensor settings.
    /// Uses $EDITOR environment variable or falls back to nano/vim.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in auscult.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PatientsCommand {
    /// Register a new patient
    Add,
    /// List registered patients (default)
    List,
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If setup fails
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "auscult", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    // Check if setup is needed (version check or missing config)
    check_and_run_setup().await?;

    // Route to appropriate command handler
    match cli.command {
        None | Some(Commands::Record { .. }) => {
            // Default command is record
            // Merge top-level options with explicit record command options
            let (patient, source) = match cli.command {
                Some(Commands::Record { patient, source }) => (patient, source),
                None => (cli.patient, cli.source),
                _ => unreachable!(),
            };
            commands::handle_record(patient, source).await?;
        }
        Some(Commands::Review { id }) => {
            commands::handle_review(id).await?;
        }
        Some(Commands::Patients { command }) => match command {
            Some(PatientsCommand::Add) => commands::handle_patients_add().await?,
            Some(PatientsCommand::List) | None => commands::handle_patients_list()?,
        },
        Some(Commands::History { patient }) => {
            commands::handle_history(patient).await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
