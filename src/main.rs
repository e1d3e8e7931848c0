// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

use soundpad::soundpad::Soundpad;
use soundpad::{audio, config, thread_priority, verify};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=GPIO button sound pad
After=sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/soundpad
ExecStart=/usr/local/bin/soundpad start /etc/soundpad.yaml

[Install]
WantedBy=multi-user.target
Alias=soundpad.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays a sound clip when a button wired to a GPIO pin is pressed."
)]
struct Cli {
    /// Runs `start` with the default configuration when omitted.
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Polls the buttons and plays sounds until interrupted.
    Start {
        /// The path to the config. Defaults to /etc/soundpad.yaml, falling back to
        /// built-in defaults if that doesn't exist.
        config: Option<PathBuf>,
    },
    /// Parses the config and decodes every sound without touching any hardware.
    Verify {
        /// The path to the config.
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Start { config: None }) {
        Commands::Start { config } => start(config).await?,
        Commands::Verify { config } => {
            let config = config::load(config.as_deref())?;
            let report = verify::verify(&config);

            println!("Channels (count: {}):", report.channels.len());
            for channel in report.channels.iter() {
                println!("- {}", channel);
            }

            if report.has_errors() {
                return Err("one or more sounds could not be loaded".into());
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

/// Runs the poll loop on a blocking thread until SIGINT or SIGTERM.
async fn start(path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    // Registered before any pin is claimed, so a signal can always release them.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let config = config::load(path.as_deref())?;
    let soundpad = Soundpad::from_config(&config)?;
    let cancel_handle = soundpad.cancel_handle();

    let mut poll_loop = tokio::task::spawn_blocking(move || {
        thread_priority::configure_poll_thread_priority(thread_priority::poll_thread_priority());
        soundpad.run();
    });

    tokio::select! {
        result = &mut poll_loop => {
            result?;
            return Ok(());
        }
        _ = sigint.recv() => {
            info!("Received SIGINT.");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM.");
        }
    }

    cancel_handle.cancel();
    poll_loop.await?;
    info!("Shut down cleanly.");
    Ok(())
}
