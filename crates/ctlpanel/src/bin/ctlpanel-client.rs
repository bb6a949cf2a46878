//! # ctlpanel-client
//!
//! Command-line client: sends JSON commands or recorded audio clips to a
//! running control panel server and prints the replies.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ctlpanel::client;
use ctlpanel_core::logging::init_subscriber;
use ctlpanel_settings::load_settings;
use serde_json::Value;
use tracing::warn;

/// Control panel client.
#[derive(Parser, Debug)]
#[command(name = "ctlpanel-client", about = "Control panel client")]
struct Cli {
    /// Server URL.
    #[arg(long, default_value = "ws://localhost:9000")]
    url: String,

    /// Log filter.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a JSON command and print the reply.
    Command {
        /// Command id.
        #[arg(long, allow_negative_numbers = true)]
        id: i64,
        /// JSON payload.
        #[arg(long, default_value = "null")]
        data: String,
        /// Number of times to send it.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Record from the configured audio device and stream the clip.
    Audio {
        /// Clip length in seconds.
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
        /// Number of clips to send.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load_settings().unwrap_or_default();
    init_subscriber(&args.log_level, settings.logging.format);

    let mut ws = client::connect(&args.url).await?;

    match args.command {
        Command::Command { id, data, repeat } => {
            let data: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
            for _ in 0..repeat {
                let reply = client::send_command(&mut ws, id, data.clone()).await?;
                println!("{}", reply.to_json());
                if reply.is_sentinel() {
                    break;
                }
            }
        }
        Command::Audio { seconds, repeat } => {
            let device = ctlpanel::build_audio_device(&settings.audio)?;
            for _ in 0..repeat {
                let clip = client::record_clip(device.clone(), seconds).await?;
                let ack = client::send_clip(&mut ws, &clip).await?;
                println!("{ack}");
            }
        }
    }

    if let Err(e) = client::close(ws).await {
        warn!(error = %e, "close failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_subcommand_parses() {
        let cli = Cli::parse_from([
            "ctlpanel-client",
            "command",
            "--id",
            "1",
            "--data",
            "[1, 2]",
            "--repeat",
            "3",
        ]);
        assert_eq!(cli.url, "ws://localhost:9000");
        match cli.command {
            Command::Command { id, data, repeat } => {
                assert_eq!(id, 1);
                assert_eq!(data, "[1, 2]");
                assert_eq!(repeat, 3);
            }
            Command::Audio { .. } => panic!("expected command"),
        }
    }

    #[test]
    fn negative_id_parses() {
        let cli = Cli::parse_from(["ctlpanel-client", "command", "--id", "-4"]);
        match cli.command {
            Command::Command { id, data, .. } => {
                assert_eq!(id, -4);
                assert_eq!(data, "null");
            }
            Command::Audio { .. } => panic!("expected command"),
        }
    }

    #[test]
    fn audio_subcommand_defaults() {
        let cli = Cli::parse_from(["ctlpanel-client", "--url", "ws://h:1", "audio"]);
        assert_eq!(cli.url, "ws://h:1");
        match cli.command {
            Command::Audio { seconds, repeat } => {
                assert!((seconds - 1.0).abs() < f64::EPSILON);
                assert_eq!(repeat, 1);
            }
            Command::Command { .. } => panic!("expected audio"),
        }
    }
}
