// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VoxRelay - a WhatsApp voice sales assistant relay.
//!
//! This is the binary entry point for the relay server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;

/// VoxRelay - a WhatsApp voice sales assistant relay.
#[derive(Parser, Debug)]
#[command(name = "voxrelay", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (default: XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Load the configuration, validate it, and print a summary.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> voxrelay_config::RelayConfig {
    let result = match path {
        Some(path) => voxrelay_config::load_and_validate_path(path),
        None => voxrelay_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            voxrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("voxrelay: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            print_config_summary(&config);
        }
    }
}

/// Prints the resolved configuration with secrets elided.
fn print_config_summary(config: &voxrelay_config::RelayConfig) {
    println!("server:       {}:{}", config.server.host, config.server.port);
    println!("instance:     {}", config.evolution.instance_name);
    println!("gateway:      {}", config.evolution.base_url);
    println!(
        "models:       {} (fallback {})",
        config.llm.primary_model, config.llm.fallback_model
    );
    println!("transcriber:  {}", config.whisper.model);
    println!(
        "tts:          azure={} edge={}",
        if config.tts.azure_key.is_some() {
            config.tts.azure_voice.as_str()
        } else {
            "disabled"
        },
        config.tts.edge_voice
    );
    println!("response:     {}", config.relay.response_type);
    println!("notification: {}", config.notification.sink);
}
