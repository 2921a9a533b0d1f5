use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doreveal_lib::{ToolEnv, ToolkitSettings, ToolsSource};
use log::error;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and convert local media files with a self-provisioned FFmpeg toolkit.
#[derive(Parser, Debug)]
#[command(name = "doreveal", version)]
struct Cli {
    /// Settings file. Defaults to the per-user config directory.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Use ffmpeg and ffprobe from this directory instead of the managed toolkit.
    #[arg(long, global = true, conflicts_with = "system_tools")]
    tools_dir: Option<PathBuf>,

    /// Use ffmpeg and ffprobe from the inherited PATH.
    #[arg(long, global = true)]
    system_tools: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Make sure the toolkit is installed and report where it lives.
    Setup,
    /// Report the resolved ffmpeg and ffprobe executables.
    Status,
    /// Probe a media file.
    Inspect {
        path: String,
    },
    /// Convert a media file next to the original.
    Convert {
        path: String,

        /// Target container: mp4, m4a or mp3.
        #[arg(long = "to")]
        target: String,

        /// Playback speed between 0.5 and 2.0. Only applies to mp4; ignored for m4a and mp3.
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Open a file or directory with the desktop's default handler.
    Open {
        path: String,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;

    match cli.command {
        Command::Setup | Command::Status => {
            let env = tool_env(&settings)?;
            print_json(&doreveal_lib::tools_status(&env, &settings))
        }
        Command::Inspect { path } => {
            let env = tool_env(&settings)?;
            print_json(&doreveal_lib::inspect_media(&env, &path)?)
        }
        Command::Convert {
            path,
            target,
            speed,
        } => {
            let env = tool_env(&settings)?;
            print_json(&doreveal_lib::convert_media(&env, &path, &target, speed)?)
        }
        Command::Open { path } => {
            doreveal_lib::open_path(&path)?;
            Ok(())
        }
    }
}

fn tool_env(settings: &ToolkitSettings) -> Result<ToolEnv> {
    doreveal_lib::prepare_tools(settings).context("FFmpeg toolkit is not available")
}

fn load_settings(cli: &Cli) -> Result<ToolkitSettings> {
    let mut settings = ToolkitSettings::load(cli.settings.as_deref())?;
    if let Some(dir) = cli.tools_dir.as_ref() {
        settings.tools_source = ToolsSource::Custom;
        settings.tools_dir = Some(dir.to_string_lossy().to_string());
    } else if cli.system_tools {
        settings.tools_source = ToolsSource::System;
    }
    Ok(settings.normalized()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
