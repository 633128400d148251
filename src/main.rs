// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use pwp_vision::circle_pipeline;
use pwp_vision::config::{CirclePreset, Config};
use pwp_vision::display::Display;
use pwp_vision::lane_pipeline;
use pwp_vision::source::{expand_sources, FrameSource};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pwp-vision", about = "Hough-based can and lane detection")]
struct Cli {
    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write annotated output instead of opening windows
    #[arg(long)]
    headless: bool,

    /// Where headless output goes
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the largest circle (can rim or bottom)
    Circles {
        #[arg(long, value_enum, default_value_t = CirclePreset::RollingCan)]
        preset: CirclePreset,
        /// Camera index, image, video or directory of videos
        source: String,
    },
    /// Overlay averaged lane lines and their center line
    Lanes {
        /// Camera index, video or directory of videos
        source: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.headless {
        config.display.headless = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.display.output_dir = dir.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("PWP vision starting");

    let source_arg = match &cli.command {
        Command::Circles { source, .. } | Command::Lanes { source } => source,
    };
    let sources = expand_sources(source_arg)?;

    let mut display = Display::new(&config.display);
    let mut failures = 0usize;

    for (idx, source) in sources.iter().enumerate() {
        info!("Processing {}/{}: {:?}", idx + 1, sources.len(), source);

        let outcome = match &cli.command {
            Command::Circles { preset, .. } => {
                let circle_config = config.circle_for(*preset)?;
                match source {
                    FrameSource::Image(path) => {
                        circle_pipeline::run_image(path, circle_config, &mut display).map(|_| ())
                    }
                    _ => circle_pipeline::run_stream(source, circle_config, &mut display).map(|_| ()),
                }
            }
            Command::Lanes { .. } => match source {
                FrameSource::Image(path) => Err(anyhow::anyhow!(
                    "Lane detection needs a stream, got image {}",
                    path.display()
                )),
                _ => lane_pipeline::run_stream(source, config.lanes.clone(), &mut display).map(|_| ()),
            },
        };

        if let Err(e) = outcome {
            error!("Failed to process {:?}: {:#}", source, e);
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} sources failed", failures, sources.len());
    }

    Ok(())
}
