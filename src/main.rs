mod audio_extractor;
mod binary_utils;
mod config;
mod containers;
mod error;
mod formats;
mod graphics;
mod intro_extractor;
mod level_extractor;
mod manifest;
mod model_extractor;
mod picture_extractor;
mod pipeline;
mod progress;
#[cfg(test)]
mod test_fixtures;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{ExtractConfig, GameLayout, DEFAULT_OUTLINE_COLOUR},
    graphics::png::PngOptions,
    pipeline::{initial_step, Pipeline, PipelineStep},
};

#[derive(Parser)]
#[command(name = "carpet_scraper")]
#[command(about = "Converts the game's archives into PNG, OBJ and raw audio assets")]
#[command(version)]
struct Cli {
    /// Game installation directory
    #[arg(long)]
    game_dir: PathBuf,

    /// Output root; an existing directory counts as a finished extraction
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file overriding the built-in file layout
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Integer upscale factor for written images
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=8))]
    upscale: u32,

    /// Palette index used to outline font glyphs
    #[arg(long, default_value_t = DEFAULT_OUTLINE_COLOUR)]
    outline_colour: u8,

    /// Leave font glyphs without an outline
    #[arg(long)]
    no_outline: bool,

    /// Run written PNGs through oxipng
    #[arg(long)]
    optimise_png: bool,

    /// Write progress JSON to this file after every step
    #[arg(long)]
    progress: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let layout = match &cli.layout {
        Some(path) => GameLayout::load(path)?,
        None => GameLayout::default(),
    };

    let config = ExtractConfig {
        layout,
        upscale: cli.upscale.max(1),
        outline_colour: (!cli.no_outline).then_some(cli.outline_colour),
        png: PngOptions {
            optimise: cli.optimise_png,
            ..PngOptions::default()
        },
        progress_path: cli.progress,
        ..ExtractConfig::new(cli.game_dir, cli.output)
    };

    if initial_step(&config.output_root) == PipelineStep::Finished {
        println!(
            "{} already exists; remove it to extract again.",
            config.output_root.display()
        );
        return Ok(());
    }

    Pipeline::new(&config)
        .run()
        .with_context(|| format!("extraction from {} failed", config.game_dir.display()))?;

    println!("Processing complete!");
    Ok(())
}
