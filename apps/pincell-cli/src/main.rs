use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pincell_model::PinCellConfig;
use pincell_runner::{OpenMcEngine, RunEnvironment, Study, TallyResult};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pincell", about = "Pin-cell capture study driver for OpenMC")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default study configuration as YAML
    Init {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate the model and check that its cells partition the pitch box
    Check {
        /// Study configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Sample points per axis
        #[arg(short, long, default_value = "200")]
        resolution: usize,
    },
    /// Write the XML input deck and its manifest
    Export {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Deck directory
        #[arg(short, long)]
        dir: PathBuf,
    },
    /// Export the deck, run OpenMC and print the tally
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        dir: PathBuf,
        /// OpenMC executable
        #[arg(long, default_value = "openmc")]
        openmc: PathBuf,
        /// OpenMP threads passed to OpenMC
        #[arg(short, long)]
        threads: Option<u32>,
        /// Tally to print (the configured tally when omitted)
        #[arg(long)]
        tally: Option<String>,
        /// Print the tally as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a tally from a finished run directory
    Show {
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long, default_value = "capture_reactions")]
        tally: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { output } => {
            let yaml = PinCellConfig::default().to_yaml()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, yaml)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote default configuration to {}", path.display());
                }
                None => print!("{yaml}"),
            }
        }
        Commands::Check { config, resolution } => {
            let config = load_config(config.as_deref())?;
            let model = config.build_model().context("building model")?;
            let report = model
                .geometry
                .check_partition(&config.bounds(), resolution);
            tracing::debug!(samples = report.samples, skipped = report.skipped, "partition sampled");
            println!(
                "Model: {} materials, {} surfaces, {} cells, {} tallies",
                model.materials.len(),
                model.geometry.surfaces().len(),
                model.geometry.cells().len(),
                model.tallies.len()
            );
            println!(
                "Partition: samples={}, on-surface={}, overlaps={}, gaps={}",
                report.samples, report.skipped, report.overlap_count, report.gap_count
            );
            for cell in model.geometry.cells().values() {
                println!(
                    "  cell {} {:<10} {:>7.3}%",
                    cell.id,
                    cell.name,
                    report.fraction(cell.id) * 100.0
                );
            }
            for (point, cells) in &report.overlaps {
                println!("  overlap at {point}: cells {cells:?}");
            }
            for point in &report.gaps {
                println!("  gap at {point}");
            }
            if !report.is_partition() {
                bail!(
                    "cells do not partition the pitch box ({} overlaps, {} gaps)",
                    report.overlap_count,
                    report.gap_count
                );
            }
            println!("Match: OK");
        }
        Commands::Export { config, dir } => {
            let config = load_config(config.as_deref())?;
            let model = config.build_model().context("building model")?;
            let manifest = pincell_deck::write_deck(&model, &dir)
                .with_context(|| format!("writing deck to {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), files = manifest.entries.len(), "deck exported");
            for entry in &manifest.entries {
                println!("{}  {}", entry.sha256, dir.join(&entry.filename).display());
            }
        }
        Commands::Run {
            config,
            dir,
            openmc,
            threads,
            tally,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let model = config.build_model().context("building model")?;
            let tally = tally.unwrap_or_else(|| config.tally.name.clone());
            let engine = OpenMcEngine {
                executable: openmc,
                threads,
            };
            let env = RunEnvironment::resolve(config.cross_sections.clone());
            tracing::info!(tally = %tally, dir = %dir.display(), "starting study");
            let study = Study::new(engine, env, &dir);
            let result = study
                .run(&model, &tally)
                .with_context(|| format!("running study in {}", dir.display()))?;
            print_tally(&result, json)?;
        }
        Commands::Show { dir, tally, json } => {
            let settings = pincell_deck::read_deck(&dir)
                .with_context(|| format!("reading deck in {}", dir.display()))?
                .settings;
            let result = pincell_runner::collect_result(&dir, settings.batches, &tally)
                .with_context(|| format!("reading results in {}", dir.display()))?;
            print_tally(&result, json)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PinCellConfig> {
    match path {
        Some(path) => PinCellConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PinCellConfig::default()),
    }
}

fn print_tally(result: &TallyResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{result}");
    }
    Ok(())
}
