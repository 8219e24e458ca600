/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Main executable for avatom-rs
//!
//! Reads a JSON configuration, runs the calculation and prints a JSON
//! summary.

use anyhow::{bail, Context};
use avatom_rs::sweep::{Sweep, SweepPoint};
use avatom_rs::{AtomConfig, AverageAtom, PhysicalConstants, ResultSummary};
use clap::Parser;
use std::path::PathBuf;

/// Average-atom model of an ion in warm dense matter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; defaults are used when omitted
    config: Option<PathBuf>,

    /// Override the nuclear charge
    #[arg(short = 'z', long)]
    nuclear_charge: Option<f64>,

    /// Override the temperature (in the configured unit)
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Override the sphere radius in bohr
    #[arg(short, long, conflicts_with = "mass_density")]
    radius: Option<f64>,

    /// Set the sphere radius from a mass density in g/cm³
    #[arg(long, requires = "atomic_mass")]
    mass_density: Option<f64>,

    /// Atomic mass in atomic mass units, used with --mass-density
    #[arg(long)]
    atomic_mass: Option<f64>,

    /// Run a chained sweep over these temperatures instead of a single point
    #[arg(long, value_delimiter = ',')]
    sweep_temperatures: Vec<f64>,

    /// Write the summary here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let constants = PhysicalConstants::default();

    let mut config = match &args.config {
        Some(path) => AtomConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AtomConfig::default(),
    };
    if let Some(z) = args.nuclear_charge {
        config.nuclear_charge = z;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(radius) = args.radius {
        config.radius = radius;
    }
    if let (Some(rho), Some(mass)) = (args.mass_density, args.atomic_mass) {
        if rho <= 0.0 || mass <= 0.0 {
            bail!("Mass density and atomic mass must be positive");
        }
        config.radius = constants.wigner_seitz_radius(rho, mass);
        log::info!("Sphere radius {:.4} bohr from {} g/cm³", config.radius, rho);
    }

    let summaries = if args.sweep_temperatures.is_empty() {
        let atom = AverageAtom::new(config)
            .context("Invalid configuration")?
            .with_constants(constants);
        let result = atom.run().context("Calculation failed")?;
        vec![atom.summarize(&result)]
    } else {
        let points: Vec<SweepPoint> = args
            .sweep_temperatures
            .iter()
            .map(|&t| SweepPoint::temperature(t))
            .collect();
        let sweep = Sweep::new(&config, &points)
            .context("Invalid sweep")?
            .with_constants(constants);

        let mut summaries = Vec::with_capacity(points.len());
        for (point, outcome) in points.iter().zip(sweep.run_chained()) {
            match outcome.result() {
                Some(result) => {
                    summaries.push(ResultSummary::new(&point.apply(&config), &constants, result))
                }
                None => log::warn!("No result at temperature {:?}", point.temperature),
            }
        }
        summaries
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&summaries)?
    } else {
        serde_json::to_string(&summaries)?
    };

    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}
