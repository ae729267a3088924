//! # Catalog Runner
//!
//! Runs the built-in experiments: every subject is audited, every variant
//! group is verified, and only then are the variants timed.
//!
//! ## Usage
//! ```bash
//! # Run everything with the quick preset
//! cargo run --release --example run_catalog
//!
//! # One experiment, thorough preset, JSON output
//! cargo run --release --example run_catalog -- --experiment receiver --preset thorough --json
//!
//! # Audit for a 32-bit target
//! cargo run --release --example run_catalog -- --pointer-width 4
//! ```

use std::env;
use std::process::ExitCode;

use variant_lab::experiments::{catalog, write_path};
use variant_lab::{ConfigBuilder, Coordinator, ExperimentReport, LabConfig};

/// Options for one catalog run
#[derive(Debug)]
struct RunOptions {
    /// Configuration preset name
    preset: String,
    /// Only run this experiment
    experiment: Option<String>,
    /// Audit for this pointer width instead of the host's
    pointer_width: Option<usize>,
    /// Print JSON instead of tables
    json: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            preset: "quick".to_string(),
            experiment: None,
            pointer_width: None,
            json: false,
        }
    }
}

impl RunOptions {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut options = RunOptions::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--preset" if i + 1 < args.len() => {
                    options.preset = args[i + 1].clone();
                    i += 2;
                }
                "--experiment" if i + 1 < args.len() => {
                    options.experiment = Some(args[i + 1].clone());
                    i += 2;
                }
                "--pointer-width" if i + 1 < args.len() => {
                    options.pointer_width = args[i + 1].parse().ok();
                    i += 2;
                }
                "--json" => {
                    options.json = true;
                    i += 1;
                }
                other => {
                    eprintln!("ignoring argument {}", other);
                    i += 1;
                }
            }
        }

        options
    }

    fn config(&self) -> variant_lab::Result<LabConfig> {
        let preset = match self.preset.as_str() {
            "thorough" => LabConfig::thorough(),
            "development" => LabConfig::development(),
            _ => LabConfig::quick(),
        };

        let mut builder = ConfigBuilder::from_config(preset);
        if let Some(width) = self.pointer_width {
            builder = builder.pointer_width(width);
        }
        builder.build()
    }
}

fn print_report(report: &ExperimentReport, json: bool) -> variant_lab::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.render_table());
    }
    Ok(())
}

fn run(options: &RunOptions) -> variant_lab::Result<bool> {
    let registry = catalog()?;
    let mut coordinator = Coordinator::with_config(options.config()?)?;

    let reports = {
        // The stdout write paths would otherwise interleave with the tables
        #[cfg(unix)]
        let null_device = write_path::open_null_device()?;
        #[cfg(unix)]
        let _redirect = write_path::StdoutRedirect::to(&null_device)?;

        match &options.experiment {
            Some(name) => vec![coordinator.run_named(&registry, name)?],
            None => coordinator.run_all(&registry),
        }
    };

    for report in &reports {
        print_report(report, options.json)?;
    }

    if !options.json {
        println!("phase timings:");
        for (phase, stats) in coordinator.phase_stats() {
            println!(
                "  {:<8} {:>4} runs, {:?} total",
                phase, stats.count, stats.total_time
            );
        }
    }

    Ok(reports.iter().all(ExperimentReport::is_clean))
}

fn main() -> ExitCode {
    let options = RunOptions::from_args();
    eprintln!("variant-lab catalog ({} preset)", options.preset);

    match run(&options) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("some experiments reported failures");
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}
