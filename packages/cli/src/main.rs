#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the safe route black spot pipeline.
//!
//! Each subcommand runs one pipeline stage (or both) against the files
//! named in the configuration. With no subcommand, an interactive menu
//! prompts for the stage and its main parameters.
//!
//! Configuration is layered: built-in defaults, then the TOML file, then
//! command-line flags.

mod interactive;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use safe_route_cli_utils::{IndicatifProgress, MultiProgress};
use safe_route_pipeline::{ConfigError, LogProgress, Pipeline, PipelineConfig};

/// Configuration file picked up from the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILE: &str = "safe_route.toml";

#[derive(Parser)]
#[command(
    name = "safe_route",
    about = "Accident black spot detection: clean raw crash data and cluster it into risk-rated hotspots"
)]
struct Cli {
    /// TOML configuration file (defaults to `safe_route.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print the run report as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Raise the default log level (-v debug, -vv trace). `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the raw accident table and write the cleaned snapshot
    Clean {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Cluster the cleaned snapshot and write the black spot centroids
    Cluster {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Clean, then cluster
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        overrides: Overrides,
        /// Write the configuration to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Flags that override individual configuration values.
#[derive(Args, Default)]
struct Overrides {
    /// Raw accident table
    #[arg(long)]
    input: Option<PathBuf>,
    /// Cleaned snapshot path
    #[arg(long)]
    cleaned_output: Option<PathBuf>,
    /// Black spot centroid table path
    #[arg(long)]
    centroids_output: Option<PathBuf>,
    /// Also write every cleaned record with its cluster id here
    #[arg(long)]
    labeled_output: Option<PathBuf>,
    /// Also write the black spots as GeoJSON here
    #[arg(long)]
    geojson_output: Option<PathBuf>,
    /// Number of clusters
    #[arg(short = 'k', long)]
    clusters: Option<usize>,
    /// Partitioner seed
    #[arg(long)]
    seed: Option<u64>,
    /// Southern edge of the bounding box
    #[arg(long, allow_negative_numbers = true)]
    lat_min: Option<f64>,
    /// Northern edge of the bounding box
    #[arg(long, allow_negative_numbers = true)]
    lat_max: Option<f64>,
    /// Western edge of the bounding box
    #[arg(long, allow_negative_numbers = true)]
    lon_min: Option<f64>,
    /// Eastern edge of the bounding box
    #[arg(long, allow_negative_numbers = true)]
    lon_max: Option<f64>,
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(path) = self.cleaned_output {
            config.cleaned_output = path;
        }
        if let Some(path) = self.centroids_output {
            config.centroids_output = path;
        }
        if self.labeled_output.is_some() {
            config.labeled_output = self.labeled_output;
        }
        if self.geojson_output.is_some() {
            config.geojson_output = self.geojson_output;
        }
        if let Some(clusters) = self.clusters {
            config.clusters = clusters;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        let bbox = &mut config.bounding_box;
        for (value, slot) in [
            (self.lat_min, &mut bbox.lat_min),
            (self.lat_max, &mut bbox.lat_max),
            (self.lon_min, &mut bbox.lon_min),
            (self.lon_max, &mut bbox.lon_max),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// Which part of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Clean,
    Cluster,
    Run,
}

impl Stage {
    const ALL: &[Self] = &[Self::Run, Self::Clean, Self::Cluster];

    #[must_use]
    const fn label(self) -> &'static str {
        match self {
            Self::Run => "Run full pipeline (clean + cluster)",
            Self::Clean => "Clean raw accident data",
            Self::Cluster => "Cluster cleaned data into black spots",
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let multi = safe_route_cli_utils::init_logger(level);

    let mut config = load_config(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, config, cli.json);
    };

    let stage = match command {
        Commands::Clean { overrides } => {
            overrides.apply(&mut config);
            Stage::Clean
        }
        Commands::Cluster { overrides } => {
            overrides.apply(&mut config);
            Stage::Cluster
        }
        Commands::Run { overrides } => {
            overrides.apply(&mut config);
            Stage::Run
        }
        Commands::Config { overrides, output } => {
            overrides.apply(&mut config);
            config.validate()?;
            let rendered = config.to_toml_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    log::info!("Wrote configuration to {}", path.display());
                }
                None => print!("{rendered}"),
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    execute(stage, config, &multi, cli.json)
}

/// Loads the explicit config file, else `safe_route.toml` if present, else
/// defaults.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    if let Some(path) = path {
        return PipelineConfig::load(path);
    }

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        log::info!("Using configuration from {DEFAULT_CONFIG_FILE}");
        PipelineConfig::load(fallback)
    } else {
        Ok(PipelineConfig::default())
    }
}

/// Runs `stage` and reports the outcome.
///
/// A pipeline halt is reported and mapped to a failing exit code rather
/// than an error, so the cleaning counts still get printed.
///
/// # Errors
///
/// Returns an error only if the report cannot be rendered.
fn execute(
    stage: Stage,
    config: PipelineConfig,
    multi: &MultiProgress,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    // With --json, steps go to the log as plain lines.
    let progress = if json {
        LogProgress::shared()
    } else {
        IndicatifProgress::stage_bar(multi, stage.label())
    };
    let pipeline = Pipeline::new(config).with_progress(progress);

    let result = match stage {
        Stage::Clean => pipeline.run_cleaning(),
        Stage::Cluster => pipeline.run_clustering(),
        Stage::Run => pipeline.run(),
    };

    match result {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in report::render(&report) {
                    println!("{line}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(halt) => {
            if let Some(clean) = &halt.clean_report {
                log::error!("{}", report::clean_line(clean));
            }
            log::error!("Pipeline halted ({}): {halt}", halt.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "safe_route",
            "run",
            "--input",
            "raw.csv",
            "-k",
            "4",
            "--seed",
            "7",
            "--lat-min",
            "28.5",
            "--geojson-output",
            "spots.geojson",
        ])
        .unwrap();

        let Some(Commands::Run { overrides }) = cli.command else {
            panic!("expected run subcommand");
        };

        let mut config = PipelineConfig::default();
        overrides.apply(&mut config);

        assert_eq!(config.input, PathBuf::from("raw.csv"));
        assert_eq!(config.clusters, 4);
        assert_eq!(config.seed, 7);
        assert!((config.bounding_box.lat_min - 28.5).abs() < f64::EPSILON);
        assert!((config.bounding_box.lat_max - 28.88).abs() < f64::EPSILON);
        assert_eq!(config.geojson_output, Some(PathBuf::from("spots.geojson")));
        assert_eq!(config.labeled_output, None);
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let mut config = PipelineConfig {
            clusters: 6,
            labeled_output: Some("labeled.csv".into()),
            ..PipelineConfig::default()
        };
        Overrides::default().apply(&mut config);

        assert_eq!(config.clusters, 6);
        assert_eq!(config.labeled_output, Some(PathBuf::from("labeled.csv")));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["safe_route", "clean", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["safe_route"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "clusters = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.clusters, 3);
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "clusters = 0\n").unwrap();

        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
