//! Interactive menu for running the pipeline without memorizing flags.
//!
//! Prompts for the stage, then for the handful of values most runs change:
//! input path, cluster count, seed, and whether to write GeoJSON. All other
//! settings come from the loaded configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use dialoguer::{Confirm, Input, Select};
use safe_route_cli_utils::MultiProgress;
use safe_route_pipeline::PipelineConfig;

use crate::Stage;

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the report cannot be rendered.
pub fn run(
    multi: &MultiProgress,
    mut config: PipelineConfig,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!("Safe Route: accident black spot pipeline");
    println!();

    let labels: Vec<&str> = Stage::ALL.iter().copied().map(Stage::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let stage = Stage::ALL[idx];

    if matches!(stage, Stage::Run | Stage::Clean) {
        config.input = prompt_path("Raw accident CSV", &config.input)?;
        config.cleaned_output = prompt_path("Cleaned output", &config.cleaned_output)?;
    } else {
        config.cleaned_output = prompt_path("Cleaned snapshot", &config.cleaned_output)?;
    }

    if matches!(stage, Stage::Run | Stage::Cluster) {
        config.centroids_output = prompt_path("Centroid output", &config.centroids_output)?;

        config.clusters = Input::new()
            .with_prompt("Number of clusters (k)")
            .default(config.clusters)
            .validate_with(|k: &usize| {
                if *k == 0 {
                    Err("must be at least 1")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        config.seed = Input::new()
            .with_prompt("Random seed")
            .default(config.seed)
            .interact_text()?;

        let geojson = Confirm::new()
            .with_prompt("Also write black spots as GeoJSON?")
            .default(config.geojson_output.is_some())
            .interact()?;
        config.geojson_output = if geojson {
            let default = config
                .geojson_output
                .clone()
                .unwrap_or_else(|| config.centroids_output.with_extension("geojson"));
            Some(prompt_path("GeoJSON output", &default)?)
        } else {
            None
        };
    }

    crate::execute(stage, config, multi, json)
}

fn prompt_path(prompt: &str, default: &std::path::Path) -> Result<PathBuf, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(default.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(input.trim()))
}
