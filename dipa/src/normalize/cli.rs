//! CLI argument definitions for the normalization planner.
//!
//! Every planning parameter is optional on the command line. Unset flags fall
//! back to the `--config` file, then to the library defaults.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::Path;

/// Serialization format of the written workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

/// Hierarchical DTI normalization planner
///
/// Reads a table of subjects and writes a workflow DAG that builds a
/// template per group at every hierarchy level and warps each subject into
/// it:
///
/// - workflow.yaml: tasks and dependencies
/// - execution_plan.yaml: dependency batches and critical path
/// - replica_catalog.yaml: physical locations of every external input
/// - input/: generated manifest files
#[derive(Parser, Debug, Clone)]
#[command(name = "normalize-planner")]
#[command(about = "Plan hierarchical DTI normalization as a workflow DAG")]
#[command(version)]
pub struct Args {
    /// Entity table: .csv, .yaml/.yml or .json
    ///
    /// One row per subject with a column for every hierarchy level and an
    /// SPD column pointing at the subject's tensor image.
    #[arg(long, short = 'i', value_name = "PATH")]
    pub input: String,

    /// Directory the workflow, catalogs and manifests are written to
    #[arg(long, short = 'o', value_name = "DIR", default_value = "normalize")]
    pub output_dir: String,

    /// YAML or JSON file with planner settings
    ///
    /// Flags given on the command line override values from this file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Hierarchy levels, outermost first (e.g. PROJECT,SITE,ID)
    ///
    /// PROJECT and ID are added when missing.
    #[arg(long, value_name = "LEVELS", value_delimiter = ',')]
    pub hierarchy: Option<Vec<String>>,

    /// Project name, used when the table has no PROJECT column
    #[arg(long)]
    pub name: Option<String>,

    /// Register to this template instead of building one
    ///
    /// Collapses the hierarchy to PROJECT,ID and runs a single iteration per
    /// stage.
    #[arg(long, value_name = "PATH")]
    pub template: Option<String>,

    /// Species of the subjects: human, monkey or rat
    #[arg(long)]
    pub species: Option<String>,

    /// Similarity metric for rigid and affine registration
    #[arg(long, value_name = "METRIC")]
    pub similarity_metric: Option<String>,

    /// Rigid iterations
    #[arg(long, value_name = "N")]
    pub rigid: Option<u32>,

    /// Affine iterations
    #[arg(long, value_name = "N")]
    pub affine: Option<u32>,

    /// Diffeomorphic iterations
    #[arg(long, value_name = "N")]
    pub diffeomorphic: Option<u32>,

    /// Only stage out templates and composed warps
    #[arg(long)]
    pub no_transfer: bool,

    /// Workflow file format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Site name used in the replica catalog
    #[arg(long, default_value = "local")]
    pub site: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Table extensions the planner can read
pub const TABLE_EXTENSIONS: [&str; 4] = ["csv", "yaml", "yml", "json"];

impl Args {
    /// Validate arguments before any file is read
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            anyhow::bail!("--input must name an entity table");
        }
        validate_extension(&self.input, "--input", &TABLE_EXTENSIONS)?;

        if let Some(config) = &self.config {
            validate_extension(config, "--config", &["yaml", "yml", "json"])?;
        }

        if let Some(levels) = &self.hierarchy {
            if levels.iter().any(|l| l.trim().is_empty()) {
                anyhow::bail!("--hierarchy contains an empty level: {}", levels.join(","));
            }
        }

        if self.site.trim().is_empty() {
            anyhow::bail!("--site must not be empty");
        }
        Ok(())
    }
}

fn validate_extension(path: &str, flag: &str, allowed: &[&str]) -> Result<()> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !allowed.contains(&extension.as_str()) {
        anyhow::bail!(
            "{} '{}' has unsupported extension. Expected one of: {}",
            flag,
            path,
            allowed.join(", ")
        );
    }
    Ok(())
}
