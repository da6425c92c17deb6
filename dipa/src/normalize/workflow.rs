//! Main workflow orchestration for normalization planning.
//!
//! 1. Resolve settings from the config file and command-line overrides
//! 2. Load the entity table and plan the DAG
//! 3. Write the workflow, execution plan, replica catalog and manifests

use anyhow::{Context, Result};
use dipa_normalize::{build_execution_plan, plan, NormalizeConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::normalize::{
    cli::{Args, OutputFormat},
    types::{ExecutionPlanFile, WorkflowFile, WorkflowSummary},
    utils::{
        build_replica_catalog, load_entity_table, load_normalize_config, parent_dir, save_document,
        save_yaml, write_manifests, ReplicaRoots,
    },
};

/// Planner settings given explicitly on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub hierarchy: Option<Vec<String>>,
    pub template: Option<String>,
    pub species: Option<String>,
    pub similarity_metric: Option<String>,
    pub rigid: Option<u32>,
    pub affine: Option<u32>,
    pub diffeomorphic: Option<u32>,
    pub no_transfer: bool,
}

impl ConfigOverrides {
    /// Overwrite every field of `config` that was set explicitly
    pub fn apply(&self, config: &mut NormalizeConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(hierarchy) = &self.hierarchy {
            config.hierarchy = hierarchy.clone();
        }
        if let Some(template) = &self.template {
            config.template = Some(template.clone());
        }
        if let Some(species) = &self.species {
            config.species = species.clone();
        }
        if let Some(metric) = &self.similarity_metric {
            config.similarity_metric = metric.clone();
        }
        if let Some(rigid) = self.rigid {
            config.rigid = rigid;
        }
        if let Some(affine) = self.affine {
            config.affine = affine;
        }
        if let Some(diffeomorphic) = self.diffeomorphic {
            config.diffeomorphic = diffeomorphic;
        }
        if self.no_transfer {
            config.transfer_intermediates = false;
        }
    }
}

/// Workflow configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Entity table
    pub input: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Optional settings file
    pub config_file: Option<PathBuf>,

    /// Explicit command-line settings
    pub overrides: ConfigOverrides,

    /// Workflow file format
    pub format: OutputFormat,

    /// Replica catalog site
    pub site: String,
}

impl From<Args> for WorkflowConfig {
    fn from(args: Args) -> Self {
        WorkflowConfig {
            input: PathBuf::from(&args.input),
            output_dir: PathBuf::from(&args.output_dir),
            config_file: args.config.map(PathBuf::from),
            overrides: ConfigOverrides {
                name: args.name,
                hierarchy: args.hierarchy,
                template: args.template,
                species: args.species,
                similarity_metric: args.similarity_metric,
                rigid: args.rigid,
                affine: args.affine,
                diffeomorphic: args.diffeomorphic,
                no_transfer: args.no_transfer,
            },
            format: args.format,
            site: args.site,
        }
    }
}

impl WorkflowConfig {
    /// Settings file (or defaults) with command-line overrides applied
    pub fn normalize_config(&self) -> Result<NormalizeConfig> {
        let mut config = match &self.config_file {
            Some(path) => load_normalize_config(path)?,
            None => NormalizeConfig::default(),
        };
        self.overrides.apply(&mut config);
        Ok(config)
    }

    pub fn workflow_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("workflow.{}", self.format.extension()))
    }

    pub fn execution_plan_path(&self) -> PathBuf {
        self.output_dir.join("execution_plan.yaml")
    }

    pub fn replica_catalog_path(&self) -> PathBuf {
        self.output_dir.join("replica_catalog.yaml")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.output_dir.join("input")
    }

    /// Directory relative table paths are resolved against
    fn table_dir(&self) -> &Path {
        parent_dir(&self.input)
    }

    /// Directory a relative fixed template is resolved against: the current
    /// directory for `--template`, the config file's directory otherwise
    fn template_dir(&self) -> &Path {
        match (&self.overrides.template, &self.config_file) {
            (None, Some(file)) => parent_dir(file),
            _ => Path::new("."),
        }
    }
}

/// Validate the arguments and run the workflow
pub fn run_workflow(args: Args) -> Result<()> {
    args.validate()?;
    let config = WorkflowConfig::from(args);
    let summary = run_normalize_workflow(&config)?;

    println!("\n{}", "=".repeat(80));
    println!(
        "✓ Planned {} tasks with {} dependencies in {} batches",
        summary.tasks, summary.edges, summary.batches
    );
    println!("  Workflow:         {}", summary.workflow_path.display());
    println!("  Execution plan:   {}", summary.execution_plan_path.display());
    println!(
        "  Replica catalog:  {} ({} files)",
        summary.replica_catalog_path.display(),
        summary.replicas
    );
    println!(
        "  Manifests:        {} ({} files)",
        summary.input_dir.display(),
        summary.manifests
    );
    println!("{}", "=".repeat(80));
    Ok(())
}

/// Plan the normalization and write every output file
pub fn run_normalize_workflow(config: &WorkflowConfig) -> Result<WorkflowSummary> {
    let settings = config.normalize_config()?;
    let table = load_entity_table(&config.input)?;

    let plan = plan(&table, &settings).context("Failed to plan normalization workflow")?;
    let execution = build_execution_plan(&plan.graph).context("Failed to batch workflow")?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let workflow_path = config.workflow_path();
    save_document(&workflow_path, &WorkflowFile::from_plan(&plan), config.format)?;
    info!(path = %workflow_path.display(), tasks = plan.graph.len(), "Wrote workflow");

    let execution_plan_path = config.execution_plan_path();
    let batches = execution.total_batches;
    save_yaml(
        &execution_plan_path,
        &ExecutionPlanFile {
            generated_at: chrono::Local::now(),
            execution_plan: execution,
        },
    )?;
    info!(path = %execution_plan_path.display(), batches, "Wrote execution plan");

    let input_dir = config.input_dir();
    let manifests = write_manifests(&plan.catalog, &input_dir)?;

    let replica_catalog_path = config.replica_catalog_path();
    let roots = ReplicaRoots {
        input_dir: &input_dir,
        table_dir: config.table_dir(),
        template: plan
            .settings
            .template
            .as_deref()
            .map(|path| (path, config.template_dir())),
    };
    let replicas = build_replica_catalog(
        &plan.graph.external_inputs(),
        &plan.catalog,
        &roots,
        &config.site,
    )?;
    save_yaml(&replica_catalog_path, &replicas)?;
    info!(
        path = %replica_catalog_path.display(),
        replicas = replicas.len(),
        "Wrote replica catalog"
    );

    Ok(WorkflowSummary {
        tasks: plan.graph.len(),
        edges: plan.graph.edges().len(),
        batches,
        manifests,
        replicas: replicas.len(),
        workflow_path,
        execution_plan_path,
        replica_catalog_path,
        input_dir,
    })
}
