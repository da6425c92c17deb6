//! Workflow planner for hierarchical group-wise DTI normalization.
//!
//! Given an entity table and a hierarchy (for example project > site >
//! subject), the planner describes every registration task needed to build a
//! template per group and warp each entity into it, as a DAG for an external
//! execution engine. Nothing here runs a registration or reads image data.
//!
//! - [`config`]: requested parameters and their resolution
//! - [`entity`]: entity table loading and grouping validation
//! - [`naming`]: deterministic artifact names
//! - [`stages`]: one builder per pipeline stage
//! - [`planner`]: the recursive tier planner
//! - [`graph`]: the emitted task graph
//! - [`catalog`]: generated manifest files
//! - [`execution_plan`]: batch layering of a finished graph
//!
//! ```no_run
//! use dipa_normalize::{plan, EntityTable, NormalizeConfig};
//!
//! let table = EntityTable::from_csv_str("ID,SPD\ns1,s1.nii.gz\ns2,s2.nii.gz\n")?;
//! let plan = plan(&table, &NormalizeConfig::default())?;
//! println!("{} tasks", plan.graph.len());
//! # Ok::<(), dipa_normalize::PlanError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod execution_plan;
pub mod graph;
pub mod naming;
pub mod planner;
pub mod stages;
pub mod types;

pub use catalog::{ArtifactCatalog, Manifest};
pub use config::{NormalizeConfig, PlanSettings, Species, ID_LEVEL, PROJECT_LEVEL, SPD_COLUMN};
pub use entity::{Entity, EntityTable};
pub use error::{ErrorKind, PlanError, Result};
pub use execution_plan::{build_execution_plan, Batch, BatchTask, DependenciesSummary, ExecutionPlan};
pub use graph::{GraphDocument, TaskRef, WorkflowGraph};
pub use naming::{NamingScheme, TierKey};
pub use planner::{plan, plan_with_settings, NormalizationPlan};
pub use types::{Edge, OutputFile, StageKind, Task, TASK_NAMESPACE};
