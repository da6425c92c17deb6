//! Data types emitted by the normalization planner.
//!
//! This module defines the task model handed to the external execution engine:
//!
//! 1. **StageKind** - Closed set of pipeline stages
//! 2. **Task** - One invocation of an external tool with declared files
//! 3. **Edge** - Ordering constraint between two tasks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace under which every task is registered with the execution engine
pub const TASK_NAMESPACE: &str = "dipa";

// ============================================================================
// Stage Types
// ============================================================================

/// Pipeline stage a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKind {
    ImageDim,
    CreateTemplate,
    RigidWarp,
    RigidMean,
    AffineWarpA,
    AffineMeanA,
    AffineWarpB,
    AffineMeanB,
    DiffeomorphicWarp,
    DiffeomorphicMean,
    ComposeWarp,
    ComposeMean,
    ComposeFullWarp,
}

impl StageKind {
    /// Every stage, in pipeline order
    pub const ALL: [StageKind; 13] = [
        StageKind::ImageDim,
        StageKind::CreateTemplate,
        StageKind::RigidWarp,
        StageKind::RigidMean,
        StageKind::AffineWarpA,
        StageKind::AffineMeanA,
        StageKind::AffineWarpB,
        StageKind::AffineMeanB,
        StageKind::DiffeomorphicWarp,
        StageKind::DiffeomorphicMean,
        StageKind::ComposeWarp,
        StageKind::ComposeMean,
        StageKind::ComposeFullWarp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::ImageDim => "ImageDim",
            StageKind::CreateTemplate => "CreateTemplate",
            StageKind::RigidWarp => "RigidWarp",
            StageKind::RigidMean => "RigidMean",
            StageKind::AffineWarpA => "AffineWarpA",
            StageKind::AffineMeanA => "AffineMeanA",
            StageKind::AffineWarpB => "AffineWarpB",
            StageKind::AffineMeanB => "AffineMeanB",
            StageKind::DiffeomorphicWarp => "DiffeomorphicWarp",
            StageKind::DiffeomorphicMean => "DiffeomorphicMean",
            StageKind::ComposeWarp => "ComposeWarp",
            StageKind::ComposeMean => "ComposeMean",
            StageKind::ComposeFullWarp => "ComposeFullWarp",
        }
    }

    /// External transformation name the execution engine resolves to an executable
    pub fn job_name(&self) -> String {
        format!("Normalize_{}", self.as_str())
    }

    /// Whether the stage runs once per tier rather than once per entity
    pub fn is_group_stage(&self) -> bool {
        matches!(
            self,
            StageKind::CreateTemplate
                | StageKind::RigidMean
                | StageKind::AffineMeanA
                | StageKind::AffineMeanB
                | StageKind::DiffeomorphicMean
                | StageKind::ComposeMean
        )
    }

    /// Whether the stage is repeated per registration iteration
    pub fn is_iterated(&self) -> bool {
        matches!(
            self,
            StageKind::RigidWarp
                | StageKind::RigidMean
                | StageKind::AffineWarpA
                | StageKind::AffineMeanA
                | StageKind::AffineWarpB
                | StageKind::AffineMeanB
                | StageKind::DiffeomorphicWarp
                | StageKind::DiffeomorphicMean
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Task Types
// ============================================================================

/// Declared output file of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Logical file name
    pub name: String,

    /// Whether the engine should stage this file out to the archive site
    pub transfer: bool,
}

/// One node of the workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Deterministic identifier, stable across planning runs
    pub id: String,

    /// Pipeline stage
    pub stage: StageKind,

    /// Engine namespace
    pub namespace: String,

    /// Transformation name (`Normalize_<Stage>`)
    pub name: String,

    /// Hierarchy level the task was emitted for
    pub tier: String,

    /// Group or entity id within `tier`
    pub entity: String,

    /// Registration iteration, 1-based
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,

    /// Ordered command-line arguments for the external tool
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Files that must exist before the task starts
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Files the task materializes
    #[serde(default)]
    pub outputs: Vec<OutputFile>,
}

impl Task {
    /// Build a task with a deterministic id derived from `(tier, entity, iteration, stage)`
    pub fn new(
        stage: StageKind,
        tier: impl Into<String>,
        entity: impl Into<String>,
        iteration: Option<u32>,
    ) -> Self {
        let tier = tier.into();
        let entity = entity.into();
        let id = task_id(stage, &tier, &entity, iteration);
        Task {
            id,
            stage,
            namespace: TASK_NAMESPACE.to_string(),
            name: stage.job_name(),
            tier,
            entity,
            iteration,
            arguments: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I, transfer: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(|name| OutputFile {
            name: name.into(),
            transfer,
        }));
        self
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name.as_str())
    }

    pub fn produces(&self, file: &str) -> bool {
        self.outputs.iter().any(|o| o.name == file)
    }

    pub fn consumes(&self, file: &str) -> bool {
        self.inputs.iter().any(|i| i == file)
    }
}

/// Deterministic task id: `{tier}-{entity}[_i{n}]_Normalize_{Stage}`
pub fn task_id(stage: StageKind, tier: &str, entity: &str, iteration: Option<u32>) -> String {
    match iteration {
        Some(n) => format!("{}-{}_i{}_{}", tier, entity, n, stage.job_name()),
        None => format!("{}-{}_{}", tier, entity, stage.job_name()),
    }
}

// ============================================================================
// Edge Types
// ============================================================================

/// Ordering constraint: `child` may not start before `parent` finished
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub parent: String,
    pub child: String,
}
