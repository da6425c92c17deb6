//! Documents written by the normalization workflow.
//!
//! 1. **WorkflowFile** - Tasks and edges for the execution engine
//! 2. **ExecutionPlanFile** - Dependency batches with a generation timestamp
//! 3. **ReplicaCatalog** - Where every external input physically lives

use chrono::{DateTime, Local};
use dipa_normalize::{
    Edge, ExecutionPlan, NormalizationPlan, PlanSettings, Task, WorkflowGraph,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Workflow Types
// ============================================================================

/// Content of workflow.yaml / workflow.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    /// Project name
    pub name: String,

    /// Effective settings the graph was planned with
    pub settings: PlanSettings,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowFile {
    pub fn from_plan(plan: &NormalizationPlan) -> Self {
        WorkflowFile {
            name: plan.settings.name.clone(),
            settings: plan.settings.clone(),
            tasks: plan.graph.tasks().to_vec(),
            edges: plan.graph.edges().to_vec(),
        }
    }

    /// Rebuild the graph, checking it is still a valid DAG
    pub fn into_graph(self) -> dipa_normalize::Result<WorkflowGraph> {
        WorkflowGraph::from_parts(self.tasks, self.edges)
    }
}

// ============================================================================
// Execution Plan Types
// ============================================================================

/// Content of execution_plan.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlanFile {
    /// When the plan was generated
    pub generated_at: DateTime<Local>,

    pub execution_plan: ExecutionPlan,
}

// ============================================================================
// Replica Catalog Types
// ============================================================================

/// Physical copy of a logical file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalFile {
    /// `file://` URL
    pub pfn: String,

    /// Site holding the copy
    pub site: String,
}

/// Logical file and its physical copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    /// Logical file name as declared by the tasks
    pub lfn: String,

    #[serde(default)]
    pub pfns: Vec<PhysicalFile>,
}

/// Content of replica_catalog.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCatalog {
    #[serde(default)]
    pub replicas: Vec<Replica>,
}

impl ReplicaCatalog {
    pub fn add(&mut self, lfn: impl Into<String>, pfn: impl Into<String>, site: impl Into<String>) {
        self.replicas.push(Replica {
            lfn: lfn.into(),
            pfns: vec![PhysicalFile {
                pfn: pfn.into(),
                site: site.into(),
            }],
        });
    }

    pub fn get(&self, lfn: &str) -> Option<&Replica> {
        self.replicas.iter().find(|r| r.lfn == lfn)
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Paths and counts reported after a successful run
#[derive(Debug, Clone)]
pub struct WorkflowSummary {
    pub tasks: usize,
    pub edges: usize,
    pub batches: usize,
    pub manifests: usize,
    pub replicas: usize,
    pub workflow_path: std::path::PathBuf,
    pub execution_plan_path: std::path::PathBuf,
    pub replica_catalog_path: std::path::PathBuf,
    pub input_dir: std::path::PathBuf,
}
