//! Execution batches for a planned graph.
//!
//! This module provides:
//! - Layering of the DAG into batches whose tasks may all run in parallel
//! - The critical path (longest dependency chain)
//! - A short parallelisation summary for operators

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::graph::WorkflowGraph;
use crate::types::StageKind;

/// Batched view of a workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Total number of tasks
    pub total_tasks: usize,

    /// Total number of batches
    pub total_batches: usize,

    /// Batches in execution order
    #[serde(default)]
    pub batches: Vec<Batch>,

    /// Dependencies summary
    pub dependencies_summary: DependenciesSummary,
}

/// Tasks that may run concurrently once every earlier batch finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based batch number
    pub batch_id: usize,

    /// Stage counts in this batch, e.g. "3 RigidWarp, 1 ImageDim"
    pub description: String,

    /// Always "parallel": batches run in sequence, their tasks concurrently
    pub strategy: String,

    #[serde(default)]
    pub tasks: Vec<BatchTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTask {
    /// Task id in the graph
    pub task_id: String,

    /// External job name
    pub task_name: String,

    /// Why the task sits in this batch
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesSummary {
    /// Task ids of the longest dependency chain, first to last
    #[serde(default)]
    pub critical_path: Vec<String>,

    /// low, medium or high
    pub parallelization_potential: String,

    pub parallelization_explanation: String,
}

/// Layer `graph` into execution batches
pub fn build_execution_plan(graph: &WorkflowGraph) -> Result<ExecutionPlan> {
    let layers = graph.layers()?;
    let critical_path: Vec<String> = graph
        .critical_path()?
        .into_iter()
        .map(|t| t.id.clone())
        .collect();

    let mut batches = Vec::with_capacity(layers.len());
    for (i, layer) in layers.iter().enumerate() {
        let batch_id = i + 1;

        let mut stages: BTreeMap<StageKind, usize> = BTreeMap::new();
        for task in layer {
            *stages.entry(task.stage).or_default() += 1;
        }
        let description = stages
            .iter()
            .map(|(stage, n)| format!("{} {}", n, stage))
            .collect::<Vec<_>>()
            .join(", ");

        let tasks = layer
            .iter()
            .map(|task| {
                let parents = graph.parents(&task.id).len();
                let reason = if parents == 0 {
                    "No dependencies".to_string()
                } else {
                    format!("Depends on {} task(s) in earlier batches", parents)
                };
                BatchTask {
                    task_id: task.id.clone(),
                    task_name: task.name.clone(),
                    reason,
                }
            })
            .collect();

        debug!(batch = batch_id, tasks = layer.len(), "Execution batch");
        batches.push(Batch {
            batch_id,
            description,
            strategy: "parallel".to_string(),
            tasks,
        });
    }

    let total_tasks = graph.len();
    let total_batches = batches.len();
    let widest = layers.iter().map(Vec::len).max().unwrap_or(0);

    Ok(ExecutionPlan {
        total_tasks,
        total_batches,
        batches,
        dependencies_summary: DependenciesSummary {
            parallelization_potential: parallelization_potential(total_tasks, total_batches)
                .to_string(),
            parallelization_explanation: format!(
                "{} tasks in {} batches, widest batch runs {} tasks, critical path is {} tasks long",
                total_tasks,
                total_batches,
                widest,
                critical_path.len()
            ),
            critical_path,
        },
    })
}

/// Average batch width bucketed into low (<2), medium (<4) and high
fn parallelization_potential(tasks: usize, batches: usize) -> &'static str {
    if batches == 0 {
        return "low";
    }
    let average = tasks as f64 / batches as f64;
    if average >= 4.0 {
        "high"
    } else if average >= 2.0 {
        "medium"
    } else {
        "low"
    }
}
