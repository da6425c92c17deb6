//! Dependency graph handed to the external execution engine.
//!
//! Tasks are appended once and never mutated. Edges can only be drawn between
//! handles returned by [`WorkflowGraph::add_task`], so a stage can never be
//! wired to a task that has not been emitted yet.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{PlanError, Result};
use crate::types::{Edge, StageKind, Task};

/// Handle to a task already in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskRef(usize);

/// Serialized form of a graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Append-only DAG of tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct WorkflowGraph {
    tasks: Vec<Task>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    producers: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    edge_set: HashSet<(usize, usize)>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from its parts, validating ids, producers and acyclicity
    pub fn from_parts(tasks: Vec<Task>, edges: Vec<Edge>) -> Result<Self> {
        let mut graph = WorkflowGraph::new();
        for task in tasks {
            graph.add_task(task)?;
        }
        for edge in edges {
            let parent = graph.lookup(&edge.parent)?;
            let child = graph.lookup(&edge.child)?;
            graph.add_edge(parent, child)?;
        }
        graph.topological_order()?;
        Ok(graph)
    }

    /// Append a task. Its id and every declared output must be new.
    pub fn add_task(&mut self, task: Task) -> Result<TaskRef> {
        if self.index.contains_key(&task.id) {
            return Err(PlanError::DuplicateTask(task.id));
        }
        for output in &task.outputs {
            if let Some(&existing) = self.producers.get(&output.name) {
                return Err(PlanError::DuplicateOutput {
                    file: output.name.clone(),
                    first: self.tasks[existing].id.clone(),
                    second: task.id.clone(),
                });
            }
        }

        let idx = self.tasks.len();
        for output in &task.outputs {
            self.producers.insert(output.name.clone(), idx);
        }
        self.index.insert(task.id.clone(), idx);
        self.tasks.push(task);
        self.parents.push(Vec::new());
        self.children.push(Vec::new());
        Ok(TaskRef(idx))
    }

    /// Require `parent` to finish before `child` starts. Repeated edges are
    /// recorded once.
    pub fn add_edge(&mut self, parent: TaskRef, child: TaskRef) -> Result<()> {
        if parent == child {
            return Err(PlanError::SelfDependency(self.tasks[child.0].id.clone()));
        }
        if !self.edge_set.insert((parent.0, child.0)) {
            return Ok(());
        }
        self.parents[child.0].push(parent.0);
        self.children[parent.0].push(child.0);
        self.edges.push(Edge {
            parent: self.tasks[parent.0].id.clone(),
            child: self.tasks[child.0].id.clone(),
        });
        Ok(())
    }

    pub fn add_edges(&mut self, parents: &[TaskRef], child: TaskRef) -> Result<()> {
        for parent in parents {
            self.add_edge(*parent, child)?;
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<TaskRef> {
        self.index
            .get(id)
            .map(|&idx| TaskRef(idx))
            .ok_or_else(|| PlanError::UnknownTask(id.to_string()))
    }

    pub fn get(&self, task: TaskRef) -> &Task {
        &self.tasks[task.0]
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&idx| &self.tasks[idx])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Direct predecessors of a task, in the order the edges were drawn
    pub fn parents(&self, id: &str) -> Vec<&Task> {
        self.index
            .get(id)
            .map(|&idx| self.parents[idx].iter().map(|&p| &self.tasks[p]).collect())
            .unwrap_or_default()
    }

    /// Direct successors of a task, in the order the edges were drawn
    pub fn children(&self, id: &str) -> Vec<&Task> {
        self.index
            .get(id)
            .map(|&idx| self.children[idx].iter().map(|&c| &self.tasks[c]).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, stage: StageKind) -> usize {
        self.tasks.iter().filter(|t| t.stage == stage).count()
    }

    pub fn tasks_of(&self, stage: StageKind) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.stage == stage)
    }

    /// Task that declares `file` as an output
    pub fn producer_of(&self, file: &str) -> Option<&Task> {
        self.producers.get(file).map(|&idx| &self.tasks[idx])
    }

    /// Declared inputs no task produces: raw images, the fixed template and
    /// generated manifests. These must exist before the graph runs.
    pub fn external_inputs(&self) -> Vec<String> {
        let inputs: BTreeSet<&str> = self
            .tasks
            .iter()
            .flat_map(|t| t.inputs.iter())
            .filter(|input| !self.producers.contains_key(input.as_str()))
            .map(String::as_str)
            .collect();
        inputs.into_iter().map(str::to_string).collect()
    }

    /// Dependency layers: every task's parents sit in strictly earlier layers.
    /// Within a layer tasks keep their insertion order.
    pub fn layers(&self) -> Result<Vec<Vec<&Task>>> {
        let mut indegree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: Vec<usize> = (0..self.tasks.len()).filter(|&i| indegree[i] == 0).collect();
        let mut placed = 0;
        let mut layers = Vec::new();

        while !ready.is_empty() {
            let mut next = Vec::new();
            for &idx in &ready {
                for &child in &self.children[idx] {
                    indegree[child] -= 1;
                    if indegree[child] == 0 {
                        next.push(child);
                    }
                }
            }
            placed += ready.len();
            next.sort_unstable();
            layers.push(ready.iter().map(|&i| &self.tasks[i]).collect());
            ready = next;
        }

        if placed < self.tasks.len() {
            let stuck: Vec<&str> = (0..self.tasks.len())
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.tasks[i].id.as_str())
                .collect();
            return Err(PlanError::Cycle(stuck.join(", ")));
        }
        Ok(layers)
    }

    pub fn topological_order(&self) -> Result<Vec<&Task>> {
        Ok(self.layers()?.into_iter().flatten().collect())
    }

    /// Longest dependency chain, first task to last
    pub fn critical_path(&self) -> Result<Vec<&Task>> {
        let order = self.topological_order()?;
        let mut depth: Vec<usize> = vec![1; self.tasks.len()];
        let mut via: Vec<Option<usize>> = vec![None; self.tasks.len()];

        for task in &order {
            let idx = self.index[&task.id];
            for &parent in &self.parents[idx] {
                if depth[parent] + 1 > depth[idx] {
                    depth[idx] = depth[parent] + 1;
                    via[idx] = Some(parent);
                }
            }
        }

        let mut path = Vec::new();
        let mut cursor = (0..self.tasks.len()).max_by_key(|&i| (depth[i], std::cmp::Reverse(i)));
        while let Some(idx) = cursor {
            path.push(&self.tasks[idx]);
            cursor = via[idx];
        }
        path.reverse();
        Ok(path)
    }
}

impl TryFrom<GraphDocument> for WorkflowGraph {
    type Error = PlanError;

    fn try_from(doc: GraphDocument) -> Result<Self> {
        WorkflowGraph::from_parts(doc.tasks, doc.edges)
    }
}

impl From<WorkflowGraph> for GraphDocument {
    fn from(graph: WorkflowGraph) -> Self {
        GraphDocument {
            tasks: graph.tasks,
            edges: graph.edges,
        }
    }
}
