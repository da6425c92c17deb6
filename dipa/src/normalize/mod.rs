//! Normalization planning workflow.
//!
//! Loads an entity table, plans the normalization DAG with
//! `dipa_normalize` and writes everything the execution engine needs.
//!
//! ## Module Structure
//!
//! - `cli` - Command-line argument definitions
//! - `types` - Output document structures
//! - `utils` - Loading inputs and writing outputs
//! - `workflow` - Main workflow orchestration

pub mod cli;
pub mod types;
pub mod utils;
pub mod workflow;

pub use workflow::{run_normalize_workflow, run_workflow, WorkflowConfig};
