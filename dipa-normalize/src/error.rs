//! Error types for normalization planning.
//!
//! Every failure aborts the planning pass as a whole. Callers never receive
//! a partially built graph: `plan()` either returns a complete
//! [`NormalizationPlan`](crate::NormalizationPlan) or one of these errors.

use thiserror::Error;

use crate::types::StageKind;

/// Coarse classification of a [`PlanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad inputs: species, hierarchy, table shape.
    Configuration,
    /// An entity does not map uniquely into the hierarchy grouping.
    Grouping,
    /// The planner refused to emit an inconsistent graph.
    Structure,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unrecognized species '{0}'. Select one of HUMAN, MONKEY, RAT")]
    UnknownSpecies(String),

    #[error("Invalid hierarchy [{levels}]: {reason}")]
    InvalidHierarchy { levels: String, reason: String },

    #[error("Entity table is missing required columns [{}]", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Entity table has no rows")]
    EmptyTable,

    #[error("Malformed entity table: {0}")]
    MalformedTable(String),

    #[error("{level} '{value}' belongs to more than one {parent_level} ({first} and {second})")]
    AmbiguousGroup {
        level: String,
        value: String,
        parent_level: String,
        first: String,
        second: String,
    },

    #[error("{level} '{value}' appears more than once in the entity table")]
    DuplicateEntity { level: String, value: String },

    #[error("Row {row} has an empty value for {level}")]
    EmptyValue { level: String, row: usize },

    #[error("Entity table spans more than one {level}: {values}")]
    MultipleRoots { level: String, values: String },

    #[error("{task} cannot run its first iteration without an initial template")]
    MissingInitialTemplate { task: String },

    #[error("{task} expected a reference produced by {expected}, got {actual}")]
    UnexpectedReference {
        task: String,
        expected: String,
        actual: StageKind,
    },

    #[error("{task} requires the output of {expected}")]
    MissingReference { task: String, expected: String },

    #[error("Task '{0}' was emitted twice")]
    DuplicateTask(String),

    #[error("Output '{file}' is produced by both '{first}' and '{second}'")]
    DuplicateOutput {
        file: String,
        first: String,
        second: String,
    },

    #[error("Manifest '{0}' was generated twice with different contents")]
    ManifestConflict(String),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Dependency cycle detected among tasks: {0}")]
    Cycle(String),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::UnknownSpecies(_)
            | PlanError::InvalidHierarchy { .. }
            | PlanError::MissingColumns { .. }
            | PlanError::EmptyTable
            | PlanError::MalformedTable(_) => ErrorKind::Configuration,
            PlanError::AmbiguousGroup { .. }
            | PlanError::DuplicateEntity { .. }
            | PlanError::EmptyValue { .. }
            | PlanError::MultipleRoots { .. } => ErrorKind::Grouping,
            PlanError::MissingInitialTemplate { .. }
            | PlanError::UnexpectedReference { .. }
            | PlanError::MissingReference { .. }
            | PlanError::DuplicateTask(_)
            | PlanError::DuplicateOutput { .. }
            | PlanError::ManifestConflict(_)
            | PlanError::UnknownTask(_)
            | PlanError::SelfDependency(_)
            | PlanError::Cycle(_) => ErrorKind::Structure,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
