//! Planner configuration and its resolution into effective settings.
//!
//! [`NormalizeConfig`] is what a caller asks for. [`PlanSettings`] is what the
//! planner actually runs with after hierarchy normalisation, iteration
//! clamping, species lookup and the fixed-template collapse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{PlanError, Result};

/// Outermost hierarchy level; every table has exactly one value for it
pub const PROJECT_LEVEL: &str = "PROJECT";

/// Atomic per-subject level; always last
pub const ID_LEVEL: &str = "ID";

/// Column holding each leaf entity's tensor image
pub const SPD_COLUMN: &str = "SPD";

/// Species of the imaged subjects; selects the coarse registration separation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Species {
    Human,
    Monkey,
    Rat,
}

impl Species {
    /// Coarse sampling separation passed to rigid and affine registration
    pub fn separation_coarse(&self) -> f64 {
        match self {
            Species::Human => 4.0,
            Species::Monkey => 2.0,
            Species::Rat => 0.4,
        }
    }
}

impl FromStr for Species {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "HUMAN" => Ok(Species::Human),
            "MONKEY" => Ok(Species::Monkey),
            "RAT" => Ok(Species::Rat),
            _ => Err(PlanError::UnknownSpecies(s.to_string())),
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Species::Human => "HUMAN",
            Species::Monkey => "MONKEY",
            Species::Rat => "RAT",
        };
        f.write_str(name)
    }
}

/// Requested normalization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Project name, used when the table has no PROJECT column
    pub name: String,

    /// Hierarchy levels, outermost first
    pub hierarchy: Vec<String>,

    /// Externally supplied template; switches to fixed-template mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Similarity metric for rigid and affine registration
    pub similarity_metric: String,

    /// Species name, case-insensitive
    pub species: String,

    /// Rigid iterations
    pub rigid: u32,

    /// Affine iterations
    pub affine: u32,

    /// Diffeomorphic iterations
    pub diffeomorphic: u32,

    /// Whether intermediate outputs are staged out to the archive site
    pub transfer_intermediates: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            name: "Project".to_string(),
            hierarchy: vec![PROJECT_LEVEL.to_string(), ID_LEVEL.to_string()],
            template: None,
            similarity_metric: "NMI".to_string(),
            species: "Human".to_string(),
            rigid: 3,
            affine: 3,
            diffeomorphic: 6,
            transfer_intermediates: true,
        }
    }
}

/// Effective settings the planner runs with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    pub name: String,
    pub hierarchy: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub similarity_metric: String,
    pub species: Species,
    pub separation_coarse: f64,
    pub rigid: u32,
    pub affine: u32,
    pub diffeomorphic: u32,
    pub transfer_intermediates: bool,
}

impl PlanSettings {
    pub fn is_fixed(&self) -> bool {
        self.template.is_some()
    }

    /// Level whose values are leaf entities
    pub fn leaf_level(&self) -> &str {
        self.hierarchy.last().map(String::as_str).unwrap_or(ID_LEVEL)
    }
}

impl NormalizeConfig {
    /// Resolve the request into effective settings.
    ///
    /// Species is checked first so an unknown species is reported before any
    /// other validation.
    pub fn resolve(&self) -> Result<PlanSettings> {
        let species: Species = self.species.parse()?;

        let mut hierarchy = normalize_hierarchy(&self.hierarchy)?;
        let mut rigid = clamp_iterations("rigid", self.rigid);
        let mut affine = clamp_iterations("affine", self.affine);
        let mut diffeomorphic = clamp_iterations("diffeomorphic", self.diffeomorphic);

        if self.template.is_some() {
            let minimal = vec![PROJECT_LEVEL.to_string(), ID_LEVEL.to_string()];
            if hierarchy != minimal {
                warn!(
                    requested = %hierarchy.join(","),
                    "Fixed template supplied, collapsing hierarchy to PROJECT,ID"
                );
                hierarchy = minimal;
            }
            if (rigid, affine, diffeomorphic) != (1, 1, 1) {
                warn!(
                    rigid,
                    affine,
                    diffeomorphic,
                    "Fixed template supplied, using a single iteration per stage"
                );
                rigid = 1;
                affine = 1;
                diffeomorphic = 1;
            }
        }

        Ok(PlanSettings {
            name: self.name.clone(),
            hierarchy,
            template: self.template.clone(),
            similarity_metric: self.similarity_metric.clone(),
            species,
            separation_coarse: species.separation_coarse(),
            rigid,
            affine,
            diffeomorphic,
            transfer_intermediates: self.transfer_intermediates,
        })
    }
}

fn clamp_iterations(stage: &str, requested: u32) -> u32 {
    if requested == 0 {
        debug!(stage, "Iteration count 0 clamped to 1");
        1
    } else {
        requested
    }
}

/// Ensure PROJECT leads and ID closes the hierarchy, with no repeated level
pub fn normalize_hierarchy(levels: &[String]) -> Result<Vec<String>> {
    let mut hierarchy: Vec<String> = levels
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let invalid = |hierarchy: &[String], reason: &str| PlanError::InvalidHierarchy {
        levels: hierarchy.join(", "),
        reason: reason.to_string(),
    };

    if !hierarchy.iter().any(|l| l == ID_LEVEL) {
        hierarchy.push(ID_LEVEL.to_string());
    }
    if !hierarchy.iter().any(|l| l == PROJECT_LEVEL) {
        hierarchy.insert(0, PROJECT_LEVEL.to_string());
    }

    if hierarchy.first().map(String::as_str) != Some(PROJECT_LEVEL) {
        return Err(invalid(&hierarchy, "PROJECT must be the outermost level"));
    }
    if hierarchy.last().map(String::as_str) != Some(ID_LEVEL) {
        return Err(invalid(&hierarchy, "ID must be the innermost level"));
    }
    for (i, level) in hierarchy.iter().enumerate() {
        if hierarchy[..i].contains(level) {
            return Err(invalid(&hierarchy, &format!("level {} is repeated", level)));
        }
        if level == SPD_COLUMN {
            return Err(invalid(&hierarchy, "SPD is a data column, not a level"));
        }
    }

    Ok(hierarchy)
}
