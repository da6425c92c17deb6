//! Settings precedence and failure reporting

use super::common::*;
use dipa::normalize::run_normalize_workflow;
use dipa::normalize::types::WorkflowFile;
use dipa_normalize::{PlanError, Species};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_file_values_apply() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let settings = write_file(
        dir.path(),
        "settings.yaml",
        "species: monkey\nhierarchy: [SITE]\nrigid: 4\n",
    );
    let mut config = workflow_config(table, dir.path().join("out"));
    config.config_file = Some(settings);

    let summary = run_normalize_workflow(&config).unwrap();
    let text = fs::read_to_string(&summary.workflow_path).unwrap();
    let workflow: WorkflowFile = serde_yaml::from_str(&text).unwrap();

    assert_eq!(workflow.settings.species, Species::Monkey);
    assert_eq!(workflow.settings.hierarchy, vec!["PROJECT", "SITE", "ID"]);
    // --rigid from the command line wins over the file
    assert_eq!(workflow.settings.rigid, 1);
}

#[test]
fn test_fixed_template_from_command_line() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let mut config = workflow_config(table, dir.path().join("out"));
    config.overrides.hierarchy = Some(vec!["SITE".to_string()]);
    config.overrides.template = Some("/atlas/template.nii.gz".to_string());

    let summary = run_normalize_workflow(&config).unwrap();
    assert_eq!(summary.tasks, 6 * 3 + 1);
}

#[test]
fn test_unknown_species_is_reported() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let out = dir.path().join("out");
    let mut config = workflow_config(table, out.clone());
    config.overrides.species = Some("dog".to_string());

    let err = run_normalize_workflow(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PlanError>(),
        Some(PlanError::UnknownSpecies(_))
    ));
    assert!(!out.exists());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let mut config = workflow_config(table, dir.path().join("out"));
    config.config_file = Some(dir.path().join("missing.yaml"));

    let err = run_normalize_workflow(&config).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
