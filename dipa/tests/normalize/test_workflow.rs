//! Full workflow runs against a temporary directory

use super::common::*;
use dipa::normalize::cli::OutputFormat;
use dipa::normalize::run_normalize_workflow;
use dipa::normalize::types::{ExecutionPlanFile, ReplicaCatalog, WorkflowFile};
use dipa_normalize::StageKind;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_run_writes_all_outputs() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let out = dir.path().join("out");

    let summary = run_normalize_workflow(&workflow_config(table, out.clone())).unwrap();

    assert!(summary.workflow_path.ends_with("workflow.yaml"));
    assert!(summary.workflow_path.exists());
    assert!(summary.execution_plan_path.exists());
    assert!(summary.replica_catalog_path.exists());
    assert_eq!(fs::read_dir(out.join("input")).unwrap().count(), summary.manifests);
    assert!(summary.manifests > 0);
}

#[test]
fn test_workflow_file_round_trips_to_graph() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let summary =
        run_normalize_workflow(&workflow_config(table, dir.path().join("out"))).unwrap();

    let text = fs::read_to_string(&summary.workflow_path).unwrap();
    let workflow: WorkflowFile = serde_yaml::from_str(&text).unwrap();
    assert_eq!(workflow.name, "Project");
    assert_eq!(workflow.settings.hierarchy, vec!["PROJECT", "ID"]);

    let graph = workflow.into_graph().unwrap();
    assert_eq!(graph.len(), summary.tasks);
    assert_eq!(graph.edges().len(), summary.edges);
}

#[test]
fn test_site_hierarchy_emits_full_warps() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let mut config = workflow_config(table, dir.path().join("out"));
    config.overrides.hierarchy = Some(vec!["SITE".to_string()]);

    let summary = run_normalize_workflow(&config).unwrap();
    let text = fs::read_to_string(&summary.workflow_path).unwrap();
    let graph = serde_yaml::from_str::<WorkflowFile>(&text)
        .unwrap()
        .into_graph()
        .unwrap();

    assert_eq!(graph.count(StageKind::ComposeFullWarp), 3);
    assert!(graph.task("SITE-north_Normalize_ImageDim").is_some());
}

#[test]
fn test_replica_catalog_resolves_table_paths() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let out = dir.path().join("out");
    let mut config = workflow_config(table, out.clone());
    config.site = "cluster".to_string();

    let summary = run_normalize_workflow(&config).unwrap();
    let text = fs::read_to_string(&summary.replica_catalog_path).unwrap();
    let replicas: ReplicaCatalog = serde_yaml::from_str(&text).unwrap();

    let relative = replicas.get("images/n1_spd.nii.gz").unwrap();
    assert_eq!(
        relative.pfns[0].pfn,
        format!("file://{}", dir.path().join("images/n1_spd.nii.gz").display())
    );
    assert_eq!(relative.pfns[0].site, "cluster");

    let absolute = replicas.get("/archive/s1_spd.nii.gz").unwrap();
    assert_eq!(absolute.pfns[0].pfn, "file:///archive/s1_spd.nii.gz");

    let lookup = replicas.get("PROJECT-Study_dimension_files.csv").unwrap();
    assert_eq!(
        lookup.pfns[0].pfn,
        format!(
            "file://{}",
            out.join("input/PROJECT-Study_dimension_files.csv").display()
        )
    );
    assert_eq!(summary.replicas, 3 + summary.manifests);
}

#[test]
fn test_manifest_contents_on_disk() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let out = dir.path().join("out");
    run_normalize_workflow(&workflow_config(table, out.clone())).unwrap();

    let lookup = fs::read_to_string(out.join("input/PROJECT-Study_dimension_files.csv")).unwrap();
    assert_eq!(
        lookup,
        "ID,FILE\nn1,ID-n1_dimensions.csv\nn2,ID-n2_dimensions.csv\ns1,ID-s1_dimensions.csv\n"
    );
}

#[test]
fn test_execution_plan_file() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let summary =
        run_normalize_workflow(&workflow_config(table, dir.path().join("out"))).unwrap();

    let text = fs::read_to_string(&summary.execution_plan_path).unwrap();
    let file: ExecutionPlanFile = serde_yaml::from_str(&text).unwrap();
    assert_eq!(file.execution_plan.total_tasks, summary.tasks);
    assert_eq!(file.execution_plan.total_batches, summary.batches);
    assert_eq!(file.execution_plan.batches[0].tasks.len(), 3);
}

#[test]
fn test_json_workflow_format() {
    let dir = TempDir::new().unwrap();
    let table = write_file(dir.path(), "subjects.csv", SITE_TABLE);
    let mut config = workflow_config(table, dir.path().join("out"));
    config.format = OutputFormat::Json;

    let summary = run_normalize_workflow(&config).unwrap();
    assert!(summary.workflow_path.ends_with("workflow.json"));

    let text = fs::read_to_string(&summary.workflow_path).unwrap();
    let workflow: WorkflowFile = serde_json::from_str(&text).unwrap();
    assert_eq!(workflow.tasks.len(), summary.tasks);
}

#[test]
fn test_command_line_template_resolves_against_working_dir() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    let table = write_file(&dir.path().join("data"), "subjects.csv", SITE_TABLE);
    let mut config = workflow_config(table, dir.path().join("out"));
    config.overrides.template = Some("atlas/ixi.nii.gz".to_string());

    let summary = run_normalize_workflow(&config).unwrap();
    let text = fs::read_to_string(&summary.replica_catalog_path).unwrap();
    let replicas: ReplicaCatalog = serde_yaml::from_str(&text).unwrap();

    let cwd = std::env::current_dir().unwrap();
    assert_eq!(
        replicas.get("atlas/ixi.nii.gz").unwrap().pfns[0].pfn,
        format!("file://{}", cwd.join("atlas/ixi.nii.gz").display())
    );
    assert_eq!(
        replicas.get("images/n1_spd.nii.gz").unwrap().pfns[0].pfn,
        format!(
            "file://{}",
            dir.path().join("data/images/n1_spd.nii.gz").display()
        )
    );
}

#[test]
fn test_config_file_template_resolves_against_config_dir() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::create_dir(dir.path().join("configs")).unwrap();
    let table = write_file(&dir.path().join("data"), "subjects.csv", SITE_TABLE);
    let settings = write_file(
        &dir.path().join("configs"),
        "settings.yaml",
        "template: atlas/ixi.nii.gz\n",
    );
    let mut config = workflow_config(table, dir.path().join("out"));
    config.config_file = Some(settings);

    let summary = run_normalize_workflow(&config).unwrap();
    let text = fs::read_to_string(&summary.replica_catalog_path).unwrap();
    let replicas: ReplicaCatalog = serde_yaml::from_str(&text).unwrap();

    assert_eq!(
        replicas.get("atlas/ixi.nii.gz").unwrap().pfns[0].pfn,
        format!(
            "file://{}",
            dir.path().join("configs/atlas/ixi.nii.gz").display()
        )
    );
}
