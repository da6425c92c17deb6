//! Fixed-template mode

use super::common::*;
use dipa_normalize::{NormalizeConfig, StageKind};
use pretty_assertions::assert_eq;

fn fixed_config() -> NormalizeConfig {
    NormalizeConfig {
        template: Some("/atlas/template.nii.gz".into()),
        ..Default::default()
    }
}

#[test]
fn test_fixed_mode_computes_no_group_mean() {
    let plan = plan_ok(&flat_table(&["A", "B", "C"]), &fixed_config());

    assert_eq!(plan.task_count(), 6 * 3 + 1);
    for stage in [
        StageKind::RigidMean,
        StageKind::AffineMeanA,
        StageKind::AffineMeanB,
        StageKind::DiffeomorphicMean,
        StageKind::ComposeMean,
        StageKind::ComposeFullWarp,
    ] {
        assert_eq!(plan.count(stage), 0, "{} emitted in fixed mode", stage);
    }
    assert_eq!(plan.count(StageKind::ComposeWarp), 3);
}

#[test]
fn test_fixed_mode_collapses_hierarchy_and_iterations() {
    let config = NormalizeConfig {
        template: Some("/atlas/template.nii.gz".into()),
        ..site_config(5, 2, 4)
    };
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 2)]), &config);

    assert_eq!(plan.settings.hierarchy, vec!["PROJECT", "ID"]);
    assert_eq!(
        (plan.settings.rigid, plan.settings.affine, plan.settings.diffeomorphic),
        (1, 1, 1)
    );
    assert_eq!(plan.task_count(), 6 * 4 + 1);
    assert_eq!(plan.count(StageKind::CreateTemplate), 1);
    assert!(plan.graph.task("ID-north1_i1_Normalize_RigidWarp").is_some());
    assert!(plan.graph.task("ID-north1_i2_Normalize_RigidWarp").is_none());
}

#[test]
fn test_fixed_mode_chains_each_entity() {
    let plan = plan_ok(&flat_table(&["A", "B"]), &fixed_config());
    let graph = &plan.graph;

    assert_eq!(
        parent_ids(graph, "ID-A_i1_Normalize_RigidWarp"),
        vec!["PROJECT-Project_Normalize_CreateTemplate".to_string()]
    );
    assert_eq!(
        parent_ids(graph, "ID-A_i1_Normalize_AffineWarpA"),
        vec!["ID-A_i1_Normalize_RigidWarp".to_string()]
    );
    assert_eq!(
        parent_ids(graph, "ID-A_i1_Normalize_AffineWarpB"),
        vec!["ID-A_i1_Normalize_AffineWarpA".to_string()]
    );
    assert_eq!(
        parent_ids(graph, "ID-A_i1_Normalize_DiffeomorphicWarp"),
        vec!["ID-A_i1_Normalize_AffineWarpB".to_string()]
    );
    assert_eq!(
        parent_ids(graph, "ID-A_Normalize_ComposeWarp"),
        vec![
            "ID-A_i1_Normalize_DiffeomorphicWarp".to_string(),
            "PROJECT-Project_Normalize_CreateTemplate".to_string(),
        ]
    );
}

#[test]
fn test_fixed_mode_registers_against_resampled_template() {
    let plan = plan_ok(&flat_table(&["A"]), &fixed_config());
    let graph = &plan.graph;

    let create = graph.task("PROJECT-Project_Normalize_CreateTemplate").unwrap();
    assert!(create.consumes("/atlas/template.nii.gz"));
    assert!(create.produces("PROJECT-Project_mask.nii.gz"));

    let resampled = "PROJECT-Project_initial_template.nii.gz";
    for stage in [
        StageKind::RigidWarp,
        StageKind::AffineWarpA,
        StageKind::AffineWarpB,
        StageKind::DiffeomorphicWarp,
        StageKind::ComposeWarp,
    ] {
        let task = graph.tasks_of(stage).next().unwrap();
        assert!(task.consumes(resampled), "{} does not use the template", stage);
    }

    let affine_b = graph.task("ID-A_i1_Normalize_AffineWarpB").unwrap();
    assert!(!affine_b.arguments.contains(&"--invaff".to_string()));
    assert_eq!(
        graph.external_inputs(),
        vec![
            "/atlas/template.nii.gz".to_string(),
            "/data/A_spd.nii.gz".to_string(),
            "PROJECT-Project_dimension_files.csv".to_string(),
        ]
    );
}
