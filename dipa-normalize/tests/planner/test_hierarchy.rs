//! Cross-tier linking, full warp chains and idempotence

use super::common::*;
use dipa_normalize::StageKind;
use pretty_assertions::assert_eq;

#[test]
fn test_full_warp_depends_on_site_then_project_compose() {
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 1)]), &site_config(1, 1, 1));

    for task in plan.graph.tasks_of(StageKind::ComposeFullWarp) {
        let parents = plan.graph.parents(&task.id);
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().all(|p| p.stage == StageKind::ComposeWarp));
        assert_eq!(parents[0].tier, "SITE");
        assert_eq!(parents[1].tier, "ID");
    }

    assert_eq!(
        parent_ids(&plan.graph, "ID-south1_Normalize_ComposeFullWarp"),
        vec![
            "SITE-south_Normalize_ComposeWarp".to_string(),
            "ID-south1_Normalize_ComposeWarp".to_string(),
        ]
    );
}

#[test]
fn test_full_warp_arguments_compose_root_first() {
    let plan = plan_ok(&site_table(&[("north", 2)]), &site_config(1, 1, 1));
    let task = plan.graph.task("ID-north2_Normalize_ComposeFullWarp").unwrap();

    assert_eq!(
        task.arguments,
        vec![
            "--image",
            "/data/north/north2_spd.nii.gz",
            "--df",
            "SITE-north_combined.df.nii.gz",
            "--df",
            "ID-north2_combined.df.nii.gz",
            "--outdf",
            "ID-north2_full.df.nii.gz",
            "--outinvdf",
            "ID-north2_full.df_inv.nii.gz",
            "--outimage",
            "ID-north2_full.nii.gz",
        ]
    );
    assert!(task.outputs.iter().all(|o| o.transfer));
}

#[test]
fn test_site_template_is_project_tier_source() {
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 2)]), &site_config(1, 1, 1));

    let image_dim = plan.graph.task("SITE-north_Normalize_ImageDim").unwrap();
    assert!(image_dim.consumes("SITE-north_template.nii.gz"));
    assert_eq!(
        parent_ids(&plan.graph, &image_dim.id),
        vec!["SITE-north_Normalize_ComposeMean".to_string()]
    );

    let rigid = plan.graph.task("SITE-south_i1_Normalize_RigidWarp").unwrap();
    assert!(rigid.consumes("SITE-south_template.nii.gz"));
    assert!(rigid.consumes("PROJECT-Study_initial_template.nii.gz"));
}

#[test]
fn test_four_level_chain() {
    let table = dipa_normalize::EntityTable::from_csv_str(
        "SITE,SCANNER,ID,SPD\n\
         north,n1,a,a.nii.gz\n\
         north,n1,b,b.nii.gz\n\
         north,n2,c,c.nii.gz\n\
         south,s1,d,d.nii.gz\n",
    )
    .unwrap();
    let config = dipa_normalize::NormalizeConfig {
        hierarchy: vec!["SITE".into(), "SCANNER".into()],
        ..config(1, 1, 1)
    };
    let plan = plan_ok(&table, &config);

    assert_eq!(plan.count(StageKind::ComposeFullWarp), 4);
    assert_eq!(plan.count(StageKind::ComposeMean), 1 + 2 + 3);
    assert_eq!(
        parent_ids(&plan.graph, "ID-c_Normalize_ComposeFullWarp"),
        vec![
            "SITE-north_Normalize_ComposeWarp".to_string(),
            "SCANNER-n2_Normalize_ComposeWarp".to_string(),
            "ID-c_Normalize_ComposeWarp".to_string(),
        ]
    );
}

#[test]
fn test_planning_is_idempotent() {
    let table = site_table(&[("north", 3), ("south", 2)]);
    let first = plan_ok(&table, &site_config(2, 2, 2));
    let second = plan_ok(&table, &site_config(2, 2, 2));

    let ids = |p: &dipa_normalize::NormalizationPlan| -> Vec<String> {
        p.graph.tasks().iter().map(|t| t.id.clone()).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.graph.edges(), second.graph.edges());
    assert_eq!(first.catalog, second.catalog);
}

#[test]
fn test_graph_is_acyclic_and_children_precede_parents() {
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 2)]), &site_config(2, 2, 2));
    let order = plan.graph.topological_order().unwrap();
    assert_eq!(order.len(), plan.task_count());

    let position = |id: &str| order.iter().position(|t| t.id == id).unwrap();
    for edge in plan.graph.edges() {
        assert!(position(&edge.parent) < position(&edge.child));
    }
}

#[test]
fn test_every_input_is_produced_or_external() {
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 2)]), &site_config(2, 2, 2));
    let external = plan.graph.external_inputs();

    for input in &external {
        let is_raw = input.starts_with("/data/");
        let is_manifest = plan.catalog.contains(input);
        assert!(is_raw || is_manifest, "unexpected external input {}", input);
    }
    assert_eq!(plan.catalog.len(), external.iter().filter(|i| !i.starts_with("/data/")).count());
}
