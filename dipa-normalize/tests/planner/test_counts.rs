//! Task counts per stage

use super::common::*;
use dipa_normalize::StageKind;
use pretty_assertions::assert_eq;

/// Expected task count of one bootstrap tier over `n` sources
fn tier_tasks(n: usize, r: usize, a: usize, d: usize) -> usize {
    n + 1 + (r * n + r) + (2 * a * n + 2 * a) + (d * n + d) + (n + 1)
}

#[test]
fn test_three_subjects_with_clamped_iterations() {
    let plan = plan_ok(&flat_table(&["A", "B", "C"]), &config(2, 0, 0));

    let counts: Vec<(StageKind, usize)> = StageKind::ALL
        .iter()
        .map(|s| (*s, plan.count(*s)))
        .collect();
    assert_eq!(
        counts,
        vec![
            (StageKind::ImageDim, 3),
            (StageKind::CreateTemplate, 1),
            (StageKind::RigidWarp, 6),
            (StageKind::RigidMean, 2),
            (StageKind::AffineWarpA, 3),
            (StageKind::AffineMeanA, 1),
            (StageKind::AffineWarpB, 3),
            (StageKind::AffineMeanB, 1),
            (StageKind::DiffeomorphicWarp, 3),
            (StageKind::DiffeomorphicMean, 1),
            (StageKind::ComposeWarp, 3),
            (StageKind::ComposeMean, 1),
            (StageKind::ComposeFullWarp, 0),
        ]
    );
    assert_eq!(plan.task_count(), 28);
}

#[test]
fn test_two_level_formula() {
    for (n, r, a, d) in [(1, 1, 1, 1), (4, 3, 3, 6), (7, 2, 5, 1)] {
        let ids: Vec<String> = (0..n).map(|i| format!("s{:02}", i)).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let plan = plan_ok(&flat_table(&ids), &config(r as u32, a as u32, d as u32));

        assert_eq!(plan.task_count(), tier_tasks(n, r, a, d));
        assert_eq!(plan.count(StageKind::RigidWarp), r * n);
        assert_eq!(plan.count(StageKind::AffineMeanA), a);
        assert_eq!(plan.count(StageKind::DiffeomorphicWarp), d * n);
        assert_eq!(plan.count(StageKind::ComposeFullWarp), 0);
    }
}

#[test]
fn test_three_level_counts() {
    let plan = plan_ok(&site_table(&[("north", 2), ("south", 3)]), &site_config(1, 1, 1));

    let expected = tier_tasks(2, 1, 1, 1) + tier_tasks(3, 1, 1, 1) + tier_tasks(2, 1, 1, 1) + 5;
    assert_eq!(plan.task_count(), expected);
    assert_eq!(plan.count(StageKind::ComposeMean), 3);
    assert_eq!(plan.count(StageKind::ComposeFullWarp), 5);
}

#[test]
fn test_default_iterations() {
    let plan = plan_ok(&flat_table(&["A", "B"]), &Default::default());
    assert_eq!(plan.count(StageKind::RigidMean), 3);
    assert_eq!(plan.count(StageKind::AffineMeanB), 3);
    assert_eq!(plan.count(StageKind::DiffeomorphicMean), 6);
}
