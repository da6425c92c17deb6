//! Common fixtures for planner tests

#![allow(dead_code)]

use dipa_normalize::{plan, EntityTable, NormalizationPlan, NormalizeConfig, WorkflowGraph};

/// Flat table of leaf subjects under a single project
pub fn flat_table(ids: &[&str]) -> EntityTable {
    let mut csv = String::from("ID,SPD\n");
    for id in ids {
        csv.push_str(&format!("{},/data/{}_spd.nii.gz\n", id, id));
    }
    EntityTable::from_csv_str(&csv).unwrap()
}

/// SITE > ID table; `sites` lists each site with its subject count
pub fn site_table(sites: &[(&str, usize)]) -> EntityTable {
    let mut csv = String::from("PROJECT,SITE,ID,SPD\n");
    for (site, n) in sites {
        for i in 1..=*n {
            csv.push_str(&format!("Study,{site},{site}{i},/data/{site}/{site}{i}_spd.nii.gz\n"));
        }
    }
    EntityTable::from_csv_str(&csv).unwrap()
}

pub fn config(rigid: u32, affine: u32, diffeomorphic: u32) -> NormalizeConfig {
    NormalizeConfig {
        rigid,
        affine,
        diffeomorphic,
        ..Default::default()
    }
}

pub fn site_config(rigid: u32, affine: u32, diffeomorphic: u32) -> NormalizeConfig {
    NormalizeConfig {
        hierarchy: vec!["PROJECT".into(), "SITE".into(), "ID".into()],
        ..config(rigid, affine, diffeomorphic)
    }
}

pub fn plan_ok(table: &EntityTable, config: &NormalizeConfig) -> NormalizationPlan {
    plan(table, config).unwrap()
}

/// Ids of the direct parents of `id`, in edge order
pub fn parent_ids(graph: &WorkflowGraph, id: &str) -> Vec<String> {
    graph.parents(id).iter().map(|t| t.id.clone()).collect()
}
