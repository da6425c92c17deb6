//! Common fixtures for workflow tests

#![allow(dead_code)]

use dipa::normalize::cli::OutputFormat;
use dipa::normalize::workflow::{ConfigOverrides, WorkflowConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub const SITE_TABLE: &str = "PROJECT,SITE,ID,SPD\n\
Study,north,n1,images/n1_spd.nii.gz\n\
Study,north,n2,images/n2_spd.nii.gz\n\
Study,south,s1,/archive/s1_spd.nii.gz\n";

/// Write `contents` to `name` inside `dir`
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn workflow_config(input: PathBuf, output_dir: PathBuf) -> WorkflowConfig {
    WorkflowConfig {
        input,
        output_dir,
        config_file: None,
        overrides: ConfigOverrides {
            rigid: Some(1),
            affine: Some(1),
            diffeomorphic: Some(1),
            ..Default::default()
        },
        format: OutputFormat::Yaml,
        site: "local".to_string(),
    }
}
