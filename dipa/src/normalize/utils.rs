//! Utility functions for the normalization workflow

use anyhow::{Context, Result};
use dipa_normalize::{ArtifactCatalog, EntityTable, NormalizeConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::normalize::cli::OutputFormat;
use crate::normalize::types::ReplicaCatalog;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Load an entity table, choosing the parser from the file extension
pub fn load_entity_table(path: &Path) -> Result<EntityTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read entity table: {}", path.display()))?;

    let table = match extension_of(path).as_str() {
        "yaml" | "yml" => EntityTable::from_yaml_str(&text),
        "json" => EntityTable::from_json_str(&text),
        _ => EntityTable::from_csv_str(&text),
    }
    .with_context(|| format!("Failed to parse entity table: {}", path.display()))?;

    debug!(
        path = %path.display(),
        rows = table.len(),
        columns = %table.columns().join(","),
        "Loaded entity table"
    );
    Ok(table)
}

/// Load planner settings from a YAML or JSON file
pub fn load_normalize_config(path: &Path) -> Result<NormalizeConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: NormalizeConfig = if extension_of(path) == "json" {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    } else {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
    };
    Ok(config)
}

/// Serialize `value` to `path` in the given format
pub fn save_document<T: Serialize>(path: &Path, value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize YAML")?,
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize JSON")?
        }
    };
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    save_document(path, value, OutputFormat::Yaml)
}

/// Write every manifest of the catalog into `dir`
pub fn write_manifests(catalog: &ArtifactCatalog, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create manifest directory: {}", dir.display()))?;

    for (name, contents) in catalog.iter() {
        let path = dir.join(name);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    }
    debug!(dir = %dir.display(), manifests = catalog.len(), "Wrote manifests");
    Ok(catalog.len())
}

/// Make `path` absolute against the current directory
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(cwd.join(path))
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Directory holding `path`, `.` for a bare file name
pub fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Directories relative external inputs resolve against
#[derive(Debug, Clone)]
pub struct ReplicaRoots<'a> {
    /// Generated manifests
    pub input_dir: &'a Path,
    /// Image paths taken from the entity table
    pub table_dir: &'a Path,
    /// Fixed template, with the directory its path is relative to
    pub template: Option<(&'a str, &'a Path)>,
}

/// Map every external input to a physical file.
///
/// Manifests live in `input_dir`. The fixed template resolves against the
/// directory it was given relative to. Anything else is a path from the
/// entity table and resolves against `table_dir` when relative.
pub fn build_replica_catalog(
    external: &[String],
    catalog: &ArtifactCatalog,
    roots: &ReplicaRoots<'_>,
    site: &str,
) -> Result<ReplicaCatalog> {
    let input_dir = absolutize(roots.input_dir)?;
    let table_dir = absolutize(roots.table_dir)?;
    let template = match roots.template {
        Some((path, dir)) => Some((path, absolutize(dir)?)),
        None => None,
    };

    let mut replicas = ReplicaCatalog::default();
    for lfn in external {
        let physical = match &template {
            _ if catalog.contains(lfn) => input_dir.join(lfn),
            Some((path, dir)) if *path == lfn.as_str() => dir.join(lfn),
            _ => table_dir.join(lfn),
        };
        replicas.add(lfn.as_str(), file_url(&physical), site);
    }
    Ok(replicas)
}
