//! Generated manifest files.
//!
//! Group stages read their inputs from small generated files (newline
//! separated warp lists, `ID,FILE` lookup tables). The planner collects them
//! here while it descends and hands the finished catalog to whoever writes
//! the plan to disk.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{PlanError, Result};

/// A manifest produced alongside a stage's task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub contents: String,
}

impl Manifest {
    /// Newline separated list, no trailing newline
    pub fn list<I, S>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let contents = entries
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Manifest {
            name: name.into(),
            contents,
        }
    }

    /// `ID,FILE` lookup table with a header row. Fields holding a comma,
    /// quote or line break are quoted with embedded quotes doubled.
    pub fn lookup<'a, I>(name: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let mut contents = String::from("ID,FILE\n");
        for (id, file) in rows {
            contents.push_str(&csv_field(id));
            contents.push(',');
            contents.push_str(&csv_field(&file));
            contents.push('\n');
        }
        Manifest {
            name: name.into(),
            contents,
        }
    }
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Append-only mapping from manifest name to contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCatalog {
    files: BTreeMap<String, String>,
}

impl ArtifactCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manifest. Re-adding identical contents is a no-op; a
    /// different body under the same name is refused.
    pub fn insert(&mut self, manifest: Manifest) -> Result<()> {
        match self.files.get(&manifest.name) {
            Some(existing) if *existing != manifest.contents => {
                Err(PlanError::ManifestConflict(manifest.name))
            }
            Some(_) => Ok(()),
            None => {
                self.files.insert(manifest.name, manifest.contents);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Manifests in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
