//! Entity table: one row per leaf entity, one column per hierarchy level plus
//! the `SPD` tensor image column.
//!
//! Tables load from CSV, YAML or JSON. Identifiers in YAML/JSON records
//! should be quoted: integers are accepted as written, but a non-integer
//! number (`1e3`, `2.50`) has no faithful text form and is refused when it
//! sits in a hierarchy column. [`EntityTable::entities`] projects the
//! table onto a hierarchy and validates that every entity maps to exactly one
//! group at every level, so the planner can descend without further checks.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{PlanSettings, PROJECT_LEVEL, SPD_COLUMN};
use crate::error::{PlanError, Result};

/// Raw tabular input, all values kept as strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Columns where some record held a non-integer number
    inexact: BTreeSet<String>,
}

/// A leaf entity projected onto the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Value per hierarchy level, outermost first
    pub levels: Vec<String>,

    /// Tensor image of the entity
    pub spd: String,

    /// 1-based data row the entity came from
    pub row: usize,
}

impl Entity {
    pub fn level(&self, depth: usize) -> &str {
        &self.levels[depth]
    }

    pub fn leaf_id(&self) -> &str {
        self.levels.last().map(String::as_str).unwrap_or_default()
    }
}

/// Scalar cell accepted from YAML/JSON records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Empty(()),
}

impl Cell {
    fn into_string(self) -> String {
        match self {
            Cell::Text(s) => s,
            Cell::Integer(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Flag(b) => b.to_string(),
            Cell::Empty(()) => String::new(),
        }
    }
}

impl EntityTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PlanError::MalformedTable(format!(
                    "row {} has {} fields, expected {}",
                    i + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(EntityTable {
            columns,
            rows,
            inexact: BTreeSet::new(),
        })
    }

    /// Build from column->value maps; absent keys become empty cells
    pub fn from_records(records: Vec<BTreeMap<String, String>>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or_default())
                    .collect()
            })
            .collect();
        EntityTable::new(columns, rows)
    }

    /// Parse comma separated text with a header row; double-quoted fields may
    /// contain commas and `""` escapes
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| PlanError::MalformedTable("missing header row".to_string()))?;
        let columns: Vec<String> = split_csv_line(header, 1)?
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (line_no, line) in lines {
            rows.push(split_csv_line(line, line_no + 1)?);
        }
        EntityTable::new(columns, rows)
    }

    /// Parse a YAML sequence of mappings
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let records: Vec<BTreeMap<String, Cell>> = serde_yaml::from_str(text)
            .map_err(|e| PlanError::MalformedTable(format!("invalid YAML records: {}", e)))?;
        EntityTable::from_cells(records)
    }

    /// Parse a JSON array of objects
    pub fn from_json_str(text: &str) -> Result<Self> {
        let records: Vec<BTreeMap<String, Cell>> = serde_json::from_str(text)
            .map_err(|e| PlanError::MalformedTable(format!("invalid JSON records: {}", e)))?;
        EntityTable::from_cells(records)
    }

    fn from_cells(records: Vec<BTreeMap<String, Cell>>) -> Result<Self> {
        let (records, inexact) = stringify(records);
        let mut table = EntityTable::from_records(records)?;
        table.inexact = inexact;
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Project the table onto the resolved hierarchy.
    ///
    /// A missing PROJECT column is filled with the project name. Every other
    /// hierarchy level and `SPD` must be present. The returned entities are
    /// already validated for unique grouping.
    pub fn entities(&self, settings: &PlanSettings) -> Result<Vec<Entity>> {
        let mut required: Vec<&str> = settings.hierarchy.iter().map(String::as_str).collect();
        required.push(SPD_COLUMN);

        let missing: Vec<String> = required
            .iter()
            .filter(|c| **c != PROJECT_LEVEL && self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PlanError::MissingColumns { missing });
        }
        if self.rows.is_empty() {
            return Err(PlanError::EmptyTable);
        }
        if let Some(level) = settings.hierarchy.iter().find(|l| self.inexact.contains(*l)) {
            return Err(PlanError::MalformedTable(format!(
                "column {} holds a non-integer number; quote identifiers",
                level
            )));
        }

        let level_columns: Vec<Option<usize>> = settings
            .hierarchy
            .iter()
            .map(|level| self.column_index(level))
            .collect();
        let spd_column = self
            .column_index(SPD_COLUMN)
            .ok_or_else(|| PlanError::MissingColumns {
                missing: vec![SPD_COLUMN.to_string()],
            })?;

        let mut entities = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let row_no = i + 1;
            let mut levels = Vec::with_capacity(level_columns.len());
            for (level, column) in settings.hierarchy.iter().zip(&level_columns) {
                let value = match column {
                    Some(idx) => row[*idx].trim().to_string(),
                    None => settings.name.clone(),
                };
                if value.is_empty() {
                    return Err(PlanError::EmptyValue {
                        level: level.clone(),
                        row: row_no,
                    });
                }
                levels.push(value);
            }
            let spd = row[spd_column].trim().to_string();
            if spd.is_empty() {
                return Err(PlanError::EmptyValue {
                    level: SPD_COLUMN.to_string(),
                    row: row_no,
                });
            }
            entities.push(Entity {
                levels,
                spd,
                row: row_no,
            });
        }

        validate_grouping(&settings.hierarchy, &entities)?;
        Ok(entities)
    }
}

fn stringify(
    records: Vec<BTreeMap<String, Cell>>,
) -> (Vec<BTreeMap<String, String>>, BTreeSet<String>) {
    let mut inexact = BTreeSet::new();
    let records = records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(k, v)| {
                    let key = k.trim().to_string();
                    if matches!(v, Cell::Float(_)) {
                        inexact.insert(key.clone());
                    }
                    (key, v.into_string())
                })
                .collect()
        })
        .collect();
    (records, inexact)
}

fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if quoted {
        return Err(PlanError::MalformedTable(format!(
            "unterminated quote on line {}",
            line_no
        )));
    }
    fields.push(field);
    Ok(fields)
}

/// Check that every value at every level belongs to exactly one parent group,
/// that leaves are unique and that the table has a single root
pub fn validate_grouping(hierarchy: &[String], entities: &[Entity]) -> Result<()> {
    let mut roots: Vec<&str> = Vec::new();
    for entity in entities {
        if !roots.contains(&entity.level(0)) {
            roots.push(entity.level(0));
        }
    }
    if roots.len() > 1 {
        return Err(PlanError::MultipleRoots {
            level: hierarchy[0].clone(),
            values: roots.join(", "),
        });
    }

    let leaf_depth = hierarchy.len() - 1;
    for depth in 1..hierarchy.len() {
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for entity in entities {
            let value = entity.level(depth);
            let parent = entity.level(depth - 1);
            match parent_of.get(value) {
                None => {
                    parent_of.insert(value, parent);
                }
                Some(_) if depth == leaf_depth => {
                    return Err(PlanError::DuplicateEntity {
                        level: hierarchy[depth].clone(),
                        value: value.to_string(),
                    });
                }
                Some(existing) if *existing != parent => {
                    return Err(PlanError::AmbiguousGroup {
                        level: hierarchy[depth].clone(),
                        value: value.to_string(),
                        parent_level: hierarchy[depth - 1].clone(),
                        first: existing.to_string(),
                        second: parent.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Group entities by their value at `depth`, in order of first appearance
pub fn group_by<'a>(entities: &[&'a Entity], depth: usize) -> Vec<(&'a str, Vec<&'a Entity>)> {
    let mut groups: Vec<(&'a str, Vec<&'a Entity>)> = Vec::new();
    for entity in entities {
        let key = entity.level(depth);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(entity),
            None => groups.push((key, vec![*entity])),
        }
    }
    groups
}
