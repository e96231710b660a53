use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Result, SkillGraphError};
use crate::types::{Occupation, Skill, SkillType};

/// A raw skill row as returned by a category-scoped graph query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillRow {
    pub uri: String,
    pub label: String,
    pub alt_label: Option<String>,
    pub description: Option<String>,
    pub skill_type: String,
    pub narrower: Option<String>,
}

/// A raw occupation row: one occupation paired with one related skill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccupationRow {
    pub uri: String,
    pub label: String,
    pub alt_label: Option<String>,
    pub description: Option<String>,
    pub skill_uri: String,
    pub skill_type: String,
}

/// Rows produced by one graph query, scoped to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet<R> {
    pub category: String,
    pub rows: Vec<R>,
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

/// Unions row sets with full-row deduplication and groups rows by uri,
/// preserving first-seen order.
///
/// Every row set must be non-empty: a silently missing source would degrade
/// search correctness, so it is a fatal `DataSource` error instead.
fn union_by_uri<R>(
    row_sets: &[RowSet<R>],
    uri_of: impl Fn(&R) -> &str,
) -> Result<IndexMap<String, Vec<R>>>
where
    R: Clone + PartialEq + Eq + std::hash::Hash,
{
    let mut seen: HashSet<R> = HashSet::new();
    let mut grouped: IndexMap<String, Vec<R>> = IndexMap::new();

    for set in row_sets {
        if set.rows.is_empty() {
            return Err(SkillGraphError::DataSource {
                message: "required category query returned no rows".to_string(),
                category: set.category.clone(),
            });
        }
        for row in &set.rows {
            if !seen.insert(row.clone()) {
                continue;
            }
            grouped
                .entry(uri_of(row).to_string())
                .or_default()
                .push(row.clone());
        }
    }
    Ok(grouped)
}

/// First non-missing, non-blank value across the grouped rows.
fn first_value<'a, R>(rows: &'a [R], field: impl Fn(&'a R) -> Option<&'a str>) -> Option<&'a str> {
    rows.iter().find_map(|r| field(r).and_then(non_blank))
}

/// Deduplicated multi-valued field across the grouped rows, blanks filtered,
/// first-seen order preserved.
fn collect_values<'a, R>(
    rows: &'a [R],
    field: impl Fn(&'a R) -> Option<&'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for row in rows {
        if let Some(v) = field(row).and_then(non_blank) {
            if seen.insert(v.to_string()) {
                values.push(v.to_string());
            }
        }
    }
    values
}

/// Aggregates raw skill row sets into deduplicated `Skill` records.
pub fn aggregate_skills(row_sets: &[RowSet<SkillRow>]) -> Result<Vec<Skill>> {
    let grouped = union_by_uri(row_sets, |r: &SkillRow| r.uri.as_str())?;
    let mut skills = Vec::with_capacity(grouped.len());

    for (uri, rows) in grouped {
        let label = match first_value(&rows, |r| Some(r.label.as_str())) {
            Some(l) => l.to_string(),
            None => {
                warn!(%uri, "skipping record without a label");
                continue;
            }
        };
        let skill_type = first_value(&rows, |r| Some(r.skill_type.as_str()))
            .and_then(SkillType::from_str)
            .unwrap_or_else(|| {
                warn!(%uri, "unknown skill type, defaulting to 'skill'");
                SkillType::Skill
            });

        let mut skill = Skill {
            uri,
            label,
            alt_label: collect_values(&rows, |r| r.alt_label.as_deref()),
            description: first_value(&rows, |r| r.description.as_deref())
                .unwrap_or_default()
                .to_string(),
            skill_type,
            narrowers: collect_values(&rows, |r| r.narrower.as_deref()),
            all_label: HashSet::new(),
            text: String::new(),
        };
        skill.derive_fields();
        skills.push(skill);
    }
    Ok(skills)
}

/// Aggregates raw occupation row sets into deduplicated `Occupation`
/// records, partitioning related skills by their skill type.
pub fn aggregate_occupations(row_sets: &[RowSet<OccupationRow>]) -> Result<Vec<Occupation>> {
    let grouped = union_by_uri(row_sets, |r: &OccupationRow| r.uri.as_str())?;
    let mut occupations = Vec::with_capacity(grouped.len());

    for (uri, rows) in grouped {
        let label = match first_value(&rows, |r| Some(r.label.as_str())) {
            Some(l) => l.to_string(),
            None => {
                warn!(%uri, "skipping record without a label");
                continue;
            }
        };

        let skills = collect_values(&rows, |r| Some(r.skill_uri.as_str()));
        let mut essential_skills = Vec::new();
        let mut knowledge_skills = Vec::new();
        for skill_uri in &skills {
            let row_type = rows
                .iter()
                .find(|r| r.skill_uri == *skill_uri)
                .and_then(|r| SkillType::from_str(&r.skill_type));
            match row_type {
                Some(SkillType::Knowledge) => knowledge_skills.push(skill_uri.clone()),
                Some(_) => essential_skills.push(skill_uri.clone()),
                None => {}
            }
        }

        let mut occupation = Occupation {
            uri,
            label,
            alt_label: collect_values(&rows, |r| r.alt_label.as_deref()),
            description: first_value(&rows, |r| r.description.as_deref())
                .unwrap_or_default()
                .to_string(),
            skills,
            essential_skills,
            knowledge_skills,
            all_label: HashSet::new(),
            text: String::new(),
        };
        occupation.derive_fields();
        occupations.push(occupation);
    }
    Ok(occupations)
}
