use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SkillGraphError};

/// Namespace prefixes recognized in CURIE notation.
pub const NS_MAP: &[(&str, &str)] = &[
    ("esco:", "http://data.europa.eu/esco/skill/"),
    ("isco:", "http://data.europa.eu/esco/isco/"),
];

/// Converts a full URI to CURIE (compact URI) notation.
///
/// Fails if the URI does not start with any known namespace.
pub fn to_curie(uri: &str) -> Result<String> {
    for (prefix, ns) in NS_MAP {
        if let Some(suffix) = uri.strip_prefix(ns) {
            return Ok(format!("{prefix}{suffix}"));
        }
    }
    Err(SkillGraphError::invalid_input(format!(
        "unknown namespace for uri '{uri}'"
    )))
}

/// Converts a CURIE to a full URI. Full `http(s)` URIs pass through unchanged.
pub fn from_curie(curie: &str) -> Result<String> {
    if curie.starts_with("http://") || curie.starts_with("https://") {
        return Ok(curie.to_string());
    }
    for (prefix, ns) in NS_MAP {
        if let Some(suffix) = curie.strip_prefix(prefix) {
            return Ok(format!("{ns}{suffix}"));
        }
    }
    Err(SkillGraphError::invalid_input(format!(
        "unknown prefix for curie '{curie}'"
    )))
}

/// Kind of a taxonomy skill record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillType {
    Skill,
    Knowledge,
    Attitude,
}

#[allow(clippy::should_implement_trait)]
impl SkillType {
    /// Returns the string representation of this skill type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillType::Skill => "skill",
            SkillType::Knowledge => "knowledge",
            SkillType::Attitude => "attitude",
        }
    }

    /// Parses a string into a `SkillType`, returning `None` for unrecognized values.
    ///
    /// Accepts the bare type name or any string ending in it, since graph
    /// sources sometimes return the full type label.
    pub fn from_str(s: &str) -> Option<SkillType> {
        let s = s.trim().to_lowercase();
        if s.ends_with("knowledge") {
            Some(SkillType::Knowledge)
        } else if s.ends_with("attitude") {
            Some(SkillType::Attitude)
        } else if s.ends_with("skill") {
            Some(SkillType::Skill)
        } else {
            None
        }
    }
}

/// A canonical skill record aggregated from the taxonomy graph.
///
/// `all_label` and `text` are derived fields: `all_label` is the lowercase
/// union of `label` and `alt_label` (never empty for a well-formed record),
/// `text` is the lowercase concatenation used for semantic search. They are
/// recomputed on load, never trusted from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub uri: String,
    pub label: String,
    #[serde(default)]
    pub alt_label: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub skill_type: SkillType,
    #[serde(default)]
    pub narrowers: Vec<String>,
    #[serde(skip)]
    pub all_label: HashSet<String>,
    #[serde(skip)]
    pub text: String,
}

impl Skill {
    /// Recomputes the derived `all_label` and `text` fields from the
    /// canonical ones.
    pub fn derive_fields(&mut self) {
        self.all_label = all_label_of(&self.label, &self.alt_label);
        self.text = search_text_of(&self.label, &self.alt_label, &self.description);
    }
}

/// An occupation record with its related skills partitioned by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occupation {
    pub uri: String,
    pub label: String,
    #[serde(default)]
    pub alt_label: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// All related skill uris.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Related skill uris with skill type `skill`.
    #[serde(default)]
    pub essential_skills: Vec<String>,
    /// Related skill uris with skill type `knowledge`.
    #[serde(default)]
    pub knowledge_skills: Vec<String>,
    #[serde(skip)]
    pub all_label: HashSet<String>,
    #[serde(skip)]
    pub text: String,
}

impl Occupation {
    /// Recomputes the derived `all_label` and `text` fields.
    pub fn derive_fields(&mut self) {
        self.all_label = all_label_of(&self.label, &self.alt_label);
        self.text = search_text_of(&self.label, &self.alt_label, &self.description);
    }
}

/// Lowercase label set used for exact/alt-label search.
pub fn all_label_of(label: &str, alt_label: &[String]) -> HashSet<String> {
    let mut set: HashSet<String> = alt_label
        .iter()
        .filter(|a| !a.trim().is_empty())
        .map(|a| a.to_lowercase())
        .collect();
    set.insert(label.to_lowercase());
    set
}

/// Lowercase "; "-joined text field used for semantic search.
pub fn search_text_of(label: &str, alt_label: &[String], description: &str) -> String {
    let mut parts = vec![label];
    parts.extend(alt_label.iter().map(|a| a.as_str()));
    if !description.trim().is_empty() {
        parts.push(description);
    }
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("; ")
        .to_lowercase()
}

/// Tag assigned to a recognized text span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    /// A taxonomy term matched by a compiled pattern.
    Taxonomy,
    /// A product name, candidate for alt-label lookup.
    Product,
    /// A (programming or natural) language.
    Language,
    /// A legal term.
    Law,
}

#[allow(clippy::should_implement_trait)]
impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Taxonomy => "TAXONOMY",
            EntityLabel::Product => "PRODUCT",
            EntityLabel::Language => "LANGUAGE",
            EntityLabel::Law => "LAW",
        }
    }

    pub fn from_str(s: &str) -> Option<EntityLabel> {
        match s {
            "TAXONOMY" | "ESCO" => Some(EntityLabel::Taxonomy),
            "PRODUCT" => Some(EntityLabel::Product),
            "LANGUAGE" => Some(EntityLabel::Language),
            "LAW" => Some(EntityLabel::Law),
            _ => None,
        }
    }
}

/// A typed text span produced by the entity recognizer.
///
/// `start` and `end` are character offsets into the recognized text. `id`
/// carries the taxonomy uri when the span was resolved at recognition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub label: EntityLabel,
    pub text: String,
    pub id: Option<String>,
}

/// A per-token constraint inside a literal sequence pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenConstraint {
    /// The token must match exactly, case included.
    Exact(String),
    /// The lowercased token must match the stored lowercase form.
    Lower(String),
}

impl TokenConstraint {
    /// Tests a surface token against this constraint.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            TokenConstraint::Exact(t) => token == t,
            TokenConstraint::Lower(t) => token.to_lowercase() == *t,
        }
    }
}

/// A matchable linguistic pattern compiled from a canonical label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    /// An ordered sequence of per-token constraints.
    LiteralSequence(Vec<TokenConstraint>),
    /// A structural pattern over a parsed sentence: an anchor lemma plus one
    /// modifier lemma reachable through the given dependency relation.
    DependencyTemplate {
        root_lemma: String,
        relation: String,
        child_lemma: String,
    },
}

/// Which recognition strategy produced a resolved skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillSource {
    /// Resolved through the vector index.
    Vector,
    /// Resolved through exact/alt-label pattern lookup.
    Pattern,
    /// Carried a taxonomy identifier at recognition time.
    Ner,
}

impl SkillSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillSource::Ner => "ner",
            SkillSource::Pattern => "pattern",
            SkillSource::Vector => "vector",
        }
    }
}

/// A skill resolved from input text, with provenance and occurrence count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSkill {
    pub uri: String,
    pub label: String,
    pub count: u32,
    pub source: SkillSource,
    /// Similarity score, present for vector-sourced matches only.
    pub score: Option<f32>,
}

/// A deduplicated entity with its occurrence count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountedEntity {
    pub label: EntityLabel,
    pub count: u32,
    pub id: Option<String>,
    pub text: String,
}
