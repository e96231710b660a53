//! The CV pipeline: segments text, recognizes entities, counts and
//! cross-references them, and fuses the three recognition strategies into
//! one deduplicated, provenance-tagged skill set.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::nlp::split_sentences;
use crate::recognizer::EntityRecognizer;
use crate::taxonomy::TaxonomyTable;
use crate::types::{CountedEntity, Entity, ResolvedSkill, SkillSource};
use crate::vectors::VectorIndex;

/// Entities recognized within one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceSkills {
    pub sentence: String,
    pub entities: Vec<Entity>,
}

/// Deduplicates entities, keyed by taxonomy identifier when present and by
/// lowercased surface text otherwise, counting occurrences.
pub fn count_entities(entities: &[Entity]) -> IndexMap<String, CountedEntity> {
    let mut counted: IndexMap<String, CountedEntity> = IndexMap::new();
    for entity in entities {
        let key = entity
            .id
            .clone()
            .unwrap_or_else(|| entity.text.to_lowercase());
        counted
            .entry(key)
            .and_modify(|c| c.count += 1)
            .or_insert_with(|| CountedEntity {
                label: entity.label,
                count: 1,
                id: entity.id.clone(),
                text: entity.text.to_lowercase(),
            });
    }
    counted
}

/// Resolves free text into taxonomy skills.
///
/// Built by explicit dependency injection: a recognizer, the aggregated
/// taxonomy table and an optional vector index for semantic fallback. No
/// process-wide state.
pub struct SkillResolver<'a> {
    recognizer: &'a EntityRecognizer,
    table: &'a TaxonomyTable,
    vector_index: Option<&'a VectorIndex>,
}

impl<'a> SkillResolver<'a> {
    pub fn new(
        recognizer: &'a EntityRecognizer,
        table: &'a TaxonomyTable,
        vector_index: Option<&'a VectorIndex>,
    ) -> Self {
        Self {
            recognizer,
            table,
            vector_index,
        }
    }

    /// Resolves `text` into a deduplicated skill set.
    ///
    /// Per counted entity, strategies are tried in order: a taxonomy
    /// identifier carried from recognition resolves directly; otherwise the
    /// surface form goes through exact/alt-label lookup; otherwise the
    /// vector index (when present) supplies its best hit above threshold.
    ///
    /// Fusion is deterministic: when one uri arrives from several
    /// strategies, precedence is `ner` over `pattern` over `vector`, and
    /// within the same strategy the higher count wins. Full ties keep the
    /// first-seen entry, so output order follows input order.
    pub fn resolve(&self, text: &str) -> Result<Vec<ResolvedSkill>> {
        let recognition = self.recognizer.recognize(text)?;
        let counted = count_entities(&recognition.entities);
        let mut fused: IndexMap<String, ResolvedSkill> = IndexMap::new();

        for entry in counted.values() {
            for candidate in self.resolve_entity(entry)? {
                merge_resolved(&mut fused, candidate);
            }
        }

        debug!(
            entities = recognition.count,
            skills = fused.len(),
            "resolved skill set"
        );
        Ok(fused.into_values().collect())
    }

    fn resolve_entity(&self, entry: &CountedEntity) -> Result<Vec<ResolvedSkill>> {
        if let Some(id) = &entry.id {
            return match self.table.get(id) {
                Some(skill) => Ok(vec![ResolvedSkill {
                    uri: skill.uri.clone(),
                    label: skill.label.clone(),
                    count: entry.count,
                    source: SkillSource::Ner,
                    score: None,
                }]),
                None => {
                    warn!(uri = %id, "recognized identifier missing from table");
                    Ok(Vec::new())
                }
            };
        }

        let labels: HashSet<String> = std::iter::once(entry.text.clone()).collect();
        let hits = self.table.search_products(&labels);
        if !hits.is_empty() {
            return Ok(hits
                .into_iter()
                .map(|skill| ResolvedSkill {
                    uri: skill.uri.clone(),
                    label: skill.label.clone(),
                    count: entry.count,
                    source: SkillSource::Pattern,
                    score: None,
                })
                .collect());
        }

        if let Some(index) = self.vector_index {
            // Best hit only: flooding the result set with weak semantic
            // neighbors buries the exact matches.
            if let Some(hit) = index.search(&entry.text, None, None)?.into_iter().next() {
                return Ok(vec![ResolvedSkill {
                    uri: hit.uri,
                    label: hit.label,
                    count: entry.count,
                    source: SkillSource::Vector,
                    score: Some(hit.score),
                }]);
            }
        }
        Ok(Vec::new())
    }

    /// Recognizes entities per sentence, for inspection and debugging.
    pub fn skills_by_sentence(&self, text: &str) -> Result<Vec<SentenceSkills>> {
        let recognition = self.recognizer.recognize(text)?;
        let sentences = split_sentences(text);
        let mut result: Vec<SentenceSkills> = sentences
            .iter()
            .map(|s| SentenceSkills {
                sentence: s.text.clone(),
                entities: Vec::new(),
            })
            .collect();

        for entity in recognition.entities {
            if let Some(pos) = sentences
                .iter()
                .position(|s| entity.start >= s.start && entity.start < s.end)
            {
                result[pos].entities.push(entity);
            }
        }
        result.retain(|s| !s.entities.is_empty());
        Ok(result)
    }

    /// Returns the union of the strict transitive ancestors of the given
    /// uris, aggregated by identifier with the first-seen label.
    pub fn expand_ancestors(&self, uris: &[String]) -> IndexMap<String, String> {
        let mut expanded: IndexMap<String, String> = IndexMap::new();
        for uri in uris {
            for ancestor in self.table.ancestors(uri) {
                expanded.entry(ancestor.uri).or_insert(ancestor.label);
            }
        }
        expanded
    }
}

/// Precedence rank of a strategy; higher wins on a same-uri collision.
fn source_rank(source: SkillSource) -> u8 {
    match source {
        SkillSource::Ner => 2,
        SkillSource::Pattern => 1,
        SkillSource::Vector => 0,
    }
}

fn merge_resolved(fused: &mut IndexMap<String, ResolvedSkill>, candidate: ResolvedSkill) {
    match fused.get_mut(&candidate.uri) {
        None => {
            fused.insert(candidate.uri.clone(), candidate);
        }
        Some(existing) => {
            let replace = source_rank(candidate.source) > source_rank(existing.source)
                || (candidate.source == existing.source && candidate.count > existing.count);
            if replace {
                *existing = candidate;
            }
        }
    }
}
