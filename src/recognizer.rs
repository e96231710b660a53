//! Entity recognition: a statistical sequence model layered with the
//! compiled rule patterns and the structural dependency matcher.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, SkillGraphError};
use crate::nlp::{split_sentences, DependencyParser, SequenceModel};
use crate::patterns::{DependencyMatcher, LiteralMatcher, PatternSet};
use crate::types::{Entity, EntityLabel};

/// Character offset below which recognized spans are suppressed. The head of
/// a CV usually holds personally-identifying data, a reliable source of
/// false positives.
pub const DEFAULT_PRIVACY_OFFSET: usize = 100;

/// Filtering configuration for the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Labels retained in the output.
    pub allowed_labels: Vec<EntityLabel>,
    /// Spans starting before this character offset are dropped.
    pub privacy_offset: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            allowed_labels: vec![
                EntityLabel::Taxonomy,
                EntityLabel::Product,
                EntityLabel::Language,
                EntityLabel::Law,
            ],
            privacy_offset: DEFAULT_PRIVACY_OFFSET,
        }
    }
}

/// Output of one recognition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Filtered, offset-ordered entities.
    pub entities: Vec<Entity>,
    /// Unfiltered total detected by the statistical-plus-rule pass, kept for
    /// diagnostics.
    pub count: usize,
}

/// Recognizes taxonomy mentions in free text.
///
/// Three passes: the statistical model, the literal rule patterns (which win
/// over statistical spans at their exact range), and the dependency matcher,
/// which runs per parsed sentence and ignores span claims entirely.
pub struct EntityRecognizer {
    model: Box<dyn SequenceModel>,
    ruler: LiteralMatcher,
    dependency: DependencyMatcher,
    parser: Option<Box<dyn DependencyParser>>,
    config: RecognizerConfig,
}

impl EntityRecognizer {
    pub fn new(
        model: Box<dyn SequenceModel>,
        patterns: &PatternSet,
        parser: Option<Box<dyn DependencyParser>>,
        config: RecognizerConfig,
    ) -> Self {
        Self {
            model,
            ruler: LiteralMatcher::from_set(patterns),
            dependency: DependencyMatcher::from_set(patterns),
            parser,
            config,
        }
    }

    /// Recognizes entities in `text`.
    ///
    /// Missing or blank input is a caller contract violation, not an empty
    /// result.
    pub fn recognize(&self, text: &str) -> Result<Recognition> {
        if text.trim().is_empty() {
            return Err(SkillGraphError::invalid_input(
                "text must not be empty".to_string(),
            ));
        }

        let rule_entities = self.ruler.find_matches(text);
        let statistical = self.model.predict(text)?;

        // Rule matches take precedence at their span; statistical spans that
        // overlap a rule span are dropped.
        let mut merged = rule_entities;
        for entity in statistical {
            let overlaps = merged
                .iter()
                .any(|r| entity.start < r.end && r.start < entity.end);
            if !overlaps {
                merged.push(entity);
            }
        }
        let count = merged.len();

        merged.extend(self.dependency_pass(text)?);
        merged.sort_by_key(|e| (e.start, e.end));
        merged.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.id == b.id);

        let entities: Vec<Entity> = merged
            .into_iter()
            .filter(|e| {
                self.config.allowed_labels.contains(&e.label)
                    && e.start >= self.config.privacy_offset
            })
            .collect();

        debug!(count, kept = entities.len(), "recognition finished");
        Ok(Recognition { entities, count })
    }

    /// Runs the dependency matcher over every parsed sentence, mapping
    /// sentence-local offsets back onto the document.
    fn dependency_pass(&self, text: &str) -> Result<Vec<Entity>> {
        let Some(parser) = &self.parser else {
            return Ok(Vec::new());
        };
        if self.dependency.is_empty() {
            return Ok(Vec::new());
        }

        let mut entities = Vec::new();
        for sentence in split_sentences(text) {
            let parsed = parser.parse(&sentence.text)?;
            for m in self.dependency.find_matches(&parsed) {
                entities.push(Entity {
                    start: sentence.start + m.start,
                    end: sentence.start + m.end,
                    label: EntityLabel::Taxonomy,
                    text: m.text,
                    id: Some(m.uri),
                });
            }
        }
        Ok(entities)
    }
}
