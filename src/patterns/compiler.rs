use indexmap::IndexMap;
use tracing::warn;

use crate::nlp::{DependencyParser, ParsedSentence};
use crate::taxonomy::TaxonomyTable;
use crate::types::{Pattern, SkillType, TokenConstraint};

/// Compiled patterns for a taxonomy table: uri → ordered, deduplicated
/// pattern list, canonical label's pattern first.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: IndexMap<String, Vec<Pattern>>,
}

impl PatternSet {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, uri: &str) -> Option<&[Pattern]> {
        self.patterns.get(uri).map(|p| p.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Pattern])> {
        self.patterns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Literal-sequence patterns, flattened to (uri, constraints) pairs.
    pub fn literal_entries(&self) -> Vec<(String, Vec<TokenConstraint>)> {
        let mut entries = Vec::new();
        for (uri, patterns) in &self.patterns {
            for pattern in patterns {
                if let Pattern::LiteralSequence(constraints) = pattern {
                    entries.push((uri.clone(), constraints.clone()));
                }
            }
        }
        entries
    }

    /// Dependency-template patterns, flattened to (uri, template) pairs.
    pub fn dependency_entries(&self) -> Vec<(String, Pattern)> {
        let mut entries = Vec::new();
        for (uri, patterns) in &self.patterns {
            for pattern in patterns {
                if matches!(pattern, Pattern::DependencyTemplate { .. }) {
                    entries.push((uri.clone(), pattern.clone()));
                }
            }
        }
        entries
    }
}

/// Compiles one canonical label into a pattern, escalating by label shape:
///
/// - length ≤ 3 characters: exact-text single token, so short acronyms like
///   `"SQL"` are not case-folded into false positives;
/// - up to 3 whitespace tokens: ordered case-insensitive literal sequence;
/// - longer phrases: syntactic extraction through the parser, falling back
///   to the literal sequence when extraction does not produce exactly a
///   two-element compound chain. The fallback is logged, never an error.
pub fn compile_label(label: &str, parser: Option<&dyn DependencyParser>) -> Pattern {
    let label = label.trim();
    if label.chars().count() <= 3 {
        return Pattern::LiteralSequence(vec![TokenConstraint::Exact(label.to_string())]);
    }

    let words: Vec<&str> = label.split_whitespace().collect();
    let literal = Pattern::LiteralSequence(
        words
            .iter()
            .map(|w| TokenConstraint::Lower(w.to_lowercase()))
            .collect(),
    );
    if words.len() <= 3 {
        return literal;
    }

    if let Some(parser) = parser {
        if let Some(template) = extract_template(label, parser) {
            return template;
        }
        warn!(%label, "dependency extraction fell back to literal pattern");
    }
    literal
}

/// Attempts the syntactic extraction: root verb → prepositional object →
/// compound chain of exactly two lemmas.
fn extract_template(label: &str, parser: &dyn DependencyParser) -> Option<Pattern> {
    let (sent, root) = find_root(label, parser)?;
    let obj = find_obj(&sent, root)?;
    let compound = collect_compound(&sent, obj);
    if compound.len() != 2 {
        return None;
    }
    Some(Pattern::DependencyTemplate {
        root_lemma: compound[0].clone(),
        relation: "compound".to_string(),
        child_lemma: compound[1].clone(),
    })
}

/// Finds the structural root verb, retrying with an infinitive marker when
/// the bare phrase has no verb root (imperative labels often parse as nouns).
fn find_root(label: &str, parser: &dyn DependencyParser) -> Option<(ParsedSentence, usize)> {
    for prefix in ["", "to "] {
        let text = format!("{prefix}{label}");
        let sent = match parser.parse(&text) {
            Ok(s) => s,
            Err(e) => {
                warn!(%label, error = %e, "parser failed, treating as no root");
                return None;
            }
        };
        if let Some(root) = sent.root() {
            if sent.tokens[root].pos == "VERB" {
                return Some((sent, root));
            }
        }
    }
    None
}

/// From the root, follows prepositional links down to the primary object.
fn find_obj(sent: &ParsedSentence, token: usize) -> Option<usize> {
    for child in sent.children(token) {
        match sent.tokens[child].dep.as_str() {
            "prep" => return find_obj(sent, child),
            "dobj" | "pobj" | "nsubj" => return Some(child),
            _ => {}
        }
    }
    None
}

/// Collects the object's lemma plus its compound-modifier chain, up to two
/// levels deep.
fn collect_compound(sent: &ParsedSentence, token: usize) -> Vec<String> {
    let mut chain = vec![sent.tokens[token].lemma.clone()];
    let mut current = token;
    for _ in 0..2 {
        let Some(next) = sent
            .children(current)
            .into_iter()
            .find(|&c| sent.tokens[c].dep == "compound")
        else {
            break;
        };
        chain.push(sent.tokens[next].lemma.clone());
        current = next;
    }
    chain
}

/// Compiles patterns for every record of a table.
///
/// The canonical label compiles first, then one pattern per alternate label,
/// skipping exact duplicates. Knowledge-type records are plain vocabulary,
/// so they compile without the parser (literal patterns only); skill-type
/// phrases get the full extraction path.
pub fn compile_table(
    table: &TaxonomyTable,
    parser: Option<&dyn DependencyParser>,
) -> PatternSet {
    let mut set = PatternSet::default();
    for skill in table.iter() {
        let record_parser = match skill.skill_type {
            SkillType::Skill => parser,
            _ => None,
        };
        let mut patterns = vec![compile_label(&skill.label, record_parser)];
        for alt in &skill.alt_label {
            let candidate = compile_label(alt, record_parser);
            if !patterns.contains(&candidate) {
                patterns.push(candidate);
            }
        }
        set.patterns.insert(skill.uri.clone(), patterns);
    }
    set
}
