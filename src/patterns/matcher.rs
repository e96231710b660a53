use crate::nlp::{tokenize, ParsedSentence};
use crate::types::{Entity, EntityLabel, Pattern, TokenConstraint};

use super::compiler::PatternSet;

/// Matches literal-sequence patterns against tokenized text, the rule layer
/// of the recognizer.
pub struct LiteralMatcher {
    entries: Vec<(String, Vec<TokenConstraint>)>,
}

impl LiteralMatcher {
    pub fn from_set(set: &PatternSet) -> Self {
        Self {
            entries: set.literal_entries(),
        }
    }

    /// Scans the text and returns one entity per matched span.
    ///
    /// The scan claims spans left to right; at each start position the
    /// longest matching pattern wins and the scan resumes after it, so
    /// matched spans never overlap.
    pub fn find_matches(&self, text: &str) -> Vec<Entity> {
        let tokens = tokenize(text);
        let chars: Vec<char> = text.chars().collect();
        let mut entities = Vec::new();
        let mut i = 0usize;

        while i < tokens.len() {
            let mut best: Option<(usize, &str)> = None;
            for (uri, constraints) in &self.entries {
                let len = constraints.len();
                if len == 0 || i + len > tokens.len() {
                    continue;
                }
                let matched = constraints
                    .iter()
                    .zip(&tokens[i..i + len])
                    .all(|(c, t)| c.matches(&t.text));
                if matched && best.map_or(true, |(l, _)| len > l) {
                    best = Some((len, uri));
                }
            }

            if let Some((len, uri)) = best {
                let start = tokens[i].start;
                let end = tokens[i + len - 1].end;
                entities.push(Entity {
                    start,
                    end,
                    label: EntityLabel::Taxonomy,
                    text: chars[start..end].iter().collect(),
                    id: Some(uri.to_string()),
                });
                i += len;
            } else {
                i += 1;
            }
        }
        entities
    }
}

/// A dependency-template match within one parsed sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyMatch {
    pub uri: String,
    /// Character offsets within the parsed sentence.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Matches dependency templates over parsed sentences.
///
/// Works on the sentence's syntactic graph, so it is independent of span
/// boundaries already claimed by other recognition passes.
pub struct DependencyMatcher {
    entries: Vec<(String, Pattern)>,
}

impl DependencyMatcher {
    pub fn from_set(set: &PatternSet) -> Self {
        Self {
            entries: set.dependency_entries(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns one match per template whose anchor lemma appears in the
    /// sentence with the modifier lemma reachable through the bound relation.
    pub fn find_matches(&self, sent: &ParsedSentence) -> Vec<DependencyMatch> {
        let mut matches = Vec::new();
        for (uri, pattern) in &self.entries {
            let Pattern::DependencyTemplate {
                root_lemma,
                relation,
                child_lemma,
            } = pattern
            else {
                continue;
            };
            for (anchor, token) in sent.tokens.iter().enumerate() {
                if token.lemma != *root_lemma {
                    continue;
                }
                if let Some(modifier) = reachable_by(sent, anchor, relation, child_lemma) {
                    let (a, b) = (&sent.tokens[anchor], &sent.tokens[modifier]);
                    let start = a.start.min(b.start);
                    let end = a.end.max(b.end);
                    matches.push(DependencyMatch {
                        uri: uri.clone(),
                        start,
                        end,
                        text: format!("{} {}", root_lemma, child_lemma),
                    });
                    break;
                }
            }
        }
        matches
    }
}

/// Depth-first search for a descendant with the wanted lemma, following only
/// edges of the bound dependency relation (transitively, like a `>>`
/// operator restricted to one relation).
fn reachable_by(
    sent: &ParsedSentence,
    from: usize,
    relation: &str,
    lemma: &str,
) -> Option<usize> {
    let mut stack: Vec<usize> = sent
        .children(from)
        .into_iter()
        .filter(|&c| sent.tokens[c].dep == relation)
        .collect();
    let mut visited = vec![false; sent.tokens.len()];

    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        if sent.tokens[idx].lemma == lemma {
            return Some(idx);
        }
        stack.extend(
            sent.children(idx)
                .into_iter()
                .filter(|&c| sent.tokens[c].dep == relation),
        );
    }
    None
}
