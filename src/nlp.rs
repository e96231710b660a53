use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, SkillGraphError};
use crate::types::{Entity, EntityLabel};

/// A surface token with character offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Characters treated as part of a word besides alphanumerics.
///
/// Keeps technology names like `C++`, `C#` and `state-of-the-art` as single
/// tokens, matching how labels are split at pattern compilation time.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '+' | '#' | '_' | '-')
}

/// Splits text into tokens, preserving character offsets.
///
/// A token is a maximal run of word characters; punctuation and whitespace
/// are skipped.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut token_start = 0usize;

    for (i, c) in text.chars().enumerate() {
        if is_word_char(c) {
            if current.is_empty() {
                token_start = i;
            }
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(&mut current),
                start: token_start,
                end: i,
            });
        }
    }
    if !current.is_empty() {
        let end = token_start + current.chars().count();
        tokens.push(Token {
            text: current,
            start: token_start,
            end,
        });
    }
    tokens
}

/// A sentence with character offsets into the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits a document into sentences.
///
/// Rule-based segmentation: a sentence ends at `.`, `!`, `?` followed by
/// whitespace, or at a blank line. Offsets are character offsets.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    let mut push = |start: usize, end: usize, sentences: &mut Vec<Sentence>| {
        let raw: String = chars[start..end].iter().collect();
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let lead = raw.chars().take_while(|c| c.is_whitespace()).count();
            sentences.push(Sentence {
                text: trimmed.to_string(),
                start: start + lead,
                end: start + lead + trimmed.chars().count(),
            });
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let terminator = matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).map_or(true, |n| n.is_whitespace());
        let blank_line = c == '\n' && chars.get(i + 1) == Some(&'\n');
        if terminator || blank_line {
            push(start, i + 1, &mut sentences);
            start = i + 1;
        }
        i += 1;
    }
    push(start, chars.len(), &mut sentences);
    sentences
}

/// A token annotated with lemma, part of speech and a dependency edge to its
/// head. The root token points at itself with dep `"ROOT"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedToken {
    pub text: String,
    pub lemma: String,
    pub pos: String,
    pub dep: String,
    /// Index of the head token within the sentence.
    pub head: usize,
    /// Character offsets within the parsed text.
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// A dependency-parsed sentence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSentence {
    pub tokens: Vec<ParsedToken>,
}

impl ParsedSentence {
    /// Returns the index of the root token, if the parse has one.
    pub fn root(&self) -> Option<usize> {
        self.tokens.iter().position(|t| t.dep == "ROOT")
    }

    /// Returns the indices of the direct children of the token at `idx`.
    pub fn children(&self, idx: usize) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(i, t)| t.head == idx && *i != idx)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Syntactic dependency parser, consumed as a black box.
///
/// The parser must return one `ParsedToken` per token with head indices
/// forming a tree rooted at a token whose dep is `"ROOT"`.
pub trait DependencyParser {
    fn parse(&self, text: &str) -> Result<ParsedSentence>;
}

/// Statistical sequence-labeling model, consumed as a black box.
///
/// `predict` returns raw entity spans with character offsets into `text`.
/// Filtering (allowed labels, privacy offset) is the recognizer's job.
pub trait SequenceModel {
    fn predict(&self, text: &str) -> Result<Vec<Entity>>;
}

fn http_error(url: &str, e: ureq::Error) -> SkillGraphError {
    SkillGraphError::Http {
        message: e.to_string(),
        url: url.to_string(),
    }
}

/// Sequence model served over HTTP.
///
/// Contract: `POST {url}` with body `{"text": "..."}` returns
/// `{"entities": [{"start": n, "end": n, "label": "PRODUCT", "text": "..."}]}`.
/// Spans with labels outside the known set are dropped with a debug log.
pub struct HttpSequenceModel {
    url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct WireEntity {
    start: usize,
    end: usize,
    label: String,
    text: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    entities: Vec<WireEntity>,
}

impl HttpSequenceModel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            agent: ureq::Agent::new(),
        }
    }
}

impl SequenceModel for HttpSequenceModel {
    fn predict(&self, text: &str) -> Result<Vec<Entity>> {
        let response: PredictResponse = self
            .agent
            .post(&self.url)
            .send_json(serde_json::json!({ "text": text }))
            .map_err(|e| http_error(&self.url, e))?
            .into_json()?;

        let mut entities = Vec::new();
        for e in response.entities {
            match EntityLabel::from_str(&e.label) {
                Some(label) => entities.push(Entity {
                    start: e.start,
                    end: e.end,
                    label,
                    text: e.text,
                    id: e.id,
                }),
                None => debug!(label = %e.label, text = %e.text, "dropping span with unknown label"),
            }
        }
        Ok(entities)
    }
}

/// Dependency parser served over HTTP.
///
/// Contract: `POST {url}` with body `{"text": "..."}` returns
/// `{"tokens": [{"text", "lemma", "pos", "dep", "head", "start", "end"}]}`.
pub struct HttpDependencyParser {
    url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ParseResponse {
    tokens: Vec<ParsedToken>,
}

impl HttpDependencyParser {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            agent: ureq::Agent::new(),
        }
    }
}

impl DependencyParser for HttpDependencyParser {
    fn parse(&self, text: &str) -> Result<ParsedSentence> {
        let response: ParseResponse = self
            .agent
            .post(&self.url)
            .send_json(serde_json::json!({ "text": text }))
            .map_err(|e| http_error(&self.url, e))?
            .into_json()?;
        Ok(ParsedSentence {
            tokens: response.tokens,
        })
    }
}

/// Deterministic sequence model that always returns a fixed set of spans.
///
/// With an empty span list this degrades the recognizer to pattern-only
/// recognition, which is the behavior when no model server is configured.
#[derive(Default)]
pub struct StaticSequenceModel {
    entities: Vec<Entity>,
}

impl StaticSequenceModel {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }
}

impl SequenceModel for StaticSequenceModel {
    fn predict(&self, _text: &str) -> Result<Vec<Entity>> {
        Ok(self.entities.clone())
    }
}

/// Deterministic parser backed by a fixed text→parse table.
///
/// Unknown texts parse to an empty sentence, which downstream consumers
/// treat as "no root found".
#[derive(Default)]
pub struct StaticDependencyParser {
    parses: std::collections::HashMap<String, ParsedSentence>,
}

impl StaticDependencyParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text: impl Into<String>, parse: ParsedSentence) {
        self.parses.insert(text.into(), parse);
    }
}

impl DependencyParser for StaticDependencyParser {
    fn parse(&self, text: &str) -> Result<ParsedSentence> {
        Ok(self.parses.get(text).cloned().unwrap_or_default())
    }
}
