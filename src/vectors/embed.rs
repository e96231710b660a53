use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::{Result, SkillGraphError};
use crate::nlp::tokenize;

/// Embedding function, consumed as a black box.
pub trait Embedder {
    /// Embeds a batch of texts, one vector per input, all the same length.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Name of the underlying model, used to pick tuned search defaults.
    fn model_name(&self) -> &str;
}

/// Search defaults tuned per embedding model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchDefaults {
    pub k: usize,
    pub score_threshold: f32,
}

/// Returns the tuned `k` / score-threshold defaults for a model, falling
/// back to conservative values for unknown models.
pub fn model_defaults(model: &str) -> SearchDefaults {
    match model {
        "all-MiniLM-L12-v2" => SearchDefaults {
            k: 10,
            score_threshold: 0.3,
        },
        "paraphrase-albert-small-v2" => SearchDefaults {
            k: 10,
            score_threshold: 0.25,
        },
        _ => SearchDefaults {
            k: 10,
            score_threshold: 0.25,
        },
    }
}

/// Embedder served over HTTP.
///
/// Contract: `POST {url}` with body `{"model": "...", "input": ["..."]}`
/// returns `{"embeddings": [[f32, ...], ...]}`, one vector per input in
/// order (the Ollama embed API shape).
pub struct HttpEmbedder {
    url: String,
    model: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            agent: ureq::Agent::new(),
        }
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response: EmbedResponse = self
            .agent
            .post(&self.url)
            .send_json(serde_json::json!({ "model": self.model, "input": texts }))
            .map_err(|e| SkillGraphError::Http {
                message: e.to_string(),
                url: self.url.clone(),
            })?
            .into_json()?;
        if response.embeddings.len() != texts.len() {
            return Err(SkillGraphError::Http {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.embeddings.len()
                ),
                url: self.url.clone(),
            });
        }
        Ok(response.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic token-hash embedder.
///
/// Each token hashes to a dimension of a bag-of-words vector, which is then
/// L2-normalized. Texts sharing tokens get a positive cosine similarity, so
/// exact-term semantic lookups behave sensibly without a model server.
/// Used for tests and air-gapped deployments; not a substitute for a real
/// embedding model.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let mut v = vec![0.0f32; self.dimension];
            for token in tokenize(&text.to_lowercase()) {
                let digest = Sha256::digest(token.text.as_bytes());
                let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap_or_default());
                v[(bucket % self.dimension as u64) as usize] += 1.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            vectors.push(v);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "token-hash"
    }
}
