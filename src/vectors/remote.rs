use serde_json::json;
use sha2::{Digest, Sha256};

use crate::errors::{Result, SkillGraphError};

use super::index::{ScrollPoint, VectorHit};

/// One remote point: uri, label, text and its embedding.
pub struct RemotePoint {
    pub uri: String,
    pub label: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A collection on a remote vector store speaking a Qdrant-style REST API.
///
/// Offers the same build/search/scroll/close surface as the local backend.
pub struct RemoteCollection {
    base_url: String,
    collection: String,
    agent: ureq::Agent,
}

impl RemoteCollection {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            agent: ureq::Agent::new(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    fn http_err(&self, url: &str, e: impl std::fmt::Display) -> SkillGraphError {
        SkillGraphError::Http {
            message: e.to_string(),
            url: url.to_string(),
        }
    }

    /// Whether the collection exists on the remote store.
    pub fn exists(&self) -> Result<bool> {
        let url = self.url("");
        match self.agent.get(&url).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(self.http_err(&url, e)),
        }
    }

    /// Drops and recreates the collection with the given vector dimension.
    pub fn recreate(&self, dimension: usize) -> Result<()> {
        let url = self.url("");
        // Deleting a missing collection is fine.
        let _ = self.agent.delete(&url).call();
        self.agent
            .put(&url)
            .send_json(json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            }))
            .map_err(|e| self.http_err(&url, e))?;
        Ok(())
    }

    /// Bulk-upserts points into the collection.
    pub fn upsert(&self, points: &[RemotePoint]) -> Result<()> {
        let url = self.url("/points");
        let body: Vec<_> = points
            .iter()
            .map(|p| {
                json!({
                    "id": point_id(&p.uri),
                    "vector": p.vector,
                    "payload": { "uri": p.uri, "label": p.label, "text": p.text },
                })
            })
            .collect();
        self.agent
            .put(&url)
            .query("wait", "true")
            .send_json(json!({ "points": body }))
            .map_err(|e| self.http_err(&url, e))?;
        Ok(())
    }

    /// Similarity search, ranked by the store, truncated to `k` and filtered
    /// by the score threshold remotely.
    pub fn search(&self, vector: &[f32], k: usize, score_threshold: f32) -> Result<Vec<VectorHit>> {
        let url = self.url("/points/search");
        let response: serde_json::Value = self
            .agent
            .post(&url)
            .send_json(json!({
                "vector": vector,
                "limit": k,
                "score_threshold": score_threshold,
                "with_payload": true,
            }))
            .map_err(|e| self.http_err(&url, e))?
            .into_json()?;

        let hits = response["result"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| {
                Some(VectorHit {
                    uri: hit["payload"]["uri"].as_str()?.to_string(),
                    label: hit["payload"]["label"].as_str()?.to_string(),
                    score: hit["score"].as_f64()? as f32,
                })
            })
            .collect();
        Ok(hits)
    }

    /// Pages through stored points for inspection.
    pub fn scroll(&self, limit: usize) -> Result<Vec<ScrollPoint>> {
        let url = self.url("/points/scroll");
        let response: serde_json::Value = self
            .agent
            .post(&url)
            .send_json(json!({ "limit": limit, "with_payload": true }))
            .map_err(|e| self.http_err(&url, e))?
            .into_json()?;

        let points = response["result"]["points"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                Some(ScrollPoint {
                    uri: p["payload"]["uri"].as_str()?.to_string(),
                    label: p["payload"]["label"].as_str()?.to_string(),
                    text: p["payload"]["text"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(points)
    }

    /// Exact point count.
    pub fn count(&self) -> Result<usize> {
        let url = self.url("/points/count");
        let response: serde_json::Value = self
            .agent
            .post(&url)
            .send_json(json!({ "exact": true }))
            .map_err(|e| self.http_err(&url, e))?
            .into_json()?;
        Ok(response["result"]["count"].as_u64().unwrap_or(0) as usize)
    }
}

/// Derives a store-acceptable point id from a uri.
///
/// Taxonomy uris end in a UUID, which is used directly; anything else is
/// hashed into a UUID-shaped hex string so ids stay deterministic.
fn point_id(uri: &str) -> String {
    let suffix = uri.rsplit('/').next().unwrap_or(uri);
    if is_uuid_shaped(suffix) {
        return suffix.to_string();
    }
    let h = hex::encode(Sha256::digest(uri.as_bytes()));
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

fn is_uuid_shaped(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(&parts)
            .all(|(len, p)| p.len() == *len && p.chars().all(|c| c.is_ascii_hexdigit()))
}
