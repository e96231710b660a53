use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{Result, SkillGraphError};
use crate::taxonomy::TaxonomyTable;
use crate::types::Skill;

use super::embed::{model_defaults, Embedder, SearchDefaults};
use super::remote::{RemoteCollection, RemotePoint};

/// Where the index lives: a local on-disk path or a remote store URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexLocation {
    Path(PathBuf),
    Url(String),
}

impl IndexLocation {
    fn describe(&self) -> String {
        match self {
            IndexLocation::Path(p) => p.display().to_string(),
            IndexLocation::Url(u) => u.clone(),
        }
    }
}

/// Index location plus collection name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub location: IndexLocation,
    pub collection: String,
}

/// A ranked semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub uri: String,
    pub label: String,
    pub score: f32,
}

/// A stored point as returned by `scroll`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPoint {
    pub uri: String,
    pub label: String,
    pub text: String,
}

const LOCAL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS points (
    uri        TEXT PRIMARY KEY,
    label      TEXT NOT NULL,
    text       TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    model      TEXT NOT NULL,
    created_at INTEGER NOT NULL
);";

enum Backend {
    Local(Connection),
    Remote(RemoteCollection),
}

/// Approximate-nearest-neighbor index over taxonomy `text` fields.
///
/// A derived, rebuildable projection of the taxonomy table: it must never
/// diverge from it in cardinality (`validate`). Rebuild is exclusive --
/// `build` constructs a fresh index value, while searches borrow immutably.
pub struct VectorIndex {
    backend: Backend,
    config: VectorIndexConfig,
    embedder: Box<dyn Embedder>,
    defaults: SearchDefaults,
    read_only: bool,
}

impl VectorIndex {
    /// Opens an existing index.
    ///
    /// Missing persisted state is a fatal `IndexNotFound`, never an empty
    /// index.
    pub fn open(config: VectorIndexConfig, embedder: Box<dyn Embedder>) -> Result<Self> {
        let defaults = model_defaults(embedder.model_name());
        let backend = match &config.location {
            IndexLocation::Path(dir) => {
                let db_path = local_db_path(dir, &config.collection);
                if !db_path.exists() {
                    return Err(SkillGraphError::IndexNotFound {
                        location: config.location.describe(),
                    });
                }
                Backend::Local(open_local(&db_path)?)
            }
            IndexLocation::Url(url) => {
                let remote = RemoteCollection::new(url.clone(), config.collection.clone());
                if !remote.exists()? {
                    return Err(SkillGraphError::IndexNotFound {
                        location: config.location.describe(),
                    });
                }
                Backend::Remote(remote)
            }
        };
        Ok(Self {
            backend,
            config,
            embedder,
            defaults,
            read_only: false,
        })
    }

    /// Builds the index over the given records.
    ///
    /// With `force_recreate` every record is re-embedded and bulk-loaded,
    /// replacing prior contents. Without it, existing persisted state is
    /// opened as-is, and missing state is `IndexNotFound`.
    pub fn build(
        config: VectorIndexConfig,
        embedder: Box<dyn Embedder>,
        records: &[Skill],
        force_recreate: bool,
    ) -> Result<Self> {
        if !force_recreate {
            return Self::open(config, embedder);
        }

        let texts: Vec<String> = records.iter().map(|s| s.text.clone()).collect();
        let vectors = embedder.embed(&texts)?;
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        let defaults = model_defaults(embedder.model_name());

        let backend = match &config.location {
            IndexLocation::Path(dir) => {
                let db_path = local_db_path(dir, &config.collection);
                if db_path.exists() {
                    std::fs::remove_file(&db_path)?;
                }
                let conn = open_local(&db_path)?;
                insert_local(&conn, embedder.model_name(), records, &vectors)?;
                Backend::Local(conn)
            }
            IndexLocation::Url(url) => {
                let remote = RemoteCollection::new(url.clone(), config.collection.clone());
                remote.recreate(dimension)?;
                let points: Vec<RemotePoint> = records
                    .iter()
                    .zip(&vectors)
                    .map(|(s, v)| RemotePoint {
                        uri: s.uri.clone(),
                        label: s.label.clone(),
                        text: s.text.clone(),
                        vector: v.clone(),
                    })
                    .collect();
                remote.upsert(&points)?;
                Backend::Remote(remote)
            }
        };
        info!(
            count = records.len(),
            collection = %config.collection,
            "rebuilt vector index"
        );
        Ok(Self {
            backend,
            config,
            embedder,
            defaults,
            read_only: false,
        })
    }

    /// Marks the index read-only: insertions become logged no-ops,
    /// protecting a shared index from accidental mutation by consumers that
    /// only search.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Inserts or replaces a single record.
    pub fn insert(&mut self, skill: &Skill) -> Result<()> {
        if self.read_only {
            warn!(uri = %skill.uri, "insert ignored on read-only index");
            return Ok(());
        }
        let vectors = self.embedder.embed(std::slice::from_ref(&skill.text))?;
        match &self.backend {
            Backend::Local(conn) => insert_local(
                conn,
                self.embedder.model_name(),
                std::slice::from_ref(skill),
                &vectors,
            ),
            Backend::Remote(remote) => remote.upsert(&[RemotePoint {
                uri: skill.uri.clone(),
                label: skill.label.clone(),
                text: skill.text.clone(),
                vector: vectors.into_iter().next().unwrap_or_default(),
            }]),
        }
    }

    /// Similarity search, ranked by score, truncated to `k` and filtered by
    /// the minimum score. `None` arguments use the model-tuned defaults.
    pub fn search(
        &self,
        text: &str,
        k: Option<usize>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        let k = k.unwrap_or(self.defaults.k);
        let threshold = score_threshold.unwrap_or(self.defaults.score_threshold);
        let query = self
            .embedder
            .embed(std::slice::from_ref(&text.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();

        match &self.backend {
            Backend::Local(conn) => {
                let mut hits = local_brute_force(conn, &query)?;
                hits.retain(|h| h.score >= threshold);
                hits.truncate(k);
                Ok(hits)
            }
            Backend::Remote(remote) => remote.search(&query, k, threshold),
        }
    }

    /// Pages through stored points.
    pub fn scroll(&self, limit: usize) -> Result<Vec<ScrollPoint>> {
        match &self.backend {
            Backend::Local(conn) => {
                let mut stmt =
                    conn.prepare("SELECT uri, label, text FROM points ORDER BY uri LIMIT ?1")?;
                let rows = stmt.query_map(params![limit as i64], |row| {
                    Ok(ScrollPoint {
                        uri: row.get(0)?,
                        label: row.get(1)?,
                        text: row.get(2)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
            }
            Backend::Remote(remote) => remote.scroll(limit),
        }
    }

    /// Number of stored points.
    pub fn count(&self) -> Result<usize> {
        match &self.backend {
            Backend::Local(conn) => {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM points", [], |r| r.get(0))?;
                Ok(count as usize)
            }
            Backend::Remote(remote) => remote.count(),
        }
    }

    /// Asserts the index has exactly one point per table record.
    ///
    /// A mismatch means the derived projection diverged from its source and
    /// is fatal, never silently tolerated.
    pub fn validate(&self, table: &TaxonomyTable) -> Result<()> {
        let index_count = self.count()?;
        let table_count = table.len();
        if index_count != table_count {
            return Err(SkillGraphError::IndexConsistency {
                table_count,
                index_count,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &VectorIndexConfig {
        &self.config
    }

    /// Releases the index storage deterministically.
    pub fn close(self) -> Result<()> {
        match self.backend {
            Backend::Local(conn) => conn.close().map_err(|(_, e)| e.into()),
            // Remote connections are per-request; nothing to release.
            Backend::Remote(_) => Ok(()),
        }
    }
}

fn local_db_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.db"))
}

fn open_local(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
    )?;
    conn.execute_batch(LOCAL_SCHEMA)?;
    Ok(conn)
}

fn insert_local(
    conn: &Connection,
    model: &str,
    records: &[Skill],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    for (skill, vector) in records.iter().zip(vectors) {
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        conn.execute(
            "INSERT OR REPLACE INTO points (uri, label, text, embedding, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![skill.uri, skill.label, skill.text, bytes, model, now],
        )?;
    }
    Ok(())
}

/// Brute-force cosine ranking across all stored vectors, descending.
fn local_brute_force(conn: &Connection, query: &[f32]) -> Result<Vec<VectorHit>> {
    let mut stmt = conn.prepare("SELECT uri, label, embedding FROM points")?;
    let rows = stmt.query_map([], |row| {
        let uri: String = row.get(0)?;
        let label: String = row.get(1)?;
        let bytes: Vec<u8> = row.get(2)?;
        Ok((uri, label, bytes))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (uri, label, bytes) = row?;
        let embedding = bytes_to_f32s(&bytes);
        hits.push(VectorHit {
            uri,
            label,
            score: cosine_similarity(query, &embedding),
        });
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(hits)
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Convert a byte slice to a vector of f32 values (little-endian).
fn bytes_to_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = [chunk[0], chunk[1], chunk[2], chunk[3]];
            f32::from_le_bytes(arr)
        })
        .collect()
}
