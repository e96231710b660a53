use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use tracing::info;

use super::ancestors::{broader_map, walk_broader, Ancestor};
use crate::errors::{Result, SkillGraphError};
use crate::types::{from_curie, Occupation, Skill};

/// Immutable in-memory table of aggregated skill records, keyed by uri.
///
/// Records never change after construction; the broader map used for
/// ancestor walks is built once up front.
pub struct TaxonomyTable {
    skills: IndexMap<String, Skill>,
    broader: HashMap<String, Vec<String>>,
}

impl TaxonomyTable {
    /// Builds a table from aggregated records.
    ///
    /// Uri uniqueness is an aggregation invariant; a duplicate here means
    /// the input was not aggregated and is rejected.
    pub fn from_skills(records: Vec<Skill>) -> Result<Self> {
        let mut skills: IndexMap<String, Skill> = IndexMap::with_capacity(records.len());
        for skill in records {
            if skills.insert(skill.uri.clone(), skill.clone()).is_some() {
                return Err(SkillGraphError::invalid_input(format!(
                    "duplicate uri in table input: {}",
                    skill.uri
                )));
            }
        }
        let broader = broader_map(
            skills
                .values()
                .map(|s| (s.uri.as_str(), s.narrowers.as_slice())),
        );
        Ok(Self { skills, broader })
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Looks up a record by full uri or CURIE. Returns `None` for unknown
    /// uris and for unparseable CURIEs.
    pub fn get(&self, uri_or_curie: &str) -> Option<&Skill> {
        let uri = from_curie(uri_or_curie).ok()?;
        self.skills.get(&uri)
    }

    /// Looks up the canonical label for a uri or CURIE.
    pub fn get_label(&self, uri_or_curie: &str) -> Option<&str> {
        self.get(uri_or_curie).map(|s| s.label.as_str())
    }

    /// Like `get`, but an unknown uri is a typed `NotFound` error.
    ///
    /// Meant for the outer request boundary, which maps it to a 404.
    pub fn require(&self, uri_or_curie: &str) -> Result<&Skill> {
        self.get(uri_or_curie)
            .ok_or_else(|| SkillGraphError::NotFound {
                uri: uri_or_curie.to_string(),
            })
    }

    /// Resolves a uri prefix to a single record.
    ///
    /// No match is `NotFound`; more than one match is `Ambiguous` with the
    /// candidate uris attached (the request boundary maps this to a 400).
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&Skill> {
        let full = from_curie(prefix).unwrap_or_else(|_| prefix.to_string());
        let mut matches: Vec<&Skill> = self
            .skills
            .values()
            .filter(|s| s.uri.starts_with(&full))
            .collect();
        match matches.len() {
            0 => Err(SkillGraphError::NotFound {
                uri: prefix.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(SkillGraphError::Ambiguous {
                prefix: prefix.to_string(),
                candidates: matches.iter().map(|s| s.uri.clone()).collect(),
            }),
        }
    }

    /// Finds skills whose label set intersects the given product labels.
    ///
    /// Input labels are lowercased; the test is a plain per-record set
    /// intersection against `all_label`.
    pub fn search_products(&self, products: &HashSet<String>) -> Vec<&Skill> {
        let products: HashSet<String> = products.iter().map(|p| p.to_lowercase()).collect();
        self.skills
            .values()
            .filter(|s| !s.all_label.is_disjoint(&products))
            .collect()
    }

    /// Lists records, optionally filtered by a case-insensitive substring of
    /// any label, truncated to `limit`.
    pub fn list(&self, limit: usize, q: Option<&str>) -> Vec<&Skill> {
        let needle = q.map(|q| q.to_lowercase());
        self.skills
            .values()
            .filter(|s| match &needle {
                Some(n) => s.all_label.iter().any(|l| l.contains(n.as_str())),
                None => true,
            })
            .take(limit)
            .collect()
    }

    /// Returns the strict transitive ancestors of a record: every record
    /// reachable by one or more broader hops, excluding the record itself.
    ///
    /// Terminates on cyclic input; ancestors without a record in the table
    /// are skipped (no label to report).
    pub fn ancestors(&self, uri_or_curie: &str) -> Vec<Ancestor> {
        let uri = match from_curie(uri_or_curie) {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        };
        walk_broader(&self.broader, &uri)
            .into_iter()
            .filter_map(|ancestor_uri| {
                self.skills.get(&ancestor_uri).map(|s| Ancestor {
                    uri: ancestor_uri,
                    label: s.label.clone(),
                })
            })
            .collect()
    }

    /// Writes the table as gzip-compressed JSON records.
    pub fn save(&self, path: &Path) -> Result<()> {
        let records: Vec<&Skill> = self.skills.values().collect();
        save_records(path, &records)
    }

    /// Loads a table from gzip-compressed JSON records.
    ///
    /// `all_label` and `text` are derived after load, never read from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let mut records: Vec<Skill> = load_records(path)?;
        for record in &mut records {
            record.derive_fields();
        }
        info!(count = records.len(), path = %path.display(), "loaded skills table");
        Self::from_skills(records)
    }
}

/// Writes serializable records to a gzip JSON file.
pub fn save_records<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, records)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Reads records from a gzip JSON file.
pub fn load_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    Ok(serde_json::from_reader(decoder)?)
}

/// Loads occupation records, deriving label sets after load.
pub fn load_occupations(path: &Path) -> Result<Vec<Occupation>> {
    let mut records: Vec<Occupation> = load_records(path)?;
    for record in &mut records {
        record.derive_fields();
    }
    info!(count = records.len(), path = %path.display(), "loaded occupations table");
    Ok(records)
}
