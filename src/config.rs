use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SkillGraphError};
use crate::recognizer::{RecognizerConfig, DEFAULT_PRIVACY_OFFSET};
use crate::sparql::{DEFAULT_OCCUPATION_CATEGORIES, DEFAULT_SKILL_CATEGORIES};
use crate::types::EntityLabel;

/// Name of the configuration file stored inside the data directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store skillgraph data.
pub const SKILLGRAPH_DIR: &str = ".skillgraph";

/// Configuration for a skillgraph deployment.
///
/// Controls the graph endpoint, the black-box model endpoints, the table
/// and index locations, and recognition filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGraphConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// SPARQL-like endpoint serving the taxonomy graph.
    pub sparql_url: String,
    /// Language filter applied to multi-lingual literal fields.
    pub language: String,
    /// Taxonomy category uris scoping the skills queries.
    pub skill_categories: Vec<String>,
    /// Occupation-group category uris scoping the occupation queries.
    pub occupation_categories: Vec<String>,
    /// Statistical sequence model endpoint; pattern-only recognition when unset.
    pub model_url: Option<String>,
    /// Dependency parser endpoint; literal-only compilation when unset.
    pub parser_url: Option<String>,
    /// Embedding service endpoint; the deterministic token-hash embedder when unset.
    pub embedder_url: Option<String>,
    /// Embedding model name, selects tuned search defaults.
    pub embedding_model: String,
    /// Remote vector store URL; the index lives on local disk when unset.
    pub vector_url: Option<String>,
    /// Collection name inside the vector store.
    pub collection_name: String,
    /// File names of the persisted tables inside the data directory.
    pub skills_table: String,
    pub occupations_table: String,
    /// Entity labels retained by the recognizer.
    pub allowed_labels: Vec<EntityLabel>,
    /// Character offset below which recognized spans are suppressed.
    pub privacy_offset: usize,
}

impl SkillGraphConfig {
    /// The recognizer filtering settings carried by this configuration.
    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            allowed_labels: self.allowed_labels.clone(),
            privacy_offset: self.privacy_offset,
        }
    }
}

impl Default for SkillGraphConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sparql_url: "http://localhost:18890/sparql".to_string(),
            language: "en".to_string(),
            skill_categories: DEFAULT_SKILL_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            occupation_categories: DEFAULT_OCCUPATION_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model_url: None,
            parser_url: None,
            embedder_url: None,
            embedding_model: "all-MiniLM-L12-v2".to_string(),
            vector_url: None,
            collection_name: "skills".to_string(),
            skills_table: "skills.json.gz".to_string(),
            occupations_table: "occupations.json.gz".to_string(),
            allowed_labels: RecognizerConfig::default().allowed_labels,
            privacy_offset: DEFAULT_PRIVACY_OFFSET,
        }
    }
}

/// Returns the path to the data directory within the given root.
pub fn get_data_dir(root: &Path) -> PathBuf {
    root.join(SKILLGRAPH_DIR)
}

/// Returns the path to the configuration file within the data directory.
pub fn get_config_path(root: &Path) -> PathBuf {
    get_data_dir(root).join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns the default
/// configuration.
pub fn load_config(root: &Path) -> Result<SkillGraphConfig> {
    let config_path = get_config_path(root);

    if !config_path.exists() {
        return Ok(SkillGraphConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| SkillGraphError::Storage {
        message: format!("failed to read config file '{}': {}", config_path.display(), e),
        operation: "load_config".to_string(),
    })?;

    let config: SkillGraphConfig =
        serde_json::from_str(&contents).map_err(|e| SkillGraphError::Storage {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
            operation: "load_config".to_string(),
        })?;

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final
/// location, so a partial write never corrupts the configuration.
pub fn save_config(root: &Path, config: &SkillGraphConfig) -> Result<()> {
    let data_dir = get_data_dir(root);
    fs::create_dir_all(&data_dir).map_err(|e| SkillGraphError::Storage {
        message: format!("failed to create data directory '{}': {}", data_dir.display(), e),
        operation: "save_config".to_string(),
    })?;

    let config_path = get_config_path(root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config)?;
    fs::write(&tmp_path, &json).map_err(|e| SkillGraphError::Storage {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
        operation: "save_config".to_string(),
    })?;
    fs::rename(&tmp_path, &config_path).map_err(|e| SkillGraphError::Storage {
        message: format!(
            "failed to rename '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
        operation: "save_config".to_string(),
    })?;

    Ok(())
}
