use skillgraph::config::*;
use tempfile::TempDir;

#[test]
fn test_default_config_values() {
    let config = SkillGraphConfig::default();
    assert_eq!(config.version, 1);
    assert_eq!(config.language, "en");
    assert_eq!(config.embedding_model, "all-MiniLM-L12-v2");
    assert_eq!(config.collection_name, "skills");
    assert_eq!(config.privacy_offset, 100);
    assert!(config.model_url.is_none());
    assert!(config.parser_url.is_none());
    assert_eq!(config.allowed_labels.len(), 4);
    assert_eq!(
        config.recognizer_config().privacy_offset,
        config.privacy_offset
    );
    assert!(!config.skill_categories.is_empty());
    assert!(!config.occupation_categories.is_empty());
}

#[test]
fn test_load_missing_config_returns_default() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = load_config(dir.path()).expect("load failed");
    assert_eq!(config, SkillGraphConfig::default());
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = SkillGraphConfig::default();
    config.language = "de".to_string();
    config.model_url = Some("http://localhost:9000/predict".to_string());
    config.privacy_offset = 0;

    save_config(dir.path(), &config).expect("save failed");
    assert!(get_config_path(dir.path()).exists());

    let loaded = load_config(dir.path()).expect("load failed");
    assert_eq!(loaded, config);
}

#[test]
fn test_save_overwrites_previous_config() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = SkillGraphConfig::default();
    save_config(dir.path(), &config).expect("save failed");

    let mut updated = config.clone();
    updated.collection_name = "skills-v2".to_string();
    save_config(dir.path(), &updated).expect("save failed");

    let loaded = load_config(dir.path()).expect("load failed");
    assert_eq!(loaded.collection_name, "skills-v2");
}

#[test]
fn test_corrupt_config_is_a_storage_error() {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::create_dir_all(get_data_dir(dir.path())).expect("mkdir failed");
    std::fs::write(get_config_path(dir.path()), "not json").expect("write failed");
    assert!(load_config(dir.path()).is_err());
}

#[test]
fn test_data_dir_is_hidden_directory() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let data_dir = get_data_dir(dir.path());
    assert!(data_dir.ends_with(SKILLGRAPH_DIR));
    assert_eq!(get_config_path(dir.path()), data_dir.join(CONFIG_FILENAME));
}
