use skillgraph::errors::SkillGraphError;
use skillgraph::taxonomy::TaxonomyTable;
use skillgraph::types::{Skill, SkillType};
use skillgraph::vectors::*;
use tempfile::TempDir;

fn make_skill(uri: &str, label: &str, description: &str) -> Skill {
    let mut skill = Skill {
        uri: uri.to_string(),
        label: label.to_string(),
        alt_label: Vec::new(),
        description: description.to_string(),
        skill_type: SkillType::Knowledge,
        narrowers: Vec::new(),
        all_label: Default::default(),
        text: String::new(),
    };
    skill.derive_fields();
    skill
}

fn sample_skills() -> Vec<Skill> {
    vec![
        make_skill(
            "http://data.europa.eu/esco/skill/ansible",
            "Ansible",
            "configuration management and orchestration",
        ),
        make_skill(
            "http://data.europa.eu/esco/skill/postgres",
            "PostgreSQL",
            "relational database administration",
        ),
        make_skill(
            "http://data.europa.eu/esco/skill/rust",
            "Rust",
            "systems programming language",
        ),
    ]
}

fn local_config(dir: &TempDir) -> VectorIndexConfig {
    VectorIndexConfig {
        location: IndexLocation::Path(dir.path().to_path_buf()),
        collection: "skills".to_string(),
    }
}

fn embedder() -> Box<dyn Embedder> {
    // A wide hash space keeps token buckets collision-free for small corpora.
    Box::new(HashEmbedder::new(4096))
}

#[test]
fn test_cosine_similarity_identical_vectors() {
    let v = vec![1.0, 2.0, 3.0];
    let sim = cosine_similarity(&v, &v);
    assert!((sim - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_orthogonal_vectors() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    assert!(cosine_similarity(&a, &b).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_zero_vector() {
    let a = vec![0.0, 0.0];
    let b = vec![1.0, 1.0];
    assert_eq!(cosine_similarity(&a, &b), 0.0);
}

#[test]
fn test_model_defaults_are_tuned_per_model() {
    assert_eq!(model_defaults("all-MiniLM-L12-v2").score_threshold, 0.3);
    assert_eq!(
        model_defaults("paraphrase-albert-small-v2").score_threshold,
        0.25
    );
    assert_eq!(model_defaults("anything-else").k, 10);
}

#[test]
fn test_hash_embedder_is_deterministic_and_normalized() {
    let embedder = HashEmbedder::default();
    let texts = vec!["ansible orchestration".to_string()];
    let a = embedder.embed(&texts).expect("embed failed");
    let b = embedder.embed(&texts).expect("embed failed");
    assert_eq!(a, b);
    let norm: f32 = a[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn test_open_without_persisted_state_fails() {
    let dir = TempDir::new().expect("failed to create temp dir");
    match VectorIndex::open(local_config(&dir), embedder()) {
        Err(SkillGraphError::IndexNotFound { location }) => {
            assert!(location.contains(dir.path().to_str().unwrap()));
        }
        _ => panic!("expected IndexNotFound"),
    }
}

#[test]
fn test_build_and_search_local_index() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let skills = sample_skills();
    let index =
        VectorIndex::build(local_config(&dir), embedder(), &skills, true).expect("build failed");
    assert_eq!(index.count().expect("count failed"), 3);

    let hits = index.search("ansible", None, None).expect("search failed");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].uri, "http://data.europa.eu/esco/skill/ansible");
    assert!(hits[0].score > 0.3);
    index.close().expect("close failed");
}

#[test]
fn test_search_threshold_filters_unrelated_records() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let index = VectorIndex::build(local_config(&dir), embedder(), &sample_skills(), true)
        .expect("build failed");

    // No record shares a token with the query, so every score falls below
    // the threshold.
    let hits = index
        .search("underwater basket weaving", None, None)
        .expect("search failed");
    assert!(hits.is_empty());
    index.close().expect("close failed");
}

#[test]
fn test_search_respects_explicit_k() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let index = VectorIndex::build(local_config(&dir), embedder(), &sample_skills(), true)
        .expect("build failed");

    let hits = index
        .search("database administration", Some(1), Some(0.0))
        .expect("search failed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uri, "http://data.europa.eu/esco/skill/postgres");
    index.close().expect("close failed");
}

#[test]
fn test_open_after_build_sees_same_points() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let index = VectorIndex::build(local_config(&dir), embedder(), &sample_skills(), true)
        .expect("build failed");
    index.close().expect("close failed");

    let reopened = VectorIndex::open(local_config(&dir), embedder()).expect("open failed");
    assert_eq!(reopened.count().expect("count failed"), 3);
    let points = reopened.scroll(10).expect("scroll failed");
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| !p.text.is_empty()));
    reopened.close().expect("close failed");
}

#[test]
fn test_force_recreate_replaces_prior_contents() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let skills = sample_skills();
    let index =
        VectorIndex::build(local_config(&dir), embedder(), &skills, true).expect("build failed");
    index.close().expect("close failed");

    // Rebuild without the last record: the dropped term becomes unfindable.
    let fewer = &skills[..2];
    let index =
        VectorIndex::build(local_config(&dir), embedder(), fewer, true).expect("rebuild failed");
    assert_eq!(index.count().expect("count failed"), 2);
    let hits = index.search("rust", None, None).expect("search failed");
    assert!(hits.iter().all(|h| h.uri != "http://data.europa.eu/esco/skill/rust"));
    index.close().expect("close failed");
}

#[test]
fn test_build_without_force_opens_existing_state() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let index = VectorIndex::build(local_config(&dir), embedder(), &sample_skills(), true)
        .expect("build failed");
    index.close().expect("close failed");

    // Without force, prior contents are kept even if fewer records are given.
    let index = VectorIndex::build(local_config(&dir), embedder(), &[], false)
        .expect("reopen failed");
    assert_eq!(index.count().expect("count failed"), 3);
    index.close().expect("close failed");
}

#[test]
fn test_insert_updates_existing_point() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut index = VectorIndex::build(local_config(&dir), embedder(), &sample_skills(), true)
        .expect("build failed");

    let updated = make_skill(
        "http://data.europa.eu/esco/skill/rust",
        "Rust",
        "memory-safe systems language",
    );
    index.insert(&updated).expect("insert failed");
    // Same uri, so the point count stays put.
    assert_eq!(index.count().expect("count failed"), 3);
    index.close().expect("close failed");
}

#[test]
fn test_read_only_insert_is_a_no_op() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let skills = sample_skills();
    let index =
        VectorIndex::build(local_config(&dir), embedder(), &skills[..2], true)
            .expect("build failed");
    let mut index = index.read_only();

    index.insert(&skills[2]).expect("insert failed");
    assert_eq!(index.count().expect("count failed"), 2);
    index.close().expect("close failed");
}

#[test]
fn test_validate_detects_cardinality_drift() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let skills = sample_skills();
    let index = VectorIndex::build(local_config(&dir), embedder(), &skills[..2], true)
        .expect("build failed");

    let table = TaxonomyTable::from_skills(skills).expect("failed to build table");
    match index.validate(&table) {
        Err(SkillGraphError::IndexConsistency {
            table_count,
            index_count,
        }) => {
            assert_eq!(table_count, 3);
            assert_eq!(index_count, 2);
        }
        _ => panic!("expected IndexConsistency"),
    }

    let smaller = TaxonomyTable::from_skills(sample_skills()[..2].to_vec())
        .expect("failed to build table");
    index.validate(&smaller).expect("validation failed");
    index.close().expect("close failed");
}
