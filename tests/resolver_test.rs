use skillgraph::nlp::StaticSequenceModel;
use skillgraph::patterns::compile_table;
use skillgraph::recognizer::{EntityRecognizer, RecognizerConfig};
use skillgraph::resolver::{count_entities, SkillResolver};
use skillgraph::taxonomy::TaxonomyTable;
use skillgraph::types::{Entity, EntityLabel, Skill, SkillSource, SkillType};
use skillgraph::vectors::{HashEmbedder, IndexLocation, VectorIndex, VectorIndexConfig};
use tempfile::TempDir;

fn make_skill(uri: &str, label: &str, alt: &[&str], narrowers: &[&str]) -> Skill {
    let mut skill = Skill {
        uri: uri.to_string(),
        label: label.to_string(),
        alt_label: alt.iter().map(|s| s.to_string()).collect(),
        description: String::new(),
        skill_type: SkillType::Knowledge,
        narrowers: narrowers.iter().map(|s| s.to_string()).collect(),
        all_label: Default::default(),
        text: String::new(),
    };
    skill.derive_fields();
    skill
}

fn uri(suffix: &str) -> String {
    format!("http://data.europa.eu/esco/skill/{suffix}")
}

fn setup_table() -> TaxonomyTable {
    TaxonomyTable::from_skills(vec![
        make_skill(
            &uri("config-mgmt"),
            "configuration management",
            &[],
            &[&uri("ansible")],
        ),
        make_skill(&uri("ansible"), "Ansible", &["AWX"], &[]),
        make_skill(&uri("python"), "Python", &[], &[]),
    ])
    .expect("failed to build table")
}

fn product_entity(start: usize, text: &str) -> Entity {
    Entity {
        start,
        end: start + text.chars().count(),
        label: EntityLabel::Product,
        text: text.to_string(),
        id: None,
    }
}

#[test]
fn test_count_entities_keys_on_identifier() {
    let entities = vec![
        Entity {
            start: 0,
            end: 7,
            label: EntityLabel::Taxonomy,
            text: "Ansible".to_string(),
            id: Some(uri("ansible")),
        },
        Entity {
            start: 20,
            end: 27,
            label: EntityLabel::Taxonomy,
            text: "ansible".to_string(),
            id: Some(uri("ansible")),
        },
    ];
    let counted = count_entities(&entities);
    assert_eq!(counted.len(), 1);
    assert_eq!(counted[&uri("ansible")].count, 2);
}

#[test]
fn test_count_entities_keys_on_lowercased_text_without_identifier() {
    let entities = vec![
        product_entity(0, "Terraform"),
        product_entity(20, "terraform"),
        product_entity(40, "TERRAFORM"),
    ];
    let counted = count_entities(&entities);
    assert_eq!(counted.len(), 1);
    let entry = &counted["terraform"];
    assert_eq!(entry.count, 3);
    assert_eq!(entry.text, "terraform");
}

#[test]
fn test_resolve_counts_repeated_mentions() {
    let table = setup_table();
    let patterns = compile_table(&table, None);
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &patterns,
        None,
        RecognizerConfig {
            privacy_offset: 0,
            ..RecognizerConfig::default()
        },
    );
    let resolver = SkillResolver::new(&recognizer, &table, None);

    let skills = resolver
        .resolve("used ansible for provisioning. more ansible for deployment. some python too.")
        .expect("resolution failed");
    assert_eq!(skills.len(), 2);
    let ansible = skills.iter().find(|s| s.uri == uri("ansible")).unwrap();
    assert_eq!(ansible.count, 2);
    assert_eq!(ansible.source, SkillSource::Ner);
    let python = skills.iter().find(|s| s.uri == uri("python")).unwrap();
    assert_eq!(python.count, 1);
}

#[test]
fn test_product_entities_resolve_through_label_lookup() {
    let table = setup_table();
    // The rule layer sees nothing; the model tags "awx" as a product.
    let model = StaticSequenceModel::new(vec![product_entity(11, "awx")]);
    let recognizer = EntityRecognizer::new(
        Box::new(model),
        &compile_table(
            &TaxonomyTable::from_skills(Vec::new()).expect("empty table"),
            None,
        ),
        None,
        RecognizerConfig {
            privacy_offset: 0,
            ..RecognizerConfig::default()
        },
    );
    let resolver = SkillResolver::new(&recognizer, &table, None);

    let skills = resolver.resolve("built with awx daily").expect("resolution failed");
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].uri, uri("ansible"));
    assert_eq!(skills[0].source, SkillSource::Pattern);
    assert_eq!(skills[0].score, None);
}

#[test]
fn test_vector_fallback_supplies_best_hit_with_score() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let table = setup_table();
    let records: Vec<Skill> = vec![make_skill(
        &uri("config-mgmt"),
        "configuration management",
        &[],
        &[],
    )];
    let index = VectorIndex::build(
        VectorIndexConfig {
            location: IndexLocation::Path(dir.path().to_path_buf()),
            collection: "skills".to_string(),
        },
        Box::new(HashEmbedder::new(4096)),
        &records,
        true,
    )
    .expect("build failed")
    .read_only();

    // "configuration" matches nothing in the tables but shares a token with
    // the indexed record.
    let model = StaticSequenceModel::new(vec![product_entity(0, "configuration")]);
    let recognizer = EntityRecognizer::new(
        Box::new(model),
        &compile_table(
            &TaxonomyTable::from_skills(Vec::new()).expect("empty table"),
            None,
        ),
        None,
        RecognizerConfig {
            privacy_offset: 0,
            ..RecognizerConfig::default()
        },
    );
    let resolver = SkillResolver::new(&recognizer, &table, Some(&index));

    let skills = resolver
        .resolve("configuration work everywhere")
        .expect("resolution failed");
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].uri, uri("config-mgmt"));
    assert_eq!(skills[0].source, SkillSource::Vector);
    assert!(skills[0].score.is_some());
    index.close().expect("close failed");
}

#[test]
fn test_fusion_prefers_identifier_sourced_matches() {
    let table = setup_table();
    let patterns = compile_table(&table, None);
    // The model tags "AWX" as a product; the rule layer independently finds
    // "ansible". Both resolve to the same record.
    let model = StaticSequenceModel::new(vec![product_entity(30, "awx")]);
    let recognizer = EntityRecognizer::new(
        Box::new(model),
        &patterns,
        None,
        RecognizerConfig {
            privacy_offset: 0,
            ..RecognizerConfig::default()
        },
    );
    let resolver = SkillResolver::new(&recognizer, &table, None);

    let skills = resolver
        .resolve("ansible playbooks drive all our awx jobs")
        .expect("resolution failed");
    let ansible: Vec<_> = skills.iter().filter(|s| s.uri == uri("ansible")).collect();
    assert_eq!(ansible.len(), 1);
    assert_eq!(ansible[0].source, SkillSource::Ner);
}

#[test]
fn test_skills_by_sentence_assigns_entities_by_offset() {
    let table = setup_table();
    let patterns = compile_table(&table, None);
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &patterns,
        None,
        RecognizerConfig {
            privacy_offset: 0,
            ..RecognizerConfig::default()
        },
    );
    let resolver = SkillResolver::new(&recognizer, &table, None);

    let by_sentence = resolver
        .skills_by_sentence("I deploy with ansible. I also like gardening. python is my language.")
        .expect("resolution failed");
    assert_eq!(by_sentence.len(), 2);
    assert_eq!(by_sentence[0].sentence, "I deploy with ansible.");
    assert_eq!(by_sentence[0].entities.len(), 1);
    assert_eq!(by_sentence[1].sentence, "python is my language.");
}

#[test]
fn test_expand_ancestors_aggregates_by_uri() {
    let table = setup_table();
    let patterns = compile_table(&table, None);
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &patterns,
        None,
        RecognizerConfig::default(),
    );
    let resolver = SkillResolver::new(&recognizer, &table, None);

    let expanded = resolver.expand_ancestors(&[uri("ansible"), uri("ansible")]);
    assert_eq!(expanded.len(), 1);
    assert_eq!(
        expanded.get(&uri("config-mgmt")).map(String::as_str),
        Some("configuration management")
    );
}
