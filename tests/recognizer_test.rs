use skillgraph::errors::SkillGraphError;
use skillgraph::nlp::StaticSequenceModel;
use skillgraph::patterns::{compile_table, PatternSet};
use skillgraph::recognizer::{EntityRecognizer, RecognizerConfig};
use skillgraph::taxonomy::TaxonomyTable;
use skillgraph::types::{Entity, EntityLabel, Skill, SkillType};

fn make_skill(uri: &str, label: &str) -> Skill {
    let mut skill = Skill {
        uri: uri.to_string(),
        label: label.to_string(),
        alt_label: Vec::new(),
        description: String::new(),
        skill_type: SkillType::Knowledge,
        narrowers: Vec::new(),
        all_label: Default::default(),
        text: String::new(),
    };
    skill.derive_fields();
    skill
}

fn ansible_patterns() -> PatternSet {
    let table = TaxonomyTable::from_skills(vec![make_skill(
        "http://data.europa.eu/esco/skill/ansible",
        "Ansible",
    )])
    .expect("failed to build table");
    compile_table(&table, None)
}

fn no_filter() -> RecognizerConfig {
    RecognizerConfig {
        privacy_offset: 0,
        ..RecognizerConfig::default()
    }
}

#[test]
fn test_blank_text_is_rejected() {
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &ansible_patterns(),
        None,
        no_filter(),
    );
    assert!(matches!(
        recognizer.recognize("   "),
        Err(SkillGraphError::InvalidInput { .. })
    ));
}

#[test]
fn test_rule_patterns_match_without_a_model() {
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &ansible_patterns(),
        None,
        no_filter(),
    );
    let recognition = recognizer
        .recognize("automated the rollout with ansible")
        .expect("recognition failed");
    assert_eq!(recognition.entities.len(), 1);
    assert_eq!(recognition.entities[0].label, EntityLabel::Taxonomy);
    assert_eq!(
        recognition.entities[0].id.as_deref(),
        Some("http://data.europa.eu/esco/skill/ansible")
    );
}

#[test]
fn test_statistical_spans_merge_with_rule_spans() {
    let text = "shipped terraform modules and ansible playbooks";
    let model = StaticSequenceModel::new(vec![Entity {
        start: 8,
        end: 17,
        label: EntityLabel::Product,
        text: "terraform".to_string(),
        id: None,
    }]);
    let recognizer =
        EntityRecognizer::new(Box::new(model), &ansible_patterns(), None, no_filter());
    let recognition = recognizer.recognize(text).expect("recognition failed");
    assert_eq!(recognition.entities.len(), 2);
    assert_eq!(recognition.count, 2);
    // Output is ordered by offset.
    assert_eq!(recognition.entities[0].text, "terraform");
    assert_eq!(recognition.entities[1].text, "ansible");
}

#[test]
fn test_rule_spans_win_over_overlapping_statistical_spans() {
    let text = "experienced with ansible deployments";
    // The model claims a wider span over the same region.
    let model = StaticSequenceModel::new(vec![Entity {
        start: 17,
        end: 36,
        label: EntityLabel::Product,
        text: "ansible deployments".to_string(),
        id: None,
    }]);
    let recognizer =
        EntityRecognizer::new(Box::new(model), &ansible_patterns(), None, no_filter());
    let recognition = recognizer.recognize(text).expect("recognition failed");
    assert_eq!(recognition.entities.len(), 1);
    assert_eq!(recognition.entities[0].text, "ansible");
    assert_eq!(recognition.entities[0].label, EntityLabel::Taxonomy);
}

#[test]
fn test_privacy_offset_suppresses_leading_spans() {
    // Padding puts the second mention past the default offset of 100.
    let padding = "x".repeat(100);
    let text = format!("ansible {padding} ansible");
    let recognizer = EntityRecognizer::new(
        Box::new(StaticSequenceModel::default()),
        &ansible_patterns(),
        None,
        RecognizerConfig::default(),
    );
    let recognition = recognizer.recognize(&text).expect("recognition failed");
    assert_eq!(recognition.entities.len(), 1);
    assert!(recognition.entities[0].start >= 100);
    // The unfiltered count still sees both mentions.
    assert_eq!(recognition.count, 2);
}

#[test]
fn test_disallowed_labels_are_filtered_but_counted() {
    let model = StaticSequenceModel::new(vec![Entity {
        start: 0,
        end: 4,
        label: EntityLabel::Law,
        text: "GDPR".to_string(),
        id: None,
    }]);
    let recognizer = EntityRecognizer::new(
        Box::new(model),
        &PatternSet::default(),
        None,
        RecognizerConfig {
            allowed_labels: vec![EntityLabel::Taxonomy, EntityLabel::Product],
            privacy_offset: 0,
        },
    );
    let recognition = recognizer
        .recognize("GDPR compliance work")
        .expect("recognition failed");
    assert!(recognition.entities.is_empty());
    assert_eq!(recognition.count, 1);
}

#[test]
fn test_model_echoing_a_rule_span_yields_one_entity() {
    // The model reports the exact span the rule layer also finds, with the
    // same identifier.
    let model = StaticSequenceModel::new(vec![Entity {
        start: 0,
        end: 7,
        label: EntityLabel::Taxonomy,
        text: "ansible".to_string(),
        id: Some("http://data.europa.eu/esco/skill/ansible".to_string()),
    }]);
    let recognizer =
        EntityRecognizer::new(Box::new(model), &ansible_patterns(), None, no_filter());
    let recognition = recognizer
        .recognize("ansible everywhere")
        .expect("recognition failed");
    assert_eq!(recognition.entities.len(), 1);
}
