//! Read-only client for the taxonomy graph endpoint.
//!
//! Queries are scoped by a category filter, apply a single configured
//! language filter to multi-lingual literals, and come back as CSV rows.
//! An empty result for a required category is caught at aggregation time.

use tracing::info;

use crate::errors::{Result, SkillGraphError};
use crate::taxonomy::{OccupationRow, RowSet, SkillRow};

/// Default taxonomy categories for the skills-subtree query scope.
pub const DEFAULT_SKILL_CATEGORIES: &[&str] = &[
    "http://data.europa.eu/esco/isced-f/06",
    "http://data.europa.eu/esco/skill/243eb885-07c7-4b77-ab9c-827551d83dc4",
    "http://data.europa.eu/esco/skill/b590d4e5-7c62-4b4a-abc2-c270b482e0ce",
    "http://data.europa.eu/esco/skill/bec4359e-cb92-468f-a997-8fb28e32fba9",
];

/// Default occupation-group categories (ICT professionals and technicians).
pub const DEFAULT_OCCUPATION_CATEGORIES: &[&str] = &[
    "http://data.europa.eu/esco/isco/C25",
    "http://data.europa.eu/esco/isco/C35",
];

const PREFIXES: &[(&str, &str)] = &[
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("iso-thes", "http://purl.org/iso25964/skos-thes#"),
    ("dct", "http://purl.org/dc/terms/"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("esco", "http://data.europa.eu/esco/model#"),
];

/// Blocking client for a SPARQL-like endpoint.
pub struct SparqlClient {
    url: String,
    language: String,
    agent: ureq::Agent,
}

impl SparqlClient {
    pub fn new(url: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            language: language.into(),
            agent: ureq::Agent::new(),
        }
    }

    /// Executes a query, prepending the prefix preamble, and returns the raw
    /// CSV response body.
    pub fn query(&self, body: &str) -> Result<String> {
        let preamble: String = PREFIXES
            .iter()
            .map(|(k, v)| format!("PREFIX {k}: <{v}>\n"))
            .collect();
        let query = format!("{preamble}{body}");
        self.agent
            .post(&self.url)
            .set("Accept", "text/csv")
            .send_form(&[("query", query.as_str())])
            .map_err(|e| SkillGraphError::Http {
                message: e.to_string(),
                url: self.url.clone(),
            })?
            .into_string()
            .map_err(|e| SkillGraphError::Http {
                message: e.to_string(),
                url: self.url.clone(),
            })
    }

    /// Fetches skill rows from both must-have scopes: skills under the given
    /// taxonomy categories, and skills related to occupations under the
    /// given occupation-group categories.
    pub fn fetch_skill_rows(
        &self,
        skill_categories: &[String],
        occupation_categories: &[String],
    ) -> Result<Vec<RowSet<SkillRow>>> {
        let mut row_sets = Vec::new();
        for (scope, body) in [
            (
                format!("skills:{}", skill_categories.join(",")),
                self.skills_query(skill_categories),
            ),
            (
                format!("occupation-skills:{}", occupation_categories.join(",")),
                self.occupation_skills_query(occupation_categories),
            ),
        ] {
            let csv = self.query(&body)?;
            let rows = decode_skill_rows(&csv);
            info!(count = rows.len(), category = %scope, "fetched skill rows");
            row_sets.push(RowSet {
                category: scope,
                rows,
            });
        }
        Ok(row_sets)
    }

    /// Fetches occupation rows for the given occupation-group categories.
    pub fn fetch_occupation_rows(
        &self,
        categories: &[String],
    ) -> Result<Vec<RowSet<OccupationRow>>> {
        let body = self.occupations_query(categories);
        let csv = self.query(&body)?;
        let rows = decode_occupation_rows(&csv);
        info!(count = rows.len(), "fetched occupation rows");
        Ok(vec![RowSet {
            category: categories.join(","),
            rows,
        }])
    }

    fn values_clause(categories: &[String]) -> String {
        categories
            .iter()
            .map(|uri| format!("<{uri}>"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Skills reachable downward from a taxonomy category.
    fn skills_query(&self, categories: &[String]) -> String {
        let values = Self::values_clause(categories);
        let lang = &self.language;
        format!(
            r#"SELECT DISTINCT ?uri ?label ?altLabel ?description ?skillType
    (GROUP_CONCAT(DISTINCT ?narrower; separator=", ") AS ?narrowers)
WHERE {{
    VALUES ?category {{ {values} }}
    ?uri a esco:Skill ;
        skos:prefLabel ?label ;
        skos:broaderTransitive* ?category ;
        esco:skillType _:skillType ;
        iso-thes:status "released" .
    FILTER (lang(?label) = "{lang}")
    _:skillType skos:prefLabel ?skillType . FILTER (lang(?skillType) = "{lang}")
    OPTIONAL {{ ?narrower skos:broader ?uri . }}
    OPTIONAL {{
        ?uri skos:altLabel ?altLabel . FILTER (lang(?altLabel) = "{lang}")
        ?uri dct:description _:description .
        _:description esco:nodeLiteral ?description ;
            esco:language "{lang}"^^xsd:language .
    }}
}}"#
        )
    }

    /// Skills related to occupations under an occupation-group category.
    fn occupation_skills_query(&self, categories: &[String]) -> String {
        let values = Self::values_clause(categories);
        let lang = &self.language;
        format!(
            r#"SELECT DISTINCT ?uri ?label ?altLabel ?description ?skillType
    (GROUP_CONCAT(DISTINCT ?narrower; separator=", ") AS ?narrowers)
WHERE {{
    VALUES ?category {{ {values} }}
    ?o a esco:Occupation ;
        esco:relatedEssentialSkill ?uri ;
        skos:broaderTransitive* ?category ;
        iso-thes:status "released" .
    ?uri esco:skillType _:skillType ;
        iso-thes:status "released" ;
        skos:prefLabel ?label . FILTER (lang(?label) = "{lang}")
    _:skillType skos:prefLabel ?skillType . FILTER (lang(?skillType) = "{lang}")
    OPTIONAL {{ ?narrower skos:broader ?uri . }}
    OPTIONAL {{
        ?uri skos:altLabel ?altLabel . FILTER (lang(?altLabel) = "{lang}")
        ?uri dct:description _:description .
        _:description esco:nodeLiteral ?description ;
            esco:language "{lang}"^^xsd:language .
    }}
}}"#
        )
    }

    /// Occupations with their related skills under a group category.
    fn occupations_query(&self, categories: &[String]) -> String {
        let values = Self::values_clause(categories);
        let lang = &self.language;
        format!(
            r#"SELECT DISTINCT ?uri ?label ?altLabel ?description ?skill ?skillType
WHERE {{
    VALUES ?category {{ {values} }}
    ?uri a esco:Occupation ;
        skos:prefLabel ?label ;
        esco:relatedEssentialSkill ?skill ;
        skos:broaderTransitive* ?category ;
        iso-thes:status "released" .
    ?skill esco:skillType _:skillType ;
        iso-thes:status "released" .
    _:skillType skos:prefLabel ?skillType . FILTER (lang(?skillType) = "{lang}")
    FILTER (lang(?label) = "{lang}")
    OPTIONAL {{
        ?uri skos:altLabel ?altLabel . FILTER (lang(?altLabel) = "{lang}")
        ?uri dct:description _:description .
        _:description esco:nodeLiteral ?description ;
            esco:language "{lang}"^^xsd:language .
    }}
}}"#
        )
    }
}

/// Parses CSV text into records, handling quoted fields, embedded commas,
/// embedded newlines and doubled quotes.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

fn opt(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Maps a CSV header to column indices, so decoding tolerates reordered
/// columns from different endpoint versions.
fn column_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim() == name)
}

/// Decodes skill rows from a CSV response.
///
/// The `narrowers` column is a `", "`-joined concatenation; it is split into
/// one row per narrower uri so each raw row carries at most one, matching
/// the aggregator's row shape.
pub fn decode_skill_rows(csv: &str) -> Vec<SkillRow> {
    let records = parse_csv(csv);
    let Some((header, data)) = records.split_first() else {
        return Vec::new();
    };
    let (Some(uri_i), Some(label_i)) = (
        column_index(header, "uri"),
        column_index(header, "label"),
    ) else {
        return Vec::new();
    };
    let alt_i = column_index(header, "altLabel");
    let desc_i = column_index(header, "description");
    let type_i = column_index(header, "skillType");
    let narrowers_i = column_index(header, "narrowers");

    let mut rows = Vec::new();
    for record in data {
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).map(|s| s.as_str());
        let (Some(uri), Some(label)) = (
            field(Some(uri_i)).and_then(|v| opt(v)),
            field(Some(label_i)).and_then(|v| opt(v)),
        ) else {
            continue;
        };
        let base = SkillRow {
            uri,
            label,
            alt_label: field(alt_i).and_then(opt),
            description: field(desc_i).and_then(opt),
            skill_type: field(type_i).and_then(opt).unwrap_or_default(),
            narrower: None,
        };
        let narrowers: Vec<String> = field(narrowers_i)
            .map(|v| v.split(", ").filter_map(opt).collect())
            .unwrap_or_default();
        if narrowers.is_empty() {
            rows.push(base);
        } else {
            for narrower in narrowers {
                rows.push(SkillRow {
                    narrower: Some(narrower),
                    ..base.clone()
                });
            }
        }
    }
    rows
}

/// Decodes occupation rows from a CSV response.
pub fn decode_occupation_rows(csv: &str) -> Vec<OccupationRow> {
    let records = parse_csv(csv);
    let Some((header, data)) = records.split_first() else {
        return Vec::new();
    };
    let (Some(uri_i), Some(label_i), Some(skill_i)) = (
        column_index(header, "uri"),
        column_index(header, "label"),
        column_index(header, "skill"),
    ) else {
        return Vec::new();
    };
    let alt_i = column_index(header, "altLabel");
    let desc_i = column_index(header, "description");
    let type_i = column_index(header, "skillType");

    let mut rows = Vec::new();
    for record in data {
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).map(|s| s.as_str());
        let (Some(uri), Some(label), Some(skill_uri)) = (
            field(Some(uri_i)).and_then(|v| opt(v)),
            field(Some(label_i)).and_then(|v| opt(v)),
            field(Some(skill_i)).and_then(|v| opt(v)),
        ) else {
            continue;
        };
        rows.push(OccupationRow {
            uri,
            label,
            alt_label: field(alt_i).and_then(opt),
            description: field(desc_i).and_then(opt),
            skill_uri,
            skill_type: field(type_i).and_then(opt).unwrap_or_default(),
        });
    }
    rows
}
