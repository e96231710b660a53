use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process;

use skillgraph::config::{get_data_dir, load_config, save_config, SkillGraphConfig};
use skillgraph::errors::Result;
use skillgraph::nlp::{
    DependencyParser, HttpDependencyParser, HttpSequenceModel, SequenceModel, StaticSequenceModel,
};
use skillgraph::patterns::compile_table;
use skillgraph::recognizer::EntityRecognizer;
use skillgraph::resolver::SkillResolver;
use skillgraph::sparql::SparqlClient;
use skillgraph::taxonomy::{aggregate_occupations, aggregate_skills, save_records, TaxonomyTable};
use skillgraph::vectors::{
    Embedder, HashEmbedder, HttpEmbedder, IndexLocation, VectorIndex, VectorIndexConfig,
};

/// Skill resolution over an ESCO-like taxonomy.
#[derive(Parser)]
#[command(name = "skillgraph", about = "Resolve free text into taxonomy skills")]
struct Cli {
    /// Data directory root (default: current directory)
    #[arg(short, long)]
    path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the taxonomy graph and write the aggregated tables
    Fetch {
        /// Override the SPARQL endpoint URL
        #[arg(long)]
        sparql: Option<String>,
    },
    /// Build or rebuild the vector index from the skills table
    Index {
        /// Re-embed and replace existing index contents
        #[arg(short, long)]
        force: bool,
    },
    /// Validate index / table consistency
    Validate,
    /// Search skills by product labels, or semantically with --neural
    Search {
        /// Query terms (labels, or free text with --neural)
        query: Vec<String>,
        /// Use the vector index instead of label lookup
        #[arg(long)]
        neural: bool,
        /// Maximum results for neural search
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show one skill by uri, CURIE or unique uri prefix
    Show {
        uri: String,
        /// Include the transitive ancestors
        #[arg(short, long)]
        ancestors: bool,
    },
    /// Resolve a text file into a skill set
    Resolve {
        /// Input file
        file: PathBuf,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = resolve_path(cli.path);
    let config = load_config(&root)?;
    let data_dir = get_data_dir(&root);

    match cli.command {
        Commands::Fetch { sparql } => {
            let url = sparql.unwrap_or_else(|| config.sparql_url.clone());
            let client = SparqlClient::new(url, config.language.clone());

            let skill_rows =
                client.fetch_skill_rows(&config.skill_categories, &config.occupation_categories)?;
            let skills = aggregate_skills(&skill_rows)?;
            save_records(&data_dir.join(&config.skills_table), &skills)?;
            println!("Wrote {} skills to {}", skills.len(), config.skills_table);

            let occupation_rows = client.fetch_occupation_rows(&config.occupation_categories)?;
            let occupations = aggregate_occupations(&occupation_rows)?;
            save_records(&data_dir.join(&config.occupations_table), &occupations)?;
            println!(
                "Wrote {} occupations to {}",
                occupations.len(),
                config.occupations_table
            );

            save_config(&root, &config)?;
        }
        Commands::Index { force } => {
            let table = load_table(&config, &data_dir)?;
            let records: Vec<_> = table.iter().cloned().collect();
            let index = VectorIndex::build(
                index_config(&config, &data_dir),
                embedder(&config),
                &records,
                force,
            )?;
            index.validate(&table)?;
            println!("Indexed {} records", records.len());
            index.close()?;
        }
        Commands::Validate => {
            let table = load_table(&config, &data_dir)?;
            let index = VectorIndex::open(index_config(&config, &data_dir), embedder(&config))?;
            let outcome = index.validate(&table);
            index.close()?;
            outcome?;
            println!("Index and table agree on {} records", table.len());
        }
        Commands::Search {
            query,
            neural,
            limit,
        } => {
            let table = load_table(&config, &data_dir)?;
            if neural {
                let index = VectorIndex::open(index_config(&config, &data_dir), embedder(&config))?
                    .read_only();
                let hits = index.search(&query.join(" "), Some(limit), None)?;
                for hit in &hits {
                    println!("{:.3}  {}  {}", hit.score, hit.uri, hit.label);
                }
                index.close()?;
            } else {
                let labels: HashSet<String> = query.into_iter().collect();
                for skill in table.search_products(&labels) {
                    println!("{}  {}", skill.uri, skill.label);
                }
            }
        }
        Commands::Show { uri, ancestors } => {
            let table = load_table(&config, &data_dir)?;
            let skill = table.find_by_prefix(&uri)?;
            println!("{}", serde_json::to_string_pretty(skill)?);
            if ancestors {
                for ancestor in table.ancestors(&skill.uri) {
                    println!("broader: {}  {}", ancestor.uri, ancestor.label);
                }
            }
        }
        Commands::Resolve { file, json } => {
            let text = std::fs::read_to_string(&file)?;
            let table = load_table(&config, &data_dir)?;
            let parser: Option<Box<dyn DependencyParser>> = config
                .parser_url
                .as_ref()
                .map(|url| {
                    Box::new(HttpDependencyParser::new(url.clone())) as Box<dyn DependencyParser>
                });
            let patterns = compile_table(&table, parser.as_deref());

            let model: Box<dyn SequenceModel> = match &config.model_url {
                Some(url) => Box::new(HttpSequenceModel::new(url.clone())),
                None => Box::new(StaticSequenceModel::default()),
            };
            let recognizer =
                EntityRecognizer::new(model, &patterns, parser, config.recognizer_config());

            let index = VectorIndex::open(index_config(&config, &data_dir), embedder(&config))
                .ok()
                .map(VectorIndex::read_only);
            let resolver = SkillResolver::new(&recognizer, &table, index.as_ref());
            let skills = resolver.resolve(&text);
            if let Some(index) = index {
                index.close()?;
            }
            let skills = skills?;

            if json {
                println!("{}", serde_json::to_string_pretty(&skills)?);
            } else if skills.is_empty() {
                println!("No skills recognized in {}", file.display());
            } else {
                for skill in &skills {
                    println!(
                        "{:>3}x [{}] {}  {}",
                        skill.count,
                        skill.source.as_str(),
                        skill.uri,
                        skill.label
                    );
                }
            }
        }
    }
    Ok(())
}

fn load_table(config: &SkillGraphConfig, data_dir: &std::path::Path) -> Result<TaxonomyTable> {
    TaxonomyTable::load(&data_dir.join(&config.skills_table))
}

fn index_config(config: &SkillGraphConfig, data_dir: &std::path::Path) -> VectorIndexConfig {
    let location = match &config.vector_url {
        Some(url) => IndexLocation::Url(url.clone()),
        None => IndexLocation::Path(data_dir.join("vectors")),
    };
    VectorIndexConfig {
        location,
        collection: config.collection_name.clone(),
    }
}

fn embedder(config: &SkillGraphConfig) -> Box<dyn Embedder> {
    match &config.embedder_url {
        Some(url) => Box::new(HttpEmbedder::new(
            url.clone(),
            config.embedding_model.clone(),
        )),
        None => Box::new(HashEmbedder::default()),
    }
}

/// Resolves an optional path argument to an absolute `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
