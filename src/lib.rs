pub mod config;
pub mod errors;
pub mod nlp;
pub mod patterns;
pub mod recognizer;
pub mod resolver;
pub mod sparql;
pub mod taxonomy;
pub mod types;
pub mod vectors;
