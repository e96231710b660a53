//! Pattern compilation and matching: turns canonical labels into matchable
//! linguistic patterns and matches them against free text.
mod compiler;
mod matcher;

pub use compiler::{compile_label, compile_table, PatternSet};
pub use matcher::{DependencyMatch, DependencyMatcher, LiteralMatcher};
