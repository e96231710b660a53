//! Taxonomy aggregation: turns raw graph query results into deduplicated
//! skill/occupation records with derived search fields, and serves lookups
//! over the aggregated table.
mod aggregate;
mod ancestors;
mod table;

pub use aggregate::{aggregate_occupations, aggregate_skills, OccupationRow, RowSet, SkillRow};
pub use ancestors::{broader_map, walk_broader, Ancestor};
pub use table::{load_occupations, load_records, save_records, TaxonomyTable};
