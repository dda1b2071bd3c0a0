//! Column model for the variants table
//!
//! - `columns`: closed set of static columns and the primary key
//! - `dynamic`: per-study column builders and their parser
//! - `population`: population frequency sources and columns
//! - `indexes`: secondary index catalog
//!
//! Dynamic names are reversible: `parse_dynamic_column(c.name())` yields `c`.

mod columns;
mod dynamic;
mod errors;
mod indexes;
mod population;
mod types;

pub use columns::{
    conservation_column, functional_score_column, static_columns, VariantColumn, PRIMARY_KEY,
};
pub use dynamic::{
    cohort_freq_column, cohort_maf_column, cohort_mgf_column, cohort_pass_freq_column,
    cohort_stats_column, extract_id, extract_study_id, file_column, fill_missing_column,
    parse_dynamic_column, release_column, release_columns, sample_column, sample_columns,
    sample_file_column, stats_columns, study_column, study_columns, variant_score_column,
    DynamicColumn, COLUMNS_PER_COHORT, COLUMN_SEPARATOR, RELEASE_PREFIX,
};
pub use errors::{SchemaError, SchemaResult};
pub use indexes::{
    all_indices, array_element, pop_freq_indices, score_indices, IndexDefinition, IndexType,
};
pub use population::{
    human_population_columns, human_populations, normalize_source, Population, KNOWN_SOURCES,
    POPULATION_FREQUENCY_PREFIX,
};
pub use types::{Column, SqlType};
