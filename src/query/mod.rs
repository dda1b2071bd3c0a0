//! Variant query compilation
//!
//! - `params`: query parameters and result options
//! - `values`: value lists, `key op value` items, negation
//! - `operators`: operator normalization
//! - `filter`: per-parameter filter specs and predicate rendering
//! - `region`: regions, variant ids, xrefs, gene combinations
//! - `consequence`: SO terms and annotation combinations
//! - `relaxation`: when a comparison also matches NULL
//! - `projection`: returned columns
//! - `compiler`: the SELECT statement
//!
//! A query never reaches the database unless every value in it parsed.

mod compiler;
mod consequence;
mod errors;
mod filter;
mod operators;
mod params;
mod projection;
mod region;
mod relaxation;
mod values;

pub use compiler::{
    CompiledQuery, QueryCompiler, NO_INDEX_HINT, STUDY_FILTER_SKIPPED_EVENT,
    UNSUPPORTED_FILTER_EVENT, VOID_CHROMOSOME,
};
pub use consequence::{
    combine, consequence_accessions, parse_consequence_type, parse_consequence_types,
    so_accession, so_term, Combination, LOF, LOSS_OF_FUNCTION_TERMS, PA,
};
pub use errors::{QueryError, QueryResult};
pub use filter::{append_filters, build_filter, FilterSpec, FilterValue, ValueSource};
pub use operators::{format_double, inverse_operator, parse_numeric_operator, parse_operator};
pub use params::{QueryOptions, QueryParam, SortOrder, VariantQuery, SKIP_GENE_REGIONS};
pub use projection::{Projection, ProjectionFields, SampleProjection, StudyProjection, ALL, NONE};
pub use region::{variant_filter, Region, VariantId, REGION_MAX_END};
pub use relaxation::{
    population_null_relaxation, stats_null_relaxation, study_filter_is_redundant,
    PopulationKind, StatsKind,
};
pub use values::{
    check_operator, is_negated, split_operator, split_study_resource, split_values, KeyOpValue,
    QueryOperation,
};
