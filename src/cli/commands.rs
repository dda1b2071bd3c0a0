//! CLI command implementations
//!
//! Every command is a one-shot: read arguments and files, print one JSON
//! response, exit. Nothing is written to the store.

use std::path::Path;

use serde_json::{json, Value};

use crate::catalog::InMemoryCatalog;
use crate::config::StoreConfig;
use crate::evolution::HUMAN_SPECIES;
use crate::keycodec::{AuxiliaryAlleles, KeyCodec, StructuralBounds, VariantCoordinates, VariantType};
use crate::observability::Logger;
use crate::query::{Projection, QueryCompiler, QueryOptions, VariantQuery};
use crate::schema::{
    all_indices, cohort_freq_column, cohort_maf_column, cohort_mgf_column,
    cohort_pass_freq_column, cohort_stats_column, file_column, parse_dynamic_column,
    release_column, sample_column, sample_file_column, score_indices, study_column,
    variant_score_column, Column, DynamicColumn, VariantColumn,
};

use super::args::{Cli, ColumnKind, Command, SortArg};
use super::errors::{CliError, CliResult};
use super::io::{read_input, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    // stdout carries only the response
    Logger::stderr_only();
    let response = run_command(cli.command)?;
    write_response(response)
}

/// Run a command and return its response payload
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::EncodeKey {
            chrom,
            pos,
            reference,
            alternate,
            end,
            max_row_length,
        } => encode_key(&chrom, pos, &reference, &alternate, end, max_row_length),
        Command::DecodeKey {
            key,
            variant_type,
            alleles,
        } => decode_key(&key, variant_type.as_deref(), alleles.as_deref()),
        Command::Column { kind } => column(kind),
        Command::Ddl { config } => ddl(&config),
        Command::Compile {
            config,
            catalog,
            query,
            count,
            limit,
            skip,
            sort,
        } => compile(&config, &catalog, &query, count, limit, skip, sort),
    }
}

// =============================================================================
// Row keys
// =============================================================================

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(hex: &str) -> CliResult<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(CliError::invalid_argument(format!("Invalid hex key: {}", hex)));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| CliError::invalid_argument(format!("Invalid hex key: {}", hex)))
        })
        .collect()
}

pub fn encode_key(
    chromosome: &str,
    position: u32,
    reference: &str,
    alternate: &str,
    end: Option<u32>,
    max_row_length: usize,
) -> CliResult<Value> {
    let mut coords = VariantCoordinates::new(chromosome, position, reference, alternate);
    if let Some(end) = end {
        coords = coords.with_bounds(StructuralBounds::new(end));
    }
    let encoded = KeyCodec::new(max_row_length).encode(&coords)?;
    let mut response = json!({
        "key": to_hex(&encoded.key),
        "hashed": encoded.is_hashed(),
    });
    if let Some(auxiliary) = &encoded.auxiliary {
        response["type"] = json!(auxiliary.variant_type.as_str());
        response["alleles"] = json!(auxiliary.alleles);
    }
    Ok(response)
}

pub fn decode_key(key: &str, variant_type: Option<&str>, alleles: Option<&str>) -> CliResult<Value> {
    let key = from_hex(key)?;
    let auxiliary = match (variant_type, alleles) {
        (Some(variant_type), Some(alleles)) => Some(AuxiliaryAlleles {
            variant_type: variant_type.parse::<VariantType>()?,
            alleles: alleles.to_string(),
        }),
        _ => None,
    };
    let decoded = KeyCodec::default().decode(&key, auxiliary.as_ref())?;
    Ok(json!({
        "chromosome": decoded.chromosome,
        "position": decoded.position,
        "reference": decoded.reference,
        "alternate": decoded.alternate,
        "end": decoded.bounds.map(|b| b.end),
    }))
}

// =============================================================================
// Columns
// =============================================================================

fn column_json(column: &Column) -> Value {
    json!({
        "name": column.name,
        "type": column.sql_type.sql_name(),
    })
}

pub fn column(kind: ColumnKind) -> CliResult<Value> {
    let columns = match kind {
        ColumnKind::Study { study } => vec![study_column(study)],
        ColumnKind::File { study, file } => vec![file_column(study, file)],
        ColumnKind::Sample { study, sample, file: None } => vec![sample_column(study, sample)],
        ColumnKind::Sample {
            study,
            sample,
            file: Some(file),
        } => vec![sample_file_column(study, sample, file)],
        ColumnKind::Cohort { study, cohort } => vec![
            cohort_stats_column(study, cohort),
            cohort_freq_column(study, cohort),
            cohort_maf_column(study, cohort),
            cohort_mgf_column(study, cohort),
            cohort_pass_freq_column(study, cohort),
        ],
        ColumnKind::Score { study, score } => vec![variant_score_column(study, score)],
        ColumnKind::Release { release } => vec![release_column(release)],
        ColumnKind::Parse { name } => return parse_column(&name),
    };
    Ok(json!({ "columns": columns.iter().map(column_json).collect::<Vec<_>>() }))
}

fn parse_column(name: &str) -> CliResult<Value> {
    if let Some(column) = VariantColumn::from_name(name) {
        return Ok(json!({
            "name": column.name(),
            "type": column.sql_type().sql_name(),
            "dynamic": false,
        }));
    }
    let dynamic = parse_dynamic_column(name)
        .ok_or_else(|| CliError::invalid_argument(format!("Unknown column {}", name)))?;
    let id = match &dynamic {
        DynamicColumn::File { file, .. } => Some(*file),
        DynamicColumn::Sample { sample, .. } | DynamicColumn::SampleFile { sample, .. } => Some(*sample),
        DynamicColumn::CohortStats { cohort, .. }
        | DynamicColumn::CohortFreq { cohort, .. }
        | DynamicColumn::CohortMaf { cohort, .. }
        | DynamicColumn::CohortMgf { cohort, .. }
        | DynamicColumn::CohortPassFreq { cohort, .. } => Some(*cohort),
        DynamicColumn::VariantScore { score, .. } => Some(*score),
        DynamicColumn::Release { release } => Some(*release),
        DynamicColumn::Study { .. }
        | DynamicColumn::FillMissing { .. }
        | DynamicColumn::PopulationFrequency(_) => None,
    };
    Ok(json!({
        "name": dynamic.name(),
        "type": dynamic.sql_type().sql_name(),
        "dynamic": true,
        "study": dynamic.study(),
        "id": id,
    }))
}

// =============================================================================
// Statements
// =============================================================================

pub fn ddl(config_path: &Path) -> CliResult<Value> {
    let config = StoreConfig::load(config_path)?;
    let statements = config.statement_builder();

    let mut sql = Vec::new();
    sql.extend(statements.create_schema());
    sql.push(statements.create_table());
    let indices = if config.species == HUMAN_SPECIES {
        all_indices()
    } else {
        score_indices()
    };
    for index in &indices {
        sql.push(statements.create_index(index, false));
    }
    Ok(json!({ "statements": sql }))
}

pub fn compile(
    config_path: &Path,
    catalog_path: &Path,
    query_path: &Path,
    count: bool,
    limit: Option<u64>,
    skip: Option<u64>,
    sort: Option<SortArg>,
) -> CliResult<Value> {
    let config = StoreConfig::load(config_path)?;
    let catalog = InMemoryCatalog::load(catalog_path)?;
    let query = VariantQuery::from_json(&read_input(query_path)?)?;

    let mut options = if count {
        QueryOptions::count()
    } else {
        QueryOptions::new()
    };
    options.limit = limit;
    options.skip = skip;
    options.sort = sort.map(Into::into);

    let projection = Projection::from_query(&query, &catalog)?;
    let compiled = QueryCompiler::from_config(&config).compile(&query, &projection, &options, &catalog)?;
    Ok(json!({
        "sql": compiled.sql,
        "warnings": compiled.warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x31, 0x00, 0xff, 0x0a];
        assert_eq!(to_hex(&bytes), "3100ff0a");
        assert_eq!(from_hex("3100FF0a").unwrap(), bytes);
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }

    #[test]
    fn test_encode_then_decode_key() {
        let encoded = encode_key("chr1", 1000, "A", "C", None, 100).unwrap();
        assert_eq!(encoded["hashed"], json!(false));
        let key = encoded["key"].as_str().unwrap();

        let decoded = decode_key(key, None, None).unwrap();
        assert_eq!(decoded["chromosome"], json!("1"));
        assert_eq!(decoded["position"], json!(1000));
        assert_eq!(decoded["reference"], json!("A"));
        assert_eq!(decoded["alternate"], json!("C"));
    }

    #[test]
    fn test_column_cohort_lists_stats_columns() {
        let response = column(ColumnKind::Cohort { study: 1, cohort: 2 }).unwrap();
        let names: Vec<&str> = response["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "1_2_PB");
    }

    #[test]
    fn test_parse_column() {
        let response = parse_column("3_7_F").unwrap();
        assert_eq!(response["study"], json!(3));
        assert_eq!(response["id"], json!(7));
        assert_eq!(response["dynamic"], json!(true));

        let response = parse_column("CHROMOSOME").unwrap();
        assert_eq!(response["dynamic"], json!(false));

        assert!(parse_column("NOT_A_COLUMN").is_err());
    }
}
