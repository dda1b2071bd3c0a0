//! Column naming tests
//!
//! Dynamic column names are reversible, never collide with static names and
//! always carry their study id.

use variant_store::schema::{
    extract_id, extract_study_id, human_population_columns, human_populations,
    parse_dynamic_column, release_columns, sample_columns, sample_file_column, stats_columns,
    study_columns, DynamicColumn, Population, VariantColumn, COLUMNS_PER_COHORT,
};

// =============================================================================
// Helper Functions
// =============================================================================

const IDS: [u32; 6] = [0, 1, 9, 10, 123, 4_000_000];

fn generated_columns() -> Vec<DynamicColumn> {
    let mut columns = Vec::new();
    for study in IDS {
        columns.push(DynamicColumn::Study { study });
        columns.push(DynamicColumn::FillMissing { study });
        for id in IDS {
            columns.push(DynamicColumn::File { study, file: id });
            columns.push(DynamicColumn::Sample { study, sample: id });
            columns.push(DynamicColumn::CohortStats { study, cohort: id });
            columns.push(DynamicColumn::CohortFreq { study, cohort: id });
            columns.push(DynamicColumn::CohortMaf { study, cohort: id });
            columns.push(DynamicColumn::CohortMgf { study, cohort: id });
            columns.push(DynamicColumn::CohortPassFreq { study, cohort: id });
            columns.push(DynamicColumn::VariantScore { study, score: id });
            for file in IDS {
                columns.push(DynamicColumn::SampleFile {
                    study,
                    sample: id,
                    file,
                });
            }
        }
    }
    for release in 1..=12 {
        columns.push(DynamicColumn::Release { release });
    }
    columns
}

// =============================================================================
// Reversibility Tests
// =============================================================================

#[test]
fn test_every_generated_name_parses_back() {
    for column in generated_columns() {
        let name = column.name();
        assert_eq!(parse_dynamic_column(&name), Some(column), "{}", name);
    }
}

#[test]
fn test_population_columns_parse_back() {
    for population in human_populations() {
        let name = population.column_name();
        assert_eq!(
            parse_dynamic_column(&name),
            Some(DynamicColumn::PopulationFrequency(population)),
            "{}",
            name
        );
    }
    assert_eq!(human_population_columns().len(), human_populations().len());
}

#[test]
fn test_population_key_and_column_agree() {
    let population = Population::parse_key("gnomad_genomes:afr").unwrap();
    assert_eq!(population.column_name(), "A_PF_GNOMAD_GENOMES_AFR");
    assert!(population.is_default());
    assert!(!Population::new("GNOMAD_GENOMES", "MALE").is_default());
    assert!(Population::parse_key("GNOMAD_GENOMES").is_none());
}

#[test]
fn test_names_carry_their_study() {
    for column in generated_columns() {
        let name = column.name();
        match column.study() {
            Some(study) if !name.starts_with('_') => {
                assert_eq!(extract_study_id(&name), Some(study), "{}", name);
            }
            _ => {}
        }
    }
    assert_eq!(extract_id("7_42_S", 0), Some(42));
    assert_eq!(extract_id("7_42_5_S", 2), Some(5));
    assert_eq!(extract_id("A_SO", 0), None);
}

#[test]
fn test_static_and_dynamic_names_are_disjoint() {
    for column in VariantColumn::all() {
        assert_eq!(parse_dynamic_column(column.name()), None, "{}", column.name());
    }
    for column in generated_columns() {
        assert_eq!(VariantColumn::from_name(&column.name()), None);
    }
}

#[test]
fn test_garbage_names_do_not_parse() {
    for name in ["", "_", "1_", "x_ST", "1_x_F", "1_2_ZZ", "R_", "R_x", "A_PF_", "__1_", "1_2_3_4_S"] {
        assert_eq!(parse_dynamic_column(name), None, "{}", name);
    }
}

// =============================================================================
// Column Group Tests
// =============================================================================

#[test]
fn test_column_groups() {
    assert_eq!(study_columns(4).len(), 2);
    assert_eq!(stats_columns(4, 0).len(), COLUMNS_PER_COHORT);
    let releases: Vec<String> = release_columns(3).into_iter().map(|c| c.name).collect();
    assert_eq!(releases, vec!["R_1", "R_2", "R_3"]);
    assert!(release_columns(0).is_empty());
}

#[test]
fn test_multi_file_sample_columns() {
    let files = [10, 11, 12];
    let names = |columns: Vec<variant_store::schema::Column>| -> Vec<String> {
        columns.into_iter().map(|c| c.name).collect()
    };

    assert_eq!(names(sample_columns(1, 5, &files, None, false)), vec!["1_5_S"]);
    assert_eq!(
        names(sample_columns(1, 5, &files, None, true)),
        vec!["1_5_S", "1_5_11_S", "1_5_12_S"]
    );
    assert_eq!(
        names(sample_columns(1, 5, &files, Some(&[12]), true)),
        vec![sample_file_column(1, 5, 12).name]
    );
}
