//! Dynamic per-study column naming
//!
//! Every builder has an inverse in `parse_dynamic_column`. Names:
//!
//! | role            | name                | type          |
//! |-----------------|---------------------|---------------|
//! | study           | `{s}_ST`            | UNSIGNED_INT  |
//! | fill-missing    | `_{s}_FM`           | INTEGER       |
//! | file            | `{s}_{f}_F`         | VARCHAR ARRAY |
//! | sample          | `{s}_{x}_S`         | VARCHAR ARRAY |
//! | sample+file     | `{s}_{x}_{f}_S`     | VARCHAR ARRAY |
//! | cohort stats    | `{s}_{c}_PB`        | VARBINARY     |
//! | cohort freq     | `{s}_{c}_CF`        | FLOAT ARRAY   |
//! | cohort maf      | `{s}_{c}_MAF`       | FLOAT         |
//! | cohort mgf      | `{s}_{c}_MGF`       | FLOAT         |
//! | cohort passfreq | `{s}_{c}_PSF`       | FLOAT         |
//! | variant score   | `{s}_{v}_VS`        | FLOAT ARRAY   |
//! | release         | `R_{n}`             | BOOLEAN       |
//! | pop frequency   | `A_PF_{SRC}_{POP}`  | FLOAT ARRAY   |

use super::population::Population;
use super::types::{Column, SqlType};

pub const COLUMN_SEPARATOR: char = '_';
pub const RELEASE_PREFIX: &str = "R_";

const STUDY_SUFFIX: &str = "ST";
const FILL_MISSING_SUFFIX: &str = "FM";
const FILE_SUFFIX: &str = "F";
const SAMPLE_SUFFIX: &str = "S";
const COHORT_STATS_SUFFIX: &str = "PB";
const COHORT_FREQ_SUFFIX: &str = "CF";
const COHORT_MAF_SUFFIX: &str = "MAF";
const COHORT_MGF_SUFFIX: &str = "MGF";
const COHORT_PASS_FREQ_SUFFIX: &str = "PSF";
const VARIANT_SCORE_SUFFIX: &str = "VS";

/// Columns written per cohort
pub const COLUMNS_PER_COHORT: usize = 5;

/// A column whose name encodes catalog ids
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DynamicColumn {
    Study { study: u32 },
    FillMissing { study: u32 },
    File { study: u32, file: u32 },
    Sample { study: u32, sample: u32 },
    SampleFile { study: u32, sample: u32, file: u32 },
    CohortStats { study: u32, cohort: u32 },
    CohortFreq { study: u32, cohort: u32 },
    CohortMaf { study: u32, cohort: u32 },
    CohortMgf { study: u32, cohort: u32 },
    CohortPassFreq { study: u32, cohort: u32 },
    VariantScore { study: u32, score: u32 },
    Release { release: u32 },
    PopulationFrequency(Population),
}

impl DynamicColumn {
    pub fn name(&self) -> String {
        match self {
            DynamicColumn::Study { study } => format!("{}_{}", study, STUDY_SUFFIX),
            DynamicColumn::FillMissing { study } => format!("_{}_{}", study, FILL_MISSING_SUFFIX),
            DynamicColumn::File { study, file } => format!("{}_{}_{}", study, file, FILE_SUFFIX),
            DynamicColumn::Sample { study, sample } => {
                format!("{}_{}_{}", study, sample, SAMPLE_SUFFIX)
            }
            DynamicColumn::SampleFile { study, sample, file } => {
                format!("{}_{}_{}_{}", study, sample, file, SAMPLE_SUFFIX)
            }
            DynamicColumn::CohortStats { study, cohort } => {
                format!("{}_{}_{}", study, cohort, COHORT_STATS_SUFFIX)
            }
            DynamicColumn::CohortFreq { study, cohort } => {
                format!("{}_{}_{}", study, cohort, COHORT_FREQ_SUFFIX)
            }
            DynamicColumn::CohortMaf { study, cohort } => {
                format!("{}_{}_{}", study, cohort, COHORT_MAF_SUFFIX)
            }
            DynamicColumn::CohortMgf { study, cohort } => {
                format!("{}_{}_{}", study, cohort, COHORT_MGF_SUFFIX)
            }
            DynamicColumn::CohortPassFreq { study, cohort } => {
                format!("{}_{}_{}", study, cohort, COHORT_PASS_FREQ_SUFFIX)
            }
            DynamicColumn::VariantScore { study, score } => {
                format!("{}_{}_{}", study, score, VARIANT_SCORE_SUFFIX)
            }
            DynamicColumn::Release { release } => format!("{}{}", RELEASE_PREFIX, release),
            DynamicColumn::PopulationFrequency(population) => population.column_name(),
        }
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            DynamicColumn::Study { .. } => SqlType::UnsignedInt,
            DynamicColumn::FillMissing { .. } => SqlType::Integer,
            DynamicColumn::File { .. }
            | DynamicColumn::Sample { .. }
            | DynamicColumn::SampleFile { .. } => SqlType::VarcharArray,
            DynamicColumn::CohortStats { .. } => SqlType::Varbinary,
            DynamicColumn::CohortFreq { .. }
            | DynamicColumn::VariantScore { .. }
            | DynamicColumn::PopulationFrequency(_) => SqlType::FloatArray,
            DynamicColumn::CohortMaf { .. }
            | DynamicColumn::CohortMgf { .. }
            | DynamicColumn::CohortPassFreq { .. } => SqlType::Float,
            DynamicColumn::Release { .. } => SqlType::Boolean,
        }
    }

    pub fn column(&self) -> Column {
        Column::new(self.name(), self.sql_type())
    }

    /// Study the column belongs to, if any
    pub fn study(&self) -> Option<u32> {
        match self {
            DynamicColumn::Study { study }
            | DynamicColumn::FillMissing { study }
            | DynamicColumn::File { study, .. }
            | DynamicColumn::Sample { study, .. }
            | DynamicColumn::SampleFile { study, .. }
            | DynamicColumn::CohortStats { study, .. }
            | DynamicColumn::CohortFreq { study, .. }
            | DynamicColumn::CohortMaf { study, .. }
            | DynamicColumn::CohortMgf { study, .. }
            | DynamicColumn::CohortPassFreq { study, .. }
            | DynamicColumn::VariantScore { study, .. } => Some(*study),
            DynamicColumn::Release { .. } | DynamicColumn::PopulationFrequency(_) => None,
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn study_column(study: u32) -> Column {
    DynamicColumn::Study { study }.column()
}

pub fn fill_missing_column(study: u32) -> Column {
    DynamicColumn::FillMissing { study }.column()
}

pub fn file_column(study: u32, file: u32) -> Column {
    DynamicColumn::File { study, file }.column()
}

pub fn sample_column(study: u32, sample: u32) -> Column {
    DynamicColumn::Sample { study, sample }.column()
}

pub fn sample_file_column(study: u32, sample: u32, file: u32) -> Column {
    DynamicColumn::SampleFile { study, sample, file }.column()
}

pub fn cohort_stats_column(study: u32, cohort: u32) -> Column {
    DynamicColumn::CohortStats { study, cohort }.column()
}

pub fn cohort_freq_column(study: u32, cohort: u32) -> Column {
    DynamicColumn::CohortFreq { study, cohort }.column()
}

pub fn cohort_maf_column(study: u32, cohort: u32) -> Column {
    DynamicColumn::CohortMaf { study, cohort }.column()
}

pub fn cohort_mgf_column(study: u32, cohort: u32) -> Column {
    DynamicColumn::CohortMgf { study, cohort }.column()
}

pub fn cohort_pass_freq_column(study: u32, cohort: u32) -> Column {
    DynamicColumn::CohortPassFreq { study, cohort }.column()
}

pub fn variant_score_column(study: u32, score: u32) -> Column {
    DynamicColumn::VariantScore { study, score }.column()
}

pub fn release_column(release: u32) -> Column {
    DynamicColumn::Release { release }.column()
}

/// Study presence column and fill-missing counter
pub fn study_columns(study: u32) -> Vec<Column> {
    vec![study_column(study), fill_missing_column(study)]
}

/// `R_1 ..= R_{release}`
pub fn release_columns(release: u32) -> Vec<Column> {
    (1..=release).map(release_column).collect()
}

/// The five columns of one cohort
pub fn stats_columns(study: u32, cohort: u32) -> Vec<Column> {
    vec![
        cohort_stats_column(study, cohort),
        cohort_freq_column(study, cohort),
        cohort_maf_column(study, cohort),
        cohort_mgf_column(study, cohort),
        cohort_pass_freq_column(study, cohort),
    ]
}

/// Data columns of one sample.
///
/// A sample split across several files (`multi_file`) keeps its first file
/// in the bare sample column and each later file in a sample+file column.
/// `required_files` restricts which of those columns are returned; it does
/// not apply to single-file samples.
pub fn sample_columns(
    study: u32,
    sample: u32,
    files: &[u32],
    required_files: Option<&[u32]>,
    multi_file: bool,
) -> Vec<Column> {
    if !multi_file || files.is_empty() {
        return vec![sample_column(study, sample)];
    }
    let wanted = |file: &u32| required_files.map_or(true, |required| required.contains(file));

    let mut columns = Vec::with_capacity(files.len());
    if wanted(&files[0]) {
        columns.push(sample_column(study, sample));
    }
    for file in &files[1..] {
        if wanted(file) {
            columns.push(sample_file_column(study, sample, *file));
        }
    }
    columns
}

// =============================================================================
// Parsing
// =============================================================================

/// Leading study id of a `{s}_...` name
pub fn extract_study_id(name: &str) -> Option<u32> {
    let (study, _) = name.split_once(COLUMN_SEPARATOR)?;
    parse_id(study)
}

/// Id between the first separator at or after `offset` and the next one.
///
/// `extract_id("7_42_S", 0) == Some(42)`. The name itself must start with a digit.
pub fn extract_id(name: &str, offset: usize) -> Option<u32> {
    if !name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let start = offset + name.get(offset..)?.find(COLUMN_SEPARATOR)?;
    let end = start + 1 + name.get(start + 1..)?.find(COLUMN_SEPARATOR)?;
    parse_id(&name[start + 1..end])
}

fn parse_id(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Inverse of every dynamic column builder. Never panics.
pub fn parse_dynamic_column(name: &str) -> Option<DynamicColumn> {
    if let Some(release) = name.strip_prefix(RELEASE_PREFIX) {
        return parse_id(release).map(|release| DynamicColumn::Release { release });
    }
    if name.starts_with(super::population::POPULATION_FREQUENCY_PREFIX) {
        return Population::parse_column(name).map(DynamicColumn::PopulationFrequency);
    }
    if let Some(rest) = name.strip_prefix(COLUMN_SEPARATOR) {
        let study = rest.strip_suffix(FILL_MISSING_SUFFIX)?.strip_suffix(COLUMN_SEPARATOR)?;
        return parse_id(study).map(|study| DynamicColumn::FillMissing { study });
    }

    let study = extract_study_id(name)?;
    let parts: Vec<&str> = name.split(COLUMN_SEPARATOR).collect();
    match parts.as_slice() {
        [_, STUDY_SUFFIX] => Some(DynamicColumn::Study { study }),
        [_, _, suffix] => {
            let id = extract_id(name, 0)?;
            match *suffix {
                FILE_SUFFIX => Some(DynamicColumn::File { study, file: id }),
                SAMPLE_SUFFIX => Some(DynamicColumn::Sample { study, sample: id }),
                COHORT_STATS_SUFFIX => Some(DynamicColumn::CohortStats { study, cohort: id }),
                COHORT_FREQ_SUFFIX => Some(DynamicColumn::CohortFreq { study, cohort: id }),
                COHORT_MAF_SUFFIX => Some(DynamicColumn::CohortMaf { study, cohort: id }),
                COHORT_MGF_SUFFIX => Some(DynamicColumn::CohortMgf { study, cohort: id }),
                COHORT_PASS_FREQ_SUFFIX => {
                    Some(DynamicColumn::CohortPassFreq { study, cohort: id })
                }
                VARIANT_SCORE_SUFFIX => Some(DynamicColumn::VariantScore { study, score: id }),
                _ => None,
            }
        }
        [study_part, _, _, SAMPLE_SUFFIX] => {
            let sample = extract_id(name, 0)?;
            let file = extract_id(name, study_part.len() + 1)?;
            Some(DynamicColumn::SampleFile { study, sample, file })
        }
        _ => None,
    }
}
