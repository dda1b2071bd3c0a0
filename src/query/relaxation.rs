//! When a comparison also has to accept NULL
//!
//! Sparse columns are NULL where nothing was loaded. A filter like
//! `maf < 0.01` must still match those rows when the missing value means
//! "zero" for the row: a study not forced into the result, a population
//! that is not loaded for every variant.

use super::values::QueryOperation;

/// Cohort statistic a filter compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    RefFreq,
    AltFreq,
    Maf,
    Mgf,
    PassFreq,
}

/// Population frequency field a filter compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationKind {
    Maf,
    AltFreq,
    RefFreq,
}

/// Plain `<`/`<=` only. The `<<` forms carry their own NULL clause.
fn is_less_than(op: &str) -> bool {
    matches!(op, "<" | "<=")
}

fn is_greater_than(op: &str) -> bool {
    matches!(op, ">" | ">=")
}

/// `true` when the operator points the way that a missing value satisfies.
///
/// A missing reference frequency reads as 1, so only `>` matches; every
/// other statistic reads as 0, so only `<` matches.
pub fn stats_direction_matches(kind: StatsKind, op: &str) -> bool {
    match kind {
        StatsKind::RefFreq => is_greater_than(op),
        StatsKind::AltFreq | StatsKind::Maf | StatsKind::Mgf | StatsKind::PassFreq => {
            is_less_than(op)
        }
    }
}

/// Whether a cohort stats filter gets `OR col IS NULL`.
///
/// Rows of a study that is not mandatorily included may lack the column
/// entirely. With an OR across studies every study is optional.
pub fn stats_null_relaxation(
    kind: StatsKind,
    op: &str,
    study: u32,
    mandatory_studies: &[u32],
    study_operation: Option<QueryOperation>,
) -> bool {
    stats_direction_matches(kind, op)
        && (!mandatory_studies.contains(&study) || study_operation == Some(QueryOperation::Or))
}

/// Whether a population frequency filter gets `OR col[n] IS NULL`.
///
/// Default populations are loaded for every annotated variant, so a NULL
/// there never means "not observed".
pub fn population_null_relaxation(kind: PopulationKind, op: &str, default_population: bool) -> bool {
    if default_population {
        return false;
    }
    match kind {
        PopulationKind::Maf | PopulationKind::AltFreq => is_less_than(op),
        PopulationKind::RefFreq => is_greater_than(op),
    }
}

/// The study filter adds nothing when it asks for every study with OR,
/// or for the only study there is.
///
/// `required` holds the non-negated studies of the filter. Negated
/// studies always make the filter meaningful.
pub fn study_filter_is_redundant(
    required: &[u32],
    negated: &[u32],
    all_studies: &[u32],
    operation: Option<QueryOperation>,
) -> bool {
    if !negated.is_empty() || all_studies.is_empty() {
        return false;
    }
    let covers_all = all_studies.iter().all(|s| required.contains(s))
        && required.iter().all(|s| all_studies.contains(s));
    covers_all && (operation == Some(QueryOperation::Or) || all_studies.len() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OR: Option<QueryOperation> = Some(QueryOperation::Or);
    const AND: Option<QueryOperation> = Some(QueryOperation::And);

    #[test]
    fn test_stats_direction() {
        let cases = [
            (StatsKind::RefFreq, ">", true),
            (StatsKind::RefFreq, ">=", true),
            (StatsKind::RefFreq, "<", false),
            (StatsKind::AltFreq, "<", true),
            (StatsKind::AltFreq, "<=", true),
            (StatsKind::AltFreq, ">", false),
            (StatsKind::Maf, "<", true),
            (StatsKind::Mgf, "<=", true),
            (StatsKind::PassFreq, "<", true),
            (StatsKind::PassFreq, "=", false),
            (StatsKind::Maf, "<<", false),
            (StatsKind::Maf, "<<=", false),
            (StatsKind::RefFreq, ">>", false),
            (StatsKind::RefFreq, ">>=", false),
        ];
        for (kind, op, expected) in cases {
            assert_eq!(stats_direction_matches(kind, op), expected, "{:?} {}", kind, op);
        }
    }

    #[test]
    fn test_stats_null_relaxation_table() {
        // (op, study, mandatory, study op) → relax
        let cases: [(&str, u32, &[u32], Option<QueryOperation>, bool); 8] = [
            ("<", 1, &[1], None, false),
            ("<", 1, &[1], AND, false),
            ("<", 1, &[1], OR, true),
            ("<", 2, &[1], None, true),
            ("<", 2, &[1], AND, true),
            ("<", 1, &[], None, true),
            (">", 2, &[1], OR, false),
            (">", 1, &[], None, false),
        ];
        for (op, study, mandatory, study_op, expected) in cases {
            assert_eq!(
                stats_null_relaxation(StatsKind::Maf, op, study, mandatory, study_op),
                expected,
                "{} {} {:?} {:?}",
                op,
                study,
                mandatory,
                study_op
            );
        }
    }

    #[test]
    fn test_ref_freq_relaxes_on_greater_than() {
        assert!(stats_null_relaxation(StatsKind::RefFreq, ">=", 3, &[1], AND));
        assert!(!stats_null_relaxation(StatsKind::RefFreq, "<", 3, &[1], AND));
    }

    #[test]
    fn test_population_null_relaxation_table() {
        let cases = [
            (PopulationKind::Maf, "<", false, true),
            (PopulationKind::Maf, "<", true, false),
            (PopulationKind::Maf, ">", false, false),
            (PopulationKind::AltFreq, "<=", false, true),
            (PopulationKind::AltFreq, ">", false, false),
            (PopulationKind::RefFreq, ">", false, true),
            (PopulationKind::RefFreq, ">", true, false),
            (PopulationKind::RefFreq, "<", false, false),
            (PopulationKind::AltFreq, "<<", false, false),
            (PopulationKind::RefFreq, ">>=", false, false),
        ];
        for (kind, op, default, expected) in cases {
            assert_eq!(
                population_null_relaxation(kind, op, default),
                expected,
                "{:?} {} {}",
                kind,
                op,
                default
            );
        }
    }

    #[test]
    fn test_study_filter_is_redundant() {
        assert!(study_filter_is_redundant(&[1, 2], &[], &[1, 2], OR));
        assert!(!study_filter_is_redundant(&[1, 2], &[], &[1, 2], AND));
        assert!(study_filter_is_redundant(&[1], &[], &[1], None));
        assert!(!study_filter_is_redundant(&[1], &[], &[1, 2], None));
        assert!(!study_filter_is_redundant(&[1], &[2], &[1, 2], OR));
        assert!(!study_filter_is_redundant(&[], &[], &[], OR));
    }
}
