//! Sequence Ontology consequence types and the
//! biotype/consequence-type/transcript-flag combination
//!
//! Annotation rows carry pre-combined columns (`A_GENE_SO`, `A_BT_SO`, ...)
//! so a query naming a gene together with a consequence type can be
//! answered with one `ANY()` lookup instead of two independent ones.

use std::fmt;

use super::errors::{QueryError, QueryResult};
use super::params::{QueryParam, VariantQuery};
use super::values::split_values;

/// Separator between the parts of a combined annotation token
pub const COMBINATION_SEPARATOR: &str = "_";

pub const LOF: &str = "lof";
pub const LOSS_OF_FUNCTION: &str = "loss_of_function";
pub const PA: &str = "pa";
pub const PROTEIN_ALTERING: &str = "protein_altering";

/// `(term, accession)` without the `SO:` prefix
const SO_TERMS: [(&str, u32); 38] = [
    ("transcript_ablation", 1893),
    ("splice_acceptor_variant", 1574),
    ("splice_donor_variant", 1575),
    ("stop_gained", 1587),
    ("frameshift_variant", 1589),
    ("stop_lost", 1578),
    ("start_lost", 2012),
    ("transcript_amplification", 1889),
    ("inframe_insertion", 1821),
    ("inframe_deletion", 1822),
    ("missense_variant", 1583),
    ("protein_altering_variant", 1818),
    ("splice_region_variant", 1630),
    ("incomplete_terminal_codon_variant", 1626),
    ("stop_retained_variant", 1567),
    ("synonymous_variant", 1819),
    ("coding_sequence_variant", 1580),
    ("mature_miRNA_variant", 1620),
    ("5_prime_UTR_variant", 1623),
    ("3_prime_UTR_variant", 1624),
    ("non_coding_transcript_exon_variant", 1792),
    ("intron_variant", 1627),
    ("NMD_transcript_variant", 1621),
    ("non_coding_transcript_variant", 1619),
    ("upstream_gene_variant", 1631),
    ("downstream_gene_variant", 1632),
    ("TFBS_ablation", 1895),
    ("TFBS_amplification", 1892),
    ("TF_binding_site_variant", 1782),
    ("regulatory_region_ablation", 1894),
    ("regulatory_region_amplification", 1891),
    ("feature_elongation", 1907),
    ("regulatory_region_variant", 1566),
    ("feature_truncation", 1906),
    ("intergenic_variant", 1628),
    ("initiator_codon_variant", 1582),
    ("2KB_upstream_variant", 1636),
    ("2KB_downstream_variant", 2083),
];

pub const LOSS_OF_FUNCTION_TERMS: [&str; 9] = [
    "frameshift_variant",
    "incomplete_terminal_codon_variant",
    "start_lost",
    "stop_gained",
    "stop_lost",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "feature_truncation",
    "transcript_ablation",
];

const PROTEIN_ALTERING_EXTRA_TERMS: [&str; 3] =
    ["inframe_deletion", "inframe_insertion", "missense_variant"];

/// Transcript flags that are pre-combined with consequence types
pub const IMPORTANT_TRANSCRIPT_FLAGS: [&str; 8] = [
    "canonical",
    "MANE Select",
    "MANE Plus Clinical",
    "CCDS",
    "basic",
    "LRG",
    "EGLH_HaemOnc",
    "TSO500",
];

pub fn so_accession(term: &str) -> Option<u32> {
    SO_TERMS.iter().find(|(t, _)| *t == term).map(|(_, a)| *a)
}

pub fn so_term(accession: u32) -> Option<&'static str> {
    SO_TERMS.iter().find(|(_, a)| *a == accession).map(|(t, _)| *t)
}

/// Accession of a term, `SO:0001587` or bare `1587`
pub fn parse_consequence_type(so: &str) -> QueryResult<u32> {
    let param = QueryParam::ConsequenceType.key();
    let numeric = if so.get(..3).map_or(false, |p| p.eq_ignore_ascii_case("SO:")) {
        Some(&so[3..])
    } else if !so.is_empty() && so.chars().all(|c| c.is_ascii_digit()) {
        Some(so)
    } else {
        None
    };
    match numeric {
        Some(digits) => {
            let accession: u32 = digits
                .parse()
                .map_err(|_| QueryError::malformed(param, so, "Not a valid SO number"))?;
            if so_term(accession).is_none() {
                return Err(QueryError::malformed(param, so, "Not a valid SO number"));
            }
            Ok(accession)
        }
        None => {
            so_accession(so).ok_or_else(|| QueryError::malformed(param, so, "Not a valid Accession term"))
        }
    }
}

/// Expand `lof`/`pa` and normalize every entry to its term. Order is kept,
/// duplicates dropped.
pub fn parse_consequence_types(values: &[String]) -> QueryResult<Vec<&'static str>> {
    let mut terms: Vec<&'static str> = Vec::new();
    for value in values {
        let expanded: Vec<&'static str> =
            if value.eq_ignore_ascii_case(LOF) || value.eq_ignore_ascii_case(LOSS_OF_FUNCTION) {
                LOSS_OF_FUNCTION_TERMS.to_vec()
            } else if value.eq_ignore_ascii_case(PA) || value.eq_ignore_ascii_case(PROTEIN_ALTERING) {
                LOSS_OF_FUNCTION_TERMS
                    .iter()
                    .chain(PROTEIN_ALTERING_EXTRA_TERMS.iter())
                    .copied()
                    .collect()
            } else {
                so_term(parse_consequence_type(value)?).into_iter().collect()
            };
        for term in expanded {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    Ok(terms)
}

/// Accessions of the consequence types in `values`
pub fn consequence_accessions(values: &[String]) -> QueryResult<Vec<u32>> {
    Ok(parse_consequence_types(values)?
        .into_iter()
        .filter_map(so_accession)
        .collect())
}

/// Join the parts of a combined annotation token
pub fn combine(parts: &[&str]) -> String {
    parts.join(COMBINATION_SEPARATOR)
}

/// Which of consequence type, biotype and transcript flag a query combines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    None,
    Ct,
    Flag,
    Biotype,
    BiotypeFlag,
    BiotypeCt,
    CtFlag,
    BiotypeCtFlag,
}

impl Combination {
    /// Pick the combination from the present parameters.
    ///
    /// The transcript flag only counts when every flag is one of
    /// `IMPORTANT_TRANSCRIPT_FLAGS`.
    pub fn from_query(query: &VariantQuery) -> QueryResult<Combination> {
        let biotype = query.is_valid(QueryParam::Biotype);
        let ct = query.is_valid(QueryParam::ConsequenceType);
        let flag = match query.value(QueryParam::TranscriptFlag) {
            Some(value) => {
                let (_, flags) = split_values(value)?;
                flags
                    .iter()
                    .all(|f| IMPORTANT_TRANSCRIPT_FLAGS.contains(&f.as_str()))
            }
            None => false,
        };
        Ok(match (biotype, ct, flag) {
            (false, false, false) => Combination::None,
            (false, true, false) => Combination::Ct,
            (false, false, true) => Combination::Flag,
            (true, false, false) => Combination::Biotype,
            (true, false, true) => Combination::BiotypeFlag,
            (true, true, false) => Combination::BiotypeCt,
            (false, true, true) => Combination::CtFlag,
            (true, true, true) => Combination::BiotypeCtFlag,
        })
    }

    /// Whether the transcript flag takes part in the combination
    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            Combination::Flag
                | Combination::BiotypeFlag
                | Combination::CtFlag
                | Combination::BiotypeCtFlag
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Combination::None => "NONE",
            Combination::Ct => "CT",
            Combination::Flag => "FLAG",
            Combination::Biotype => "BIOTYPE",
            Combination::BiotypeFlag => "BIOTYPE_FLAG",
            Combination::BiotypeCt => "BIOTYPE_CT",
            Combination::CtFlag => "CT_FLAG",
            Combination::BiotypeCtFlag => "BIOTYPE_CT_FLAG",
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_consequence_type_forms() {
        assert_eq!(parse_consequence_type("stop_gained").unwrap(), 1587);
        assert_eq!(parse_consequence_type("SO:0001587").unwrap(), 1587);
        assert_eq!(parse_consequence_type("so:0001587").unwrap(), 1587);
        assert_eq!(parse_consequence_type("1587").unwrap(), 1587);
    }

    #[test]
    fn test_parse_consequence_type_rejects_unknown() {
        for bad in ["stop_gainedd", "SO:9999999", "SO:abc", "42"] {
            let err = parse_consequence_type(bad).unwrap_err();
            assert_eq!(err.code(), "VS_QUERY_MALFORMED_PARAM", "{}", bad);
        }
    }

    #[test]
    fn test_lof_and_pa_expand() {
        let lof = parse_consequence_types(&strings(&["LoF"])).unwrap();
        assert_eq!(lof.len(), 9);
        let pa = parse_consequence_types(&strings(&["protein_altering", "missense_variant"])).unwrap();
        assert_eq!(pa.len(), 12);
        assert!(pa.contains(&"missense_variant"));
    }

    #[test]
    fn test_combination_from_query() {
        let base = VariantQuery::new();
        assert_eq!(Combination::from_query(&base).unwrap(), Combination::None);

        let q = base.clone().with(QueryParam::ConsequenceType, "missense_variant");
        assert_eq!(Combination::from_query(&q).unwrap(), Combination::Ct);

        let q = q.with(QueryParam::TranscriptFlag, "basic");
        assert_eq!(Combination::from_query(&q).unwrap(), Combination::CtFlag);

        let q = q.with(QueryParam::Biotype, "protein_coding");
        assert_eq!(Combination::from_query(&q).unwrap(), Combination::BiotypeCtFlag);

        // A flag outside the important set is not combined
        let q = base
            .with(QueryParam::Biotype, "protein_coding")
            .with(QueryParam::TranscriptFlag, "basic,cds_start_NF");
        assert_eq!(Combination::from_query(&q).unwrap(), Combination::Biotype);
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine(&["BRCA2", "1587"]), "BRCA2_1587");
        assert_eq!(combine(&["BRCA2", "protein_coding", "1587"]), "BRCA2_protein_coding_1587");
    }
}
