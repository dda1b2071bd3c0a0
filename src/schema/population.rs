//! Population frequency sources and populations
//!
//! Column form: `A_PF_{SOURCE}_{POPULATION}`. Query form: `source:population`.

use std::fmt;

use super::types::{Column, SqlType};

pub const POPULATION_FREQUENCY_PREFIX: &str = "A_PF_";

/// Known sources, longest first so prefix matching is unambiguous
pub const KNOWN_SOURCES: [&str; 8] = [
    "GNOMAD_GENOMES",
    "GNOMAD_EXOMES",
    "1KG_PHASE3",
    "ESP6500",
    "1000G",
    "UK10K",
    "EXAC",
    "GONL",
];

const THOUSAND_GENOMES_POPULATIONS: [&str; 33] = [
    "ALL", "AFR", "AMR", "EAS", "EUR", "SAS", "ACB", "ASW", "BEB", "CDX", "CEU", "CHB", "CHD",
    "CHS", "CLM", "ESN", "FIN", "GBR", "GIH", "GWD", "IBS", "ITU", "JPT", "KHV", "LWK", "MSL",
    "MXL", "PEL", "PJL", "PUR", "STU", "TSI", "YRI",
];

const GNOMAD_POPULATIONS: [&str; 10] = [
    "ALL", "AFR", "AMR", "ASJ", "EAS", "FIN", "NFE", "OTH", "MALE", "FEMALE",
];

/// Populations that are always loaded, so never need null relaxation
const DEFAULT_POPULATIONS: [(&str, &[&str]); 7] = [
    ("1000G", &["ALL", "AFR", "AMR", "EAS", "EUR", "SAS"]),
    ("GNOMAD_GENOMES", &["ALL", "AFR", "AMR", "ASJ", "EAS", "FIN", "NFE", "OTH"]),
    ("GNOMAD_EXOMES", &["ALL"]),
    ("ESP6500", &["ALL"]),
    ("EXAC", &["ALL"]),
    ("GONL", &["ALL"]),
    ("UK10K", &["ALL"]),
];

/// Upper-case a source name and map legacy spellings
pub fn normalize_source(source: &str) -> String {
    let upper = source.to_ascii_uppercase();
    match upper.as_str() {
        "1000GENOMES_PHASE_3" => "1KG_PHASE3".to_string(),
        "ESP_6500" => "ESP6500".to_string(),
        _ => upper,
    }
}

/// A `(source, population)` pair in normalized form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Population {
    pub source: String,
    pub population: String,
}

impl Population {
    pub fn new(source: &str, population: &str) -> Self {
        Self {
            source: normalize_source(source),
            population: population.to_ascii_uppercase(),
        }
    }

    /// Parse the query form `source:population`
    pub fn parse_key(key: &str) -> Option<Self> {
        let (source, population) = key.split_once(':')?;
        if source.is_empty() || population.is_empty() {
            return None;
        }
        Some(Self::new(source, population))
    }

    /// Parse `A_PF_{SOURCE}_{POPULATION}`
    pub fn parse_column(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(POPULATION_FREQUENCY_PREFIX)?;
        for source in KNOWN_SOURCES {
            if let Some(population) = rest
                .strip_prefix(source)
                .and_then(|r| r.strip_prefix('_'))
            {
                if !population.is_empty() {
                    return Some(Self {
                        source: source.to_string(),
                        population: population.to_string(),
                    });
                }
            }
        }
        let (source, population) = rest.rsplit_once('_')?;
        if source.is_empty() || population.is_empty() {
            return None;
        }
        Some(Self {
            source: source.to_string(),
            population: population.to_string(),
        })
    }

    pub fn column_name(&self) -> String {
        format!("{}{}_{}", POPULATION_FREQUENCY_PREFIX, self.source, self.population)
    }

    /// `FLOAT ARRAY` of `[refFreq, altFreq]`
    pub fn column(&self) -> Column {
        Column::new(self.column_name(), SqlType::FloatArray)
    }

    pub fn is_default(&self) -> bool {
        DEFAULT_POPULATIONS
            .iter()
            .any(|(source, pops)| *source == self.source && pops.contains(&self.population.as_str()))
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.population)
    }
}

/// Population frequency columns registered for human projects
pub fn human_populations() -> Vec<Population> {
    let mut populations = Vec::new();
    let mut add = |source: &str, pops: &[&str]| {
        populations.extend(pops.iter().map(|p| Population::new(source, p)));
    };
    add("ESP6500", &["ALL", "EA", "AA"]);
    add("EXAC", &["ALL", "AFR", "AMR", "EAS", "FIN", "NFE", "OTH", "SAS"]);
    add("GONL", &["ALL"]);
    add("UK10K", &["ALL", "ALSPAC", "TWINSUK", "TWINSUK_NODUP"]);
    add("GNOMAD_GENOMES", &GNOMAD_POPULATIONS);
    add("GNOMAD_EXOMES", &GNOMAD_POPULATIONS);
    add("1KG_PHASE3", &THOUSAND_GENOMES_POPULATIONS);
    add("1000G", &THOUSAND_GENOMES_POPULATIONS);
    populations
}

pub fn human_population_columns() -> Vec<Column> {
    human_populations().iter().map(Population::column).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("1000GENOMES_phase_3"), "1KG_PHASE3");
        assert_eq!(normalize_source("ESP_6500"), "ESP6500");
        assert_eq!(normalize_source("gnomad_genomes"), "GNOMAD_GENOMES");
    }

    #[test]
    fn test_query_key() {
        let pop = Population::parse_key("gnomAD_genomes:nfe").unwrap();
        assert_eq!(pop.column_name(), "A_PF_GNOMAD_GENOMES_NFE");
        assert_eq!(pop.to_string(), "GNOMAD_GENOMES:NFE");
        assert!(Population::parse_key("GNOMAD").is_none());
        assert!(Population::parse_key(":ALL").is_none());
    }

    #[test]
    fn test_parse_column_prefers_known_source() {
        let pop = Population::parse_column("A_PF_GNOMAD_GENOMES_ALL").unwrap();
        assert_eq!(pop.source, "GNOMAD_GENOMES");
        assert_eq!(pop.population, "ALL");

        let pop = Population::parse_column("A_PF_UK10K_TWINSUK_NODUP").unwrap();
        assert_eq!(pop.source, "UK10K");
        assert_eq!(pop.population, "TWINSUK_NODUP");
    }

    #[test]
    fn test_parse_column_falls_back_to_last_separator() {
        let pop = Population::parse_column("A_PF_MY_SOURCE_XYZ").unwrap();
        assert_eq!(pop.source, "MY_SOURCE");
        assert_eq!(pop.population, "XYZ");
        assert!(Population::parse_column("A_PF_NOSEP").is_none());
        assert!(Population::parse_column("A_GENES").is_none());
    }

    #[test]
    fn test_human_columns_round_trip() {
        for pop in human_populations() {
            assert_eq!(Population::parse_column(&pop.column_name()), Some(pop));
        }
        assert_eq!(human_populations().len(), 3 + 8 + 1 + 4 + 10 + 10 + 33 + 33);
    }

    #[test]
    fn test_default_populations() {
        assert!(Population::new("1000G", "EUR").is_default());
        assert!(Population::new("gnomad_genomes", "nfe").is_default());
        assert!(Population::new("EXAC", "ALL").is_default());
        assert!(!Population::new("EXAC", "AFR").is_default());
        assert!(!Population::new("1000G", "GBR").is_default());
        assert!(!Population::new("1kG_phase3", "ALL").is_default());
    }
}
