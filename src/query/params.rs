//! Query parameters and options

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{QueryError, QueryResult};

/// Region value that tells the compiler gene regions were already applied
pub const SKIP_GENE_REGIONS: &str = "SKIP";

macro_rules! query_params {
    ($($variant:ident => $key:literal,)*) => {
        /// Logical query parameters, keyed by their wire name
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum QueryParam {
            $($variant,)*
        }

        impl QueryParam {
            pub fn key(&self) -> &'static str {
                match self {
                    $(QueryParam::$variant => $key,)*
                }
            }

            pub fn all() -> &'static [QueryParam] {
                &[$(QueryParam::$variant,)*]
            }
        }
    };
}

query_params! {
    Region => "region",
    Id => "id",
    Xref => "xref",
    Gene => "gene",
    GeneRegions => "geneRegions",
    Reference => "reference",
    Alternate => "alternate",
    Type => "type",
    Study => "study",
    File => "file",
    Filter => "filter",
    Qual => "qual",
    FileData => "fileData",
    SampleData => "sampleData",
    Cohort => "cohort",
    Genotype => "genotype",
    Score => "score",
    Release => "release",
    AnnotationExists => "annotationExists",
    ConsequenceType => "ct",
    Biotype => "biotype",
    TranscriptFlag => "transcriptFlag",
    Sift => "sift",
    Polyphen => "polyphen",
    ProteinSubstitution => "proteinSubstitution",
    Conservation => "conservation",
    FunctionalScore => "functionalScore",
    PopulationMaf => "populationFrequencyMaf",
    PopulationAlt => "populationFrequencyAlt",
    PopulationRef => "populationFrequencyRef",
    GeneTraitId => "geneTraitId",
    GeneTraitName => "geneTraitName",
    Hpo => "hpo",
    GoGenes => "goGenes",
    ExpressionGenes => "expressionGenes",
    ProteinKeyword => "proteinKeyword",
    Drug => "drug",
    ClinicalSignificance => "clinicalSignificance",
    StatsRef => "cohortStatsRef",
    StatsAlt => "cohortStatsAlt",
    StatsMaf => "cohortStatsMaf",
    StatsMgf => "cohortStatsMgf",
    StatsPassFreq => "cohortStatsPass",
    MissingAlleles => "missingAlleles",
    MissingGenotypes => "missingGenotypes",
    SampleMendelianError => "sampleMendelianError",
    SampleDeNovo => "sampleDeNovo",
    SampleCompoundHeterozygous => "sampleCompoundHeterozygous",
    IncludeStudy => "includeStudy",
    IncludeFile => "includeFile",
    IncludeSample => "includeSample",
}

impl QueryParam {
    pub fn from_key(key: &str) -> Option<QueryParam> {
        QueryParam::all().iter().find(|p| p.key() == key).copied()
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for QueryParam {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryParam::from_key(s).ok_or_else(|| QueryError::unknown("param", s))
    }
}

/// A variant query: parameter → raw value in the query language
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantQuery {
    params: BTreeMap<QueryParam, String>,
}

impl VariantQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, param: QueryParam, value: impl Into<String>) -> Self {
        self.set(param, value);
        self
    }

    pub fn set(&mut self, param: QueryParam, value: impl Into<String>) {
        self.params.insert(param, value.into());
    }

    pub fn get(&self, param: QueryParam) -> Option<&str> {
        self.params.get(&param).map(String::as_str)
    }

    /// Present with a non-empty value
    pub fn is_valid(&self, param: QueryParam) -> bool {
        self.get(param).map_or(false, |v| !v.trim().is_empty())
    }

    /// Value of a valid parameter
    pub fn value(&self, param: QueryParam) -> Option<&str> {
        self.get(param).filter(|v| !v.trim().is_empty())
    }

    pub fn remove(&mut self, param: QueryParam) -> Option<String> {
        self.params.remove(&param)
    }

    pub fn params(&self) -> impl Iterator<Item = (QueryParam, &str)> {
        self.params.iter().map(|(p, v)| (*p, v.as_str()))
    }

    /// Parse a JSON object of `key → value`. Non-string values are rendered
    /// as JSON text (`true`, `3`).
    pub fn from_json(json: &str) -> QueryResult<Self> {
        let object: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| QueryError::malformed("query", json, e.to_string()))?;
        let mut query = VariantQuery::new();
        for (key, value) in object {
            let param: QueryParam = key.parse()?;
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            query.set(param, text);
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            _ => Err(QueryError::malformed("order", s, "expected asc or desc")),
        }
    }
}

/// Result shaping options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub count: bool,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub sort: Option<SortOrder>,
    /// Extra optimizer hints, e.g. `NO_INDEX`
    pub hints: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count() -> Self {
        Self {
            count: true,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_sort(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}
