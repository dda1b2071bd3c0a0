//! Static column catalog
//!
//! Every variants table carries these columns. Dynamic per-study columns
//! live in `dynamic`.

use std::fmt;

use super::errors::{SchemaError, SchemaResult};
use super::types::{Column, SqlType};

/// Columns present in every variants table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantColumn {
    Chromosome,
    Position,
    Reference,
    Alternate,
    CiStartL,
    CiStartR,
    CiEndL,
    CiEndR,
    Type,
    /// Original `REF,ALT` of a row whose key holds hashed alleles
    Alleles,

    SoAnnotationId,
    So,
    Genes,
    GeneSo,
    BiotypeSo,
    GeneBiotypeSo,
    GeneBiotype,
    GeneSoFlag,
    SoFlag,
    Biotype,
    Transcripts,
    TranscriptFlags,
    GeneTraitName,
    GeneTraitId,
    Clinical,
    ClinicalSignificance,
    ProteinKeywords,
    Drug,
    Xrefs,

    Polyphen,
    PolyphenDesc,
    Sift,
    SiftDesc,

    Phastcons,
    Phylop,
    Gerp,
    CaddScaled,
    CaddRaw,

    FullAnnotation,

    IndexNotSync,
    IndexUnknown,
    IndexStudies,
}

/// Row key columns, in key order
pub const PRIMARY_KEY: [VariantColumn; 4] = [
    VariantColumn::Chromosome,
    VariantColumn::Position,
    VariantColumn::Reference,
    VariantColumn::Alternate,
];

const ALL_COLUMNS: [VariantColumn; 42] = [
    VariantColumn::Chromosome,
    VariantColumn::Position,
    VariantColumn::Reference,
    VariantColumn::Alternate,
    VariantColumn::CiStartL,
    VariantColumn::CiStartR,
    VariantColumn::CiEndL,
    VariantColumn::CiEndR,
    VariantColumn::Type,
    VariantColumn::Alleles,
    VariantColumn::SoAnnotationId,
    VariantColumn::So,
    VariantColumn::Genes,
    VariantColumn::GeneSo,
    VariantColumn::BiotypeSo,
    VariantColumn::GeneBiotypeSo,
    VariantColumn::GeneBiotype,
    VariantColumn::GeneSoFlag,
    VariantColumn::SoFlag,
    VariantColumn::Biotype,
    VariantColumn::Transcripts,
    VariantColumn::TranscriptFlags,
    VariantColumn::GeneTraitName,
    VariantColumn::GeneTraitId,
    VariantColumn::Clinical,
    VariantColumn::ClinicalSignificance,
    VariantColumn::ProteinKeywords,
    VariantColumn::Drug,
    VariantColumn::Xrefs,
    VariantColumn::Polyphen,
    VariantColumn::PolyphenDesc,
    VariantColumn::Sift,
    VariantColumn::SiftDesc,
    VariantColumn::Phastcons,
    VariantColumn::Phylop,
    VariantColumn::Gerp,
    VariantColumn::CaddScaled,
    VariantColumn::CaddRaw,
    VariantColumn::FullAnnotation,
    VariantColumn::IndexNotSync,
    VariantColumn::IndexUnknown,
    VariantColumn::IndexStudies,
];

impl VariantColumn {
    pub fn all() -> &'static [VariantColumn] {
        &ALL_COLUMNS
    }

    pub fn name(&self) -> &'static str {
        match self {
            VariantColumn::Chromosome => "CHROMOSOME",
            VariantColumn::Position => "POSITION",
            VariantColumn::Reference => "REFERENCE",
            VariantColumn::Alternate => "ALTERNATE",
            VariantColumn::CiStartL => "CI_START_L",
            VariantColumn::CiStartR => "CI_START_R",
            VariantColumn::CiEndL => "CI_END_L",
            VariantColumn::CiEndR => "CI_END_R",
            VariantColumn::Type => "TYPE",
            VariantColumn::Alleles => "ALLELES",
            VariantColumn::SoAnnotationId => "A_ID",
            VariantColumn::So => "A_SO",
            VariantColumn::Genes => "A_GENES",
            VariantColumn::GeneSo => "A_GENE_SO",
            VariantColumn::BiotypeSo => "A_BT_SO",
            VariantColumn::GeneBiotypeSo => "A_GENE_BT_SO",
            VariantColumn::GeneBiotype => "A_GENE_BT",
            VariantColumn::GeneSoFlag => "A_GENE_SO_FLAG",
            VariantColumn::SoFlag => "A_SO_FLAG",
            VariantColumn::Biotype => "A_BIOTYPE",
            VariantColumn::Transcripts => "A_TRANSCRIPTS",
            VariantColumn::TranscriptFlags => "A_FLAGS",
            VariantColumn::GeneTraitName => "A_GT_NAME",
            VariantColumn::GeneTraitId => "A_GT_ID",
            VariantColumn::Clinical => "A_CLI",
            VariantColumn::ClinicalSignificance => "A_CLI_SIG",
            VariantColumn::ProteinKeywords => "A_PROT_KW",
            VariantColumn::Drug => "A_DRUG",
            VariantColumn::Xrefs => "A_XREFS",
            VariantColumn::Polyphen => "A_POLYPHEN",
            VariantColumn::PolyphenDesc => "A_POLYPHEN_DESC",
            VariantColumn::Sift => "A_SIFT",
            VariantColumn::SiftDesc => "A_SIFT_DESC",
            VariantColumn::Phastcons => "A_PHASTCONS",
            VariantColumn::Phylop => "A_PHYLOP",
            VariantColumn::Gerp => "A_GERP",
            VariantColumn::CaddScaled => "A_FS_CADD_SC",
            VariantColumn::CaddRaw => "A_FS_CADD_R",
            VariantColumn::FullAnnotation => "A_FULL",
            VariantColumn::IndexNotSync => "_IDX_N",
            VariantColumn::IndexUnknown => "_IDX_U",
            VariantColumn::IndexStudies => "_IDX_ST_",
        }
    }

    pub fn sql_type(&self) -> SqlType {
        use VariantColumn::*;
        match self {
            Chromosome | Reference | Alternate | Type | Alleles | FullAnnotation => SqlType::Varchar,
            Position | CiStartL | CiStartR | CiEndL | CiEndR => SqlType::UnsignedInt,
            SoAnnotationId => SqlType::Integer,
            So | IndexStudies => SqlType::IntegerArray,
            Genes | GeneSo | BiotypeSo | GeneBiotypeSo | GeneBiotype | GeneSoFlag | SoFlag
            | Biotype | Transcripts | TranscriptFlags | GeneTraitName | GeneTraitId | Clinical
            | ClinicalSignificance | ProteinKeywords | Drug | Xrefs | PolyphenDesc | SiftDesc => {
                SqlType::VarcharArray
            }
            Polyphen | Sift => SqlType::FloatArray,
            Phastcons | Phylop | Gerp | CaddScaled | CaddRaw => SqlType::Float,
            IndexNotSync | IndexUnknown => SqlType::Boolean,
        }
    }

    /// Only the leading key columns are declared NOT NULL
    pub fn nullable(&self) -> bool {
        !matches!(self, VariantColumn::Chromosome | VariantColumn::Position)
    }

    pub fn column(&self) -> Column {
        Column {
            name: self.name().to_string(),
            sql_type: self.sql_type(),
            nullable: self.nullable(),
        }
    }

    /// `"NAME"`
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.name())
    }

    pub fn from_name(name: &str) -> Option<VariantColumn> {
        ALL_COLUMNS.iter().find(|c| c.name() == name).copied()
    }
}

impl fmt::Display for VariantColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// All static columns as descriptors
pub fn static_columns() -> Vec<Column> {
    ALL_COLUMNS.iter().map(VariantColumn::column).collect()
}

/// Column of a conservation score source (`phastCons`, `phylop`, `gerp`)
pub fn conservation_column(source: &str) -> SchemaResult<VariantColumn> {
    match source.to_ascii_uppercase().as_str() {
        "PHASTCONS" => Ok(VariantColumn::Phastcons),
        "PHYLOP" => Ok(VariantColumn::Phylop),
        "GERP" => Ok(VariantColumn::Gerp),
        _ => Err(SchemaError::UnknownSource {
            kind: "conservation",
            source_name: source.to_string(),
        }),
    }
}

/// Column of a functional score source (`cadd_raw`, `cadd_scaled`)
pub fn functional_score_column(source: &str) -> SchemaResult<VariantColumn> {
    match source.to_ascii_uppercase().as_str() {
        "CADD_RAW" => Ok(VariantColumn::CaddRaw),
        "CADD_SCALED" => Ok(VariantColumn::CaddScaled),
        _ => Err(SchemaError::UnknownSource {
            kind: "functional score",
            source_name: source.to_string(),
        }),
    }
}
