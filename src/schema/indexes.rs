//! Secondary index catalog

use super::columns::VariantColumn;
use super::population::Population;

/// Index scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// Stored with the data table regions
    Local,
    /// Stored in its own table
    Global,
}

/// An index over column expressions such as `"A_SIFT"[2]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub index_type: IndexType,
    /// Indexed expressions; plain names are quoted when rendered
    pub columns: Vec<String>,
    /// Covered columns
    pub include: Vec<String>,
}

impl IndexDefinition {
    pub fn local(columns: Vec<String>) -> Self {
        Self {
            index_type: IndexType::Local,
            columns,
            include: default_include(),
        }
    }
}

/// Every index covers genes and consequence types
fn default_include() -> Vec<String> {
    vec![
        VariantColumn::Genes.name().to_string(),
        VariantColumn::So.name().to_string(),
    ]
}

/// `"col"[slot]` array element expression
pub fn array_element(column: &str, slot: usize) -> String {
    format!("\"{}\"[{}]", column, slot)
}

/// Alternate and reference frequency indexes of the main populations
pub fn pop_freq_indices() -> Vec<IndexDefinition> {
    [Population::new("1000G", "ALL"), Population::new("EXAC", "ALL")]
        .iter()
        .map(|population| {
            let name = population.column_name();
            IndexDefinition::local(vec![array_element(&name, 2), array_element(&name, 1)])
        })
        .collect()
}

/// Score and type indexes
pub fn score_indices() -> Vec<IndexDefinition> {
    let single = |expr: String| IndexDefinition::local(vec![expr]);
    vec![
        single(VariantColumn::Phastcons.name().to_string()),
        single(VariantColumn::Phylop.name().to_string()),
        single(VariantColumn::Gerp.name().to_string()),
        single(VariantColumn::CaddRaw.name().to_string()),
        single(VariantColumn::CaddScaled.name().to_string()),
        single(array_element(VariantColumn::Polyphen.name(), 1)),
        single(array_element(VariantColumn::Sift.name(), 2)),
        single(VariantColumn::Type.name().to_string()),
    ]
}

pub fn all_indices() -> Vec<IndexDefinition> {
    let mut indices = pop_freq_indices();
    indices.extend(score_indices());
    indices
}
