//! Region-like filters: genomic regions, variant ids, xrefs and genes
//!
//! These are OR'd together in the WHERE clause, ahead of every other filter.

use std::collections::BTreeSet;

use crate::keycodec::canonical_chromosome;
use crate::schema::VariantColumn;

use super::consequence::{combine, consequence_accessions, Combination};
use super::errors::{QueryError, QueryResult};
use super::filter::{append_filters, build_filter, check_string_value, ValueSource};
use super::params::{QueryParam, VariantQuery};
use super::values::{split_values, QueryOperation};

/// Open end of a region without coordinates
pub const REGION_MAX_END: i32 = i32::MAX;

/// `chrom[:start[-end]]`, 1-based and inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chromosome: String,
    pub start: i32,
    pub end: i32,
}

impl Region {
    pub fn new(chromosome: impl Into<String>, start: i32, end: i32) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    /// Parse one region. `param` names the parameter for error messages.
    pub fn parse(value: &str, param: QueryParam) -> QueryResult<Region> {
        let value = value.trim();
        let malformed = |reason: &str| QueryError::malformed(param.key(), value, reason);

        let (chromosome, coordinates) = match value.split_once(':') {
            Some((chromosome, coordinates)) => (chromosome, Some(coordinates)),
            None => (value, None),
        };
        let chromosome = canonical_chromosome(chromosome).map_err(|e| malformed(&e.to_string()))?;

        let parse_position = |s: &str| -> QueryResult<i32> {
            s.trim()
                .parse::<i32>()
                .map_err(|_| malformed("invalid region coordinate"))
        };
        let (start, end) = match coordinates {
            None => (1, REGION_MAX_END),
            Some(coordinates) => match coordinates.split_once('-') {
                Some((start, end)) => (parse_position(start)?, parse_position(end)?),
                None => {
                    let position = parse_position(coordinates)?;
                    (position, position)
                }
            },
        };
        if start > end {
            return Err(malformed("region start after end"));
        }
        Ok(Region::new(chromosome, start, end))
    }

    /// Parse an OR'd list of regions
    pub fn parse_list(value: &str, param: QueryParam) -> QueryResult<Vec<Region>> {
        let (_, values) = split_values(value)?;
        values.iter().map(|v| Region::parse(v, param)).collect()
    }

    /// `CHROMOSOME = c [AND POSITION >= start] [AND POSITION <= end]`
    pub fn filter(&self) -> QueryResult<String> {
        let source = ValueSource::internal();
        let mut sub_filters = Vec::with_capacity(3);
        sub_filters.push(build_filter(
            &VariantColumn::Chromosome.column(),
            "=",
            &self.chromosome,
            "",
            "",
            0,
            source,
        )?);
        let position = VariantColumn::Position.column();
        if self.start > 1 {
            sub_filters.push(build_filter(&position, ">=", &self.start.to_string(), "", "", 0, source)?);
        }
        if self.end < REGION_MAX_END {
            sub_filters.push(build_filter(&position, "<=", &self.end.to_string(), "", "", 0, source)?);
        }
        Ok(append_filters(&sub_filters, Some(QueryOperation::And)))
    }
}

/// `chr:pos:ref:alt`. `-` stands for an empty allele.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantId {
    pub chromosome: String,
    pub position: u32,
    pub reference: String,
    pub alternate: String,
}

impl VariantId {
    /// Three `:` make a variant id. More are allowed only inside symbolic or
    /// breakend alternates (`<DUP:TANDEM>`, `]15:300]A`).
    pub fn looks_like_variant(value: &str) -> bool {
        let colons = value.matches(':').count();
        colons == 3 || (colons > 3 && value.contains(&['<', '[', ']'][..]))
    }

    /// `None` when the value is not a variant id, so it can be used as an
    /// xref instead
    pub fn parse(value: &str) -> Option<VariantId> {
        if !Self::looks_like_variant(value) {
            return None;
        }
        let mut parts = value.splitn(4, ':');
        let chromosome = parts.next()?;
        let position = parts.next()?;
        let reference = parts.next()?;
        let alternate = parts.next()?;

        let start = position.split_once('-').map_or(position, |(start, _)| start);
        let position: u32 = start.parse().ok()?;
        let chromosome = canonical_chromosome(chromosome).ok()?;
        let allele = |s: &str| if s == "-" { String::new() } else { s.to_string() };
        Some(VariantId {
            chromosome,
            position,
            reference: allele(reference),
            alternate: allele(alternate),
        })
    }
}

/// `(CHROMOSOME, POSITION, REFERENCE, ALTERNATE) IN (('c', p, 'r', 'a') ,...)`
pub fn variant_filter(variants: &[VariantId]) -> QueryResult<String> {
    let mut sb = format!(
        "({}, {}, {}, {}) IN (",
        VariantColumn::Chromosome,
        VariantColumn::Position,
        VariantColumn::Reference,
        VariantColumn::Alternate
    );
    for (i, variant) in variants.iter().enumerate() {
        if i > 0 {
            sb.push(',');
        }
        sb.push_str(&format!(
            "('{}', {}, '{}', '{}') ",
            check_string_value(&variant.chromosome)?,
            variant.position,
            check_string_value(&variant.reference)?,
            check_string_value(&variant.alternate)?
        ));
    }
    sb.push(')');
    Ok(sb)
}

/// `'v' = ANY("A_XREFS")`
pub fn xref_filter(xref: &str) -> QueryResult<String> {
    build_filter(
        &VariantColumn::Xrefs.column(),
        "=",
        xref,
        "",
        "",
        0,
        ValueSource::internal(),
    )
}

/// Ids and xrefs split into variant coordinates and plain identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedXrefs {
    pub variants: Vec<VariantId>,
    pub ids: Vec<String>,
    pub other_xrefs: Vec<String>,
    pub genes: Vec<String>,
}

impl ParsedXrefs {
    pub fn from_query(query: &VariantQuery) -> QueryResult<ParsedXrefs> {
        let mut parsed = ParsedXrefs::default();
        for (param, target) in [(QueryParam::Id, 0), (QueryParam::Xref, 1)] {
            if let Some(value) = query.value(param) {
                let (_, values) = split_values(value)?;
                for value in values {
                    match VariantId::parse(&value) {
                        Some(variant) => parsed.variants.push(variant),
                        None if target == 0 => parsed.ids.push(value),
                        None => parsed.other_xrefs.push(value),
                    }
                }
            }
        }
        if let Some(value) = query.value(QueryParam::Gene) {
            let (_, genes) = split_values(value)?;
            parsed.genes = genes;
        }
        Ok(parsed)
    }
}

fn values_of(query: &VariantQuery, param: QueryParam) -> QueryResult<Vec<String>> {
    match query.value(param) {
        Some(value) => Ok(split_values(value)?.1),
        None => Ok(Vec::new()),
    }
}

fn combined_filters(
    column: VariantColumn,
    tokens: BTreeSet<String>,
) -> QueryResult<Vec<String>> {
    let column = column.column();
    tokens
        .iter()
        .map(|token| build_filter(&column, "=", token, "", "", 0, ValueSource::internal()))
        .collect()
}

fn gene_so(genes: &[String], so: &[u32]) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for gene in genes {
        for accession in so {
            tokens.insert(combine(&[gene, &accession.to_string()]));
        }
    }
    tokens
}

fn gene_biotype(genes: &[String], biotypes: &[String]) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for gene in genes {
        for biotype in biotypes {
            tokens.insert(combine(&[gene, biotype]));
        }
    }
    tokens
}

fn gene_biotype_so(genes: &[String], biotypes: &[String], so: &[u32]) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for gene in genes {
        for accession in so {
            for biotype in biotypes {
                tokens.insert(combine(&[gene, biotype, &accession.to_string()]));
            }
        }
    }
    tokens
}

fn gene_so_flag(genes: &[String], so: &[u32], flags: &[String]) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for gene in genes {
        for accession in so {
            for flag in flags {
                tokens.insert(combine(&[gene, &accession.to_string(), flag]));
            }
        }
    }
    tokens
}

/// Gene-scoped combination filter for `combination`, or `None` when the
/// combination does not involve a per-gene column (`FLAG`, `NONE`)
pub fn gene_combination_filter(
    combination: Combination,
    genes: &[String],
    query: &VariantQuery,
) -> QueryResult<Option<String>> {
    let or = Some(QueryOperation::Or);
    let filter = match combination {
        Combination::None | Combination::Flag => return Ok(None),
        Combination::Ct => {
            let so = consequence_accessions(&values_of(query, QueryParam::ConsequenceType)?)?;
            append_filters(&combined_filters(VariantColumn::GeneSo, gene_so(genes, &so))?, or)
        }
        Combination::CtFlag => {
            let so = consequence_accessions(&values_of(query, QueryParam::ConsequenceType)?)?;
            let flags = values_of(query, QueryParam::TranscriptFlag)?;
            let tokens = gene_so_flag(genes, &so, &flags);
            append_filters(&combined_filters(VariantColumn::GeneSoFlag, tokens)?, or)
        }
        Combination::Biotype | Combination::BiotypeFlag => {
            let biotypes = values_of(query, QueryParam::Biotype)?;
            let tokens = gene_biotype(genes, &biotypes);
            append_filters(&combined_filters(VariantColumn::GeneBiotype, tokens)?, or)
        }
        Combination::BiotypeCt => {
            let so = consequence_accessions(&values_of(query, QueryParam::ConsequenceType)?)?;
            let biotypes = values_of(query, QueryParam::Biotype)?;
            let tokens = gene_biotype_so(genes, &biotypes, &so);
            append_filters(&combined_filters(VariantColumn::GeneBiotypeSo, tokens)?, or)
        }
        Combination::BiotypeCtFlag => {
            let so = consequence_accessions(&values_of(query, QueryParam::ConsequenceType)?)?;
            let biotypes = values_of(query, QueryParam::Biotype)?;
            let flags = values_of(query, QueryParam::TranscriptFlag)?;
            let biotype_so = combined_filters(
                VariantColumn::GeneBiotypeSo,
                gene_biotype_so(genes, &biotypes, &so),
            )?;
            let so_flag = combined_filters(VariantColumn::GeneSoFlag, gene_so_flag(genes, &so, &flags))?;
            append_filters(
                &[append_filters(&biotype_so, or), append_filters(&so_flag, or)],
                Some(QueryOperation::And),
            )
        }
    };
    Ok(Some(filter))
}

/// Whether the transcript flag ends up inside the per-gene combination
pub fn flag_is_combined(combination: Combination) -> bool {
    combination.is_flag() && !matches!(combination, Combination::BiotypeFlag | Combination::Flag)
}
