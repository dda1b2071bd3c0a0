//! Variant query to SELECT statement
//!
//! ```text
//! SELECT [/*+ hints */ ] columns FROM "table"
//!   [WHERE (region-like filters OR'd) AND (other filters AND'd)]
//!   [ORDER BY CHROMOSOME,POSITION ASC|DESC ] [LIMIT n] [OFFSET m]
//! ```
//!
//! The compiler holds no mutable state; every call works on its own copy of
//! the query.

use crate::catalog::{CatalogLookup, EntityKind, HeaderKind};
use crate::config::StoreConfig;
use crate::observability::Logger;
use crate::schema::{
    cohort_freq_column, cohort_maf_column, cohort_mgf_column, cohort_pass_freq_column,
    cohort_stats_column, conservation_column, file_column, functional_score_column,
    release_column, sample_column, sample_file_column, study_column, variant_score_column, Column,
    Population, VariantColumn,
};
use crate::sql::{StatementBuilder, TableKind};

use super::consequence::{combine, consequence_accessions, Combination};
use super::errors::{QueryError, QueryResult};
use super::filter::{
    append_filters, build_filter, check_string_value, parse_boolean, parse_double, FilterSpec,
    FilterValue, ValueSource,
};
use super::operators::{format_double, is_or_null, parse_numeric_operator, parse_operator};
use super::params::{QueryOptions, QueryParam, VariantQuery, SKIP_GENE_REGIONS};
use super::projection::{Projection, ALL, NONE};
use super::region::{
    flag_is_combined, gene_combination_filter, variant_filter, xref_filter, ParsedXrefs, Region,
};
use super::relaxation::{
    population_null_relaxation, stats_null_relaxation, study_filter_is_redundant, PopulationKind,
    StatsKind,
};
use super::values::{
    check_operator, is_negated, remove_negation, split_operator, split_study_resource,
    split_values, KeyOpValue, QueryOperation, AND_CHAR, OR_CHAR,
};

pub const UNSUPPORTED_FILTER_EVENT: &str = "QUERY_UNSUPPORTED_FILTER";
pub const STUDY_FILTER_SKIPPED_EVENT: &str = "QUERY_STUDY_FILTER_SKIPPED";

/// Hint that disables secondary index usage
pub const NO_INDEX_HINT: &str = "NO_INDEX";

/// Never matches: used when a gene list resolved to nothing
pub const VOID_CHROMOSOME: &str = "_VOID";

// 1-based slots of the file column array
const FILE_OVERLAP_STATUS_SLOT: usize = 3;
const FILE_QUAL_SLOT: usize = 4;
const FILE_FILTER_SLOT: usize = 5;
const FILE_INFO_START_SLOT: usize = 6;

/// Overlap status of a variant read from the file itself
const OVERLAP_NONE: &str = "N";

const PASS: &str = "PASS";
const FILTER_SEPARATOR: char = ';';
const FILTER_KEY: &str = "FILTER";
const QUAL_KEY: &str = "QUAL";
const NA_GENOTYPE: &str = "NA";

const UNSUPPORTED_PARAMS: [QueryParam; 5] = [
    QueryParam::MissingAlleles,
    QueryParam::MissingGenotypes,
    QueryParam::SampleMendelianError,
    QueryParam::SampleDeNovo,
    QueryParam::SampleCompoundHeterozygous,
];

/// A compiled statement and the filters it could not express
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub warnings: Vec<String>,
}

pub struct QueryCompiler {
    statements: StatementBuilder,
    client_side_skip: bool,
    default_limit: Option<u64>,
}

impl QueryCompiler {
    pub fn new(statements: StatementBuilder) -> Self {
        Self {
            statements,
            client_side_skip: false,
            default_limit: None,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.statement_builder())
            .with_client_side_skip(config.query.client_side_skip)
            .with_default_limit(config.query.default_limit)
    }

    /// Fetch `skip + limit` rows and leave the skip to the caller
    pub fn with_client_side_skip(mut self, client_side_skip: bool) -> Self {
        self.client_side_skip = client_side_skip;
        self
    }

    pub fn with_default_limit(mut self, limit: Option<u64>) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn compile(
        &self,
        query: &VariantQuery,
        projection: &Projection,
        options: &QueryOptions,
        catalog: &dyn CatalogLookup,
    ) -> QueryResult<CompiledQuery> {
        let mut compilation = Compilation::new(query.clone(), catalog);
        let mut gene_combination = Vec::new();
        let region_filters = compilation.region_filters(&mut gene_combination)?;
        let mut filters = compilation.other_filters()?;
        filters.extend(gene_combination);

        let mut sb = String::from("SELECT ");

        let mut hints = Vec::new();
        if self.statements.kind() != TableKind::View && filters.is_empty() {
            hints.push(NO_INDEX_HINT.to_string());
        }
        hints.extend(options.hints.iter().cloned());
        if !hints.is_empty() {
            sb.push_str(&format!("/*+ {} */ ", hints.join(",")));
        }

        sb.push_str(&projection.select_list(options.count));
        sb.push_str(" FROM ");
        sb.push_str(&self.statements.escaped_table());

        if !region_filters.is_empty() || !filters.is_empty() {
            sb.push_str(" WHERE");
        }
        sb.push_str(&append_filters(&region_filters, Some(QueryOperation::Or)));
        if !region_filters.is_empty() && !filters.is_empty() {
            sb.push_str(" AND");
        }
        sb.push_str(&append_filters(&filters, Some(QueryOperation::And)));

        if !options.count {
            if let Some(order) = options.sort {
                sb.push_str(&format!(
                    " ORDER BY {},{} {} ",
                    VariantColumn::Chromosome,
                    VariantColumn::Position,
                    order.as_str()
                ));
            }
            let limit = options.limit.or(self.default_limit);
            if self.client_side_skip {
                if let Some(limit) = limit {
                    sb.push_str(&format!(" LIMIT {}", options.skip.unwrap_or(0).saturating_add(limit)));
                }
            } else {
                if let Some(limit) = limit {
                    sb.push_str(&format!(" LIMIT {}", limit));
                }
                if let Some(skip) = options.skip {
                    sb.push_str(&format!(" OFFSET {}", skip));
                }
            }
        }

        Ok(CompiledQuery {
            sql: sb,
            warnings: compilation.warnings,
        })
    }
}

/// A file reference inside a file-scoped filter
#[derive(Debug, Clone, Copy)]
struct FileRef {
    study: u32,
    file: u32,
    negated: bool,
}

impl FileRef {
    fn column(&self) -> Column {
        file_column(self.study, self.file)
    }
}

/// State of one `compile` call
struct Compilation<'a> {
    query: VariantQuery,
    catalog: &'a dyn CatalogLookup,
    warnings: Vec<String>,
}

impl<'a> Compilation<'a> {
    fn new(query: VariantQuery, catalog: &'a dyn CatalogLookup) -> Self {
        Self {
            query,
            catalog,
            warnings: Vec::new(),
        }
    }

    // =========================================================================
    // Catalog resolution
    // =========================================================================

    fn resolve_study(&self, name: &str) -> QueryResult<u32> {
        self.catalog
            .resolve_study(name)
            .ok_or_else(|| QueryError::unknown("study", name))
    }

    fn resolve(&self, kind: EntityKind, study: u32, name: &str) -> QueryResult<u32> {
        self.catalog
            .resolve(kind, study, name)
            .ok_or_else(|| QueryError::unknown(kind.as_str(), name))
    }

    /// The single non-negated study of the query, or the only study there is
    fn default_study(&self) -> QueryResult<u32> {
        if let Some(value) = self.query.value(QueryParam::Study) {
            let (_, studies) = split_values(value)?;
            let required: Vec<&String> = studies.iter().filter(|s| !is_negated(s)).collect();
            if let [single] = required.as_slice() {
                return self.resolve_study(single);
            }
        }
        match self.catalog.study_ids().as_slice() {
            [single] => Ok(*single),
            _ => Err(QueryError::malformed(
                QueryParam::Study.key(),
                "",
                "Unable to resolve default study",
            )),
        }
    }

    /// `[study:]resource`, falling back to the default study
    fn study_resource<'k>(&self, key: &'k str) -> QueryResult<(u32, &'k str)> {
        match split_study_resource(key) {
            (Some(study), resource) => Ok((self.resolve_study(study)?, resource)),
            (None, resource) => Ok((self.default_study()?, resource)),
        }
    }

    fn file_ref(&self, raw: &str) -> QueryResult<FileRef> {
        let negated = is_negated(raw);
        let (study, name) = self.study_resource(remove_negation(raw))?;
        Ok(FileRef {
            study,
            file: self.resolve(EntityKind::File, study, name)?,
            negated,
        })
    }

    fn cohort_column(&self, key: &str, column: fn(u32, u32) -> Column) -> QueryResult<(u32, Column)> {
        let (study, cohort) = self.study_resource(key)?;
        let cohort = self.resolve(EntityKind::Cohort, study, cohort)?;
        Ok((study, column(study, cohort)))
    }

    /// Files the query returns, used as the scope of FILTER and QUAL
    fn include_files(&self) -> QueryResult<Vec<FileRef>> {
        for param in [QueryParam::IncludeFile, QueryParam::File] {
            let Some(value) = self.query.value(param) else {
                continue;
            };
            if value.eq_ignore_ascii_case(NONE) {
                return Ok(Vec::new());
            }
            if value.eq_ignore_ascii_case(ALL) {
                break;
            }
            let (_, names) = split_values(value)?;
            let mut files = Vec::with_capacity(names.len());
            for name in names.iter().filter(|n| !is_negated(n)) {
                files.push(self.file_ref(name)?);
            }
            return Ok(files);
        }
        let Ok(study) = self.default_study() else {
            return Ok(Vec::new());
        };
        Ok(self
            .catalog
            .indexed_files(study)
            .into_iter()
            .map(|file| FileRef {
                study,
                file,
                negated: false,
            })
            .collect())
    }

    fn add(&self, filters: &mut Vec<String>, spec: FilterSpec<'_>) -> QueryResult<()> {
        if let Some(value) = self.query.value(spec.param()) {
            if let Some(filter) = spec.compile(value)? {
                filters.push(filter);
            }
        }
        Ok(())
    }

    fn add_column(&self, filters: &mut Vec<String>, param: QueryParam, column: VariantColumn) -> QueryResult<()> {
        self.add(filters, FilterSpec::column(param, column.column()))
    }

    // =========================================================================
    // Region-like filters
    // =========================================================================

    /// Regions, ids, xrefs and genes. With `geneRegions=SKIP` the per-gene
    /// combination lands in `combined` instead.
    fn region_filters(&mut self, combined: &mut Vec<String>) -> QueryResult<Vec<String>> {
        let mut regions = Vec::new();

        if let Some(value) = self.query.value(QueryParam::Region) {
            for region in Region::parse_list(value, QueryParam::Region)? {
                regions.push(region.filter()?);
            }
        }

        let xrefs = ParsedXrefs::from_query(&self.query)?;
        for id in xrefs.ids.iter().chain(xrefs.other_xrefs.iter()) {
            regions.push(xref_filter(id)?);
        }
        if !xrefs.variants.is_empty() {
            regions.push(variant_filter(&xrefs.variants)?);
        }

        let combination = Combination::from_query(&self.query)?;
        let only_gene_filter = regions.is_empty();
        if xrefs.genes.is_empty() {
            return Ok(regions);
        }

        let gene_regions = self
            .query
            .value(QueryParam::GeneRegions)
            .map(str::to_string)
            .ok_or_else(|| {
                QueryError::malformed(
                    QueryParam::Gene.key(),
                    &xrefs.genes.join(","),
                    "missing gene regions",
                )
            })?;
        let skip_gene_regions = gene_regions == SKIP_GENE_REGIONS;
        let mut gene_region_filters = Vec::new();
        if !skip_gene_regions {
            for region in Region::parse_list(&gene_regions, QueryParam::GeneRegions)? {
                gene_region_filters.push(region.filter()?);
            }
        }

        match gene_combination_filter(combination, &xrefs.genes, &self.query)? {
            None => regions.extend(gene_region_filters),
            Some(filter) if skip_gene_regions => combined.push(filter),
            Some(filter) => regions.push(append_filters(
                &[
                    append_filters(&gene_region_filters, Some(QueryOperation::Or)),
                    filter,
                ],
                Some(QueryOperation::And),
            )),
        }

        if only_gene_filter {
            self.query.remove(QueryParam::ConsequenceType);
            self.query.remove(QueryParam::Biotype);
            if flag_is_combined(combination) {
                self.query.remove(QueryParam::TranscriptFlag);
            }
        }
        Ok(regions)
    }

    // =========================================================================
    // Other filters
    // =========================================================================

    fn other_filters(&mut self) -> QueryResult<Vec<String>> {
        let mut filters = Vec::new();
        self.variant_filters(&mut filters)?;
        self.annotation_filters(&mut filters)?;
        self.stats_filters(&mut filters)?;
        self.unsupported_filters();
        Ok(filters)
    }

    fn variant_filters(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        self.add_column(filters, QueryParam::Reference, VariantColumn::Reference)?;
        self.add_column(filters, QueryParam::Alternate, VariantColumn::Alternate)?;
        self.add_column(filters, QueryParam::Type, VariantColumn::Type)?;

        self.study_filter(filters)?;

        let (filter_op, filter_values) = self.split_param(QueryParam::Filter)?;
        let (qual_op, qual_values) = self.split_param(QueryParam::Qual)?;
        let include_files = if filter_values.is_empty() && qual_values.is_empty() {
            Vec::new()
        } else {
            let files = self.include_files()?;
            for (param, values) in [(QueryParam::Filter, &filter_values), (QueryParam::Qual, &qual_values)] {
                if !values.is_empty() && files.is_empty() {
                    return Err(QueryError::malformed(
                        param.key(),
                        self.query.get(param).unwrap_or_default(),
                        "Missing \"file\" filter",
                    ));
                }
            }
            files
        };

        if self.query.is_valid(QueryParam::FileData) {
            self.file_data_filter(filters)?;
        }
        if self.query.is_valid(QueryParam::SampleData) {
            self.sample_data_filter(filters)?;
        }

        let (file_op, files) = match self.query.value(QueryParam::File) {
            Some(value) => {
                let (op, names) = split_values(value)?;
                let mut files = Vec::with_capacity(names.len());
                for name in &names {
                    files.push(self.file_ref(name)?);
                }
                (op, files)
            }
            None if !filter_values.is_empty() || !qual_values.is_empty() => {
                (Some(QueryOperation::Or), include_files)
            }
            None => (None, Vec::new()),
        };
        if !files.is_empty() {
            let mut parts = Vec::with_capacity(files.len());
            for file in &files {
                parts.push(self.file_filter(file, filter_op, &filter_values, qual_op, &qual_values)?);
            }
            let separator = match file_op {
                Some(QueryOperation::Or) => " OR ",
                _ => " AND ",
            };
            filters.push(parts.join(separator));
        }

        self.cohort_filters(filters)?;
        self.genotype_filter(filters, &files)?;

        self.add(
            filters,
            FilterSpec::resolved(QueryParam::Score, |kov, _| {
                let (study, score) = self.study_resource(kov.key_str())?;
                let score = self.resolve(EntityKind::Score, study, score)?;
                Ok(variant_score_column(study, score))
            })
            .with_fixed_slot(1),
        )?;

        self.release_filter(filters)
    }

    fn split_param(&self, param: QueryParam) -> QueryResult<(Option<QueryOperation>, Vec<String>)> {
        match self.query.value(param) {
            Some(value) => split_values(value),
            None => Ok((None, Vec::new())),
        }
    }

    fn study_filter(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let Some(value) = self.query.value(QueryParam::Study) else {
            return Ok(());
        };
        let (operation, studies) = split_values(value)?;
        let mut parts = Vec::with_capacity(studies.len());
        let mut required = Vec::new();
        let mut negated = Vec::new();
        for study in &studies {
            let id = self.resolve_study(remove_negation(study))?;
            let column = study_column(id).quoted();
            if is_negated(study) {
                negated.push(id);
                parts.push(format!("{} IS NULL ", column));
            } else {
                required.push(id);
                parts.push(format!("{} IS NOT NULL ", column));
            }
        }
        let separator = match operation {
            Some(QueryOperation::Or) => " OR ",
            _ => " AND ",
        };
        if study_filter_is_redundant(&required, &negated, &self.catalog.study_ids(), operation) {
            Logger::trace(STUDY_FILTER_SKIPPED_EVENT, &[("study", value)]);
        } else {
            filters.push(parts.join(separator));
        }
        Ok(())
    }

    /// `( "f"[5] = 'PASS' OR "f"[5] LIKE '%LowQual%' )`
    fn file_filter_clause(
        &self,
        column: &Column,
        operation: Option<QueryOperation>,
        values: &[String],
    ) -> QueryResult<String> {
        let mut sb = String::from(" ( ");
        for (i, value) in values.iter().enumerate() {
            let value = check_string_value(value)?;
            let negated = is_negated(value);
            let filter = remove_negation(value);
            if i > 0 {
                if let Some(op) = operation {
                    sb.push_str(&format!(" {} ", op));
                }
            }
            sb.push_str(&format!("{}[{}]", column.quoted(), FILE_FILTER_SLOT));
            if filter == PASS || filter.contains(FILTER_SEPARATOR) {
                sb.push_str(if negated { " != '" } else { " = '" });
                sb.push_str(filter);
                sb.push('\'');
            } else {
                if negated {
                    sb.push_str(" NOT ");
                }
                sb.push_str(&format!(" LIKE '%{}%'", filter));
            }
        }
        sb.push_str(" ) ");
        Ok(sb)
    }

    /// `TO_NUMBER("col"[slot]) op v [OR "col"[slot] IS NULL]`
    fn numeric_slot_filter(
        column: &Column,
        slot: usize,
        op: &str,
        value: &str,
        source: ValueSource<'_>,
    ) -> QueryResult<String> {
        let parsed = parse_double(value, source)?;
        let mut sb = format!(
            "TO_NUMBER({}[{}]) {} {}",
            column.quoted(),
            slot,
            parse_numeric_operator(op)?,
            format_double(parsed)
        );
        if is_or_null(op) {
            sb.push_str(&format!(" OR {}[{}] IS NULL", column.quoted(), slot));
        }
        Ok(sb)
    }

    /// `"col"[slot] op 'v'`
    fn text_slot_filter(column: &Column, slot: usize, op: &str, value: &str) -> QueryResult<String> {
        let value = check_string_value(value)?;
        Ok(format!("{}[{}] {} '{}'", column.quoted(), slot, parse_operator(op), value))
    }

    fn file_filter(
        &self,
        file: &FileRef,
        filter_op: Option<QueryOperation>,
        filter_values: &[String],
        qual_op: Option<QueryOperation>,
        qual_values: &[String],
    ) -> QueryResult<String> {
        let column = file.column();
        let quoted = column.quoted();
        let mut sb = String::from(" ( ");
        if file.negated {
            sb.push_str(&format!(
                "{} IS NULL  OR {}[{}] != '{}'",
                quoted, quoted, FILE_OVERLAP_STATUS_SLOT, OVERLAP_NONE
            ));
        } else {
            sb.push_str(&format!("{}[{}] = '{}'", quoted, FILE_OVERLAP_STATUS_SLOT, OVERLAP_NONE));
            if !filter_values.is_empty() {
                sb.push_str(" AND ");
                sb.push_str(&self.file_filter_clause(&column, filter_op, filter_values)?);
            }
            if !qual_values.is_empty() {
                sb.push_str(" AND ( ");
                for (i, raw) in qual_values.iter().enumerate() {
                    if i > 0 {
                        if let Some(op) = qual_op {
                            sb.push_str(&format!(" {} ", op));
                        }
                    }
                    let kov = split_operator(raw);
                    sb.push_str(&Self::numeric_slot_filter(
                        &column,
                        FILE_QUAL_SLOT,
                        &kov.op,
                        &kov.value,
                        ValueSource::new(QueryParam::Qual, raw),
                    )?);
                }
                sb.push_str(" ) ");
            }
        }
        sb.push_str(" ) ");
        Ok(sb)
    }

    /// Split `owner:KEY op value` items into runs sharing one owner. Items
    /// without an owner continue the previous run.
    fn owned_items(
        &self,
        param: QueryParam,
        value: &str,
        fallback_owner: Option<String>,
    ) -> QueryResult<(QueryOperation, Vec<(String, Vec<KeyOpValue>)>)> {
        let (operation, items) = split_values(value)?;
        let mut runs: Vec<(String, Vec<KeyOpValue>)> = Vec::new();
        for item in &items {
            let mut kov = split_operator(item);
            let (owner, key) = match split_study_resource(kov.key_str()) {
                (Some(owner), key) => (Some(owner.to_string()), key.to_string()),
                (None, key) => (None, key.to_string()),
            };
            kov.key = Some(key);
            let owner = match owner {
                Some(owner) => owner,
                None => match runs.last().map(|(o, _)| o.clone()).or_else(|| fallback_owner.clone()) {
                    Some(owner) => owner,
                    None => {
                        return Err(QueryError::malformed(param.key(), value, "Missing owner of the field"))
                    }
                },
            };
            match runs.last_mut() {
                Some((last, kovs)) if *last == owner => kovs.push(kov),
                _ => runs.push((owner, vec![kov])),
            }
        }
        Ok((operation.unwrap_or(QueryOperation::And), runs))
    }

    /// `fileData=file:QUAL>30;file:DP>10`
    fn file_data_filter(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let Some(value) = self.query.value(QueryParam::FileData) else {
            return Ok(());
        };
        let fallback = match self.include_files()?.as_slice() {
            [single] => self.catalog.name_of(EntityKind::File, single.study, single.file),
            _ => None,
        };
        let (operation, runs) = self.owned_items(QueryParam::FileData, value, fallback)?;
        let separator = format!(" {} ", operation);

        let mut groups = Vec::with_capacity(runs.len());
        for (file, kovs) in &runs {
            let file = self.file_ref(file)?;
            let column = file.column();
            let fixed_attributes = self.catalog.fixed_attributes(file.study);
            let mut parts = Vec::with_capacity(kovs.len());
            for kov in kovs {
                let key = kov.key_str();
                let source = ValueSource::new(QueryParam::FileData, value);
                let part = if key == FILTER_KEY {
                    let (op, values) = split_values(&kov.value)?;
                    self.file_filter_clause(&column, op, &values)?
                } else if key == QUAL_KEY {
                    Self::numeric_slot_filter(&column, FILE_QUAL_SLOT, &kov.op, &kov.value, source)?
                } else {
                    let index = fixed_attributes.iter().position(|a| a == key).ok_or_else(|| {
                        QueryError::malformed(QueryParam::FileData.key(), value, format!("Unknown INFO field {}", key))
                    })?;
                    let slot = FILE_INFO_START_SLOT + index;
                    let numeric = self
                        .catalog
                        .header_line(file.study, HeaderKind::Info, key)
                        .map_or(false, |line| line.value_type.is_numeric());
                    if numeric {
                        Self::numeric_slot_filter(&column, slot, &kov.op, &kov.value, source)?
                    } else {
                        Self::text_slot_filter(&column, slot, &kov.op, &kov.value)?
                    }
                };
                parts.push(format!(" ( {} ) ", part));
            }
            groups.push(format!(" ( {} ) ", parts.join(&separator)));
        }
        filters.push(groups.join(&separator));
        Ok(())
    }

    /// `sampleData=sample:GQ>20;sample:DP>10`
    fn sample_data_filter(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let Some(value) = self.query.value(QueryParam::SampleData) else {
            return Ok(());
        };
        let study = self.default_study()?;
        let (operation, runs) = self.owned_items(QueryParam::SampleData, value, None)?;
        let fixed_format = self.catalog.fixed_format(study);

        let mut parts = Vec::new();
        for (sample, kovs) in &runs {
            let sample = self.resolve(EntityKind::Sample, study, sample)?;
            let column = sample_column(study, sample);
            for kov in kovs {
                let key = kov.key_str();
                let index = fixed_format.iter().position(|f| f == key).ok_or_else(|| {
                    QueryError::malformed(QueryParam::SampleData.key(), value, format!("Unknown FORMAT field {}", key))
                })?;
                let slot = index + 1;
                let numeric = self
                    .catalog
                    .header_line(study, HeaderKind::Format, key)
                    .map_or(false, |line| line.value_type.is_numeric());
                let part = if numeric {
                    let source = ValueSource::new(QueryParam::SampleData, value);
                    Self::numeric_slot_filter(&column, slot, &kov.op, &kov.value, source)?
                } else {
                    Self::text_slot_filter(&column, slot, &kov.op, &kov.value)?
                };
                parts.push(format!(" ( {} ) ", part));
            }
        }
        filters.push(parts.join(&format!(" {} ", operation)));
        Ok(())
    }

    fn cohort_filters(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let (_, cohorts) = self.split_param(QueryParam::Cohort)?;
        for cohort in &cohorts {
            let (_, column) = self.cohort_column(remove_negation(cohort), cohort_stats_column)?;
            if is_negated(cohort) {
                filters.push(format!("{} IS NULL", column.quoted()));
            } else {
                filters.push(format!("{} IS NOT NULL", column.quoted()));
            }
        }
        Ok(())
    }

    /// `sample:gt,gt;sample:gt`. The separator in front of a `sample:` token
    /// is the operation between samples.
    fn parse_genotypes(value: &str) -> QueryResult<(Option<QueryOperation>, Vec<(String, Vec<String>)>)> {
        let mut samples: Vec<(String, Vec<String>)> = Vec::new();
        let mut operation: Option<QueryOperation> = None;
        let mut separator: Option<QueryOperation> = None;
        let mut token = String::new();

        let mut flush = |token: &str, separator: Option<QueryOperation>| -> QueryResult<()> {
            if token.is_empty() {
                return Ok(());
            }
            match split_study_resource(token) {
                (Some(sample), genotype) => {
                    if let Some(separator) = separator {
                        match operation {
                            Some(op) if op != separator => {
                                return Err(QueryError::MixedOperators(value.to_string()))
                            }
                            _ => operation = Some(separator),
                        }
                    }
                    samples.push((sample.to_string(), vec![genotype.to_string()]));
                }
                (None, genotype) => match samples.last_mut() {
                    Some((_, genotypes)) => genotypes.push(genotype.to_string()),
                    None => {
                        return Err(QueryError::malformed(
                            QueryParam::Genotype.key(),
                            value,
                            "Expected {sample}:{genotype}",
                        ))
                    }
                },
            }
            Ok(())
        };

        for c in value.chars() {
            match c {
                OR_CHAR | AND_CHAR => {
                    flush(&token, separator)?;
                    token.clear();
                    separator = Some(if c == OR_CHAR {
                        QueryOperation::Or
                    } else {
                        QueryOperation::And
                    });
                }
                _ => token.push(c),
            }
        }
        flush(&token, separator)?;
        if samples.len() <= 1 {
            operation = None;
        }
        Ok((operation, samples))
    }

    fn genotype_filter(&self, filters: &mut Vec<String>, file_filter: &[FileRef]) -> QueryResult<()> {
        let Some(value) = self.query.value(QueryParam::Genotype) else {
            return Ok(());
        };
        let (operation, samples) = Self::parse_genotypes(value)?;

        let mut gt_filters = Vec::with_capacity(samples.len());
        for (sample, genotypes) in &samples {
            let genotypes: Vec<&String> = genotypes.iter().filter(|g| g.as_str() != NA_GENOTYPE).collect();
            if genotypes.is_empty() {
                continue;
            }
            let negated = if genotypes.iter().all(|g| is_negated(g)) {
                true
            } else if genotypes.iter().any(|g| is_negated(g)) {
                return Err(QueryError::malformed(
                    QueryParam::Genotype.key(),
                    value,
                    "Can not mix negated and not negated genotypes",
                ));
            } else {
                false
            };

            let (study, sample_name) = self.study_resource(sample)?;
            let sample = self.resolve(EntityKind::Sample, study, sample_name)?;
            let columns = self.genotype_columns(study, sample, file_filter);

            let mut sample_filters = Vec::new();
            for genotype in genotypes {
                let genotype = check_string_value(remove_negation(genotype))?;
                let hom_ref = genotype == "0/0" || genotype == "0|0";
                for column in &columns {
                    let key = column.quoted();
                    sample_filters.push(match (hom_ref, negated) {
                        (true, true) => format!("{} IS NOT NULL AND {}[1] != '{}'", key, key, genotype),
                        (true, false) => format!("( {}[1] = '{}' OR {} IS NULL )", key, genotype, key),
                        (false, true) => format!("( {}[1] != '{}' OR {} IS NULL )", key, genotype, key),
                        (false, false) => format!("{}[1] = '{}'", key, genotype),
                    });
                }
            }
            let op = if negated { QueryOperation::And } else { QueryOperation::Or };
            gt_filters.push(append_filters(&sample_filters, Some(op)));
        }
        if !gt_filters.is_empty() {
            filters.push(append_filters(&gt_filters, operation));
        }
        Ok(())
    }

    /// Sample columns holding the genotype, restricted to the filtered files
    /// of a multi-file sample
    fn genotype_columns(&self, study: u32, sample: u32, file_filter: &[FileRef]) -> Vec<Column> {
        if !self.catalog.is_multi_file_sample(study, sample) {
            return vec![sample_column(study, sample)];
        }
        let sample_files = self.catalog.files_of_sample(study, sample);
        if file_filter.is_empty() {
            let mut columns = vec![sample_column(study, sample)];
            columns.extend(
                sample_files
                    .iter()
                    .skip(1)
                    .map(|file| sample_file_column(study, sample, *file)),
            );
            return columns;
        }
        file_filter
            .iter()
            .filter(|f| f.study == study)
            .filter_map(|f| match sample_files.iter().position(|x| *x == f.file) {
                Some(0) => Some(sample_column(study, sample)),
                Some(_) => Some(sample_file_column(study, sample, f.file)),
                None => None,
            })
            .collect()
    }

    fn release_filter(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let Some(value) = self.query.value(QueryParam::Release) else {
            return Ok(());
        };
        let release = match value.trim().parse::<i64>() {
            Ok(release) if release > 0 && release <= u32::MAX as i64 => release as u32,
            _ => return Err(QueryError::malformed(QueryParam::Release.key(), value, "Expected a release > 0")),
        };
        // R_n columns exist only up to the current release
        let release = release.min(self.catalog.project_release().max(1));
        let source = ValueSource::internal();
        let mut parts = Vec::with_capacity(release as usize);
        for r in 1..=release {
            parts.push(build_filter(&release_column(r), "=", "true", "", "", 0, source)?);
        }
        filters.push(parts.join(" OR "));
        Ok(())
    }

    // =========================================================================
    // Annotation filters
    // =========================================================================

    fn annotation_filters(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        if let Some(value) = self.query.value(QueryParam::AnnotationExists) {
            let not = if parse_boolean(value) { "NOT " } else { "" };
            filters.push(format!("{} IS {}NULL", VariantColumn::FullAnnotation, not));
        }

        match Combination::from_query(&self.query)? {
            Combination::Ct => self.add(filters, self.consequence_type_spec())?,
            Combination::Flag | Combination::None => {
                self.add_column(filters, QueryParam::TranscriptFlag, VariantColumn::TranscriptFlags)?
            }
            Combination::Biotype => self.add_column(filters, QueryParam::Biotype, VariantColumn::Biotype)?,
            Combination::BiotypeFlag => {
                self.add_column(filters, QueryParam::Biotype, VariantColumn::Biotype)?;
                self.add_column(filters, QueryParam::TranscriptFlag, VariantColumn::TranscriptFlags)?;
            }
            Combination::BiotypeCt => self.so_biotype_combination(filters)?,
            Combination::CtFlag => self.so_flag_combination(filters)?,
            Combination::BiotypeCtFlag => {
                self.so_biotype_combination(filters)?;
                self.so_flag_combination(filters)?;
            }
        }

        for (param, numeric, text) in [
            (QueryParam::Sift, VariantColumn::Sift, VariantColumn::SiftDesc),
            (QueryParam::Polyphen, VariantColumn::Polyphen, VariantColumn::PolyphenDesc),
        ] {
            let spec = FilterSpec::resolved(param, move |kov, raw| {
                if !kov.key_str().is_empty() {
                    return Err(QueryError::malformed(param.key(), raw, "Unexpected source"));
                }
                Ok(protein_score_column(&kov.value, numeric, text))
            })
            .with_slot(protein_score_slot);
            self.add(filters, spec)?;
        }

        let spec = FilterSpec::resolved(QueryParam::ProteinSubstitution, |kov, raw| {
            let source = kov.key_str();
            if source.eq_ignore_ascii_case("sift") {
                Ok(protein_score_column(&kov.value, VariantColumn::Sift, VariantColumn::SiftDesc))
            } else if source.eq_ignore_ascii_case("polyphen") {
                Ok(protein_score_column(&kov.value, VariantColumn::Polyphen, VariantColumn::PolyphenDesc))
            } else {
                Err(QueryError::malformed(
                    QueryParam::ProteinSubstitution.key(),
                    raw,
                    "Expected sift or polyphen",
                ))
            }
        })
        .with_slot(protein_score_slot);
        self.add(filters, spec)?;

        let spec = FilterSpec::resolved(QueryParam::Conservation, |kov, raw| {
            conservation_column(kov.key_str())
                .map(|c| c.column())
                .map_err(|e| QueryError::malformed(QueryParam::Conservation.key(), raw, e.to_string()))
        });
        self.add(filters, spec)?;

        self.population_filters(filters)?;

        self.add_column(filters, QueryParam::GeneTraitId, VariantColumn::Xrefs)?;
        self.add_column(filters, QueryParam::GeneTraitName, VariantColumn::GeneTraitName)?;
        self.add_column(filters, QueryParam::Hpo, VariantColumn::Xrefs)?;

        for param in [QueryParam::GoGenes, QueryParam::ExpressionGenes] {
            self.gene_list_filter(filters, param)?;
        }

        self.add_column(filters, QueryParam::ProteinKeyword, VariantColumn::ProteinKeywords)?;
        self.add_column(filters, QueryParam::Drug, VariantColumn::Drug)?;

        let spec = FilterSpec::resolved(QueryParam::FunctionalScore, |kov, raw| {
            functional_score_column(kov.key_str())
                .map(|c| c.column())
                .map_err(|e| QueryError::malformed(QueryParam::FunctionalScore.key(), raw, e.to_string()))
        });
        self.add(filters, spec)?;

        self.add_column(filters, QueryParam::ClinicalSignificance, VariantColumn::ClinicalSignificance)
    }

    fn consequence_type_spec(&self) -> FilterSpec<'static> {
        FilterSpec::column(QueryParam::ConsequenceType, VariantColumn::So.column()).with_value(|kov| {
            let accessions = consequence_accessions(std::slice::from_ref(&kov.value))?;
            Ok(match accessions.as_slice() {
                [single] => FilterValue::Single(single.to_string()),
                _ => FilterValue::AnyOf(accessions.iter().map(u32::to_string).collect()),
            })
        })
    }

    fn combined_values(&self, first: QueryParam, second: QueryParam, so_first: bool) -> QueryResult<Vec<String>> {
        let (_, so) = self.split_param(QueryParam::ConsequenceType)?;
        let so = consequence_accessions(&so)?;
        let other_param = if so_first { second } else { first };
        let (_, others) = self.split_param(other_param)?;
        let mut combined = Vec::with_capacity(so.len() * others.len());
        for accession in &so {
            let accession = accession.to_string();
            for other in &others {
                combined.push(if so_first {
                    combine(&[accession.as_str(), other.as_str()])
                } else {
                    combine(&[other.as_str(), accession.as_str()])
                });
            }
        }
        Ok(combined)
    }

    /// `biotype_so` tokens on `A_BT_SO`
    fn so_biotype_combination(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let combined = self.combined_values(QueryParam::Biotype, QueryParam::ConsequenceType, false)?;
        let spec = FilterSpec::column(QueryParam::ConsequenceType, VariantColumn::BiotypeSo.column());
        if let Some(filter) = spec.compile_values(Some(QueryOperation::Or), &combined)? {
            filters.push(filter);
        }
        Ok(())
    }

    /// `so_flag` tokens on `A_SO_FLAG`
    fn so_flag_combination(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let combined = self.combined_values(QueryParam::ConsequenceType, QueryParam::TranscriptFlag, true)?;
        let spec = FilterSpec::column(QueryParam::ConsequenceType, VariantColumn::SoFlag.column());
        if let Some(filter) = spec.compile_values(Some(QueryOperation::Or), &combined)? {
            filters.push(filter);
        }
        Ok(())
    }

    fn population(param: QueryParam, kov: &KeyOpValue, raw: &str) -> QueryResult<Population> {
        Population::parse_key(kov.key_str())
            .ok_or_else(|| QueryError::malformed(param.key(), raw, "Expected {source}:{population}"))
    }

    fn population_filters(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let param = QueryParam::PopulationMaf;
        let spec = FilterSpec::resolved(param, move |kov, raw| Ok(Self::population(param, kov, raw)?.column()))
            .with_extra(move |kov| {
                let raw = format!("{}{}{}", kov.key_str(), kov.op, kov.value);
                let population = Self::population(param, kov, &raw)?;
                let quoted = population.column().quoted();
                let value = format_double(parse_double(&kov.value, ValueSource::new(param, &raw))?);
                let op = parse_numeric_operator(&kov.op)?;
                if kov.op.starts_with('<') {
                    let mut extra = format!("OR {}[2] {} {}", quoted, op, value);
                    if population_null_relaxation(PopulationKind::Maf, &kov.op, population.is_default()) {
                        extra.push_str(&format!(" OR {}[2] IS NULL", quoted));
                    }
                    Ok(extra)
                } else if kov.op.starts_with('>') {
                    Ok(format!("AND {}[2] {} {}", quoted, op, value))
                } else {
                    Err(QueryError::malformed(
                        param.key(),
                        &raw,
                        format!("Unable to use operator {} with this query", kov.op),
                    ))
                }
            })
            .with_fixed_slot(1);
        self.add(filters, spec)?;

        for (param, kind, slot) in [
            (QueryParam::PopulationAlt, PopulationKind::AltFreq, 2),
            (QueryParam::PopulationRef, PopulationKind::RefFreq, 1),
        ] {
            let spec = FilterSpec::resolved(param, move |kov, raw| Ok(Self::population(param, kov, raw)?.column()))
                .with_extra(move |kov| {
                    let population = Self::population(param, kov, kov.key_str())?;
                    if population_null_relaxation(kind, &kov.op, population.is_default()) {
                        Ok(format!("OR {}[{}] IS NULL", population.column().quoted(), slot))
                    } else {
                        Ok(String::new())
                    }
                })
                .with_fixed_slot(slot);
            self.add(filters, spec)?;
        }
        Ok(())
    }

    /// Pre-resolved gene lists (GO terms, expression) on `A_GENES`
    fn gene_list_filter(&self, filters: &mut Vec<String>, param: QueryParam) -> QueryResult<()> {
        let Some(value) = self.query.value(param) else {
            return Ok(());
        };
        if check_operator(value)? == Some(QueryOperation::And) {
            return Err(QueryError::malformed(param.key(), value, "Unimplemented AND operator"));
        }
        let (_, genes) = split_values(value)?;
        if genes.is_empty() {
            filters.push(build_filter(
                &VariantColumn::Chromosome.column(),
                "=",
                VOID_CHROMOSOME,
                "",
                "",
                0,
                ValueSource::internal(),
            )?);
            return Ok(());
        }
        let spec = FilterSpec::column(param, VariantColumn::Genes.column());
        if let Some(filter) = spec.compile_values(Some(QueryOperation::Or), &genes)? {
            filters.push(filter);
        }
        Ok(())
    }

    // =========================================================================
    // Cohort stats filters
    // =========================================================================

    fn stats_filters(&self, filters: &mut Vec<String>) -> QueryResult<()> {
        let (studies, study_operation) = match self.query.value(QueryParam::Study) {
            Some(value) => {
                let (operation, names) = split_values(value)?;
                let mut studies = Vec::new();
                for name in names.iter().filter(|n| !is_negated(n)) {
                    let id = self.resolve_study(name)?;
                    if !studies.contains(&id) {
                        studies.push(id);
                    }
                }
                let operation = if studies.len() == 1 { None } else { operation };
                (studies, operation)
            }
            None => {
                let studies = self.catalog.study_ids();
                let operation = if studies.len() == 1 {
                    None
                } else {
                    Some(QueryOperation::Or)
                };
                (studies, operation)
            }
        };

        let stats: [(QueryParam, StatsKind, fn(u32, u32) -> Column, Option<usize>); 5] = [
            (QueryParam::StatsRef, StatsKind::RefFreq, cohort_freq_column, Some(1)),
            (QueryParam::StatsAlt, StatsKind::AltFreq, cohort_freq_column, Some(2)),
            (QueryParam::StatsMaf, StatsKind::Maf, cohort_maf_column, None),
            (QueryParam::StatsMgf, StatsKind::Mgf, cohort_mgf_column, None),
            (QueryParam::StatsPassFreq, StatsKind::PassFreq, cohort_pass_freq_column, None),
        ];
        for (param, kind, column, slot) in stats {
            let studies = &studies;
            let mut spec = FilterSpec::resolved(param, move |kov, _| {
                Ok(self.cohort_column(kov.key_str(), column)?.1)
            })
            .with_extra(move |kov| {
                let (study, column) = self.cohort_column(kov.key_str(), column)?;
                if !stats_null_relaxation(kind, &kov.op, study, studies, study_operation) {
                    return Ok(String::new());
                }
                Ok(match slot {
                    Some(slot) => format!("OR {}[{}] IS NULL", column.quoted(), slot),
                    None => format!("OR {} IS NULL", column.quoted()),
                })
            });
            if let Some(slot) = slot {
                spec = spec.with_fixed_slot(slot);
            }
            self.add(filters, spec)?;
        }
        Ok(())
    }

    fn unsupported_filters(&mut self) {
        for param in UNSUPPORTED_PARAMS {
            if self.query.is_valid(param) {
                Logger::warn(UNSUPPORTED_FILTER_EVENT, &[("param", param.key())]);
                self.warnings.push(format!("Unsupported filter \"{}\"", param));
            }
        }
    }
}

/// Numeric scores use the score column, text uses the description column
fn protein_score_column(value: &str, numeric: VariantColumn, text: VariantColumn) -> Column {
    if value.trim().parse::<f64>().is_ok() {
        numeric.column()
    } else {
        text.column()
    }
}

/// `[score, description]`: `>` reads slot 2, `<` slot 1
fn protein_score_slot(op: &str) -> Option<usize> {
    if op.contains('>') {
        Some(2)
    } else if op.contains('<') {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::query::params::SortOrder;
    use crate::query::projection::ProjectionFields;
    use crate::sql::TableName;

    const SNAPSHOT: &str = r#"{
        "release": 3,
        "studies": [{
            "id": 1,
            "name": "s1",
            "files": [{"id": 10, "name": "a.vcf", "samples": [100]}],
            "samples": [{"id": 100, "name": "NA001"}],
            "cohorts": [{"id": 0, "name": "ALL"}]
        }]
    }"#;

    fn setup() -> (QueryCompiler, InMemoryCatalog) {
        let builder = StatementBuilder::new(TableName::parse("variants"), TableKind::View, false);
        (
            QueryCompiler::new(builder),
            InMemoryCatalog::from_json(SNAPSHOT).unwrap(),
        )
    }

    fn coordinates_only(query: &VariantQuery, catalog: &InMemoryCatalog) -> Projection {
        Projection::with_fields(query, catalog, ProjectionFields::none()).unwrap()
    }

    fn compile(query: VariantQuery, options: QueryOptions) -> QueryResult<CompiledQuery> {
        let (compiler, catalog) = setup();
        let projection = coordinates_only(&query, &catalog);
        compiler.compile(&query, &projection, &options, &catalog)
    }

    #[test]
    fn test_bare_query() {
        let compiled = compile(VariantQuery::new(), QueryOptions::new()).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT CHROMOSOME,POSITION,REFERENCE,ALTERNATE,TYPE FROM \"variants\""
        );
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_region_and_type() {
        let query = VariantQuery::new()
            .with(QueryParam::Region, "1:100-200")
            .with(QueryParam::Type, "SNV");
        let sql = compile(query, QueryOptions::new()).unwrap().sql;
        let where_at = sql.find(" WHERE").unwrap();
        let region_at = sql.find("\"CHROMOSOME\" = '1'").unwrap();
        let and_at = sql.find(") AND ").unwrap();
        let type_at = sql.find("\"TYPE\" = 'SNV'").unwrap();
        assert!(where_at < region_at && region_at < type_at);
        assert!(and_at < type_at);
        assert!(sql.contains("\"POSITION\" >= 100"));
        assert!(sql.contains("\"POSITION\" <= 200"));
    }

    #[test]
    fn test_count_skips_order_and_limit() {
        let options = QueryOptions::count().with_limit(10).with_sort(SortOrder::Asc);
        let compiled = compile(VariantQuery::new(), options).unwrap();
        assert_eq!(compiled.sql, "SELECT  COUNT(*)  FROM \"variants\"");
    }

    #[test]
    fn test_order_limit_offset() {
        let options = QueryOptions::new()
            .with_sort(SortOrder::Desc)
            .with_limit(10)
            .with_skip(5);
        let compiled = compile(VariantQuery::new(), options).unwrap();
        assert!(compiled
            .sql
            .ends_with(" ORDER BY CHROMOSOME,POSITION DESC  LIMIT 10 OFFSET 5"));
    }

    #[test]
    fn test_client_side_skip() {
        let (compiler, catalog) = setup();
        let compiler = compiler.with_client_side_skip(true);
        let query = VariantQuery::new();
        let projection = coordinates_only(&query, &catalog);
        let options = QueryOptions::new().with_limit(10).with_skip(5);
        let compiled = compiler.compile(&query, &projection, &options, &catalog).unwrap();
        assert!(compiled.sql.ends_with(" LIMIT 15"));
        assert!(!compiled.sql.contains("OFFSET"));

        let options = QueryOptions::new().with_limit(u64::MAX).with_skip(5);
        let compiled = compiler.compile(&query, &projection, &options, &catalog).unwrap();
        assert!(compiled.sql.ends_with(&format!(" LIMIT {}", u64::MAX)));
    }

    #[test]
    fn test_release_filter() {
        let query = VariantQuery::new().with(QueryParam::Release, "2");
        let compiled = compile(query, QueryOptions::new()).unwrap();
        assert!(compiled.sql.contains("\"R_1\" = true OR \"R_2\" = true"));

        let query = VariantQuery::new().with(QueryParam::Release, "4000000000");
        let sql = compile(query, QueryOptions::new()).unwrap().sql;
        assert!(sql.contains("\"R_1\" = true OR \"R_2\" = true OR \"R_3\" = true"));
        assert!(!sql.contains("\"R_4\""));

        for bad in ["0", "-1", "x"] {
            let query = VariantQuery::new().with(QueryParam::Release, bad);
            let err = compile(query, QueryOptions::new()).unwrap_err();
            assert_eq!(err.code(), "VS_QUERY_MALFORMED_PARAM", "{}", bad);
        }
    }

    #[test]
    fn test_unsupported_filter_warns() {
        let query = VariantQuery::new().with(QueryParam::MissingAlleles, ">3");
        let compiled = compile(query, QueryOptions::new()).unwrap();
        assert_eq!(compiled.warnings, vec!["Unsupported filter \"missingAlleles\""]);
    }

    #[test]
    fn test_parse_genotypes() {
        let (op, samples) = Compilation::parse_genotypes("NA001:0/1,1/1;NA002:0/0").unwrap();
        assert_eq!(op, Some(QueryOperation::And));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].1, vec!["0/1", "1/1"]);

        let (op, samples) = Compilation::parse_genotypes("NA001:0/1").unwrap();
        assert_eq!(op, None);
        assert_eq!(samples.len(), 1);

        assert!(Compilation::parse_genotypes("0/1").is_err());
        assert_eq!(
            Compilation::parse_genotypes("A:0/1,B:1/1;C:0/0").unwrap_err().code(),
            "VS_QUERY_MIXED_OPERATORS"
        );
    }

    #[test]
    fn test_protein_score_slot() {
        assert_eq!(protein_score_slot(">"), Some(2));
        assert_eq!(protein_score_slot("<<="), Some(1));
        assert_eq!(protein_score_slot("="), None);
    }
}
