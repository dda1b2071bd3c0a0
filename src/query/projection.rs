//! Projected columns of a variant query
//!
//! `includeStudy`, `includeFile` and `includeSample` accept a list of names
//! or ids, `all`, or `none`. Without them every study named by `study` (or
//! every study) is returned with all its indexed files and their samples.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{CatalogLookup, EntityKind};
use crate::schema::{
    cohort_stats_column, file_column, fill_missing_column, release_column, sample_column,
    sample_file_column, study_column, variant_score_column, VariantColumn,
};

use super::errors::{QueryError, QueryResult};
use super::params::{QueryParam, VariantQuery};
use super::values::{is_negated, split_values};

pub const ALL: &str = "all";
pub const NONE: &str = "none";

/// Variant fields to return besides the coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionFields {
    pub studies: bool,
    pub stats: bool,
    pub files: bool,
    pub samples: bool,
    pub scores: bool,
    pub annotation: bool,
}

impl Default for ProjectionFields {
    fn default() -> Self {
        Self {
            studies: true,
            stats: true,
            files: true,
            samples: true,
            scores: true,
            annotation: true,
        }
    }
}

impl ProjectionFields {
    /// Coordinates only
    pub fn none() -> Self {
        Self {
            studies: false,
            stats: false,
            files: false,
            samples: false,
            scores: false,
            annotation: false,
        }
    }

    /// Parse a comma separated exclude list: `studies`, `stats`, `files`,
    /// `samples`, `scores`, `annotation`
    pub fn excluding(exclude: &str) -> QueryResult<Self> {
        let mut fields = Self::default();
        for field in exclude.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match field.to_ascii_lowercase().as_str() {
                "studies" => fields.studies = false,
                "stats" => fields.stats = false,
                "files" => fields.files = false,
                "samples" => fields.samples = false,
                "scores" => fields.scores = false,
                "annotation" => fields.annotation = false,
                _ => return Err(QueryError::unknown("field", field)),
            }
        }
        Ok(fields)
    }
}

/// One projected sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleProjection {
    pub id: u32,
    /// Every file of the sample, in load order
    pub files: Vec<u32>,
    /// Files projected through sample+file columns. Empty unless multi-file.
    pub split_files: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyProjection {
    pub id: u32,
    pub files: Vec<u32>,
    pub samples: Vec<SampleProjection>,
    pub cohorts: Vec<u32>,
    pub scores: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub fields: ProjectionFields,
    pub studies: Vec<StudyProjection>,
    pub release: u32,
}

enum Include {
    Default,
    All,
    None,
    Names(Vec<String>),
}

fn include_param(query: &VariantQuery, param: QueryParam) -> QueryResult<Include> {
    let Some(value) = query.value(param) else {
        return Ok(Include::Default);
    };
    if value.eq_ignore_ascii_case(ALL) {
        return Ok(Include::All);
    }
    if value.eq_ignore_ascii_case(NONE) {
        return Ok(Include::None);
    }
    let (_, names) = split_values(value)?;
    Ok(Include::Names(names))
}

fn push_unique(ids: &mut Vec<u32>, id: u32) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

impl Projection {
    pub fn from_query(query: &VariantQuery, catalog: &dyn CatalogLookup) -> QueryResult<Projection> {
        Self::with_fields(query, catalog, ProjectionFields::default())
    }

    pub fn with_fields(
        query: &VariantQuery,
        catalog: &dyn CatalogLookup,
        fields: ProjectionFields,
    ) -> QueryResult<Projection> {
        let study_ids = Self::projected_studies(query, catalog)?;
        let include_file = include_param(query, QueryParam::IncludeFile)?;
        let include_sample = include_param(query, QueryParam::IncludeSample)?;

        let mut studies = Vec::with_capacity(study_ids.len());
        for study in study_ids {
            let indexed = catalog.indexed_files(study);

            let sample_ids = match &include_sample {
                Include::None => Vec::new(),
                Include::All => catalog.ids(EntityKind::Sample, study),
                Include::Names(names) => {
                    let mut ids = Vec::with_capacity(names.len());
                    for name in names {
                        let id = catalog
                            .resolve(EntityKind::Sample, study, name)
                            .ok_or_else(|| QueryError::unknown("sample", name))?;
                        push_unique(&mut ids, id);
                    }
                    ids
                }
                Include::Default => Vec::new(),
            };

            let files = match &include_file {
                Include::None => Vec::new(),
                Include::All => indexed.clone(),
                Include::Names(names) => {
                    let mut ids = Vec::with_capacity(names.len());
                    for name in names {
                        let id = catalog
                            .resolve(EntityKind::File, study, name)
                            .ok_or_else(|| QueryError::unknown("file", name))?;
                        push_unique(&mut ids, id);
                    }
                    ids
                }
                Include::Default => match &include_sample {
                    Include::Names(_) => {
                        let mut ids = Vec::new();
                        for sample in &sample_ids {
                            for file in catalog.files_of_sample(study, *sample) {
                                if indexed.contains(&file) {
                                    push_unique(&mut ids, file);
                                }
                            }
                        }
                        ids
                    }
                    _ => indexed.clone(),
                },
            };

            let sample_ids = match include_sample {
                Include::Default => {
                    let mut ids = Vec::new();
                    for file in &files {
                        for sample in catalog.samples_of_file(study, *file) {
                            push_unique(&mut ids, sample);
                        }
                    }
                    ids
                }
                _ => sample_ids,
            };

            let explicit_files = matches!(include_file, Include::Names(_));
            let samples = sample_ids
                .into_iter()
                .map(|sample| {
                    let sample_files = catalog.files_of_sample(study, sample);
                    let split_files = if catalog.is_multi_file_sample(study, sample) {
                        sample_files
                            .iter()
                            .copied()
                            .filter(|f| !explicit_files || files.contains(f))
                            .collect()
                    } else {
                        Vec::new()
                    };
                    SampleProjection {
                        id: sample,
                        files: sample_files,
                        split_files,
                    }
                })
                .collect();

            studies.push(StudyProjection {
                id: study,
                files,
                samples,
                cohorts: catalog.ids(EntityKind::Cohort, study),
                scores: catalog.ids(EntityKind::Score, study),
            });
        }

        Ok(Projection {
            fields,
            studies,
            release: catalog.project_release(),
        })
    }

    fn projected_studies(query: &VariantQuery, catalog: &dyn CatalogLookup) -> QueryResult<Vec<u32>> {
        let resolve = |name: &str| {
            catalog
                .resolve_study(name)
                .ok_or_else(|| QueryError::unknown("study", name))
        };
        match include_param(query, QueryParam::IncludeStudy)? {
            Include::All => return Ok(catalog.study_ids()),
            Include::None => return Ok(Vec::new()),
            Include::Names(names) => {
                let mut ids = Vec::with_capacity(names.len());
                for name in &names {
                    push_unique(&mut ids, resolve(name)?);
                }
                return Ok(ids);
            }
            Include::Default => {}
        }
        if let Some(value) = query.value(QueryParam::Study) {
            let (_, names) = split_values(value)?;
            let mut ids = Vec::new();
            for name in names.iter().filter(|n| !is_negated(n)) {
                push_unique(&mut ids, resolve(name)?);
            }
            if !ids.is_empty() {
                return Ok(ids);
            }
        }
        Ok(catalog.study_ids())
    }

    pub fn study(&self, study: u32) -> Option<&StudyProjection> {
        self.studies.iter().find(|s| s.id == study)
    }

    /// Ids of the projected studies
    pub fn study_ids(&self) -> Vec<u32> {
        self.studies.iter().map(|s| s.id).collect()
    }

    /// Column list of the SELECT, or ` COUNT(*) ` for counts
    pub fn select_list(&self, count: bool) -> String {
        if count {
            return " COUNT(*) ".to_string();
        }
        let mut sb = [
            VariantColumn::Chromosome,
            VariantColumn::Position,
            VariantColumn::Reference,
            VariantColumn::Alternate,
            VariantColumn::Type,
        ]
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(",");

        let mut push = |quoted: String| {
            sb.push(',');
            sb.push_str(&quoted);
        };
        let fields = self.fields;
        for study in &self.studies {
            if fields.studies {
                push(study_column(study.id).quoted());
                push(fill_missing_column(study.id).quoted());
                if fields.stats {
                    for cohort in &study.cohorts {
                        push(cohort_stats_column(study.id, *cohort).quoted());
                    }
                }
            }
            if fields.files {
                for file in &study.files {
                    push(file_column(study.id, *file).quoted());
                }
            }
            if fields.samples {
                let mut sample_files = BTreeSet::new();
                for sample in &study.samples {
                    push(sample_column(study.id, sample.id).quoted());
                    let first = sample.files.first().copied();
                    for file in &sample.split_files {
                        if Some(*file) != first {
                            push(sample_file_column(study.id, sample.id, *file).quoted());
                        }
                    }
                    sample_files.extend(sample.files.iter().copied());
                }
                for file in sample_files {
                    if !study.files.contains(&file) {
                        push(file_column(study.id, file).quoted());
                    }
                }
            }
            if fields.scores {
                for score in &study.scores {
                    push(variant_score_column(study.id, *score).quoted());
                }
            }
        }
        if fields.annotation {
            push(VariantColumn::FullAnnotation.name().to_string());
            push(VariantColumn::SoAnnotationId.name().to_string());
            for release in 1..=self.release {
                push(release_column(release).name);
            }
        }
        sb
    }

    /// Multi-file sample layout, for callers decoding the returned row
    pub fn split_samples(&self, study: u32) -> BTreeMap<u32, Vec<u32>> {
        self.study(study)
            .map(|s| {
                s.samples
                    .iter()
                    .filter(|x| !x.split_files.is_empty())
                    .map(|x| (x.id, x.split_files.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    const SNAPSHOT: &str = r#"{
        "release": 2,
        "studies": [{
            "id": 1,
            "name": "s1",
            "files": [
                {"id": 10, "name": "a.vcf", "samples": [100, 101]},
                {"id": 11, "name": "b.vcf", "samples": [100]}
            ],
            "samples": [
                {"id": 100, "name": "NA001", "files": [10, 11], "multi_file": true},
                {"id": 101, "name": "NA002"}
            ],
            "cohorts": [{"id": 0, "name": "ALL"}],
            "scores": [{"id": 3, "name": "gwas"}]
        }, {
            "id": 2,
            "name": "s2",
            "files": [{"id": 20, "name": "c.vcf", "samples": [200]}],
            "samples": [{"id": 200, "name": "NA003"}]
        }]
    }"#;

    fn setup_catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_json(SNAPSHOT).unwrap()
    }

    #[test]
    fn test_default_projection() {
        let catalog = setup_catalog();
        let query = VariantQuery::new().with(QueryParam::Study, "s1");
        let projection = Projection::from_query(&query, &catalog).unwrap();
        assert_eq!(projection.study_ids(), vec![1]);
        assert_eq!(
            projection.select_list(false),
            "CHROMOSOME,POSITION,REFERENCE,ALTERNATE,TYPE,\"1_ST\",\"_1_FM\",\"1_0_PB\",\
             \"1_10_F\",\"1_11_F\",\"1_100_S\",\"1_100_11_S\",\"1_101_S\",\"1_3_VS\",\
             A_FULL,A_ID,R_1,R_2"
        );
        assert_eq!(projection.split_samples(1).get(&100), Some(&vec![10, 11]));
    }

    #[test]
    fn test_count_projection() {
        let catalog = setup_catalog();
        let projection = Projection::from_query(&VariantQuery::new(), &catalog).unwrap();
        assert_eq!(projection.select_list(true), " COUNT(*) ");
        assert_eq!(projection.study_ids(), vec![1, 2]);
    }

    #[test]
    fn test_include_sample_adds_missing_files() {
        let catalog = setup_catalog();
        let query = VariantQuery::new()
            .with(QueryParam::IncludeStudy, "s1")
            .with(QueryParam::IncludeFile, "b.vcf")
            .with(QueryParam::IncludeSample, "NA002");
        let projection =
            Projection::with_fields(&query, &catalog, ProjectionFields::excluding("annotation,stats,scores").unwrap())
                .unwrap();
        assert_eq!(
            projection.select_list(false),
            "CHROMOSOME,POSITION,REFERENCE,ALTERNATE,TYPE,\"1_ST\",\"_1_FM\",\"1_11_F\",\"1_101_S\",\"1_10_F\""
        );
    }

    #[test]
    fn test_none_and_unknown() {
        let catalog = setup_catalog();
        let query = VariantQuery::new().with(QueryParam::IncludeStudy, "none");
        let projection = Projection::from_query(&query, &catalog).unwrap();
        assert!(projection.studies.is_empty());

        let query = VariantQuery::new().with(QueryParam::IncludeSample, "ghost");
        let err = Projection::from_query(&query, &catalog).unwrap_err();
        assert_eq!(err, QueryError::unknown("sample", "ghost"));

        assert!(ProjectionFields::excluding("colour").is_err());
    }
}
