//! The `RddCounts` context object and its builder.

use crate::counts::{aggregate_counts, switch_group_column, update_groups, CountTable, GroupMapping};
use crate::data::{
    Network, ReferenceMetadata, SampleMetadata, SampleTypeFilter, Table, GROUP_COLUMN,
};
use crate::error::{RddError, Result};
use crate::filter::{select_clusters, ClusterSelection, FilterSummary, GroupSelection};
use crate::flow::{flows_from_counts, flows_from_network, FlowGraph, NoiseFloor};
use crate::normalize::{clr, to_proportions, to_wide, WideTable};
use crate::pipeline::config::{RddConfig, DEFAULT_LEVELS};
use crate::pipeline::source::NetworkSource;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reference data-driven counts for one network.
///
/// Owns the inputs and the long-form count table. The table is produced once
/// by the builder; afterwards only its `group` column can change, through
/// [`RddCounts::set_group_column`], [`RddCounts::update_groups`] and
/// [`RddCounts::rename_groups`].
#[derive(Debug, Clone)]
pub struct RddCounts {
    reference: ReferenceMetadata,
    samples: SampleMetadata,
    network: Network,
    selection: GroupSelection,
    counts: CountTable,
    requested_levels: usize,
    levels: usize,
    summary: FilterSummary,
    noise_floor: Option<NoiseFloor>,
}

impl RddCounts {
    pub fn builder<'a>() -> RddCountsBuilder<'a> {
        RddCountsBuilder::new()
    }

    /// Build from a configuration. `source` resolves `task_id` when set.
    pub fn from_config(config: &RddConfig, source: Option<&dyn NetworkSource>) -> Result<Self> {
        let mut builder = RddCountsBuilder::new()
            .sample_group_column(&config.sample_group_column)
            .groups(config.groups.clone())
            .sample_type(config.sample_type)
            .levels(config.levels);
        if let Some(path) = &config.network {
            builder = builder.network_path(path);
        }
        if let Some(task_id) = &config.task_id {
            builder = builder.task_id(task_id);
        }
        if let Some(source) = source {
            builder = builder.source(source);
        }
        if let Some(path) = &config.reference_metadata {
            builder = builder.reference_path(path);
        }
        if let Some(path) = &config.sample_metadata {
            builder = builder.sample_metadata_path(path);
        }
        if let Some(columns) = &config.ontology_columns {
            builder = builder.ontology_columns(columns.clone());
        }
        if let Some(floor) = &config.noise_floor {
            builder = builder.noise_floor(floor.clone());
        }
        builder.build()
    }

    /// The long-form count table.
    pub fn counts(&self) -> &CountTable {
        &self.counts
    }

    /// Effective ontology depth after clamping.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Depth requested before clamping.
    pub fn requested_levels(&self) -> usize {
        self.requested_levels
    }

    pub fn reference(&self) -> &ReferenceMetadata {
        &self.reference
    }

    pub fn samples(&self) -> &SampleMetadata {
        &self.samples
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn selection(&self) -> &GroupSelection {
        &self.selection
    }

    /// Default noise floor for [`RddCounts::network_flows`].
    pub fn noise_floor(&self) -> Option<&NoiseFloor> {
        self.noise_floor.as_ref()
    }

    /// Outcome of the cluster exclusivity filter.
    pub fn filter_summary(&self) -> FilterSummary {
        self.summary
    }

    /// Level-0 rows: total reference matches per file.
    pub fn file_counts(&self) -> CountTable {
        self.counts.filter_counts(0, None, None)
    }

    /// See [`CountTable::filter_counts`].
    pub fn filter_counts(
        &self,
        level: usize,
        reference_types: Option<&[String]>,
        top_n: Option<usize>,
    ) -> CountTable {
        self.counts.filter_counts(level, reference_types, top_n)
    }

    /// Switch the active grouping column and re-join groups.
    ///
    /// On error nothing changes.
    pub fn set_group_column(&mut self, column: &str) -> Result<()> {
        self.samples = switch_group_column(&mut self.counts, &self.samples, column)?;
        info!("Active grouping column is now '{}'", column);
        Ok(())
    }

    /// Apply a filename -> group mapping.
    pub fn update_groups(&mut self, mapping: &GroupMapping) {
        update_groups(&mut self.counts, &mut self.samples, mapping);
        info!("Updated groups for {} files", mapping.len());
    }

    /// Load a mapping file keyed by `filename` and apply it.
    ///
    /// A mapping that cannot be read leaves the counts unmodified.
    pub fn update_groups_from_path(&mut self, path: &Path, value_column: &str) -> Result<()> {
        let mapping = GroupMapping::load(path, value_column)?;
        self.update_groups(&mapping);
        Ok(())
    }

    /// Rename group labels in the count table.
    pub fn rename_groups(&mut self, names: &HashMap<String, String>) {
        self.counts.rename_groups(names);
    }

    /// Flow graph from the count table, optionally for one file.
    pub fn flows(&self, max_level: usize, filename: Option<&str>) -> Result<FlowGraph> {
        flows_from_counts(&self.counts, &self.reference, max_level, filename)
    }

    /// Flow graph directly from the network clusters.
    ///
    /// The exclusivity filter always applies: with no network group selected,
    /// only clusters absent from every group contribute. `noise_floor` falls
    /// back to the one configured on the builder.
    pub fn network_flows(
        &self,
        max_level: usize,
        noise_floor: Option<&NoiseFloor>,
    ) -> Result<FlowGraph> {
        flows_from_network(
            &self.network,
            &self.reference,
            &self.selection.for_network(&self.network),
            max_level,
            noise_floor.or(self.noise_floor.as_ref()),
        )
    }

    /// Wide table of raw counts at one level.
    pub fn wide(&self, level: usize) -> Result<WideTable> {
        to_wide(&self.counts, level)
    }

    /// Wide table of per-file proportions at one level.
    pub fn proportions(&self, level: usize) -> Result<WideTable> {
        Ok(to_proportions(&self.wide(level)?))
    }

    /// Wide table of CLR-transformed counts at one level.
    pub fn clr(&self, level: usize, offset: f64) -> Result<WideTable> {
        clr(&self.wide(level)?, offset)
    }

    /// Write the count table as TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.counts.to_tsv(path)
    }
}

/// Fluent construction of [`RddCounts`].
pub struct RddCountsBuilder<'a> {
    network_path: Option<PathBuf>,
    network_table: Option<Table>,
    task_id: Option<String>,
    source: Option<&'a dyn NetworkSource>,
    reference_path: Option<PathBuf>,
    reference: Option<ReferenceMetadata>,
    sample_metadata_path: Option<PathBuf>,
    samples: Option<SampleMetadata>,
    sample_group_column: String,
    selection: GroupSelection,
    sample_type: SampleTypeFilter,
    levels: usize,
    ontology_columns: Option<Vec<String>>,
    noise_floor: Option<NoiseFloor>,
}

impl Default for RddCountsBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RddCountsBuilder<'a> {
    pub fn new() -> Self {
        Self {
            network_path: None,
            network_table: None,
            task_id: None,
            source: None,
            reference_path: None,
            reference: None,
            sample_metadata_path: None,
            samples: None,
            sample_group_column: GROUP_COLUMN.to_string(),
            selection: GroupSelection::default(),
            sample_type: SampleTypeFilter::All,
            levels: DEFAULT_LEVELS,
            ontology_columns: None,
            noise_floor: None,
        }
    }

    /// Clustering table file.
    pub fn network_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.network_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Clustering table already in memory.
    pub fn network_table(mut self, table: Table) -> Self {
        self.network_table = Some(table);
        self
    }

    /// Network job to retrieve through [`RddCountsBuilder::source`].
    pub fn task_id(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn source(mut self, source: &'a dyn NetworkSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn reference_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.reference_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use loaded reference metadata instead of reading a file.
    pub fn reference(mut self, reference: ReferenceMetadata) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn sample_metadata_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sample_metadata_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use loaded sample metadata instead of reading a file.
    pub fn sample_metadata(mut self, samples: SampleMetadata) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Grouping column read from the sample metadata file.
    pub fn sample_group_column(mut self, column: &str) -> Self {
        self.sample_group_column = column.to_string();
        self
    }

    pub fn groups(mut self, selection: GroupSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn sample_groups(mut self, groups: &[&str]) -> Self {
        self.selection.sample_groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn reference_groups(mut self, groups: &[&str]) -> Self {
        self.selection.reference_groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn sample_type(mut self, filter: SampleTypeFilter) -> Self {
        self.sample_type = filter;
        self
    }

    /// Requested ontology depth; clamped to the available columns.
    pub fn levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    pub fn ontology_columns(mut self, columns: Vec<String>) -> Self {
        self.ontology_columns = Some(columns);
        self
    }

    /// Noise floor applied by [`RddCounts::network_flows`] when none is given.
    pub fn noise_floor(mut self, floor: NoiseFloor) -> Self {
        self.noise_floor = Some(floor);
        self
    }

    fn load_network(&mut self) -> Result<Network> {
        let n_files = usize::from(self.network_path.is_some()) + usize::from(self.network_table.is_some());
        if n_files + usize::from(self.task_id.is_some()) != 1 {
            return Err(RddError::Config(
                "Provide exactly one of a network file or a task id".to_string(),
            ));
        }

        if let Some(path) = &self.network_path {
            return Network::load(path);
        }
        if let Some(table) = self.network_table.take() {
            return Network::from_table(&table);
        }
        let task_id = self.task_id.as_deref().unwrap_or_default();
        let source = self.source.ok_or_else(|| {
            RddError::Config(format!(
                "Task id '{}' given but no network source is configured",
                task_id
            ))
        })?;
        info!("Fetching network table for task '{}'", task_id);
        Network::from_table(&source.fetch(task_id)?)
    }

    fn load_reference(&mut self) -> Result<ReferenceMetadata> {
        let reference = match self.reference.take() {
            Some(reference) => reference,
            None => ReferenceMetadata::load(
                self.reference_path.as_deref(),
                self.ontology_columns.as_deref(),
            )?,
        };
        reference.filter_sample_type(self.sample_type)
    }

    fn load_samples(&mut self, network: &Network) -> Result<SampleMetadata> {
        if let Some(path) = &self.sample_metadata_path {
            return SampleMetadata::load(path, &self.sample_group_column);
        }
        if let Some(samples) = self.samples.take() {
            return Ok(samples);
        }
        let samples = SampleMetadata::from_assignments(network.default_group_assignments(None));
        info!(
            "Derived groups for {} files from the network's single-group clusters",
            samples.n_samples()
        );
        Ok(samples)
    }

    /// Load the inputs, filter clusters and aggregate the count table.
    pub fn build(mut self) -> Result<RddCounts> {
        if self.levels == 0 {
            return Err(RddError::InvalidParameter(
                "levels must be at least 1".to_string(),
            ));
        }

        let network = self.load_network()?;
        let reference = self.load_reference()?;
        let samples = self.load_samples(&network)?;

        // without network groups the count table covers every cluster
        let network_selection = self.selection.for_network(&network);
        let selected = if network_selection.is_unrestricted() {
            ClusterSelection::unfiltered(&network)
        } else {
            select_clusters(&network, &network_selection)?
        };
        let sample_filter = self
            .selection
            .for_samples(&network)
            .sample_filenames(&samples);

        let aggregation = aggregate_counts(
            &selected.clusters,
            &reference,
            &samples,
            sample_filter.as_ref(),
            self.levels,
        )?;
        if aggregation.counts.is_empty() {
            warn!("No sample files matched any reference file");
        }
        info!(
            "Count table: {} rows for {} files over {} levels",
            aggregation.counts.len(),
            aggregation.counts.filenames().len(),
            aggregation.levels
        );

        let summary = selected.summary;
        Ok(RddCounts {
            reference,
            samples,
            selection: self.selection,
            counts: aggregation.counts,
            requested_levels: aggregation.requested_levels,
            levels: aggregation.levels,
            summary,
            network,
            noise_floor: self.noise_floor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_table() -> Table {
        Table::parse(
            "cluster index\tG1\tG2\tDefaultGroups\tUniqueFileSources\n\
             1\t2\t0\tG1\ts1.mzML|apple.mzML\n\
             2\t1\t1\tG1,G2\ts1.mzML|s2.mzML|beef.mzML\n\
             3\t0\t1\tG2\ts2.mzML|apple.mzML|apple.mzML\n",
            Some(b'\t'),
        )
        .unwrap()
    }

    fn reference() -> ReferenceMetadata {
        let table = Table::parse(
            "filename\tsample_type\tsample_type_group1\tsample_type_group2\n\
             apple.mzML\tsimple\tplant\tfruit\n\
             beef.mzML\tsimple\tanimal\tmeat\n",
            Some(b'\t'),
        )
        .unwrap();
        ReferenceMetadata::from_table(&table, None).unwrap()
    }

    fn build() -> RddCounts {
        RddCounts::builder()
            .network_table(network_table())
            .reference(reference())
            .build()
            .unwrap()
    }

    #[test]
    fn test_requires_exactly_one_network_input() {
        let neither = RddCounts::builder().reference(reference()).build();
        assert!(neither.unwrap_err().is_config());

        let both = RddCounts::builder()
            .network_table(network_table())
            .task_id("abc")
            .reference(reference())
            .build();
        assert!(both.unwrap_err().is_config());
    }

    #[test]
    fn test_task_id_without_source() {
        let err = RddCounts::builder()
            .task_id("abc")
            .reference(reference())
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_task_id_with_source() {
        let source = |_: &str| -> Result<Table> { Ok(network_table()) };
        let rdd = RddCounts::builder()
            .task_id("abc")
            .source(&source)
            .reference(reference())
            .build()
            .unwrap();
        assert_eq!(rdd.network().n_clusters(), 3);
    }

    #[test]
    fn test_build_counts() {
        let rdd = build();
        assert_eq!(rdd.levels(), 2);
        assert_eq!(rdd.requested_levels(), DEFAULT_LEVELS);
        // s1: apple (cluster 1) + beef (cluster 2); s2: beef + apple x2
        assert_eq!(rdd.counts().total("s1", 0), 2);
        assert_eq!(rdd.counts().total("s2", 0), 3);
        assert_eq!(rdd.file_counts().len(), 2);
    }

    #[test]
    fn test_groups_derived_from_default_groups() {
        let rdd = build();
        assert_eq!(rdd.samples().group_of("s1"), Some("G1"));
        assert_eq!(rdd.samples().group_of("s2"), Some("G2"));
        assert!(rdd
            .counts()
            .rows()
            .iter()
            .filter(|r| r.filename == "s2")
            .all(|r| r.group.as_deref() == Some("G2")));
    }

    #[test]
    fn test_group_selection() {
        let rdd = RddCounts::builder()
            .network_table(network_table())
            .reference(reference())
            .sample_groups(&["G1"])
            .build()
            .unwrap();
        // only cluster 1 is exclusive to G1
        assert_eq!(rdd.filter_summary().n_after, 1);
        assert_eq!(rdd.counts().filenames(), vec!["s1"]);
        assert_eq!(rdd.counts().total("s1", 0), 1);
    }

    #[test]
    fn test_set_group_column_failure_keeps_state() {
        let mut rdd = build();
        let before = rdd.counts().clone();
        assert!(rdd.set_group_column("diet").is_err());
        assert_eq!(rdd.counts(), &before);
    }

    #[test]
    fn test_flows_and_views() {
        let rdd = build();
        let graph = rdd.flows(2, None).unwrap();
        assert_eq!(graph.edges().len(), 2);
        // every cluster is in some group
        assert!(rdd.network_flows(2, None).is_err());

        let props = rdd.proportions(1).unwrap();
        assert_eq!(props.value("s2", "plant"), Some(2.0 / 3.0));
        assert!(rdd.clr(1, 1.0).is_ok());
    }

    #[test]
    fn test_network_flows_use_configured_noise_floor() {
        let table = Table::parse(
            "G1\tG2\tUniqueFileSources\n\
             1\t0\ts1|apple|apple|beef|water\n\
             1\t1\ts2|beef\n",
            Some(b'\t'),
        )
        .unwrap();
        let reference = ReferenceMetadata::from_table(
            &Table::parse(
                "filename\tsample_type_group1\tsample_type_group2\n\
                 apple\tplant\tfruit\n\
                 beef\tanimal\tmeat\n\
                 water\twater\twater\n",
                Some(b'\t'),
            )
            .unwrap(),
            None,
        )
        .unwrap();
        let rdd = RddCounts::builder()
            .network_table(table.clone())
            .reference(reference.clone())
            .sample_groups(&["G1"])
            .noise_floor(NoiseFloor::default())
            .build()
            .unwrap();
        assert_eq!(rdd.noise_floor(), Some(&NoiseFloor::default()));

        // water occurs once: meat and water do not exceed it
        let graph = rdd.network_flows(2, None).unwrap();
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].value, 2);

        let unpruned = RddCounts::builder()
            .network_table(table)
            .reference(reference)
            .sample_groups(&["G1"])
            .build()
            .unwrap();
        assert_eq!(unpruned.network_flows(2, None).unwrap().edges().len(), 3);
    }
}
