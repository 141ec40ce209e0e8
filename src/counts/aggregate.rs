//! Join of network clusters against the reference ontology and per-level counting.
//!
//! Within each cluster, every occurrence of a sample file is paired with every
//! occurrence of a reference file. Each pair is one match for the sample file,
//! labelled with the reference's category at each ontology level. Level 0
//! holds the total number of matches per sample file.

use crate::counts::table::{CountRow, CountTable, FILE_COUNT_TYPE};
use crate::data::{ClusterRecord, ReferenceFile, ReferenceMetadata, SampleMetadata};
use crate::error::Result;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// One sample-file / reference-file match inside a cluster.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub filename: &'a str,
    pub reference: &'a ReferenceFile,
}

/// Result of aggregation with the effective level count.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub counts: CountTable,
    /// Depth requested by the caller.
    pub requested_levels: usize,
    /// Depth actually used, clamped to the available ontology columns.
    pub levels: usize,
}

impl Aggregation {
    /// True when the requested depth exceeded the ontology.
    pub fn was_clamped(&self) -> bool {
        self.levels < self.requested_levels
    }
}

/// Expand clusters into sample/reference matches.
///
/// Files present in `reference` are matched as references. Files that are
/// reference files but were filtered out of `reference` take no part. Every
/// other file is a sample unless `sample_filter` is given and does not
/// contain it. Repeated filenames
/// in a cluster are not deduplicated.
pub fn explode_matches<'a>(
    clusters: &[&'a ClusterRecord],
    reference: &'a ReferenceMetadata,
    sample_filter: Option<&HashSet<String>>,
) -> Vec<Match<'a>> {
    let mut matches = Vec::new();
    for &cluster in clusters {
        let references: Vec<&ReferenceFile> = cluster
            .source_files
            .iter()
            .filter_map(|f| reference.get(f))
            .collect();
        if references.is_empty() {
            continue;
        }
        let samples = cluster.source_files.iter().filter(|f| {
            !reference.is_reference_file(f)
                && sample_filter.map_or(true, |s| s.contains(f.as_str()))
        });
        for filename in samples {
            for &reference in &references {
                matches.push(Match {
                    filename: filename.as_str(),
                    reference,
                });
            }
        }
    }
    matches
}

/// Count matches per (filename, reference type) at one level.
fn count_level(matches: &[Match<'_>], level: usize) -> Vec<CountRow> {
    let mut counts: BTreeMap<(&str, Option<&str>), u64> = BTreeMap::new();
    for m in matches {
        let category = if level == 0 {
            Some(FILE_COUNT_TYPE)
        } else {
            m.reference.category(level)
        };
        *counts.entry((m.filename, category)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((filename, category), count)| CountRow {
            filename: filename.to_string(),
            reference_type: category.map(String::from),
            count,
            level,
            group: None,
        })
        .collect()
}

/// Build the long-form count table for levels `0..=levels`.
///
/// `levels` is clamped to the number of ontology columns in `reference`; the
/// effective value is returned in [`Aggregation::levels`]. Groups are resolved
/// through the active grouping column of `samples`; unresolved files keep a
/// `None` group.
pub fn aggregate_counts(
    clusters: &[&ClusterRecord],
    reference: &ReferenceMetadata,
    samples: &SampleMetadata,
    sample_filter: Option<&HashSet<String>>,
    levels: usize,
) -> Result<Aggregation> {
    let effective = reference.effective_levels(levels);
    if effective < levels {
        warn!(
            "Requested {} ontology levels but only {} are available; using {}",
            levels, effective, effective
        );
    }

    let matches = explode_matches(clusters, reference, sample_filter);
    debug!(
        "{} sample/reference matches from {} clusters",
        matches.len(),
        clusters.len()
    );

    let rows: Vec<CountRow> = (0..=effective)
        .into_par_iter()
        .map(|level| count_level(&matches, level))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    let mut counts = CountTable::new(rows);
    counts.attach_groups(samples);

    Ok(Aggregation {
        counts,
        requested_levels: levels,
        levels: effective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Network, Table};

    fn reference() -> ReferenceMetadata {
        let table = Table::parse(
            "filename\tsample_name\tsample_type_group1\tsample_type_group2\tsample_type_group3\n\
             ref_apple\tapple\tplant\tfruit\tapple\n\
             ref_pear\tpear\tplant\tfruit\tpear\n\
             ref_beef\tbeef\tanimal\tmeat\tbeef\n\
             ref_odd\todd\tplant\t\t\n",
            Some(b'\t'),
        )
        .unwrap();
        ReferenceMetadata::from_table(&table, None).unwrap()
    }

    fn network() -> Network {
        let table = Table::parse(
            "cluster index\tUniqueFileSources\n\
             1\ts1.mzML|ref_apple.mzML|ref_beef.mzML\n\
             2\ts1.mzML|s2.mzML|ref_pear.mzML\n\
             3\ts3.mzML|s3.mzML|ref_apple.mzML\n\
             4\ts2.mzML|ref_odd.mzML\n\
             5\ts4.mzML\n",
            Some(b'\t'),
        )
        .unwrap();
        Network::from_table(&table).unwrap()
    }

    fn samples() -> SampleMetadata {
        SampleMetadata::from_assignments(vec![
            ("s1".to_string(), "G1".to_string()),
            ("s2".to_string(), "G2".to_string()),
        ])
    }

    fn count(table: &CountTable, filename: &str, level: usize, category: Option<&str>) -> u64 {
        table
            .at_level(level)
            .filter(|r| r.filename == filename && r.reference_type.as_deref() == category)
            .map(|r| r.count)
            .sum()
    }

    #[test]
    fn test_explode_pairs_samples_with_references() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let matches = explode_matches(&clusters, &reference, None);
        // cluster1: 1x2, cluster2: 2x1, cluster3: 2x1 (repeat kept), cluster4: 1x1
        assert_eq!(matches.len(), 7);
    }

    #[test]
    fn test_counts_per_level() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let result = aggregate_counts(&clusters, &reference, &samples(), None, 3).unwrap();
        let table = &result.counts;

        assert_eq!(count(table, "s1", 0, Some(FILE_COUNT_TYPE)), 3);
        assert_eq!(count(table, "s1", 1, Some("plant")), 2);
        assert_eq!(count(table, "s1", 1, Some("animal")), 1);
        assert_eq!(count(table, "s1", 3, Some("pear")), 1);
        assert_eq!(count(table, "s3", 3, Some("apple")), 2);
        // missing ontology values are kept as a null category
        assert_eq!(count(table, "s2", 2, None), 1);
        assert_eq!(count(table, "s4", 0, Some(FILE_COUNT_TYPE)), 0);
    }

    #[test]
    fn test_counts_are_additive() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let matches = explode_matches(&clusters, &reference, None);
        let result = aggregate_counts(&clusters, &reference, &samples(), None, 3).unwrap();
        for filename in result.counts.filenames() {
            let expected = matches.iter().filter(|m| m.filename == filename).count() as u64;
            for level in 0..=result.levels {
                assert_eq!(result.counts.total(&filename, level), expected);
            }
        }
    }

    #[test]
    fn test_groups_resolved_or_null() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let result = aggregate_counts(&clusters, &reference, &samples(), None, 1).unwrap();
        for row in result.counts.rows() {
            match row.filename.as_str() {
                "s1" => assert_eq!(row.group.as_deref(), Some("G1")),
                "s2" => assert_eq!(row.group.as_deref(), Some("G2")),
                _ => assert_eq!(row.group, None),
            }
        }
    }

    #[test]
    fn test_level_clamp() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let result = aggregate_counts(&clusters, &reference, &samples(), None, 6).unwrap();
        assert_eq!(result.levels, 3);
        assert!(result.was_clamped());
        assert_eq!(result.counts.max_level(), 3);
    }

    #[test]
    fn test_sample_filter() {
        let network = network();
        let reference = reference();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();
        let only_s1: HashSet<String> = ["s1".to_string()].into_iter().collect();
        let result =
            aggregate_counts(&clusters, &reference, &samples(), Some(&only_s1), 2).unwrap();
        assert_eq!(result.counts.filenames(), vec!["s1"]);
    }

    #[test]
    fn test_filtered_references_are_not_samples() {
        use crate::data::SampleTypeFilter;

        let table = Table::parse(
            "filename\tsample_type\tsample_type_group1\tsample_type_group2\n\
             apple\tsimple\tplant\tfruit\n\
             pizza\tcomplex\tcomplex\tdish\n",
            Some(b'\t'),
        )
        .unwrap();
        let full = ReferenceMetadata::from_table(&table, None).unwrap();
        let simple = full.filter_sample_type(SampleTypeFilter::Simple).unwrap();
        let network = Network::from_table(
            &Table::parse(
                "UniqueFileSources\ns1.mzML|apple.mzML|pizza.mzML\ns2.mzML|pizza.mzML\n",
                Some(b'\t'),
            )
            .unwrap(),
        )
        .unwrap();
        let clusters: Vec<&ClusterRecord> = network.clusters().iter().collect();

        let result =
            aggregate_counts(&clusters, &simple, &SampleMetadata::default(), None, 2).unwrap();
        assert_eq!(result.counts.filenames(), vec!["s1"]);
        assert_eq!(count(&result.counts, "s1", 0, Some(FILE_COUNT_TYPE)), 1);
        assert_eq!(count(&result.counts, "s1", 1, Some("plant")), 1);
        assert_eq!(count(&result.counts, "s1", 1, Some("complex")), 0);
    }
}
