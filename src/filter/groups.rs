//! Group-exclusivity filtering of network clusters.
//!
//! A cluster is selected iff it is present (non-zero) in every included group
//! and absent (zero) in every group column that is not included. Clusters
//! shared with any unselected group are discarded, so each selected cluster
//! belongs unambiguously to the chosen combination of sample and reference
//! groups. With no group chosen, every group column is excluded and only
//! clusters absent from all groups are selected.

use crate::data::{ClusterRecord, Network, SampleMetadata};
use crate::error::{RddError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Sample and reference groups to include.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelection {
    #[serde(default)]
    pub sample_groups: Vec<String>,
    #[serde(default)]
    pub reference_groups: Vec<String>,
}

impl GroupSelection {
    pub fn new(sample_groups: Vec<String>, reference_groups: Vec<String>) -> Self {
        Self {
            sample_groups,
            reference_groups,
        }
    }

    /// Selection with no group chosen.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no group was chosen.
    pub fn is_unrestricted(&self) -> bool {
        self.sample_groups.is_empty() && self.reference_groups.is_empty()
    }

    /// Union of sample and reference groups.
    pub fn included(&self) -> BTreeSet<&str> {
        self.sample_groups
            .iter()
            .chain(&self.reference_groups)
            .map(String::as_str)
            .collect()
    }

    /// Network group columns that are not included.
    pub fn excluded<'a>(&self, network: &'a Network) -> Vec<&'a str> {
        let included = self.included();
        network
            .group_columns()
            .iter()
            .map(String::as_str)
            .filter(|g| !included.contains(g))
            .collect()
    }

    /// The part of the selection that names group columns of `network`.
    ///
    /// Sample groups that are labels of a sample metadata column rather than
    /// network columns only restrict samples, not clusters. Reference groups
    /// are kept as given.
    pub fn for_network(&self, network: &Network) -> GroupSelection {
        GroupSelection {
            sample_groups: self
                .sample_groups
                .iter()
                .filter(|g| network.group_index(g).is_some())
                .cloned()
                .collect(),
            reference_groups: self.reference_groups.clone(),
        }
    }

    /// The sample groups that are not group columns of `network`.
    ///
    /// These are labels of the sample metadata grouping column and restrict
    /// which sample files are counted.
    pub fn for_samples(&self, network: &Network) -> GroupSelection {
        GroupSelection {
            sample_groups: self
                .sample_groups
                .iter()
                .filter(|g| network.group_index(g).is_none())
                .cloned()
                .collect(),
            reference_groups: Vec::new(),
        }
    }

    /// Filenames of samples in the chosen sample groups, or `None` when no
    /// sample group was chosen.
    pub fn sample_filenames(&self, samples: &SampleMetadata) -> Option<HashSet<String>> {
        if self.sample_groups.is_empty() {
            return None;
        }
        Some(
            samples
                .filter_groups(&self.sample_groups)
                .filenames()
                .iter()
                .cloned()
                .collect(),
        )
    }
}

/// Outcome of the exclusivity filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Number of clusters before filtering.
    pub n_before: usize,
    /// Number of clusters selected.
    pub n_after: usize,
    /// Clusters present in every included group but dropped because they
    /// also touch an excluded group.
    pub n_shared_discarded: usize,
}

impl std::fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cluster Selection")?;
        writeln!(f, "  Before:    {} clusters", self.n_before)?;
        writeln!(f, "  After:     {} clusters", self.n_after)?;
        writeln!(f, "  Shared:    {} discarded", self.n_shared_discarded)?;
        Ok(())
    }
}

/// Clusters passing the exclusivity filter.
#[derive(Debug, Clone)]
pub struct ClusterSelection<'a> {
    pub clusters: Vec<&'a ClusterRecord>,
    pub summary: FilterSummary,
}

impl<'a> ClusterSelection<'a> {
    /// Every cluster of `network`, without applying the exclusivity filter.
    pub fn unfiltered(network: &'a Network) -> Self {
        let n = network.n_clusters();
        Self {
            clusters: network.clusters().iter().collect(),
            summary: FilterSummary {
                n_before: n,
                n_after: n,
                n_shared_discarded: 0,
            },
        }
    }
}

/// Apply the exclusivity filter to every cluster of a network.
///
/// An empty selection excludes every group column.
///
/// Fails with a configuration error if an included group is not a group
/// column of the network.
pub fn select_clusters<'a>(
    network: &'a Network,
    selection: &GroupSelection,
) -> Result<ClusterSelection<'a>> {
    let n_before = network.n_clusters();
    let included: Vec<usize> = selection
        .included()
        .into_iter()
        .map(|g| {
            network.group_index(g).ok_or_else(|| {
                RddError::Config(format!("Group '{}' is not a group column of the network", g))
            })
        })
        .collect::<Result<_>>()?;
    let excluded: Vec<usize> = selection
        .excluded(network)
        .into_iter()
        .filter_map(|g| network.group_index(g))
        .collect();

    let mut clusters = Vec::new();
    let mut n_shared_discarded = 0;
    for cluster in network.clusters() {
        let in_all = included.iter().all(|&i| cluster.memberships[i] > 0.0);
        if !in_all {
            continue;
        }
        if excluded.iter().all(|&i| cluster.memberships[i] == 0.0) {
            clusters.push(cluster);
        } else {
            n_shared_discarded += 1;
        }
    }

    if n_shared_discarded > 0 {
        warn!(
            "{} clusters present in {:?} were discarded because they also occur in unselected groups",
            n_shared_discarded,
            selection.included()
        );
    }

    let n_after = clusters.len();
    Ok(ClusterSelection {
        clusters,
        summary: FilterSummary {
            n_before,
            n_after,
            n_shared_discarded,
        },
    })
}
