//! Flow graph construction from network clusters or from the count table.

use crate::counts::CountTable;
use crate::data::{Network, ReferenceFile, ReferenceMetadata};
use crate::error::{RddError, Result};
use crate::filter::{select_clusters, GroupSelection};
use crate::flow::graph::{FlowEdge, FlowGraph, FlowNode};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Background category whose occurrence count sets the pruning threshold.
///
/// Deepest-level categories occurring no more often than the background
/// category are removed from the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFloor {
    /// Background category label.
    pub category: String,
    /// Ontology level (1-based) at which the label is matched.
    pub level: usize,
}

impl Default for NoiseFloor {
    fn default() -> Self {
        Self {
            category: "water".to_string(),
            level: 1,
        }
    }
}

fn check_levels(levels: usize) -> Result<()> {
    if levels < 2 {
        return Err(RddError::EmptyResult(format!(
            "A flow needs at least 2 ontology levels, got {}",
            levels
        )));
    }
    Ok(())
}

/// Count co-occurrences of categories at each adjacent level pair.
fn edges_from_paths(paths: &[&ReferenceFile], levels: usize) -> Vec<FlowEdge> {
    let mut edges = Vec::new();
    for level in 1..levels {
        let mut pairs: BTreeMap<(&str, &str), u64> = BTreeMap::new();
        for file in paths {
            if let (Some(source), Some(target)) = (file.category(level), file.category(level + 1)) {
                *pairs.entry((source, target)).or_insert(0) += 1;
            }
        }
        edges.extend(pairs.into_iter().map(|((source, target), value)| FlowEdge {
            source: FlowNode::new(source, level),
            target: FlowNode::new(target, level + 1),
            value,
        }));
    }
    edges
}

/// Build the flow graph directly from network clusters.
///
/// Clusters pass the group-exclusivity filter, their files are exploded and
/// matched against `reference`, keeping only references with a category at
/// every level up to `max_level`. With a noise floor, deepest-level categories
/// whose count does not exceed the background count are dropped.
pub fn flows_from_network(
    network: &Network,
    reference: &ReferenceMetadata,
    selection: &GroupSelection,
    max_level: usize,
    noise_floor: Option<&NoiseFloor>,
) -> Result<FlowGraph> {
    check_levels(max_level)?;
    let levels = reference.effective_levels(max_level);
    check_levels(levels)?;

    let selected = select_clusters(network, selection)?;
    if selected.clusters.is_empty() {
        return Err(RddError::EmptyResult(
            "No clusters satisfy the group selection".to_string(),
        ));
    }

    let mut paths: Vec<&ReferenceFile> = selected
        .clusters
        .iter()
        .flat_map(|c| c.source_files.iter())
        .filter_map(|f| reference.get(f))
        .filter(|r| (1..=levels).all(|l| r.category(l).is_some()))
        .collect();
    if paths.is_empty() {
        return Err(RddError::EmptyResult(
            "No reference files with a complete ontology path in the selected clusters".to_string(),
        ));
    }

    if let Some(floor) = noise_floor {
        let threshold = paths
            .iter()
            .filter(|r| r.category(floor.level) == Some(floor.category.as_str()))
            .count();
        let mut deepest: HashMap<&str, usize> = HashMap::new();
        for r in &paths {
            if let Some(category) = r.category(levels) {
                *deepest.entry(category).or_insert(0) += 1;
            }
        }
        paths.retain(|r| {
            r.category(levels)
                .and_then(|c| deepest.get(c))
                .is_some_and(|&n| n > threshold)
        });
        debug!(
            "noise floor '{}' at level {}: threshold {}, {} reference matches kept",
            floor.category,
            floor.level,
            threshold,
            paths.len()
        );
        if paths.is_empty() {
            return Err(RddError::EmptyResult(format!(
                "No categories at level {} exceed the '{}' background count of {}",
                levels, floor.category, threshold
            )));
        }
    }

    Ok(FlowGraph::from_edges(edges_from_paths(&paths, levels)))
}

/// Build the flow graph from the count table.
///
/// Each category at level L+1 is linked to its parent at level L (taken from
/// the reference hierarchy) with the summed count of the child. With
/// `filename`, only that sample's counts are used.
pub fn flows_from_counts(
    counts: &CountTable,
    reference: &ReferenceMetadata,
    max_level: usize,
    filename: Option<&str>,
) -> Result<FlowGraph> {
    check_levels(max_level)?;
    let levels = max_level.min(counts.max_level()).min(reference.n_levels());
    check_levels(levels)?;

    let mut edges = Vec::new();
    for level in 1..levels {
        let parents = reference.parent_map(level);
        let mut totals: BTreeMap<(&str, &str), u64> = BTreeMap::new();
        for row in counts.at_level(level + 1) {
            if filename.is_some_and(|f| f != row.filename) || row.count == 0 {
                continue;
            }
            let Some(child) = row.reference_type.as_deref() else {
                continue;
            };
            if let Some(parent) = parents.get(child) {
                *totals.entry((parent.as_str(), child)).or_insert(0) += row.count;
            }
        }
        edges.extend(totals.into_iter().map(|((source, target), value)| FlowEdge {
            source: FlowNode::new(source, level),
            target: FlowNode::new(target, level + 1),
            value,
        }));
    }

    if edges.is_empty() {
        return Err(RddError::EmptyResult(match filename {
            Some(f) => format!("No counts to build a flow for '{}'", f),
            None => "No counts to build a flow".to_string(),
        }));
    }
    Ok(FlowGraph::from_edges(edges))
}
