//! Cluster selection by group membership.

pub mod groups;

pub use groups::{select_clusters, ClusterSelection, FilterSummary, GroupSelection};
