//! Reference Data-Driven (RDD) counts for molecular networks
//!
//! This library turns molecular-network clustering output and a hierarchical
//! reference ontology into per-sample counts of reference matches at every
//! ontology level, plus the views derived from them.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Input tables (network clusters, reference ontology, sample metadata)
//! - **filter**: Group-exclusivity selection of clusters
//! - **counts**: Long-form count table, aggregation and group relabelling
//! - **flow**: Level-to-level flow graphs with deterministic node ordering
//! - **normalize**: Wide tables, proportions and CLR
//! - **analysis**: PCA
//! - **pipeline**: The `RddCounts` context object, its builder and configuration
//!
//! # Example
//!
//! ```no_run
//! use gnps_rdd::prelude::*;
//!
//! let rdd = RddCounts::builder()
//!     .network_path("network.tsv")
//!     .sample_metadata_path("samples.csv")
//!     .levels(4)
//!     .build()
//!     .unwrap();
//!
//! rdd.to_tsv("counts.tsv").unwrap();
//! let flow = rdd.flows(3, None).unwrap();
//! let props = rdd.proportions(2).unwrap();
//! ```

pub mod analysis;
pub mod counts;
pub mod data;
pub mod error;
pub mod filter;
pub mod flow;
pub mod normalize;
pub mod pipeline;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::analysis::{pca, perform_pca, PcaResult};
    pub use crate::counts::{
        aggregate_counts, switch_group_column, update_groups, CountRow, CountTable, GroupMapping,
        FILE_COUNT_TYPE,
    };
    pub use crate::data::{
        load_metadata, ClusterRecord, MetadataKind, Network, ReferenceMetadata, SampleMetadata,
        SampleTypeFilter, Table,
    };
    pub use crate::error::{RddError, Result};
    pub use crate::filter::{select_clusters, FilterSummary, GroupSelection};
    pub use crate::flow::{flows_from_counts, flows_from_network, FlowEdge, FlowGraph, FlowNode, NoiseFloor};
    pub use crate::normalize::{clr, to_proportions, to_wide, WideTable};
    pub use crate::pipeline::{DirectorySource, NetworkSource, RddConfig, RddCounts, RddCountsBuilder};
}
