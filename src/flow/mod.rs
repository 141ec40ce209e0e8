//! Level-to-level flow graphs over the reference ontology.

pub mod build;
pub mod graph;

pub use build::{flows_from_counts, flows_from_network, NoiseFloor};
pub use graph::{order_nodes, FlowEdge, FlowGraph, FlowNode};
