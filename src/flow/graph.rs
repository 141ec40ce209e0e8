//! Multi-level flow graph (Sankey structure) between adjacent ontology levels.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A category at one ontology level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowNode {
    pub label: String,
    pub level: usize,
}

impl FlowNode {
    pub fn new(label: &str, level: usize) -> Self {
        Self {
            label: label.to_string(),
            level,
        }
    }

    /// Level-qualified identifier, e.g. `fruit_2`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.label, self.level)
    }
}

/// Weighted transition from a level-L category to a level-(L+1) category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub source: FlowNode,
    pub target: FlowNode,
    pub value: u64,
}

#[derive(Serialize)]
struct EdgeRecord {
    source: String,
    target: String,
    value: u64,
}

#[derive(Serialize)]
struct NodeRecord {
    id: String,
    label: String,
    level: usize,
}

/// Ordered nodes and weighted edges ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// Build the graph from its edges.
    ///
    /// Nodes are the union of all sources and targets, ordered level by level
    /// with [`order_nodes`].
    pub fn from_edges(edges: Vec<FlowEdge>) -> Self {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for edge in &edges {
            for node in [&edge.source, &edge.target] {
                if seen.insert(node.clone()) {
                    nodes.push(node.clone());
                }
            }
        }
        let nodes = order_nodes(&nodes, &edges);
        Self { nodes, edges }
    }

    /// Nodes in rendering order.
    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    /// Node id -> level lookup.
    pub fn node_levels(&self) -> HashMap<String, usize> {
        self.nodes.iter().map(|n| (n.id(), n.level)).collect()
    }

    /// Edges as (source index, target index, value) into [`FlowGraph::nodes`].
    pub fn links(&self) -> Vec<(usize, usize, u64)> {
        let index: HashMap<&FlowNode, usize> =
            self.nodes.iter().enumerate().map(|(i, n)| (n, i)).collect();
        self.edges
            .iter()
            .map(|e| (index[&e.source], index[&e.target], e.value))
            .collect()
    }

    /// Total weight leaving a node.
    pub fn outflow(&self, node: &FlowNode) -> u64 {
        self.edges
            .iter()
            .filter(|e| &e.source == node)
            .map(|e| e.value)
            .sum()
    }

    /// Total weight entering a node.
    pub fn inflow(&self, node: &FlowNode) -> u64 {
        self.edges
            .iter()
            .filter(|e| &e.target == node)
            .map(|e| e.value)
            .sum()
    }

    /// Nodes at one level, in rendering order.
    pub fn nodes_at(&self, level: usize) -> Vec<&FlowNode> {
        self.nodes.iter().filter(|n| n.level == level).collect()
    }

    /// Write the edge table (`source`, `target`, `value`) as TSV.
    pub fn write_edges<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        for edge in &self.edges {
            csv_writer.serialize(EdgeRecord {
                source: edge.source.id(),
                target: edge.target.id(),
                value: edge.value,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the ordered node table (`id`, `label`, `level`) as TSV.
    pub fn write_nodes<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        for node in &self.nodes {
            csv_writer.serialize(NodeRecord {
                id: node.id(),
                label: node.label.clone(),
                level: node.level,
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write `<prefix>_edges.tsv` and `<prefix>_nodes.tsv` into `dir`.
    pub fn to_tsv(&self, dir: &Path, prefix: &str) -> Result<()> {
        let edges = File::create(dir.join(format!("{}_edges.tsv", prefix)))?;
        self.write_edges(BufWriter::new(edges))?;
        let nodes = File::create(dir.join(format!("{}_nodes.tsv", prefix)))?;
        self.write_nodes(BufWriter::new(nodes))
    }
}

/// Order nodes level by level to limit edge crossings.
///
/// The first level is sorted by descending outgoing flow. Each later level
/// takes nodes in the order they are first reached from the already ordered
/// previous level, followed by unreached nodes in insertion order.
pub fn order_nodes(nodes: &[FlowNode], edges: &[FlowEdge]) -> Vec<FlowNode> {
    let mut by_level: BTreeMap<usize, Vec<&FlowNode>> = BTreeMap::new();
    for node in nodes {
        by_level.entry(node.level).or_default().push(node);
    }

    let mut outflow: HashMap<&FlowNode, u64> = HashMap::new();
    for edge in edges {
        *outflow.entry(&edge.source).or_insert(0) += edge.value;
    }

    let mut ordered: Vec<FlowNode> = Vec::with_capacity(nodes.len());
    let mut previous: Vec<&FlowNode> = Vec::new();
    for (i, (level, level_nodes)) in by_level.into_iter().enumerate() {
        let current: Vec<&FlowNode> = if i == 0 {
            let mut first = level_nodes;
            // stable: equal flows keep insertion order
            first.sort_by(|a, b| {
                let fa = outflow.get(a).copied().unwrap_or(0);
                let fb = outflow.get(b).copied().unwrap_or(0);
                fb.cmp(&fa)
            });
            first
        } else {
            let members: HashSet<&FlowNode> = level_nodes.iter().copied().collect();
            let mut placed: HashSet<&FlowNode> = HashSet::new();
            let mut current = Vec::with_capacity(level_nodes.len());
            for parent in &previous {
                for edge in edges.iter().filter(|e| &e.source == *parent) {
                    let target = &edge.target;
                    if target.level == level && members.contains(target) && placed.insert(target) {
                        current.push(target);
                    }
                }
            }
            for node in level_nodes {
                if placed.insert(node) {
                    current.push(node);
                }
            }
            current
        };
        ordered.extend(current.iter().map(|n| (*n).clone()));
        previous = current;
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, sl: usize, target: &str, value: u64) -> FlowEdge {
        FlowEdge {
            source: FlowNode::new(source, sl),
            target: FlowNode::new(target, sl + 1),
            value,
        }
    }

    fn create_test_graph() -> FlowGraph {
        FlowGraph::from_edges(vec![
            edge("animal", 1, "meat", 2),
            edge("plant", 1, "fruit", 5),
            edge("plant", 1, "vegetable", 1),
            edge("fruit", 2, "citrus", 3),
            edge("fruit", 2, "pome", 2),
            edge("meat", 2, "beef", 2),
            edge("vegetable", 2, "root", 1),
        ])
    }

    fn labels(nodes: &[&FlowNode]) -> Vec<String> {
        nodes.iter().map(|n| n.label.clone()).collect()
    }

    #[test]
    fn test_node_ids() {
        assert_eq!(FlowNode::new("fruit", 2).id(), "fruit_2");
    }

    #[test]
    fn test_first_level_by_outflow() {
        let graph = create_test_graph();
        assert_eq!(labels(&graph.nodes_at(1)), vec!["plant", "animal"]);
    }

    #[test]
    fn test_later_levels_follow_parents() {
        let graph = create_test_graph();
        assert_eq!(labels(&graph.nodes_at(2)), vec!["fruit", "vegetable", "meat"]);
        assert_eq!(
            labels(&graph.nodes_at(3)),
            vec!["citrus", "pome", "root", "beef"]
        );
    }

    #[test]
    fn test_unreached_nodes_keep_insertion_order() {
        let nodes = vec![
            FlowNode::new("a", 1),
            FlowNode::new("x", 2),
            FlowNode::new("y", 2),
        ];
        let edges = vec![edge("a", 1, "y", 1)];
        let ordered = order_nodes(&nodes, &edges);
        let names: Vec<&str> = ordered.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(names, vec!["a", "y", "x"]);
    }

    #[test]
    fn test_same_label_on_two_levels() {
        let graph = FlowGraph::from_edges(vec![
            edge("water", 1, "water", 4),
            edge("water", 2, "water", 4),
        ]);
        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.node_levels()["water_3"], 3);
    }

    #[test]
    fn test_links_and_flows() {
        let graph = create_test_graph();
        let fruit = FlowNode::new("fruit", 2);
        assert_eq!(graph.inflow(&fruit), 5);
        assert_eq!(graph.outflow(&fruit), 5);
        let links = graph.links();
        assert_eq!(links.len(), graph.edges().len());
        let (s, t, v) = links[1];
        assert_eq!(graph.nodes()[s].label, "plant");
        assert_eq!(graph.nodes()[t].label, "fruit");
        assert_eq!(v, 5);
    }

    #[test]
    fn test_write_edges() {
        let graph = create_test_graph();
        let mut buffer = Vec::new();
        graph.write_edges(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("source\ttarget\tvalue"));
        assert_eq!(lines.next(), Some("animal_1\tmeat_2\t2"));
    }
}
