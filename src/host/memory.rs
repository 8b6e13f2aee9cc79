//! In-memory host graph for testing and offline planning.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{GraphHost, KnobValue, NodeId, NodeKind, NodeSpec};

/// Default width of a regular node.
pub const NODE_WIDTH: i32 = 80;
/// Default height of a regular node.
pub const NODE_HEIGHT: i32 = 66;
/// Size of a dot node (square).
pub const DOT_SIZE: i32 = 12;

/// Error type for the in-memory graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Node not found.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    /// Input of a node spec does not exist.
    #[error("Input not found for new {kind} node: {input}")]
    InputNotFound {
        /// Kind of node being created.
        kind: NodeKind,
        /// Missing input handle.
        input: NodeId,
    },
}

/// A node stored in the in-memory graph.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    /// Node handle.
    pub id: NodeId,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Top-left x.
    pub x: i32,
    /// Top-left y.
    pub y: i32,
    /// Knob values.
    pub knobs: BTreeMap<String, KnobValue>,
    /// Connected inputs in slot order.
    pub inputs: Vec<NodeId>,
    /// Input slots, unconnected ones included.
    pub slots: Vec<Option<NodeId>>,
    /// Channels owned by this node. `None` means inherited from inputs.
    pub channels: Option<Vec<String>>,
}

/// In-memory host graph.
///
/// Uses BTreeMap for deterministic iteration order. Handles are issued from a
/// counter, so two identical runs produce identical handles.
///
/// `Read` nodes get their channels from sequences registered with
/// [`InMemoryGraph::register_sequence`]; every other node inherits the union of
/// its inputs' channels, the way channels flow through a compositing graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    nodes: BTreeMap<NodeId, MemoryNode>,
    next_id: u64,
    /// Sequence path -> channels found in that sequence.
    sequence_channels: BTreeMap<String, Vec<String>>,
    /// Per-kind counters for generated display names.
    name_counters: BTreeMap<NodeKind, u32>,
}

impl InMemoryGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the channels a read of `path` will expose.
    pub fn register_sequence(&mut self, path: impl Into<String>, channels: Vec<String>) {
        self.sequence_channels.insert(path.into(), channels);
    }

    /// Add an already existing node at a fixed position.
    pub fn add_node(&mut self, kind: NodeKind, name: &str, x: i32, y: i32) -> NodeId {
        let id = self.issue_id();
        self.nodes.insert(id, MemoryNode {
            id,
            kind,
            name: name.to_string(),
            x,
            y,
            knobs: BTreeMap::new(),
            inputs: Vec::new(),
            slots: Vec::new(),
            channels: None,
        });
        id
    }

    /// Give a node its own channel list.
    pub fn set_channels(&mut self, node: NodeId, channels: Vec<String>) -> Result<(), InMemoryError> {
        self.node_mut(node)?.channels = Some(channels);
        Ok(())
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(&id)
    }

    /// Get all nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    /// First node with the given display name.
    pub fn find_by_name(&self, name: &str) -> Option<&MemoryNode> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Nodes of a kind, in creation order.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&MemoryNode> {
        self.nodes.values().filter(|n| n.kind == kind).collect()
    }

    /// Get number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Serializable view of the whole graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes
                .values()
                .map(|n| NodeSnapshot {
                    id: n.id,
                    kind: n.kind,
                    name: n.name.clone(),
                    x: n.x,
                    y: n.y,
                    inputs: n.slots.clone(),
                    knobs: n.knobs.clone(),
                })
                .collect(),
        }
    }

    fn issue_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId::new(self.next_id)
    }

    fn default_name(&mut self, kind: NodeKind) -> String {
        let counter = self.name_counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{}{}", kind.class_name(), counter)
    }

    fn get(&self, id: NodeId) -> Result<&MemoryNode, InMemoryError> {
        self.nodes.get(&id).ok_or(InMemoryError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, InMemoryError> {
        self.nodes.get_mut(&id).ok_or(InMemoryError::NodeNotFound(id))
    }

    fn collect_channels(&self, id: NodeId, out: &mut Vec<String>) -> Result<(), InMemoryError> {
        let node = self.get(id)?;
        if let Some(channels) = &node.channels {
            push_unique(out, channels);
            return Ok(());
        }
        if node.kind == NodeKind::Read {
            let file = node.knobs.get("file").and_then(|v| v.as_text());
            if let Some(channels) = file.and_then(|f| self.sequence_channels.get(f)) {
                push_unique(out, channels);
            }
            return Ok(());
        }
        for input in &node.inputs {
            self.collect_channels(*input, out)?;
        }
        Ok(())
    }
}

fn push_unique(out: &mut Vec<String>, channels: &[String]) {
    for channel in channels {
        if !out.contains(channel) {
            out.push(channel.clone());
        }
    }
}

impl GraphHost for InMemoryGraph {
    type Error = InMemoryError;

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, Self::Error> {
        if let Some(missing) = spec.connected_inputs().find(|i| !self.nodes.contains_key(i)) {
            return Err(InMemoryError::InputNotFound { kind: spec.kind, input: missing });
        }
        let inputs = spec.connected_inputs().collect();
        let name = match spec.name {
            Some(name) => name,
            None => self.default_name(spec.kind),
        };
        let x = spec.knobs.get("xpos").and_then(|v| v.as_int()).unwrap_or(0) as i32;
        let y = spec.knobs.get("ypos").and_then(|v| v.as_int()).unwrap_or(0) as i32;
        let id = self.issue_id();
        self.nodes.insert(id, MemoryNode {
            id,
            kind: spec.kind,
            name,
            x,
            y,
            knobs: spec.knobs,
            inputs,
            slots: spec.inputs,
            channels: None,
        });
        Ok(id)
    }

    fn position(&self, node: NodeId) -> Result<(i32, i32), Self::Error> {
        let n = self.get(node)?;
        Ok((n.x, n.y))
    }

    fn set_position(&mut self, node: NodeId, x: i32, y: i32) -> Result<(), Self::Error> {
        let n = self.node_mut(node)?;
        n.x = x;
        n.y = y;
        Ok(())
    }

    fn size(&self, node: NodeId) -> Result<(i32, i32), Self::Error> {
        let n = self.get(node)?;
        Ok(match n.kind {
            NodeKind::Dot => (DOT_SIZE, DOT_SIZE),
            NodeKind::Backdrop => {
                let w = n.knobs.get("bdwidth").and_then(|v| v.as_float()).unwrap_or(0.0);
                let h = n.knobs.get("bdheight").and_then(|v| v.as_float()).unwrap_or(0.0);
                (w as i32, h as i32)
            }
            _ => (NODE_WIDTH, NODE_HEIGHT),
        })
    }

    fn channels(&self, node: NodeId) -> Result<Vec<String>, Self::Error> {
        let mut out = Vec::new();
        self.collect_channels(node, &mut out)?;
        Ok(out)
    }

    fn knob(&self, node: NodeId, name: &str) -> Result<Option<KnobValue>, Self::Error> {
        Ok(self.get(node)?.knobs.get(name).cloned())
    }

    fn set_knob(&mut self, node: NodeId, name: &str, value: KnobValue) -> Result<(), Self::Error> {
        self.node_mut(node)?.knobs.insert(name.to_string(), value);
        Ok(())
    }

    fn name(&self, node: NodeId) -> Result<String, Self::Error> {
        Ok(self.get(node)?.name.clone())
    }

    fn inputs(&self, node: NodeId) -> Result<Vec<NodeId>, Self::Error> {
        Ok(self.get(node)?.inputs.clone())
    }

    fn input_slots(&self, node: NodeId) -> Result<Vec<Option<NodeId>>, Self::Error> {
        Ok(self.get(node)?.slots.clone())
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes.values().filter(|n| n.kind == kind).map(|n| n.id).collect()
    }

    fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }
}

/// Serializable snapshot of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    /// Node handle.
    pub id: NodeId,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Top-left x.
    pub x: i32,
    /// Top-left y.
    pub y: i32,
    /// Input slots. `null` marks an unconnected slot.
    pub inputs: Vec<Option<NodeId>>,
    /// Knob values (sorted by name).
    pub knobs: BTreeMap<String, KnobValue>,
}

/// Serializable snapshot of an in-memory graph, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    /// All nodes.
    pub nodes: Vec<NodeSnapshot>,
}
