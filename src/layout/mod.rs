//! Layout manager.
//!
//! Collects node placement relations, backdrop membership and top-level
//! backdrop relations during a pipeline run, then computes coordinates in two
//! passes:
//!
//! 1. [`LayoutManager::build_layout_node_graph`] places every node that has a
//!    relation, relative to its (already placed) base node.
//! 2. [`LayoutManager::build_layout_backdrops`] computes backdrop boxes
//!    bottom-up, applies top-level backdrop relations, shifts everything clear
//!    of the pre-existing graph and materializes the displayed backdrops.
//!
//! ## Phases
//!
//! ```text
//! Collecting → NodesPlaced → BoxesComputed → GroupsRelated → CollisionsResolved → Materialized
//! ```
//!
//! A manager is built for one run and then discarded.

pub mod backdrop;

use std::collections::BTreeMap;
use std::fmt;

use crate::host::{GraphHost, KnobValue, NodeId, NodeKind, NodeSpec};
use crate::types::{Alignment, BackdropOption, Position, Rect};

pub use backdrop::{Backdrop, BackdropId, BackdropTree};

/// One distance unit in graph coordinates.
pub const BASE_DISTANCE: f64 = 120.0;

/// Error type for layout operations.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// A build pass was called in the wrong phase.
    #[error("Cannot run {operation} in layout phase {phase}")]
    OutOfOrder {
        /// Build pass that was called.
        operation: &'static str,
        /// Phase the manager was in.
        phase: LayoutPhase,
    },
    /// Host graph error.
    #[error("Host error: {0}")]
    Host(String),
}

impl LayoutError {
    /// Create a host error from any error type.
    pub fn from_host<E: std::error::Error>(e: E) -> Self {
        Self::Host(e.to_string())
    }
}

/// Progress of a layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayoutPhase {
    /// Relations and memberships are being registered.
    Collecting,
    /// Node positions resolved.
    NodesPlaced,
    /// Backdrop boxes computed.
    BoxesComputed,
    /// Top-level backdrop relations applied.
    GroupsRelated,
    /// Shifted clear of the pre-existing graph.
    CollisionsResolved,
    /// Backdrop nodes created in the host.
    Materialized,
}

impl fmt::Display for LayoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Placement of one node relative to a base node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRelation {
    /// Node the target is placed against.
    pub base: NodeId,
    /// Compass direction from the base.
    pub position: Position,
    /// Distance between centers, in graph units.
    pub distance: f64,
    /// Set once the target has been placed.
    pub visited: bool,
}

/// Placement of one top-level backdrop relative to another.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRelation {
    /// Path of the base backdrop.
    pub base: String,
    /// Compass direction from the base.
    pub position: Position,
    /// Cross-axis alignment.
    pub alignment: Alignment,
    /// Gap between the boxes, in graph units.
    pub distance: f64,
}

/// Layout state for one pipeline run.
#[derive(Debug, Clone)]
pub struct LayoutManager {
    phase: LayoutPhase,
    tree: BackdropTree,
    node_relations: BTreeMap<NodeId, NodeRelation>,
    /// Keyed by target path, in first-insertion order.
    group_relations: Vec<(String, GroupRelation)>,
    graph_bbox: Rect,
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            phase: LayoutPhase::Collecting,
            tree: BackdropTree::new(),
            node_relations: BTreeMap::new(),
            group_relations: Vec::new(),
            graph_bbox: Rect::default(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    /// Backdrop tree.
    pub fn tree(&self) -> &BackdropTree {
        &self.tree
    }

    /// Captured box of the graph that existed before the run.
    pub fn graph_bbox(&self) -> Rect {
        self.graph_bbox
    }

    /// Registered relation of a node.
    pub fn node_relation(&self, target: NodeId) -> Option<&NodeRelation> {
        self.node_relations.get(&target)
    }

    /// Number of registered node relations.
    pub fn node_relation_count(&self) -> usize {
        self.node_relations.len()
    }

    /// Registered top-level backdrop relations, in first-insertion order.
    pub fn group_relations(&self) -> &[(String, GroupRelation)] {
        &self.group_relations
    }

    /// Capture the box of every node currently in the host graph.
    ///
    /// Leaves the zero box when the graph is empty.
    pub fn compute_current_bbox_graph<H: GraphHost>(&mut self, host: &H) -> Result<(), LayoutError> {
        let mut bbox: Option<Rect> = None;
        for node in host.all_nodes() {
            let rect = node_rect(host, node)?;
            bbox = Some(match bbox {
                Some(b) => b.union(&rect),
                None => rect,
            });
        }
        self.graph_bbox = bbox.unwrap_or_default();
        Ok(())
    }

    /// Add member nodes to the backdrop at `path`.
    pub fn add_nodes_to_backdrop(&mut self, path: &str, nodes: impl IntoIterator<Item = NodeId>) {
        self.tree.add_nodes(path, nodes);
    }

    /// Set a display option of the backdrop at `path`.
    pub fn add_backdrop_option(&mut self, path: &str, option: BackdropOption) {
        self.tree.set_option(path, option);
    }

    /// Place backdrop `path` relative to backdrop `base`.
    ///
    /// `mult_distance` is in units of [`BASE_DISTANCE`]. Re-adding a relation
    /// for the same target overwrites it in place.
    pub fn add_top_level_backdrop_layout_relation(
        &mut self,
        base: &str,
        path: &str,
        position: Position,
        alignment: Alignment,
        mult_distance: f64,
    ) {
        self.tree.ensure(base);
        self.tree.ensure(path);
        let relation = GroupRelation {
            base: base.to_string(),
            position,
            alignment,
            distance: mult_distance * BASE_DISTANCE,
        };
        match self.group_relations.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = relation,
            None => self.group_relations.push((path.to_string(), relation)),
        }
    }

    /// Place `target` relative to `base`.
    ///
    /// `mult_distance` is in units of [`BASE_DISTANCE`]. Re-adding a relation
    /// for the same target overwrites it.
    pub fn add_node_layout_relation(
        &mut self,
        base: NodeId,
        target: NodeId,
        position: Position,
        mult_distance: f64,
    ) {
        self.node_relations.insert(
            target,
            NodeRelation {
                base,
                position,
                distance: mult_distance * BASE_DISTANCE,
                visited: false,
            },
        );
    }

    fn expect_phase(&self, expected: LayoutPhase, operation: &'static str) -> Result<(), LayoutError> {
        if self.phase != expected {
            return Err(LayoutError::OutOfOrder { operation, phase: self.phase });
        }
        Ok(())
    }

    /// Resolve the position of every node that has a relation.
    pub fn build_layout_node_graph<H: GraphHost>(&mut self, host: &mut H) -> Result<(), LayoutError> {
        self.expect_phase(LayoutPhase::Collecting, "build_layout_node_graph")?;
        let targets: Vec<NodeId> = self.node_relations.keys().copied().collect();
        for target in targets {
            self.place_node(host, target)?;
        }
        tracing::debug!(nodes = self.node_relations.len(), "Node layout built");
        self.phase = LayoutPhase::NodesPlaced;
        Ok(())
    }

    /// Place `start` after its chain of bases.
    ///
    /// Walks up the chain first and marks each relation visited, so shared
    /// bases are placed once and cycles terminate. A base without a relation
    /// goes to the origin.
    fn place_node<H: GraphHost>(&mut self, host: &mut H, start: NodeId) -> Result<(), LayoutError> {
        let mut chain = Vec::new();
        let mut current = start;
        loop {
            match self.node_relations.get_mut(&current) {
                Some(relation) if !relation.visited => {
                    relation.visited = true;
                    chain.push(current);
                    current = relation.base;
                }
                Some(_) => break,
                None => {
                    host.set_position(current, 0, 0).map_err(LayoutError::from_host)?;
                    break;
                }
            }
        }

        for target in chain.into_iter().rev() {
            let Some(relation) = self.node_relations.get(&target).copied() else {
                continue;
            };
            let (cx, cy) = node_rect(host, relation.base)?.center();
            let (w, h) = host.size(target).map_err(LayoutError::from_host)?;
            let x = cx + f64::from(relation.position.dx()) * relation.distance - f64::from(w) / 2.0;
            let y = cy + f64::from(relation.position.dy()) * relation.distance - f64::from(h) / 2.0;
            host.set_position(target, x as i32, y as i32).map_err(LayoutError::from_host)?;
        }
        Ok(())
    }

    /// Compute backdrop boxes, apply backdrop relations, avoid the existing
    /// graph and create the displayed backdrops.
    ///
    /// Returns the created backdrop nodes, children before parents.
    pub fn build_layout_backdrops<H: GraphHost>(&mut self, host: &mut H) -> Result<Vec<NodeId>, LayoutError> {
        self.expect_phase(LayoutPhase::NodesPlaced, "build_layout_backdrops")?;

        self.compute_boxes(host)?;
        self.phase = LayoutPhase::BoxesComputed;

        self.apply_group_relations(host)?;
        self.phase = LayoutPhase::GroupsRelated;

        self.resolve_collisions(host)?;
        self.phase = LayoutPhase::CollisionsResolved;

        let created = self.materialize(host)?;
        self.phase = LayoutPhase::Materialized;
        Ok(created)
    }

    fn compute_boxes<H: GraphHost>(&mut self, host: &H) -> Result<(), LayoutError> {
        for id in self.tree.post_order(BackdropId::ROOT) {
            if id == BackdropId::ROOT {
                continue;
            }
            let rect = self.compute_box(host, id)?;
            self.tree.get_mut(id).rect = rect;
        }
        Ok(())
    }

    fn compute_box<H: GraphHost>(&self, host: &H, id: BackdropId) -> Result<Option<Rect>, LayoutError> {
        let backdrop = self.tree.get(id);
        let displayed = backdrop.options.is_displayed();
        let (left, top, right, bottom) = backdrop.options.margins();

        let rect = if backdrop.is_empty() {
            if displayed {
                Some(Rect::from_corners(left, top, right, bottom))
            } else {
                Some(Rect::default())
            }
        } else {
            let mut acc: Option<Rect> = None;
            for node in &backdrop.nodes {
                let r = node_rect(host, *node)?;
                acc = Some(acc.map_or(r, |a| a.union(&r)));
            }
            for child in &backdrop.children {
                if let Some(r) = self.tree.get(*child).rect {
                    acc = Some(acc.map_or(r, |a| a.union(&r)));
                }
            }
            acc.map(|r| {
                if displayed {
                    r.expanded(left, top + backdrop.options.font_size(), right, bottom)
                } else {
                    r
                }
            })
        };

        match rect {
            Some(r) if !r.is_degenerate() => Ok(Some(r)),
            other => {
                let r = other.unwrap_or_default();
                tracing::warn!(
                    path = %backdrop.path,
                    width = r.width,
                    height = r.height,
                    children = backdrop.children.len(),
                    nodes = backdrop.nodes.len(),
                    "Degenerate backdrop box, backdrop left out of the layout"
                );
                Ok(None)
            }
        }
    }

    fn apply_group_relations<H: GraphHost>(&mut self, host: &mut H) -> Result<(), LayoutError> {
        let relations = self.group_relations.clone();
        for (path, relation) in relations {
            let target = self.tree.find(&path);
            let base = self.tree.find(&relation.base);
            let (Some(target), Some(base)) = (target, base) else {
                continue;
            };
            let (Some(r), Some(b)) = (self.tree.get(target).rect, self.tree.get(base).rect) else {
                tracing::debug!(path = %path, base = %relation.base, "Backdrop relation skipped, missing box");
                continue;
            };

            let factor = relation.alignment.factor();
            let new_x = match relation.position.dx() {
                0 => b.x + (b.width - r.width) * factor,
                1 => b.right() + relation.distance,
                _ => b.x - r.width - relation.distance,
            };
            let new_y = match relation.position.dy() {
                0 => b.y + (b.height - r.height) * factor,
                1 => b.bottom() + relation.distance,
                _ => b.y - r.height - relation.distance,
            };
            self.translate_subtree(host, target, new_x - r.x, new_y - r.y)?;
        }
        Ok(())
    }

    /// Move a backdrop, its descendants and their member nodes.
    ///
    /// Backdrops without a box are skipped together with everything below them.
    fn translate_subtree<H: GraphHost>(
        &mut self,
        host: &mut H,
        id: BackdropId,
        dx: f64,
        dy: f64,
    ) -> Result<(), LayoutError> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let backdrop = self.tree.get_mut(current);
            let Some(rect) = backdrop.rect else {
                continue;
            };
            backdrop.rect = Some(rect.translated(dx, dy));
            stack.extend(backdrop.children.iter().rev().copied());
            for node in backdrop.nodes.clone() {
                let (x, y) = host.position(node).map_err(LayoutError::from_host)?;
                host.set_position(node, (f64::from(x) + dx) as i32, (f64::from(y) + dy) as i32)
                    .map_err(LayoutError::from_host)?;
            }
        }
        Ok(())
    }

    fn resolve_collisions<H: GraphHost>(&mut self, host: &mut H) -> Result<(), LayoutError> {
        let graph = self.graph_bbox;
        if graph.width == 0.0 {
            return Ok(());
        }
        let top_level = self.tree.top_level().to_vec();
        let shift = top_level
            .iter()
            .filter_map(|id| self.tree.get(*id).rect)
            .filter(|r| r.overlaps(&graph))
            .map(|r| graph.right() - r.x)
            .fold(0.0_f64, f64::max);

        if shift != 0.0 {
            tracing::debug!(shift, "Shifting new backdrops clear of the existing graph");
            for id in top_level {
                self.translate_subtree(host, id, shift, 0.0)?;
            }
        }
        Ok(())
    }

    fn materialize<H: GraphHost>(&self, host: &mut H) -> Result<Vec<NodeId>, LayoutError> {
        let mut created = Vec::new();
        for id in self.tree.post_order(BackdropId::ROOT) {
            let backdrop = self.tree.get(id);
            let (Some(rect), Some(color)) = (backdrop.rect, backdrop.options.color) else {
                continue;
            };
            let spec = NodeSpec::new(NodeKind::Backdrop)
                .named(backdrop.name.clone())
                .knob("xpos", rect.x as i64)
                .knob("ypos", rect.y as i64)
                .knob("bdwidth", rect.width)
                .knob("bdheight", rect.height)
                .knob("z_order", backdrop.depth)
                .knob("label", backdrop.name.clone())
                .knob("note_font_size", backdrop.options.font_size())
                .knob("tile_color", KnobValue::Int(i64::from(color.tile_color())));
            let node = host.create_node(spec).map_err(LayoutError::from_host)?;
            host.set_position(node, rect.x as i32, rect.y as i32).map_err(LayoutError::from_host)?;
            created.push(node);
        }
        tracing::debug!(backdrops = created.len(), "Backdrops materialized");
        Ok(created)
    }
}

fn node_rect<H: GraphHost>(host: &H, node: NodeId) -> Result<Rect, LayoutError> {
    let (x, y) = host.position(node).map_err(LayoutError::from_host)?;
    let (w, h) = host.size(node).map_err(LayoutError::from_host)?;
    Ok(Rect::new(f64::from(x), f64::from(y), f64::from(w), f64::from(h)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{DOT_SIZE, NODE_HEIGHT, NODE_WIDTH};
    use crate::host::InMemoryGraph;
    use crate::types::Rgb;

    // ─────────────────────────────────────────────────────────────────────────
    // Node placement
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_relative_placement() {
        let mut graph = InMemoryGraph::new();
        let base = graph.add_node(NodeKind::Read, "read", 0, 0);
        let dot = graph.add_node(NodeKind::Dot, "dot", 500, 500);

        let mut layout = LayoutManager::new();
        layout.add_node_layout_relation(base, dot, Position::Right, 1.0);
        layout.build_layout_node_graph(&mut graph).unwrap();

        // center (40, 33) + (120, 0) - half dot
        assert_eq!(graph.position(dot).unwrap(), (160 - DOT_SIZE / 2, 33 - DOT_SIZE / 2));
        assert_eq!(layout.phase(), LayoutPhase::NodesPlaced);
    }

    #[test]
    fn test_relation_less_base_goes_to_origin() {
        let mut graph = InMemoryGraph::new();
        let base = graph.add_node(NodeKind::Read, "read", 300, 300);
        let target = graph.add_node(NodeKind::Read, "t", 0, 0);

        let mut layout = LayoutManager::new();
        layout.add_node_layout_relation(base, target, Position::Bottom, 2.0);
        layout.build_layout_node_graph(&mut graph).unwrap();

        assert_eq!(graph.position(base).unwrap(), (0, 0));
        assert_eq!(graph.position(target).unwrap(), (0, 240));
    }

    #[test]
    fn test_chain_registered_out_of_order() {
        let mut graph = InMemoryGraph::new();
        let nodes: Vec<NodeId> = (0..4).map(|i| graph.add_node(NodeKind::Read, &format!("n{i}"), 0, 0)).collect();

        let mut layout = LayoutManager::new();
        layout.add_node_layout_relation(nodes[2], nodes[3], Position::Right, 1.0);
        layout.add_node_layout_relation(nodes[0], nodes[1], Position::Right, 1.0);
        layout.add_node_layout_relation(nodes[1], nodes[2], Position::Right, 1.0);
        layout.build_layout_node_graph(&mut graph).unwrap();

        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(graph.position(*node).unwrap(), (120 * i as i32, 0));
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = InMemoryGraph::new();
        let a = graph.add_node(NodeKind::Read, "a", 0, 0);
        let b = graph.add_node(NodeKind::Read, "b", 0, 0);

        let mut layout = LayoutManager::new();
        layout.add_node_layout_relation(a, b, Position::Right, 1.0);
        layout.add_node_layout_relation(b, a, Position::Right, 1.0);
        layout.build_layout_node_graph(&mut graph).unwrap();
        assert!(layout.node_relation(a).unwrap().visited);
        assert!(layout.node_relation(b).unwrap().visited);
    }

    #[test]
    fn test_phases_enforced() {
        let mut graph = InMemoryGraph::new();
        let mut layout = LayoutManager::new();
        assert!(matches!(
            layout.build_layout_backdrops(&mut graph),
            Err(LayoutError::OutOfOrder { phase: LayoutPhase::Collecting, .. })
        ));
        layout.build_layout_node_graph(&mut graph).unwrap();
        assert!(layout.build_layout_node_graph(&mut graph).is_err());
        layout.build_layout_backdrops(&mut graph).unwrap();
        assert_eq!(layout.phase(), LayoutPhase::Materialized);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Backdrop boxes
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_displayed_box_is_padded() {
        let mut graph = InMemoryGraph::new();
        let n = graph.add_node(NodeKind::Read, "n", 100, 200);

        let mut layout = LayoutManager::new();
        layout.add_nodes_to_backdrop("INPUTS", [n]);
        layout.add_backdrop_option("INPUTS", BackdropOption::Color(Rgb(120, 120, 120)));
        layout.build_layout_node_graph(&mut graph).unwrap();
        let created = layout.build_layout_backdrops(&mut graph).unwrap();

        let rect = layout.tree().by_path("INPUTS").unwrap().rect.unwrap();
        assert_eq!(rect, Rect::new(70.0, 120.0, NODE_WIDTH as f64 + 60.0, NODE_HEIGHT as f64 + 110.0));

        assert_eq!(created.len(), 1);
        let bd = graph.node(created[0]).unwrap();
        assert_eq!(bd.name, "INPUTS");
        assert_eq!((bd.x, bd.y), (70, 120));
        assert_eq!(bd.knobs.get("z_order").and_then(|v| v.as_int()), Some(1));
        assert_eq!(bd.knobs.get("tile_color").and_then(|v| v.as_int()), Some(0x787878ff));
    }

    #[test]
    fn test_undisplayed_parent_wraps_children_without_margins() {
        let mut graph = InMemoryGraph::new();
        let a = graph.add_node(NodeKind::Read, "a", 0, 0);
        let b = graph.add_node(NodeKind::Read, "b", 200, 0);

        let mut layout = LayoutManager::new();
        layout.add_nodes_to_backdrop("LAYER.a", [a]);
        layout.add_nodes_to_backdrop("LAYER.b", [b]);
        layout.build_layout_node_graph(&mut graph).unwrap();
        let created = layout.build_layout_backdrops(&mut graph).unwrap();

        let rect = layout.tree().by_path("LAYER").unwrap().rect.unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 280.0, 66.0));
        assert!(created.is_empty());
    }

    #[test]
    fn test_empty_groups_are_left_out() {
        let mut graph = InMemoryGraph::new();
        let mut layout = LayoutManager::new();
        layout.add_backdrop_option("EMPTY", BackdropOption::Color(Rgb(1, 2, 3)));
        layout.add_nodes_to_backdrop("PLAIN", Vec::new());
        layout.build_layout_node_graph(&mut graph).unwrap();
        let created = layout.build_layout_backdrops(&mut graph).unwrap();

        assert!(layout.tree().by_path("EMPTY").unwrap().rect.is_none());
        assert!(layout.tree().by_path("PLAIN").unwrap().rect.is_none());
        assert!(created.is_empty());
    }

    #[test]
    fn test_nested_z_order_and_child_first_creation() {
        let mut graph = InMemoryGraph::new();
        let n = graph.add_node(NodeKind::Read, "n", 0, 0);

        let mut layout = LayoutManager::new();
        layout.add_nodes_to_backdrop("LAYER.a.READ", [n]);
        layout.add_backdrop_option("LAYER.a", BackdropOption::Color(Rgb(40, 90, 150)));
        layout.add_backdrop_option("LAYER.a.READ", BackdropOption::Color(Rgb(28, 62, 105)));
        layout.build_layout_node_graph(&mut graph).unwrap();
        let created = layout.build_layout_backdrops(&mut graph).unwrap();

        let names: Vec<_> = created.iter().map(|id| graph.node(*id).unwrap().name.clone()).collect();
        assert_eq!(names, vec!["READ", "a"]);
        let z: Vec<_> = created
            .iter()
            .map(|id| graph.knob(*id, "z_order").unwrap().and_then(|v| v.as_int()))
            .collect();
        assert_eq!(z, vec![Some(3), Some(2)]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group relations and collisions
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_group_relation_top_start_moves_members() {
        let mut graph = InMemoryGraph::new();
        let read = graph.add_node(NodeKind::Read, "read", 0, 0);
        let stamp = graph.add_node(NodeKind::PostageStamp, "stamp", 0, 0);

        let mut layout = LayoutManager::new();
        layout.add_nodes_to_backdrop("INPUTS.a", [read]);
        layout.add_nodes_to_backdrop("LAYER.a", [stamp]);
        layout.add_top_level_backdrop_layout_relation("LAYER", "INPUTS", Position::Top, Alignment::Start, 1.5);
        layout.build_layout_node_graph(&mut graph).unwrap();
        layout.build_layout_backdrops(&mut graph).unwrap();

        let inputs = layout.tree().by_path("INPUTS").unwrap().rect.unwrap();
        let layer = layout.tree().by_path("LAYER").unwrap().rect.unwrap();
        assert_eq!(inputs.x, layer.x);
        assert_eq!(inputs.bottom() + 180.0, layer.y);
        assert_eq!(graph.position(read).unwrap(), (0, -66 - 180));
        assert_eq!(layout.tree().by_path("INPUTS.a").unwrap().rect.unwrap(), inputs);
    }

    #[test]
    fn test_group_relation_overwrites_in_place() {
        let mut layout = LayoutManager::new();
        layout.add_top_level_backdrop_layout_relation("A", "B", Position::Top, Alignment::Start, 1.0);
        layout.add_top_level_backdrop_layout_relation("A", "C", Position::Left, Alignment::End, 1.0);
        layout.add_top_level_backdrop_layout_relation("A", "B", Position::Bottom, Alignment::Center, 2.0);

        let rels = layout.group_relations();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].0, "B");
        assert_eq!(rels[0].1.position, Position::Bottom);
        assert_eq!(rels[0].1.distance, 240.0);
    }

    #[test]
    fn test_collision_shift_is_horizontal_max() {
        let mut graph = InMemoryGraph::new();
        let existing = graph.add_node(NodeKind::Read, "existing", 0, 0);

        let mut layout = LayoutManager::new();
        layout.compute_current_bbox_graph(&graph).unwrap();
        assert_eq!(layout.graph_bbox(), Rect::new(0.0, 0.0, 80.0, 66.0));

        let a = graph.add_node(NodeKind::Read, "a", 20, 10);
        let b = graph.add_node(NodeKind::Read, "b", 50, 10);
        layout.add_nodes_to_backdrop("A", [a]);
        layout.add_nodes_to_backdrop("B", [b]);
        layout.build_layout_node_graph(&mut graph).unwrap();
        layout.build_layout_backdrops(&mut graph).unwrap();

        // A needs 60, B needs 30: both move by 60
        assert_eq!(graph.position(a).unwrap(), (80, 10));
        assert_eq!(graph.position(b).unwrap(), (110, 10));
        assert_eq!(graph.position(existing).unwrap(), (0, 0));
    }

    #[test]
    fn test_empty_graph_bbox_disables_collision() {
        let mut graph = InMemoryGraph::new();
        let mut layout = LayoutManager::new();
        layout.compute_current_bbox_graph(&graph).unwrap();
        assert_eq!(layout.graph_bbox(), Rect::default());

        let a = graph.add_node(NodeKind::Read, "a", 0, 0);
        layout.add_nodes_to_backdrop("A", [a]);
        layout.build_layout_node_graph(&mut graph).unwrap();
        layout.build_layout_backdrops(&mut graph).unwrap();
        assert_eq!(graph.position(a).unwrap(), (0, 0));
    }
}
