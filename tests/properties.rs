//! Property tests for rule resolution, operand resolution and layout.

use proptest::prelude::*;

use autocomp::merge::resolve_operands;
use autocomp::{
    GraphHost, InMemoryGraph, LayerOptions, LayerRule, LayoutManager, NodeKind, NodeSpec, Position, Rect,
    Relation, StartVariable, Variable, VariablesSet,
};

const POSITIONS: [Position; 8] = [
    Position::Left,
    Position::Right,
    Position::Top,
    Position::Bottom,
    Position::TopLeft,
    Position::TopRight,
    Position::BottomLeft,
    Position::BottomRight,
];

fn node_rect(graph: &InMemoryGraph, node: autocomp::NodeId) -> Rect {
    let (x, y) = graph.position(node).unwrap();
    let (w, h) = graph.size(node).unwrap();
    Rect::new(f64::from(x), f64::from(y), f64::from(w), f64::from(h))
}

fn contains(outer: &Rect, inner: &Rect) -> bool {
    outer.x <= inner.x && outer.y <= inner.y && outer.right() >= inner.right() && outer.bottom() >= inner.bottom()
}

proptest! {
    #[test]
    fn test_first_matching_rule_wins(
        prefixes in prop::collection::vec("[abc]{1,3}", 1..8),
        layer in "[abc]{1,6}",
    ) {
        let start_vars: Vec<_> = prefixes
            .iter()
            .enumerate()
            .map(|(i, p)| StartVariable::new(format!("v{i}"), LayerRule::new(p).unwrap(), i, LayerOptions::default()))
            .collect();
        let vars = VariablesSet::new(start_vars);

        let expected = prefixes.iter().position(|p| layer.starts_with(p.as_str()));
        let found = vars.start_variable_valid_for(&layer).map(StartVariable::order);
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn test_operands_are_distinct_and_a_is_exact(
        specs in prop::collection::vec((0usize..3, any::<bool>()), 0..10),
    ) {
        let names = ["a", "b", "c"];
        let active: Vec<Variable> = specs
            .iter()
            .enumerate()
            .map(|(i, (name, alias_b))| {
                let aliases = if *alias_b { vec!["b".to_string()] } else { Vec::new() };
                Variable::bound(names[*name], autocomp::NodeId::new(i as u64 + 1)).with_aliases(aliases)
            })
            .collect();
        let relation = Relation::new("a", "b", "plus", None);

        match resolve_operands(&relation, &active) {
            Some((a, b)) => {
                prop_assert_ne!(a, b);
                prop_assert_eq!(active[a].name(), "a");
                prop_assert!(active[b].name() == "b" || active[b].has_alias("b"));
            }
            None => {
                let has_a = active.iter().any(|v| v.name() == "a");
                let has_b = active.iter().any(|v| v.name() == "b");
                prop_assert!(!(has_a && has_b));
            }
        }
    }

    #[test]
    fn test_chain_placement_matches_relations(
        links in prop::collection::vec((0usize..8, 1u32..5), 1..20),
        head_x in -500i32..500,
        head_y in -500i32..500,
    ) {
        let mut graph = InMemoryGraph::new();
        let mut layout = LayoutManager::new();
        let head = graph.add_node(NodeKind::Read, "head", head_x, head_y);
        let mut chain = vec![head];
        for (position, mult) in &links {
            let base = *chain.last().unwrap();
            let node = graph.create_node(NodeSpec::dot().input(base)).unwrap();
            layout.add_node_layout_relation(base, node, POSITIONS[*position], f64::from(*mult));
            chain.push(node);
        }
        layout.build_layout_node_graph(&mut graph).unwrap();

        prop_assert_eq!(graph.position(head).unwrap(), (0, 0));
        for (pair, (position, mult)) in chain.windows(2).zip(&links) {
            let (bx, by) = node_rect(&graph, pair[0]).center();
            let (tx, ty) = node_rect(&graph, pair[1]).center();
            let p = POSITIONS[*position];
            let distance = f64::from(*mult) * autocomp::BASE_DISTANCE;
            prop_assert!((tx - (bx + f64::from(p.dx()) * distance)).abs() < 1.0);
            prop_assert!((ty - (by + f64::from(p.dy()) * distance)).abs() < 1.0);
        }
    }

    #[test]
    fn test_backdrops_contain_their_members(
        members in prop::collection::vec((0usize..3, -400i32..400, -400i32..400), 1..12),
        displayed in prop::collection::vec(any::<bool>(), 3),
    ) {
        let mut graph = InMemoryGraph::new();
        let mut layout = LayoutManager::new();
        let mut placed = Vec::new();
        for (i, (group, x, y)) in members.iter().enumerate() {
            let node = graph.add_node(NodeKind::Read, &format!("n{i}"), *x, *y);
            let path = format!("GROUP.g{group}");
            layout.add_nodes_to_backdrop(&path, [node]);
            placed.push((path, node));
        }
        for (group, shown) in displayed.iter().enumerate() {
            if *shown {
                layout.add_backdrop_option(&format!("GROUP.g{group}"), autocomp::BackdropOption::Color(autocomp::Rgb(1, 2, 3)));
            }
        }
        layout.build_layout_node_graph(&mut graph).unwrap();
        layout.build_layout_backdrops(&mut graph).unwrap();

        let outer = layout.tree().by_path("GROUP").unwrap().rect.unwrap();
        for (path, node) in &placed {
            let member = node_rect(&graph, *node);
            let rect = layout.tree().by_path(path).unwrap().rect.unwrap();
            prop_assert!(contains(&rect, &member));
            prop_assert!(contains(&outer, &rect));
        }
    }

    #[test]
    fn test_collision_shift_is_horizontal(
        existing in prop::collection::vec((-300i32..300, -300i32..300), 1..5),
        created in prop::collection::vec((-300i32..300, -300i32..300), 1..5),
    ) {
        let mut graph = InMemoryGraph::new();
        for (i, (x, y)) in existing.iter().enumerate() {
            graph.add_node(NodeKind::Read, &format!("old{i}"), *x, *y);
        }
        let mut layout = LayoutManager::new();
        layout.compute_current_bbox_graph(&graph).unwrap();
        let graph_bbox = layout.graph_bbox();

        let mut new_nodes = Vec::new();
        for (i, (x, y)) in created.iter().enumerate() {
            let node = graph.add_node(NodeKind::Read, &format!("new{i}"), *x, *y);
            new_nodes.push((node, *y));
        }
        layout.add_nodes_to_backdrop("NEW", new_nodes.iter().map(|(n, _)| *n));
        layout.build_layout_node_graph(&mut graph).unwrap();
        layout.build_layout_backdrops(&mut graph).unwrap();

        let rect = layout.tree().by_path("NEW").unwrap().rect.unwrap();
        prop_assert!(!rect.overlaps(&graph_bbox));
        for (node, y) in &new_nodes {
            prop_assert_eq!(graph.position(*node).unwrap().1, *y);
        }
    }
}
