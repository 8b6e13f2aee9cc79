//! Merge engine.
//!
//! Runs two phases over the active variables:
//!
//! 1. **Grouping**: instances sharing a name (several light groups matched by
//!    the same rule, for example) are folded into one variable with their
//!    group operation, in case-insensitive layer order.
//! 2. **Relations**: each configured [`Relation`] fires at most once, in
//!    declaration order, when both of its operands resolve to distinct active
//!    variables.

use crate::error::{PipelineError, PipelineResult};
use crate::host::{GraphHost, NodeId, NodeSpec};
use crate::layout::LayoutManager;
use crate::types::{Position, Relation, Variable, VariablesSet};
use crate::unpack::BACKDROP_MERGE;

/// Horizontal spacing per step between merge stages.
pub const DISTANCE_STEP_MERGE: f64 = 2.0;

/// Merge stage of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    relations: Vec<Relation>,
}

impl MergeEngine {
    /// Create an engine with relations in declaration order.
    pub fn new(relations: Vec<Relation>) -> Self {
        Self { relations }
    }

    /// Configured relations.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Group same-name instances, then apply every relation.
    pub fn run<H: GraphHost>(
        &self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
    ) -> PipelineResult<()> {
        self.run_group(host, layout, vars)?;
        for relation in &self.relations {
            self.apply_relation(host, layout, vars, relation)?;
        }
        Ok(())
    }

    fn run_group<H: GraphHost>(
        &self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
    ) -> PipelineResult<()> {
        let mut groups: Vec<(String, Vec<Variable>)> = Vec::new();
        for var in vars.active_vars() {
            match groups.iter_mut().find(|(name, _)| name == var.name()) {
                Some((_, instances)) => instances.push(var.clone()),
                None => groups.push((var.name().to_string(), vec![var.clone()])),
            }
        }

        for (name, mut instances) in groups {
            if instances.len() <= 1 {
                continue;
            }
            instances.sort_by_key(|v| v.layer().unwrap_or_default().to_lowercase());
            let Some(operation) = instances[0].group_operation().map(str::to_string) else {
                continue;
            };

            let first = &instances[0];
            let start = first.require_node()?;
            let step = instances.iter().map(Variable::step).max().unwrap_or(0) + 1;

            let mut previous = create(
                host,
                NodeSpec::dot().named(format!("dot_{}", first.layout_key())).input(start),
            )?;
            layout.add_nodes_to_backdrop(BACKDROP_MERGE, [previous]);
            layout.add_node_layout_relation(start, previous, Position::Right, DISTANCE_STEP_MERGE);
            vars.deactivate(first.id())?;

            for var in &instances[1..] {
                vars.deactivate(var.id())?;
                let node = var.require_node()?;
                let merge = create(
                    host,
                    NodeSpec::merge(&operation)
                        .named(format!("merge_{}_{}", operation, var.layout_key()))
                        .inputs([previous, node]),
                )?;
                layout.add_nodes_to_backdrop(BACKDROP_MERGE, [merge]);
                layout.add_node_layout_relation(node, merge, Position::Right, DISTANCE_STEP_MERGE);
                previous = merge;
            }

            tracing::debug!(variable = %name, instances = instances.len(), operation = %operation, "Instances grouped");
            let result = Variable::new(name, Some(previous), step).with_aliases(first.aliases().to_vec());
            vars.activate(result)?;
        }
        Ok(())
    }

    fn apply_relation<H: GraphHost>(
        &self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
        relation: &Relation,
    ) -> PipelineResult<()> {
        let snapshot: Vec<Variable> = vars.active_vars().to_vec();
        let Some((a, b)) = resolve_operands(relation, &snapshot) else {
            tracing::debug!(relation = %relation, "Relation skipped, operands not active");
            return Ok(());
        };
        let var_a = &snapshot[a];
        let mut var_b = snapshot[b].clone();
        let node_a = var_a.require_node()?;
        let node_b = var_b.require_node()?;

        let dot = create(
            host,
            NodeSpec::dot().named(relation.passthrough_name(var_a, &var_b)).input(node_b),
        )?;
        layout.add_nodes_to_backdrop(BACKDROP_MERGE, [dot]);
        var_b.set_node(dot);

        let result = relation.process(host, var_a, &var_b)?;
        let result_node = result.require_node()?;
        layout.add_nodes_to_backdrop(BACKDROP_MERGE, [result_node]);

        let step = result.step();
        layout.add_node_layout_relation(
            node_b,
            dot,
            Position::Right,
            f64::from(step - var_b.step()) * DISTANCE_STEP_MERGE,
        );
        layout.add_node_layout_relation(
            node_a,
            result_node,
            Position::Right,
            f64::from(step - var_a.step()) * DISTANCE_STEP_MERGE,
        );

        vars.deactivate(var_a.id())?;
        vars.deactivate(var_b.id())?;
        tracing::debug!(relation = %relation, step, "Relation applied");
        vars.activate(result)?;
        Ok(())
    }
}

/// Indices of the A and B operands of `relation` in `active`.
///
/// A first pass matches names exactly, claiming each variable at most once.
/// If a slot is still empty, a second pass may fill B by alias. A is never
/// filled by alias.
pub fn resolve_operands(relation: &Relation, active: &[Variable]) -> Option<(usize, usize)> {
    let mut a: Option<usize> = None;
    let mut b: Option<usize> = None;
    for (i, var) in active.iter().enumerate() {
        if relation.is_valid_for_a(var) && a.is_none() && b != Some(i) {
            a = Some(i);
        } else if relation.is_valid_for_b(var) && b.is_none() && a != Some(i) {
            b = Some(i);
        }
    }

    if a.is_none() || b.is_none() {
        for (i, var) in active.iter().enumerate() {
            if b.is_none() && a != Some(i) && relation.alias_is_valid_for_b(var) {
                b = Some(i);
            }
        }
    }

    a.zip(b)
}

fn create<H: GraphHost>(host: &mut H, spec: NodeSpec) -> PipelineResult<NodeId> {
    host.create_node(spec).map_err(PipelineError::from_host)
}
