//! Shuffle engine.
//!
//! Expands each active variable into one channel extraction node per
//! light group, folds the extracted channels back together with additive
//! merges, then lines up every variable's output on a common column so the
//! merge stage starts from aligned terminal dots.
//!
//! ```text
//! read ─ dot ┬ dot ─ dot ─ dot        (chain, one dot per channel)
//!            │  │     │     │
//!            │ shf   shf   shf        (extraction nodes)
//!            │  │     │     │
//!            │ dot ─ plus ─ plus ──── terminal dot → active variable
//! ```

use std::collections::BTreeSet;

use crate::error::{PipelineError, PipelineResult};
use crate::host::{GraphHost, NodeId, NodeKind, NodeSpec};
use crate::layout::LayoutManager;
use crate::types::{BackdropOption, Position, Variable, VariablesSet};
use crate::unpack::{BACKDROP_LAYER, BACKDROP_LAYER_SHUFFLE, BACKDROP_MERGE};

/// Spacing between two channel columns.
pub const DISTANCE_COLUMN_SHUFFLE: f64 = 2.0;
/// Spacing between a read and its first shuffle column.
pub const DISTANCE_READ_TO_SHUFFLE: f64 = 1.7;
/// Height of a shuffle column.
pub const HEIGHT_COLUMN_SHUFFLE: f64 = 3.0;
/// Spacing between the last column and the terminal dot.
pub const DISTANCE_OUTPUT_SHUFFLE: f64 = 1.7;
/// Share of the column height above the extraction node.
pub const PERCENT_HEIGHT_SHUFFLE: f64 = 0.25;

const LIGHT_GROUP_PREFIX: &str = "RGBA_";
const LIGHT_GROUP_EXTRAS: [&str; 2] = ["emission", "background"];

const SHUFFLE_BACKDROP_MARGIN_BOTTOM: f64 = 56.0;
const SHUFFLE_BACKDROP_FONT_SIZE: f64 = 30.0;

/// How the channels to extract are chosen.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelStrategy {
    /// Every `RGBA_*` light group plus a few named extras.
    #[default]
    LightGroups,
    /// The listed channel groups present on the node, in list order.
    Explicit(Vec<String>),
}

impl ChannelStrategy {
    /// Channel groups of `node` to extract.
    pub fn channels<H: GraphHost>(&self, host: &H, node: NodeId) -> Result<Vec<String>, H::Error> {
        let channels = host.channels(node)?;
        Ok(match self {
            Self::LightGroups => light_group_channels(&channels),
            Self::Explicit(wanted) => {
                let groups: Vec<&str> = channels.iter().map(|c| channel_group(c)).collect();
                wanted
                    .iter()
                    .filter(|w| groups.contains(&w.as_str()))
                    .cloned()
                    .collect()
            }
        })
    }
}

/// Group prefix of a channel name (`RGBA_key.red` → `RGBA_key`).
pub fn channel_group(channel: &str) -> &str {
    channel.split('.').next().unwrap_or(channel)
}

/// Distinct light groups in first-occurrence order.
pub fn light_group_channels(channels: &[String]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for channel in channels {
        let group = channel_group(channel);
        let wanted = group.starts_with(LIGHT_GROUP_PREFIX) || LIGHT_GROUP_EXTRAS.contains(&group);
        if wanted && !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
    }
    groups
}

/// Channels already extracted downstream of `read`.
///
/// Looks at every extraction node in the graph and keeps the `in1` channel of
/// those that have `read` somewhere upstream.
pub fn present_channels<H: GraphHost>(host: &H, read: NodeId) -> Result<Vec<String>, H::Error> {
    let mut present: Vec<String> = Vec::new();
    for shuffle in host.nodes_of_kind(NodeKind::Shuffle) {
        if !is_upstream(host, read, shuffle)? {
            continue;
        }
        if let Some(channel) = host.knob(shuffle, "in1")?.and_then(|v| v.as_text().map(str::to_string)) {
            if !present.contains(&channel) {
                present.push(channel);
            }
        }
    }
    Ok(present)
}

fn is_upstream<H: GraphHost>(host: &H, ancestor: NodeId, node: NodeId) -> Result<bool, H::Error> {
    let mut visited = BTreeSet::new();
    let mut stack = host.inputs(node)?;
    while let Some(current) = stack.pop() {
        if current == ancestor {
            return Ok(true);
        }
        if visited.insert(current) {
            stack.extend(host.inputs(current)?);
        }
    }
    Ok(false)
}

/// A variable's shuffle result before alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleOutput {
    /// Variable that was shuffled (already deactivated).
    pub variable: Variable,
    /// Node carrying the combined result.
    pub node: NodeId,
    /// Number of extracted channels. 0 for pass-through variables.
    pub chain_len: usize,
}

/// Shuffle stage of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ShuffleEngine {
    allow_list: Option<Vec<String>>,
    strategy: ChannelStrategy,
    columns: Vec<(Variable, Vec<NodeId>)>,
    outputs: Vec<ShuffleOutput>,
}

impl ShuffleEngine {
    /// Create an engine. With an allow-list, only the listed variable names
    /// are shuffled; the others pass through.
    pub fn new(allow_list: Option<Vec<String>>) -> Self {
        Self {
            allow_list,
            ..Self::default()
        }
    }

    /// Engine extracting only the listed channel groups.
    pub fn explicit(channels: Vec<String>) -> Self {
        Self::new(None).with_strategy(ChannelStrategy::Explicit(channels))
    }

    /// Replace the channel strategy.
    pub fn with_strategy(mut self, strategy: ChannelStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Allow-list of variable names.
    pub fn allow_list(&self) -> Option<&[String]> {
        self.allow_list.as_deref()
    }

    /// Channel strategy.
    pub fn strategy(&self) -> &ChannelStrategy {
        &self.strategy
    }

    /// Outputs of the last run, in reactivation order.
    pub fn outputs(&self) -> &[ShuffleOutput] {
        &self.outputs
    }

    /// Shuffle every active variable.
    ///
    /// In core-only mode no entry dots are created, the fold starts with a
    /// merge, and outputs are neither aligned nor reactivated.
    pub fn run<H: GraphHost>(
        &mut self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
        core_only: bool,
    ) -> PipelineResult<()> {
        self.columns.clear();
        self.outputs.clear();

        let snapshot: Vec<Variable> = vars.active_vars().to_vec();
        for var in snapshot {
            self.shuffle_variable(host, layout, vars, var, core_only)?;
        }
        self.fold(host, layout, core_only)?;
        if !core_only {
            self.align(host, layout, vars)?;
        }
        Ok(())
    }

    fn shuffle_variable<H: GraphHost>(
        &mut self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
        var: Variable,
        core_only: bool,
    ) -> PipelineResult<()> {
        let source = var.require_node()?;
        if let Some(allow) = &self.allow_list {
            if !allow.iter().any(|name| name == var.name()) {
                tracing::debug!(variable = %var, "Variable not in shuffle list, passing through");
                vars.deactivate(var.id())?;
                self.outputs.push(ShuffleOutput { variable: var, node: source, chain_len: 0 });
                return Ok(());
            }
        }

        let channels = self.strategy.channels(host, source).map_err(PipelineError::from_host)?;
        if channels.is_empty() {
            tracing::debug!(variable = %var, "No channel to shuffle");
            vars.deactivate(var.id())?;
            self.outputs.push(ShuffleOutput { variable: var, node: source, chain_len: 0 });
            return Ok(());
        }

        let layer_path = format!("{BACKDROP_LAYER}.{}", var.layout_key());
        let shuffle_path = format!("{layer_path}.{BACKDROP_LAYER_SHUFFLE}");
        let dot_name = format!("dot_{}", var.name());

        let mut previous = None;
        if !core_only {
            let entry = create(host, NodeSpec::dot().named(dot_name.clone()).input(source))?;
            layout.add_nodes_to_backdrop(&layer_path, [entry]);
            layout.add_backdrop_option(&shuffle_path, BackdropOption::MarginBottom(SHUFFLE_BACKDROP_MARGIN_BOTTOM));
            layout.add_backdrop_option(&shuffle_path, BackdropOption::FontSize(SHUFFLE_BACKDROP_FONT_SIZE));
            layout.add_node_layout_relation(source, entry, Position::Right, DISTANCE_READ_TO_SHUFFLE / 2.0);

            let head = create(host, NodeSpec::dot().named(dot_name.clone()).input(entry))?;
            layout.add_nodes_to_backdrop(&layer_path, [head]);
            layout.add_node_layout_relation(entry, head, Position::Top, HEIGHT_COLUMN_SHUFFLE);
            previous = Some(head);
        }

        let mut chain = Vec::with_capacity(channels.len());
        for channel in channels {
            let distance = if chain.is_empty() {
                DISTANCE_READ_TO_SHUFFLE / 2.0
            } else {
                DISTANCE_COLUMN_SHUFFLE
            };
            // In core-only mode the first dot has no placement relation, so
            // the source node is never moved.
            let dot = create(host, NodeSpec::dot().named(dot_name.clone()).input(previous.unwrap_or(source)))?;
            if let Some(base) = previous {
                layout.add_node_layout_relation(base, dot, Position::Right, distance);
            }
            layout.add_nodes_to_backdrop(&shuffle_path, [dot]);
            chain.push((channel, dot));
            previous = Some(dot);
        }

        let mut extracted = Vec::with_capacity(chain.len());
        for (channel, dot) in chain {
            let spec = NodeSpec::new(NodeKind::Shuffle)
                .named(format!("shuffle_{}_{}", var.name(), channel.replace(LIGHT_GROUP_PREFIX, "")))
                .knob("in1", channel.as_str())
                .knob("postage_stamp", true)
                .input(dot);
            let shuffle = create(host, spec)?;
            layout.add_nodes_to_backdrop(&shuffle_path, [shuffle]);
            layout.add_node_layout_relation(
                dot,
                shuffle,
                Position::Bottom,
                HEIGHT_COLUMN_SHUFFLE * PERCENT_HEIGHT_SHUFFLE,
            );
            extracted.push(shuffle);
        }

        tracing::debug!(variable = %var, channels = extracted.len(), "Variable shuffled");
        vars.deactivate(var.id())?;
        self.columns.push((var, extracted));
        Ok(())
    }

    fn fold<H: GraphHost>(
        &mut self,
        host: &mut H,
        layout: &mut LayoutManager,
        core_only: bool,
    ) -> PipelineResult<()> {
        let fold_distance = HEIGHT_COLUMN_SHUFFLE * (1.0 - PERCENT_HEIGHT_SHUFFLE);
        for (var, extracted) in std::mem::take(&mut self.columns) {
            let shuffle_path = format!("{BACKDROP_LAYER}.{}.{BACKDROP_LAYER_SHUFFLE}", var.layout_key());
            let last = extracted.len() - 1;
            let mut current: Option<NodeId> = None;

            for (i, node) in extracted.iter().copied().enumerate() {
                let final_name = (i == last).then(|| format!("shuffled_{}", var.name()));
                let spec = match current {
                    None if !core_only => NodeSpec::dot()
                        .named(final_name.unwrap_or_else(|| format!("dot_{}", var.name())))
                        .input(node),
                    _ => {
                        let merge = NodeSpec::merge("plus")
                            .named(final_name.unwrap_or_else(|| format!("merge_shuffle_{}", var.name())))
                            .knob("A", "rgb");
                        // the extracted channel always feeds the A slot
                        let merge = match current {
                            Some(previous) => merge.input(previous),
                            None => merge.empty_input(),
                        };
                        merge.input(node)
                    }
                };
                let folded = create(host, spec)?;
                layout.add_nodes_to_backdrop(&shuffle_path, [folded]);
                layout.add_node_layout_relation(node, folded, Position::Bottom, fold_distance);
                current = Some(folded);
            }

            if let Some(node) = current {
                self.outputs.push(ShuffleOutput { variable: var, node, chain_len: extracted.len() });
            }
        }
        Ok(())
    }

    fn align<H: GraphHost>(
        &mut self,
        host: &mut H,
        layout: &mut LayoutManager,
        vars: &mut VariablesSet,
    ) -> PipelineResult<()> {
        let max_len = self.outputs.iter().map(|o| o.chain_len).max().unwrap_or(0);
        for output in &self.outputs {
            let distance = output_distance(max_len, output.chain_len);
            let dot = create(
                host,
                NodeSpec::dot().named(format!("dot_{}", output.variable.name())).input(output.node),
            )?;
            layout.add_nodes_to_backdrop(BACKDROP_MERGE, [dot]);
            layout.add_node_layout_relation(output.node, dot, Position::Right, distance);
            vars.activate(output.variable.successor(dot, 0))?;
        }
        Ok(())
    }
}

/// Distance from a variable's output to its terminal dot so every terminal
/// dot lands on the column after the longest chain.
pub fn output_distance(max_len: usize, len: usize) -> f64 {
    if max_len == 0 {
        DISTANCE_OUTPUT_SHUFFLE
    } else if len != 0 {
        (max_len - len) as f64 * DISTANCE_COLUMN_SHUFFLE + DISTANCE_OUTPUT_SHUFFLE
    } else {
        (max_len - 1) as f64 * DISTANCE_COLUMN_SHUFFLE + DISTANCE_READ_TO_SHUFFLE + DISTANCE_OUTPUT_SHUFFLE
    }
}

fn create<H: GraphHost>(host: &mut H, spec: NodeSpec) -> PipelineResult<NodeId> {
    host.create_node(spec).map_err(PipelineError::from_host)
}
