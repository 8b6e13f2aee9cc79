//! Unpack modes: the pipeline orchestrator.
//!
//! An [`UnpackMode`] is one configured rule set. Scanning matches discovered
//! layers against its rules; unpacking creates the read nodes, runs the
//! shuffle and merge engines and lays the result out.
//!
//! ## Backdrops
//!
//! ```text
//! INPUTS                       reads (grey)
//!   INPUTS.<layer>             one per layer, layer color
//! LAYER                        below INPUTS, start aligned
//!   LAYER.<layer>              layer color
//!     LAYER.<layer>.READ       postage stamps, darkened
//!     LAYER.<layer>.SHUFFLE    shuffle columns, lightened
//! MERGE                        terminal dots and merges
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::discovery::LayerDiscovery;
use crate::error::{PipelineError, PipelineResult};
use crate::host::{GraphHost, NodeId, NodeKind, NodeSpec};
use crate::layout::LayoutManager;
use crate::merge::MergeEngine;
use crate::shuffle::ShuffleEngine;
use crate::types::{
    Alignment, BackdropOption, LayerOptions, LayerRule, Position, Rgb, StartVariable, VariablesSet,
};

/// Top-level backdrop holding the reads.
pub const BACKDROP_INPUTS: &str = "INPUTS";
/// Top-level backdrop holding per-layer groups.
pub const BACKDROP_LAYER: &str = "LAYER";
/// Top-level backdrop holding merge-stage nodes.
pub const BACKDROP_MERGE: &str = "MERGE";
/// Per-layer child backdrop holding postage stamps.
pub const BACKDROP_LAYER_READS: &str = "READ";
/// Per-layer child backdrop holding shuffle columns.
pub const BACKDROP_LAYER_SHUFFLE: &str = "SHUFFLE";

const PREFIX_POSTAGE: &str = "postage_";
const PREFIX_UTILITY: &str = "utility_";
const PREFIX_UTILITY_MERGE: &str = "utility_merge_";

const READS_FONT_SIZE: f64 = 30.0;
const INPUTS_COLOR: Rgb = Rgb(120, 120, 120);
const INPUTS_LAYER_DISTANCE: f64 = 1.5;
const LAYER_READ_DISTANCE: f64 = 1.8;
const LAYER_POSTAGE_DISTANCE: f64 = 6.0;
const UTILITY_MERGE_DISTANCE: f64 = 1.3;

/// Summary of one unpack run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnpackReport {
    /// Unpack mode name.
    pub mode: String,
    /// Layers that got read nodes, in unpack order.
    pub layers: Vec<String>,
    /// Names of the variables left active after merging.
    pub variables: Vec<String>,
    /// Backdrop nodes created.
    pub backdrops: Vec<NodeId>,
    /// When the run finished.
    pub unpacked_at: DateTime<Utc>,
}

/// A configured rule set ready to scan and unpack.
#[derive(Debug, Clone)]
pub struct UnpackMode {
    name: String,
    config_path: Option<PathBuf>,
    vars: VariablesSet,
    shuffle: ShuffleEngine,
    merge: MergeEngine,
    scanned: Vec<StartVariable>,
}

impl UnpackMode {
    /// Create an unpack mode.
    pub fn new(name: impl Into<String>, vars: VariablesSet, shuffle: ShuffleEngine, merge: MergeEngine) -> Self {
        Self {
            name: name.into(),
            config_path: None,
            vars,
            shuffle,
            merge,
            scanned: Vec::new(),
        }
    }

    /// Remember the file this mode was loaded from.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Mode name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File this mode was loaded from.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Variable set.
    pub fn var_set(&self) -> &VariablesSet {
        &self.vars
    }

    /// Shuffle engine.
    pub fn shuffle_engine(&self) -> &ShuffleEngine {
        &self.shuffle
    }

    /// Merge engine.
    pub fn merge_engine(&self) -> &MergeEngine {
        &self.merge
    }

    /// Start variables produced by the last scan, in configuration order.
    pub fn scanned(&self) -> &[StartVariable] {
        &self.scanned
    }

    /// Match discovered layers against the rules.
    ///
    /// Each matching layer gets its own instance of the first matching start
    /// variable. With a filter, only the listed layers are considered and every
    /// listed layer no rule matched gets a fallback variable named after it.
    /// Returns the number of scanned layers.
    pub fn scan_layers<D: LayerDiscovery>(&mut self, discovery: &D, root: &str, filter: Option<&[String]>) -> usize {
        self.scanned.clear();
        for layer in discovery.layer_names(root) {
            if filter.is_some_and(|f| !f.contains(&layer)) {
                continue;
            }
            match self.vars.start_variable_valid_for(&layer) {
                Some(start) => self.scanned.push(start.instantiate(&layer)),
                None => tracing::debug!(layer = %layer, "No rule matches layer"),
            }
        }
        self.scanned.sort_by_key(StartVariable::order);

        if let Some(filter) = filter {
            let rule_count = self.vars.start_vars().len();
            for (i, requested) in filter.iter().enumerate() {
                if self.is_layer_scanned(requested).is_some() {
                    continue;
                }
                match LayerRule::exact(requested) {
                    Ok(rule) => {
                        let fallback = StartVariable::new(requested.clone(), rule, rule_count + i, LayerOptions::default());
                        self.scanned.push(fallback.instantiate(requested));
                    }
                    Err(e) => tracing::warn!(layer = %requested, error = %e, "Cannot build fallback rule"),
                }
            }
        }

        tracing::debug!(mode = %self.name, layers = self.scanned.len(), "Layers scanned");
        self.scanned.len()
    }

    /// Scanned start variable bound to `layer`.
    pub fn is_layer_scanned(&self, layer: &str) -> Option<&StartVariable> {
        self.scanned.iter().find(|s| s.layer() == Some(layer))
    }

    /// Whether a scanned start variable has this name.
    pub fn is_layer_name_scanned(&self, name: &str) -> bool {
        self.scanned.iter().any(|s| s.name() == name)
    }

    /// Build the graph for the scanned layers.
    ///
    /// Does nothing and returns `None` when nothing was scanned.
    pub fn unpack<H: GraphHost, D: LayerDiscovery>(
        &mut self,
        host: &mut H,
        discovery: &D,
        root: &str,
    ) -> PipelineResult<Option<UnpackReport>> {
        if self.scanned.is_empty() {
            return Ok(None);
        }

        let mut layout = LayoutManager::new();
        layout.compute_current_bbox_graph(host)?;
        self.vars.clear_active();

        let layers = self.unpack_layers(host, discovery, root, &mut layout)?;
        self.shuffle.run(host, &mut layout, &mut self.vars, false)?;
        self.merge.run(host, &mut layout, &mut self.vars)?;
        layout.build_layout_node_graph(host)?;
        let backdrops = layout.build_layout_backdrops(host)?;

        let report = UnpackReport {
            mode: self.name.clone(),
            layers,
            variables: self.vars.active_vars().iter().map(|v| v.name().to_string()).collect(),
            backdrops,
            unpacked_at: Utc::now(),
        };
        tracing::info!(
            mode = %report.mode,
            layers = report.layers.len(),
            variables = report.variables.len(),
            backdrops = report.backdrops.len(),
            "Unpack complete"
        );
        Ok(Some(report))
    }

    fn unpack_layers<H: GraphHost, D: LayerDiscovery>(
        &mut self,
        host: &mut H,
        discovery: &D,
        root: &str,
        layout: &mut LayoutManager,
    ) -> PipelineResult<Vec<String>> {
        let mut layers = Vec::new();
        let mut reads: Vec<(NodeId, Option<NodeId>)> = Vec::new();
        let mut postages: Vec<NodeId> = Vec::new();

        for start in self.scanned.iter_mut() {
            let layer = start.layer().unwrap_or(start.name()).to_string();
            let Some(sequence) = discovery.latest_sequence(root, &layer) else {
                tracing::warn!(layer = %layer, "No sequence found, layer skipped");
                continue;
            };

            let (read, postage) = create_read_with_postage(
                host,
                &layer,
                &sequence.sequence_path,
                sequence.first_frame,
                sequence.last_frame,
            )?;
            postages.push(postage);
            let mut inputs_nodes = vec![read];
            let mut read_nodes = vec![postage];

            let var_node = match &sequence.utility_path {
                Some(utility_path) => {
                    let (utility_read, utility_postage) = create_read_with_postage(
                        host,
                        &format!("{PREFIX_UTILITY}{layer}"),
                        utility_path,
                        sequence.first_frame,
                        sequence.last_frame,
                    )?;
                    let merge = host
                        .create_node(
                            NodeSpec::merge("over")
                                .named(format!("{PREFIX_UTILITY_MERGE}{layer}"))
                                .knob("also_merge", "all")
                                .inputs([utility_postage, postage]),
                        )
                        .map_err(PipelineError::from_host)?;
                    reads.push((read, Some(utility_read)));
                    inputs_nodes.push(utility_read);
                    read_nodes.extend([utility_postage, merge]);
                    layout.add_node_layout_relation(read, utility_read, Position::Right, 1.0);
                    layout.add_node_layout_relation(postage, merge, Position::Right, UTILITY_MERGE_DISTANCE);
                    layout.add_node_layout_relation(merge, utility_postage, Position::Top, 1.0);
                    merge
                }
                None => {
                    reads.push((read, None));
                    postage
                }
            };
            start.set_node(var_node);

            let inputs_path = format!("{BACKDROP_INPUTS}.{layer}");
            let layer_path = format!("{BACKDROP_LAYER}.{layer}");
            let reads_path = format!("{layer_path}.{BACKDROP_LAYER_READS}");
            let shuffle_path = format!("{layer_path}.{BACKDROP_LAYER_SHUFFLE}");
            let color = start.color();

            layout.add_nodes_to_backdrop(&inputs_path, inputs_nodes);
            layout.add_backdrop_option(&inputs_path, BackdropOption::FontSize(READS_FONT_SIZE));
            layout.add_backdrop_option(&inputs_path, BackdropOption::Color(color));
            layout.add_backdrop_option(&layer_path, BackdropOption::Color(color));
            for option in start.options().backdrop_overrides() {
                layout.add_backdrop_option(&layer_path, option);
            }
            layout.add_nodes_to_backdrop(&reads_path, read_nodes);
            layout.add_backdrop_option(&reads_path, BackdropOption::FontSize(READS_FONT_SIZE));
            layout.add_backdrop_option(&reads_path, BackdropOption::Color(color.darken()));
            layout.add_top_level_backdrop_layout_relation(
                BACKDROP_LAYER,
                BACKDROP_INPUTS,
                Position::Top,
                Alignment::Start,
                INPUTS_LAYER_DISTANCE,
            );
            layout.add_backdrop_option(&shuffle_path, BackdropOption::Color(color.lighten()));

            self.vars.activate(start.variable().clone())?;
            layers.push(layer);
        }

        layout.add_backdrop_option(BACKDROP_INPUTS, BackdropOption::Color(INPUTS_COLOR));

        let mut last: Option<NodeId> = None;
        for (read, utility_read) in reads {
            if let Some(previous) = last {
                layout.add_node_layout_relation(previous, read, Position::Right, LAYER_READ_DISTANCE);
            }
            last = Some(utility_read.unwrap_or(read));
        }
        for pair in postages.windows(2) {
            layout.add_node_layout_relation(pair[0], pair[1], Position::Bottom, LAYER_POSTAGE_DISTANCE);
        }

        Ok(layers)
    }
}

fn create_read_with_postage<H: GraphHost>(
    host: &mut H,
    name: &str,
    path: &str,
    first: u32,
    last: u32,
) -> PipelineResult<(NodeId, NodeId)> {
    let read = host
        .create_node(
            NodeSpec::new(NodeKind::Read)
                .named(name)
                .knob("file", path)
                .knob("first", first)
                .knob("last", last),
        )
        .map_err(PipelineError::from_host)?;
    let postage = host
        .create_node(
            NodeSpec::new(NodeKind::PostageStamp)
                .named(format!("{PREFIX_POSTAGE}{name}"))
                .knob("hide_input", true)
                .knob("postage_stamp", true)
                .input(read),
        )
        .map_err(PipelineError::from_host)?;
    Ok((read, postage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{InMemoryDiscovery, LayerSequence};
    use crate::host::InMemoryGraph;

    fn start(name: &str, rule: &str, order: usize) -> StartVariable {
        StartVariable::new(name, LayerRule::new(rule).unwrap(), order, LayerOptions::default())
    }

    fn sequence(layer: &str, utility: bool) -> LayerSequence {
        let dir = format!("/shot/render_out/{layer}/{layer}.0001");
        LayerSequence {
            sequence_path: format!("{dir}/{layer}.####.exr"),
            utility_path: utility.then(|| format!("{dir}/{layer}_utility.####.exr")),
            first_frame: 1001,
            last_frame: 1050,
        }
    }

    fn mode(starts: Vec<StartVariable>) -> UnpackMode {
        UnpackMode::new("test", VariablesSet::new(starts), ShuffleEngine::new(None), MergeEngine::default())
    }

    #[test]
    fn test_scan_sorts_by_configuration_order() {
        let discovery = InMemoryDiscovery::new()
            .with_layer("lgt_spec", sequence("lgt_spec", false))
            .with_layer("fx_smoke", sequence("fx_smoke", false))
            .with_layer("lgt_diffuse", sequence("lgt_diffuse", false));
        let mut mode = mode(vec![start("diffuse", "lgt_diffuse", 0), start("spec", "lgt_spec", 1)]);

        assert_eq!(mode.scan_layers(&discovery, "/shot", None), 2);
        let names: Vec<_> = mode.scanned().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["diffuse", "spec"]);
        assert_eq!(mode.is_layer_scanned("lgt_spec").unwrap().name(), "spec");
        assert!(mode.is_layer_scanned("fx_smoke").is_none());
        assert!(mode.is_layer_name_scanned("diffuse"));
    }

    #[test]
    fn test_repeated_rule_gets_independent_instances() {
        let discovery = InMemoryDiscovery::new()
            .with_layer("lgt_key", sequence("lgt_key", false))
            .with_layer("lgt_fill", sequence("lgt_fill", false));
        let mut mode = mode(vec![start("light", "lgt_", 0)]);
        mode.scan_layers(&discovery, "/shot", None);

        let scanned = mode.scanned();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].layer(), Some("lgt_key"));
        assert_eq!(scanned[1].layer(), Some("lgt_fill"));
        assert_ne!(scanned[0].variable().id(), scanned[1].variable().id());
    }

    #[test]
    fn test_filter_synthesizes_fallback() {
        let discovery = InMemoryDiscovery::new()
            .with_layer("lgt_diffuse", sequence("lgt_diffuse", false))
            .with_layer("fx_smoke", sequence("fx_smoke", false))
            .with_layer("lgt_spec", sequence("lgt_spec", false));
        let mut mode = mode(vec![start("diffuse", "lgt_diffuse", 0)]);
        let filter = vec!["fx_smoke".to_string(), "lgt_diffuse".to_string()];
        mode.scan_layers(&discovery, "/shot", Some(&filter));

        let scanned = mode.scanned();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].name(), "diffuse");
        assert_eq!(scanned[1].name(), "fx_smoke");
        assert_eq!(scanned[1].order(), 1);
        assert!(scanned[1].is_rule_valid("fx_smoke"));
        assert!(!scanned[1].is_rule_valid("fx_smoke_2"));
    }

    #[test]
    fn test_unpack_without_scan_is_noop() {
        let mut graph = InMemoryGraph::new();
        let discovery = InMemoryDiscovery::new();
        let mut mode = mode(vec![start("diffuse", "lgt_diffuse", 0)]);
        assert!(mode.unpack(&mut graph, &discovery, "/shot").unwrap().is_none());
        assert_eq!(graph.num_nodes(), 0);
    }

    #[test]
    fn test_unpack_with_utility_sequence() {
        let mut graph = InMemoryGraph::new();
        let discovery = InMemoryDiscovery::new().with_layer("lgt_diffuse", sequence("lgt_diffuse", true));
        let mut mode = mode(vec![start("diffuse", "lgt_diffuse", 0)]);
        mode.scan_layers(&discovery, "/shot", None);
        let report = mode.unpack(&mut graph, &discovery, "/shot").unwrap().unwrap();

        assert_eq!(report.layers, vec!["lgt_diffuse"]);
        let read = graph.find_by_name("lgt_diffuse").unwrap();
        assert_eq!(read.knobs.get("first").and_then(|v| v.as_int()), Some(1001));
        assert!(graph.find_by_name("utility_lgt_diffuse").is_some());
        assert!(graph.find_by_name("postage_utility_lgt_diffuse").is_some());
        let merge = graph.find_by_name("utility_merge_lgt_diffuse").unwrap();
        assert_eq!(merge.knobs.get("also_merge").and_then(|v| v.as_text()), Some("all"));

        // no channels registered: the utility merge passes straight through
        assert_eq!(report.variables, vec!["diffuse"]);
        assert!(graph.find_by_name("dot_diffuse").is_some());
        let names: Vec<_> = report.backdrops.iter().map(|id| graph.node(*id).unwrap().name.clone()).collect();
        assert!(names.contains(&"INPUTS".to_string()));
        assert!(names.contains(&"READ".to_string()));
    }

    #[test]
    fn test_layer_options_reach_layer_backdrop() {
        let mut graph = InMemoryGraph::new();
        let discovery = InMemoryDiscovery::new().with_layer("lgt_diffuse", sequence("lgt_diffuse", false));
        let options = LayerOptions { font_size: Some(52.0), ..LayerOptions::default() };
        let diffuse = StartVariable::new("diffuse", LayerRule::new("lgt_diffuse").unwrap(), 0, options);
        let mut mode = mode(vec![diffuse]);
        mode.scan_layers(&discovery, "/shot", None);
        mode.unpack(&mut graph, &discovery, "/shot").unwrap().unwrap();

        let mut font_sizes: Vec<_> = graph
            .nodes_by_kind(NodeKind::Backdrop)
            .iter()
            .filter(|b| b.name == "lgt_diffuse")
            .filter_map(|b| b.knobs.get("note_font_size").and_then(|v| v.as_float()))
            .collect();
        font_sizes.sort_by(f64::total_cmp);
        // INPUTS.lgt_diffuse keeps its own size, LAYER.lgt_diffuse takes the layer's
        assert_eq!(font_sizes, vec![READS_FONT_SIZE, 52.0]);
    }

    #[test]
    fn test_missing_sequence_skips_layer() {
        let mut graph = InMemoryGraph::new();
        let mut discovery = InMemoryDiscovery::new().with_layer("lgt_spec", sequence("lgt_spec", false));
        discovery.add_layer("lgt_diffuse", None);
        let mut mode = mode(vec![start("diffuse", "lgt_diffuse", 0), start("spec", "lgt_spec", 1)]);
        mode.scan_layers(&discovery, "/shot", None);
        let report = mode.unpack(&mut graph, &discovery, "/shot").unwrap().unwrap();

        assert_eq!(report.layers, vec!["lgt_spec"]);
        assert!(graph.find_by_name("lgt_diffuse").is_none());
    }
}
