//! Rule-set factory.
//!
//! Parses rule-set JSON into the variable model and wires the engines into an
//! [`UnpackMode`]. Also hosts the two partial entry points: shuffling selected
//! layers, and shuffling selected channels of one existing node.
//!
//! ## Format
//!
//! ```json
//! {
//!   "name": "lighting",
//!   "shuffle": { "shuffle_layer": ["diffuse"] },
//!   "layers": [
//!     { "name": "diffuse", "rule": "lgt_diffuse", "options": { "color": [40, 90, 150] } },
//!     { "name": "light", "rule": "lgt_", "aliases": ["lights"], "options": {}, "group_operation": "plus" }
//!   ],
//!   "merge": { "rules": [ { "a": "diffuse", "b": "spec", "operation": "plus", "result": "beauty" } ] }
//! }
//! ```
//!
//! Bad records are dropped with a warning. Missing top-level sections fail the
//! whole rule set.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::discovery::LayerDiscovery;
use crate::error::{PipelineError, PipelineResult};
use crate::host::{GraphHost, NodeId};
use crate::layout::LayoutManager;
use crate::merge::MergeEngine;
use crate::shuffle::{ShuffleEngine, ShuffleOutput};
use crate::types::{LayerOptions, LayerRule, Relation, StartVariable, Variable, VariablesSet};
use crate::unpack::{UnpackMode, UnpackReport};

/// Error type for rule-set loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File or directory could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Not valid JSON.
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The top level is not a JSON object.
    #[error("Rule set must be a JSON object")]
    NotAnObject,
    /// A required top-level section is absent or has the wrong shape.
    #[error("Missing section: {0}")]
    MissingSection(&'static str),
    /// Every layer record was dropped.
    #[error("No valid layer definition")]
    NoValidLayers,
}

#[derive(Debug, Deserialize)]
struct LayerRecord {
    name: String,
    rule: String,
    #[serde(default)]
    aliases: Vec<String>,
    options: LayerOptions,
    #[serde(default)]
    group_operation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ShuffleSection {
    #[serde(default)]
    shuffle_layer: Option<Vec<String>>,
}

/// A parsed rule set.
#[derive(Debug, Clone)]
pub struct RuleSetConfig {
    /// Rule set name.
    pub name: String,
    /// Variable names allowed to shuffle. `None` shuffles everything.
    pub shuffle_layers: Option<Vec<String>>,
    /// Start variables in configuration order.
    pub layers: Vec<StartVariable>,
    /// Merge relations in declaration order.
    pub relations: Vec<Relation>,
    /// File the rule set was loaded from.
    pub path: Option<PathBuf>,
}

impl RuleSetConfig {
    /// Load a rule-set file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&json)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse rule-set JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Parse an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let root = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let name = root
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ConfigError::MissingSection("name"))?;
        let layers = root
            .get("layers")
            .and_then(Value::as_array)
            .ok_or(ConfigError::MissingSection("layers"))?;
        let rules = root
            .get("merge")
            .ok_or(ConfigError::MissingSection("merge"))?
            .get("rules")
            .and_then(Value::as_array)
            .ok_or(ConfigError::MissingSection("merge.rules"))?;

        let shuffle_layers = match root.get("shuffle") {
            None => None,
            Some(section) => match ShuffleSection::deserialize(section) {
                Ok(section) => section.shuffle_layer,
                Err(e) => {
                    tracing::warn!(rule_set = %name, error = %e, "Shuffle section ignored");
                    None
                }
            },
        };

        let start_vars = parse_layers(name, layers);
        if start_vars.is_empty() {
            return Err(ConfigError::NoValidLayers);
        }
        let relations = parse_relations(name, rules);

        Ok(Self {
            name: name.to_string(),
            shuffle_layers,
            layers: start_vars,
            relations,
            path: None,
        })
    }

    /// Build an unpack mode from a copy of this rule set.
    pub fn unpack_mode(&self) -> UnpackMode {
        self.clone().into_unpack_mode()
    }

    /// Wire the engines into an unpack mode.
    pub fn into_unpack_mode(self) -> UnpackMode {
        let mode = UnpackMode::new(
            self.name,
            VariablesSet::new(self.layers),
            ShuffleEngine::new(self.shuffle_layers),
            MergeEngine::new(self.relations),
        );
        match self.path {
            Some(path) => mode.with_config_path(path),
            None => mode,
        }
    }
}

fn parse_layers(rule_set: &str, records: &[Value]) -> Vec<StartVariable> {
    let mut start_vars = Vec::new();
    for (order, record) in records.iter().enumerate() {
        let unknown = record
            .get("options")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|options| options.keys())
            .filter(|key| !LayerOptions::FIELDS.contains(&key.as_str()));
        for key in unknown {
            tracing::warn!(rule_set = %rule_set, index = order, option = %key, "Unknown layer option ignored");
        }
        let record = match LayerRecord::deserialize(record) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(rule_set = %rule_set, index = order, error = %e, "Layer record dropped");
                continue;
            }
        };
        let rule = match LayerRule::new(&record.rule) {
            Ok(rule) => rule,
            Err(e) => {
                tracing::warn!(rule_set = %rule_set, layer = %record.name, error = %e, "Layer record dropped");
                continue;
            }
        };
        start_vars.push(
            StartVariable::new(record.name, rule, order, record.options)
                .with_aliases(record.aliases)
                .with_group_operation(record.group_operation),
        );
    }
    start_vars
}

fn parse_relations(rule_set: &str, records: &[Value]) -> Vec<Relation> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match Relation::deserialize(record) {
            Ok(relation) => Some(relation),
            Err(e) => {
                tracing::warn!(rule_set = %rule_set, index, error = %e, "Relation record dropped");
                None
            }
        })
        .collect()
}

/// Load every `*.json` rule set in `dir`, sorted by file name.
///
/// Files that fail to load are skipped with a warning.
pub fn load_unpack_modes(dir: impl AsRef<Path>) -> Result<Vec<UnpackMode>, ConfigError> {
    let dir = dir.as_ref();
    let io_error = |source| ConfigError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut modes = Vec::new();
    for path in paths {
        match RuleSetConfig::from_path(&path) {
            Ok(config) => modes.push(config.into_unpack_mode()),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Rule set skipped"),
        }
    }
    Ok(modes)
}

/// Unpack only the listed layers, without merge relations.
pub fn shuffle_layers<H: GraphHost, D: LayerDiscovery>(
    config: &RuleSetConfig,
    host: &mut H,
    discovery: &D,
    root: &str,
    layers: &[String],
) -> PipelineResult<Option<UnpackReport>> {
    let mut mode = UnpackMode::new(
        config.name.clone(),
        VariablesSet::new(config.layers.clone()),
        ShuffleEngine::new(config.shuffle_layers.clone()),
        MergeEngine::default(),
    );
    mode.scan_layers(discovery, root, Some(layers));
    mode.unpack(host, discovery, root)
}

/// Extract the listed channel groups of an existing node and lay them out.
pub fn shuffle_channels<H: GraphHost>(
    host: &mut H,
    node: NodeId,
    channels: Vec<String>,
) -> PipelineResult<Vec<ShuffleOutput>> {
    let name = host.name(node).map_err(PipelineError::from_host)?;
    let mut vars = VariablesSet::default();
    vars.activate(Variable::bound(name, node))?;

    let mut layout = LayoutManager::new();
    layout.compute_current_bbox_graph(host)?;
    let mut engine = ShuffleEngine::explicit(channels);
    engine.run(host, &mut layout, &mut vars, true)?;
    layout.build_layout_node_graph(host)?;
    layout.build_layout_backdrops(host)?;
    Ok(engine.outputs().to_vec())
}
