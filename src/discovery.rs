//! Layer discovery collaborator.
//!
//! Scanning render folders is the job of the embedding application. The
//! engine only asks for layer names under a root, the latest sequence of a
//! layer, and (for read updates) the latest version in a versions folder.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::host::InMemoryGraph;

/// Latest rendered sequence of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSequence {
    /// Frame-pattern path of the beauty sequence (`.../name.####.exr`).
    pub sequence_path: String,
    /// Frame-pattern path of the utility sequence, when rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility_path: Option<String>,
    /// First frame number.
    pub first_frame: u32,
    /// Last frame number.
    pub last_frame: u32,
}

/// Latest version found in a layer's versions folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceVersion {
    /// Version number as written in the folder name (`0012`).
    pub version: String,
    /// Frame-pattern path of that version's sequence.
    pub path: String,
}

/// Enumerates rendered layers.
pub trait LayerDiscovery {
    /// Layer names found under `root`, in discovery order.
    fn layer_names(&self, root: &str) -> Vec<String>;

    /// Latest sequence of `layer` under `root`.
    fn latest_sequence(&self, root: &str, layer: &str) -> Option<LayerSequence>;

    /// Latest version inside a layer's versions folder.
    fn latest_version(&self, _versions_dir: &str) -> Option<SequenceVersion> {
        None
    }
}

/// Discovery backed by fixed data.
///
/// The root argument is ignored: every query sees the same layers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDiscovery {
    layers: Vec<(String, Option<LayerSequence>)>,
    versions: BTreeMap<String, SequenceVersion>,
}

impl InMemoryDiscovery {
    /// Create an empty discovery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with its latest sequence.
    pub fn with_layer(mut self, name: impl Into<String>, sequence: LayerSequence) -> Self {
        self.add_layer(name, Some(sequence));
        self
    }

    /// Add a layer. A layer without a sequence is listed but cannot be read.
    pub fn add_layer(&mut self, name: impl Into<String>, sequence: Option<LayerSequence>) {
        self.layers.push((name.into(), sequence));
    }

    /// Declare the latest version of a versions folder.
    pub fn add_version(&mut self, versions_dir: impl Into<String>, version: SequenceVersion) {
        self.versions.insert(versions_dir.into(), version);
    }
}

impl LayerDiscovery for InMemoryDiscovery {
    fn layer_names(&self, _root: &str) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    fn latest_sequence(&self, _root: &str, layer: &str) -> Option<LayerSequence> {
        self.layers
            .iter()
            .find(|(name, _)| name == layer)
            .and_then(|(_, seq)| seq.clone())
    }

    fn latest_version(&self, versions_dir: &str) -> Option<SequenceVersion> {
        self.versions.get(versions_dir).cloned()
    }
}

/// Error loading a layer manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest file could not be read.
    #[error("Cannot read manifest {path}: {source}")]
    Io {
        /// Manifest path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Manifest is not valid JSON for this schema.
    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One layer in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestLayer {
    /// Layer folder name.
    pub name: String,
    /// Latest sequence, flattened into the layer record.
    #[serde(flatten)]
    pub sequence: LayerSequence,
    /// Channels of the beauty sequence.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Channels of the utility sequence.
    #[serde(default)]
    pub utility_channels: Vec<String>,
}

/// Snapshot of a render folder, stored as JSON.
///
/// Lets the pipeline run offline against an [`InMemoryGraph`]: the manifest
/// provides both the discovery answers and the channels each read exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerManifest {
    /// Root the manifest was taken from.
    #[serde(default)]
    pub root: String,
    /// Layers in discovery order.
    #[serde(default)]
    pub layers: Vec<ManifestLayer>,
    /// Latest version per versions folder.
    #[serde(default)]
    pub versions: BTreeMap<String, SequenceVersion>,
}

impl LayerManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Discovery answering from this manifest.
    pub fn discovery(&self) -> InMemoryDiscovery {
        let mut discovery = InMemoryDiscovery::new();
        for layer in &self.layers {
            discovery.add_layer(layer.name.clone(), Some(layer.sequence.clone()));
        }
        for (dir, version) in &self.versions {
            discovery.add_version(dir.clone(), version.clone());
        }
        discovery
    }

    /// Register every sequence's channels with an in-memory graph.
    pub fn register_sequences(&self, graph: &mut InMemoryGraph) {
        for layer in &self.layers {
            graph.register_sequence(layer.sequence.sequence_path.clone(), layer.channels.clone());
            if let Some(utility) = &layer.sequence.utility_path {
                graph.register_sequence(utility.clone(), layer.utility_channels.clone());
            }
        }
    }
}
