//! # autocomp
//!
//! Automatic assembly of a compositing node graph from rendered layers.
//!
//! A rule set names the layers to expect, how each one is split into light
//! groups, and how the results combine. Unpacking builds the whole graph in
//! one pass:
//!
//! ## Pipeline
//!
//! ```text
//! discovery → scan (rules) → reads → ShuffleEngine → MergeEngine → LayoutManager
//!                                         ↓               ↓
//!                                    VariablesSet (active variables)
//!                                         ↓
//!                                  GraphHost (host-owned nodes)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same rule set + same discovered layers + same host state → identical graph
//! - Layer scan order follows rule order, never discovery order
//! - Relation groups run in case-insensitive layer order
//! - Layout is a pure function of the registered relations and node sizes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod host;
pub mod discovery;
pub mod layout;
pub mod shuffle;
pub mod merge;
pub mod unpack;
pub mod factory;
pub mod update;
pub mod canonical;
pub mod error;

// Re-exports
pub use types::{
    VarId, Variable, StartVariable, VariablesSet, ModelError,
    LayerRule, RuleError, Relation,
    Rgb, LayerOptions, BackdropOptions, BackdropOption,
    Rect, Position, Alignment,
};
pub use host::{GraphHost, NodeId, NodeKind, NodeSpec, KnobValue, InMemoryGraph, InMemoryError, GraphSnapshot};
pub use discovery::{LayerDiscovery, LayerSequence, SequenceVersion, InMemoryDiscovery, LayerManifest, ManifestError};
pub use layout::{LayoutManager, LayoutError, LayoutPhase, BackdropTree, BackdropId, BASE_DISTANCE};
pub use shuffle::{ShuffleEngine, ShuffleOutput, ChannelStrategy, present_channels};
pub use merge::MergeEngine;
pub use unpack::{UnpackMode, UnpackReport};
pub use factory::{RuleSetConfig, ConfigError, load_unpack_modes, shuffle_layers, shuffle_channels};
pub use update::{ReadUpdate, ReadPath, scan_read_updates, apply_read_updates};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, graph_fingerprint};
pub use error::{PipelineError, PipelineResult};
