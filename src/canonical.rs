//! Canonical serialization for deterministic fingerprints.
//!
//! Two runs of the same rule set over the same layers must produce the same
//! graph. Fingerprinting the graph snapshot makes that checkable.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap in hashed data: knobs live in a BTreeMap
//! - Fresh variable ids never reach the graph, only node names and positions do

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

use crate::host::InMemoryGraph;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute the canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    Ok(xxh64(&to_canonical_bytes(value)?, 0))
}

/// Compute the canonical hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

/// Fingerprint of every node, position, input and knob of a graph.
pub fn graph_fingerprint(graph: &InMemoryGraph) -> Result<String, serde_json::Error> {
    canonical_hash_hex(&graph.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GraphHost, NodeKind, NodeSpec};

    #[derive(Serialize)]
    struct Probe {
        name: String,
        value: i32,
    }

    #[test]
    fn test_determinism() {
        let p = Probe {
            name: "test".to_string(),
            value: 42,
        };
        assert_eq!(canonical_hash(&p).unwrap(), canonical_hash(&p).unwrap());
        assert_eq!(canonical_hash_hex(&p).unwrap().len(), 16);
    }

    #[test]
    fn test_fingerprint_tracks_positions() {
        let build = || {
            let mut graph = InMemoryGraph::new();
            let read = graph.add_node(NodeKind::Read, "lgt_key", 0, 0);
            graph.create_node(NodeSpec::dot().input(read)).unwrap();
            graph
        };
        let a = build();
        let mut b = build();
        assert_eq!(graph_fingerprint(&a).unwrap(), graph_fingerprint(&b).unwrap());

        let dot = b.nodes_by_kind(NodeKind::Dot)[0].id;
        b.set_position(dot, 10, 0).unwrap();
        assert_ne!(graph_fingerprint(&a).unwrap(), graph_fingerprint(&b).unwrap());
    }
}
