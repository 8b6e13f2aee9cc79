//! Read version updates.
//!
//! Reads created by an unpack point into versioned render folders:
//!
//! ```text
//! <root>/render_out/<layer>/<layer>.<version>/<file>.####.exr
//! ```
//!
//! Scanning compares each read's version against the latest one the
//! discovery collaborator reports for that layer folder.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::discovery::LayerDiscovery;
use crate::host::{GraphHost, KnobValue, NodeId, NodeKind};

const READ_PATH_PATTERN: &str = r"^([\w/:.]+/render_out/(\w+))/\w+\.([0-9]+)/[\w.%#]+\.[a-z]+$";

fn read_path_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(READ_PATH_PATTERN).ok()).as_ref()
}

/// Parts of a versioned read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPath {
    /// Folder holding every version of the layer.
    pub versions_dir: String,
    /// Layer folder name.
    pub layer: String,
    /// Version number as written in the path.
    pub version: String,
}

impl ReadPath {
    /// Parse a read path. Backslashes are accepted as separators.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.replace('\\', "/");
        let caps = read_path_regex()?.captures(&path)?;
        Some(Self {
            versions_dir: caps.get(1)?.as_str().to_string(),
            layer: caps.get(2)?.as_str().to_string(),
            version: caps.get(3)?.as_str().to_string(),
        })
    }
}

/// Version state of one read node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadUpdate {
    /// Read node.
    pub node: NodeId,
    /// Layer folder name.
    pub layer: String,
    /// Version the read points at.
    pub current_version: String,
    /// Latest version available.
    pub latest_version: String,
    /// Frame-pattern path of the latest version.
    pub latest_path: String,
}

impl ReadUpdate {
    /// Whether a newer version exists.
    pub fn is_outdated(&self) -> bool {
        self.current_version != self.latest_version
    }
}

/// Version state of every versioned read in the graph.
///
/// Outdated reads come first, then reads are ordered by layer name. Reads
/// whose path does not follow the render layout, or whose layer folder has
/// no version, are left out.
pub fn scan_read_updates<H: GraphHost, D: LayerDiscovery>(
    host: &H,
    discovery: &D,
) -> Result<Vec<ReadUpdate>, H::Error> {
    let mut updates = Vec::new();
    for node in host.nodes_of_kind(NodeKind::Read) {
        let Some(file) = host.knob(node, "file")? else {
            continue;
        };
        let Some(path) = file.as_text().and_then(ReadPath::parse) else {
            continue;
        };
        let Some(latest) = discovery.latest_version(&path.versions_dir) else {
            tracing::debug!(node = %node, dir = %path.versions_dir, "No version found for read");
            continue;
        };
        updates.push(ReadUpdate {
            node,
            layer: path.layer,
            current_version: path.version,
            latest_version: latest.version,
            latest_path: latest.path,
        });
    }
    updates.sort_by(compare_updates);
    Ok(updates)
}

fn compare_updates(a: &ReadUpdate, b: &ReadUpdate) -> Ordering {
    b.is_outdated()
        .cmp(&a.is_outdated())
        .then_with(|| a.layer.cmp(&b.layer))
}

/// Point every outdated read at its latest version.
///
/// Returns the number of reads changed.
pub fn apply_read_updates<H: GraphHost>(host: &mut H, updates: &[ReadUpdate]) -> Result<usize, H::Error> {
    let mut applied = 0;
    for update in updates.iter().filter(|u| u.is_outdated()) {
        host.set_knob(update.node, "file", KnobValue::from(update.latest_path.as_str()))?;
        tracing::debug!(
            node = %update.node,
            layer = %update.layer,
            from = %update.current_version,
            to = %update.latest_version,
            "Read updated"
        );
        applied += 1;
    }
    tracing::info!(applied, scanned = updates.len(), "Read updates applied");
    Ok(applied)
}
