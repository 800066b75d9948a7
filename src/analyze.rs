//! Layered-document change analysis.
//!
//! Compares the layer trees of two versions of a layered document and
//! produces a semantic change summary that rides along inside the
//! layered-smart delta artifact. The trees themselves are parsed by the
//! external scanner collaborator; this module only consumes them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a layer on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LayerPosition {
    /// Horizontal offset in pixels
    pub x: i32,
    /// Vertical offset in pixels
    pub y: i32,
}

/// One layer of a layered document, as parsed by the scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Scanner-assigned layer identifier
    pub id: String,

    /// Layer name; the source documents treat names as stable identifiers
    pub name: String,

    /// Hash of the layer's pixel or path content
    pub content_hash: String,

    /// Opacity in the 0.0..=1.0 range
    pub opacity: f32,

    /// Whether the layer is visible
    pub visible: bool,

    /// Blend mode name ("normal", "multiply", ...)
    pub blend_mode: String,

    /// Canvas position
    pub position: LayerPosition,
}

/// Ordered layer tree of one document version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayerTree {
    /// Layers in document order
    pub layers: Vec<Layer>,
}

/// Old/new value pair for one changed layer property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Value in the base version
    pub old: serde_json::Value,
    /// Value in the new version
    pub new: serde_json::Value,
}

/// A layer present in both versions with differing content or properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerModification {
    /// Layer name
    pub name: String,

    /// Changed properties keyed by property name
    #[serde(default)]
    pub property_changes: BTreeMap<String, PropertyChange>,
}

/// Semantic change summary between two versions of a layered document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    /// Names present only in the new version
    pub added: Vec<String>,

    /// Names present only in the old version
    pub deleted: Vec<String>,

    /// Layers present in both versions whose content or properties differ
    pub modified: Vec<LayerModification>,

    /// Layers of the new version that did not change
    pub unchanged_count: usize,

    /// Human-readable one-line summary
    pub summary: String,
}

/// Compare two layer trees by name.
///
/// Names are the matching key; a name that occurs more than once within a
/// single tree keeps its first occurrence and the duplicates are ignored.
/// A layer counts as modified when its content hash differs or when any of
/// the tracked properties (opacity, visibility, blend mode, position)
/// differ; property changes are recorded either way so a property-only
/// edit is still visible downstream.
pub fn compare_layer_trees(old: &LayerTree, new: &LayerTree) -> ChangeAnalysis {
    let old_by_name = index_by_name(old);
    let new_by_name = index_by_name(new);

    let mut added = Vec::new();
    let mut deleted = Vec::new();
    let mut modified = Vec::new();

    let mut seen_new = std::collections::BTreeSet::new();
    for layer in new.layers.iter() {
        // Only the first occurrence of a duplicated name participates
        if !seen_new.insert(layer.name.as_str()) {
            continue;
        }
        match old_by_name.get(layer.name.as_str()) {
            None => added.push(layer.name.clone()),
            Some(old_layer) => {
                let property_changes = diff_properties(old_layer, layer);
                if old_layer.content_hash != layer.content_hash || !property_changes.is_empty() {
                    modified.push(LayerModification {
                        name: layer.name.clone(),
                        property_changes,
                    });
                }
            }
        }
    }

    let mut seen_old = std::collections::BTreeSet::new();
    for layer in old.layers.iter() {
        if !seen_old.insert(layer.name.as_str()) {
            continue;
        }
        if !new_by_name.contains_key(layer.name.as_str()) {
            deleted.push(layer.name.clone());
        }
    }

    let unchanged_count = new_by_name.len() - modified.len() - added.len();
    let summary = summarize(added.len(), deleted.len(), modified.len());

    ChangeAnalysis {
        added,
        deleted,
        modified,
        unchanged_count,
        summary,
    }
}

/// First-occurrence-wins name index over a tree
fn index_by_name(tree: &LayerTree) -> BTreeMap<&str, &Layer> {
    let mut index = BTreeMap::new();
    for layer in &tree.layers {
        index.entry(layer.name.as_str()).or_insert(layer);
    }
    index
}

fn diff_properties(old: &Layer, new: &Layer) -> BTreeMap<String, PropertyChange> {
    let mut changes = BTreeMap::new();

    if old.opacity != new.opacity {
        changes.insert(
            "opacity".to_string(),
            PropertyChange {
                old: serde_json::json!(old.opacity),
                new: serde_json::json!(new.opacity),
            },
        );
    }
    if old.visible != new.visible {
        changes.insert(
            "visibility".to_string(),
            PropertyChange {
                old: serde_json::json!(old.visible),
                new: serde_json::json!(new.visible),
            },
        );
    }
    if old.blend_mode != new.blend_mode {
        changes.insert(
            "blend_mode".to_string(),
            PropertyChange {
                old: serde_json::json!(old.blend_mode),
                new: serde_json::json!(new.blend_mode),
            },
        );
    }
    if old.position != new.position {
        changes.insert(
            "position".to_string(),
            PropertyChange {
                old: serde_json::json!([old.position.x, old.position.y]),
                new: serde_json::json!([new.position.x, new.position.y]),
            },
        );
    }

    changes
}

fn summarize(added: usize, deleted: usize, modified: usize) -> String {
    let total = added + deleted + modified;
    if total == 0 {
        return "no layer changes".to_string();
    }

    let mut parts = Vec::new();
    if added > 0 {
        parts.push(format!("{} added", added));
    }
    if deleted > 0 {
        parts.push(format!("{} deleted", deleted));
    }
    if modified > 0 {
        parts.push(format!("{} modified", modified));
    }
    format!("{} layer(s) changed, {}", total, parts.join(", "))
}
