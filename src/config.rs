//! Reclaim configuration.
//!
//! Children are always selected by comparing layer ids. Whether the node a
//! removal starts from is itself cleaned up depends on how its own layer is
//! compared to the target layer, which differs between the single-level and
//! the recursive removal. [`ReclaimConfig::default`] keeps that difference,
//! [`ReclaimConfig::by_id`] makes both policies compare ids.

use std::sync::Arc;

use crate::data_structures::layer::Layer;

/// How a node's own layer is compared against the layer being reclaimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerMatch {
    /// The node must reference the very same `Arc<Layer>`.
    Identity,
    /// Any layer with an equal `id` matches.
    Id,
}

impl LayerMatch {
    /// Whether a node tagged with `candidate` belongs to `target`.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The layer of the node under test, if any. Untagged
    ///   nodes never match.
    /// * `target` - The layer being reclaimed.
    pub fn matches(self, candidate: Option<&Arc<Layer>>, target: &Arc<Layer>) -> bool {
        match (self, candidate) {
            (_, None) => false,
            (LayerMatch::Identity, Some(layer)) => Layer::is(layer, target),
            (LayerMatch::Id, Some(layer)) => layer.same_id(target),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReclaimConfig {
    /// Used by `remove_children_and_cleanup` for the start node.
    pub self_match: LayerMatch,
    /// Used by `remove_children_and_cleanup_recursively` for every visited node.
    pub recursive_self_match: LayerMatch,
}

impl ReclaimConfig {
    /// Compare layers by id in every policy.
    pub fn by_id() -> Self {
        Self {
            self_match: LayerMatch::Id,
            recursive_self_match: LayerMatch::Id,
        }
    }
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            self_match: LayerMatch::Identity,
            recursive_self_match: LayerMatch::Id,
        }
    }
}
