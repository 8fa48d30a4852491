//! Reclaiming layer content from the scene graph.
//!
//! Three removal policies of increasing reach are offered:
//!
//! - [`Reclaimer::remove_children`] detaches the direct children of a node
//!   that belong to a layer and releases nothing
//! - [`Reclaimer::remove_children_and_cleanup`] additionally cleans up the
//!   node itself when it belongs to the layer
//! - [`Reclaimer::remove_children_and_cleanup_recursively`] walks children and
//!   link lists, cleaning up every visited node of the layer bottom-up
//!
//! [`Reclaimer::cleanup`] releases the resources of a single node.
//!
//! None of these validate their input. Unknown nodes, empty material lists
//! and resources released twice surface as errors. Reclamation mutates the
//! graph and must not overlap with a render pass reading it.

use std::{collections::HashSet, sync::Arc};

use anyhow::{Context, Result, bail};
use log::{debug, trace};

use crate::{
    config::{LayerMatch, ReclaimConfig},
    data_structures::{
        layer::Layer,
        model::{Material, MaterialSlot, Resources},
        scene_graph::{NodeId, NodeKind, SceneEvent, SceneGraph},
    },
};

#[derive(Clone, Debug, Default)]
pub struct Reclaimer {
    config: ReclaimConfig,
}

impl Reclaimer {
    /// Create a reclaimer with custom layer matching.
    ///
    /// # Arguments
    ///
    /// * `config` - How the node a policy starts from is matched against the
    ///   layer. [`Reclaimer::default`] keeps the stock behaviour.
    pub fn new(config: ReclaimConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    /// Release the resources owned by `node`. Does not recurse.
    ///
    /// Disposable nodes are handed to their own [`Dispose`] implementation.
    /// Every other node (the scene root included) has its geometry, its
    /// material(s) and all of their textures released, then a
    /// [`SceneEvent::Disposed`] is queued. Either way the node leaves its
    /// layer.
    ///
    /// The released geometry stays on the node. Caches may hand such a node
    /// back later; its resources report [`ResourceState::Released`].
    ///
    /// Calling this twice on the same node fails on the second release.
    ///
    /// [`Dispose`]: crate::data_structures::scene_graph::Dispose
    /// [`ResourceState::Released`]: crate::data_structures::model::ResourceState::Released
    pub fn cleanup(&self, graph: &mut SceneGraph, node: NodeId) -> Result<()> {
        let (scene_node, events) = graph.node_and_events(node)?;
        match &mut scene_node.kind {
            NodeKind::Disposable(disposable) => {
                debug!("'{}' disposes itself", scene_node.name);
                disposable
                    .dispose(node, events)
                    .with_context(|| format!("disposing '{}'", scene_node.name))?;
            }
            NodeKind::ResourceOwning(resources) | NodeKind::SceneRoot(resources) => {
                release_resources(&scene_node.name, resources)?;
                events.push_back(SceneEvent::Disposed {
                    node,
                    name: scene_node.name.clone(),
                });
            }
            NodeKind::Plain => {
                events.push_back(SceneEvent::Disposed {
                    node,
                    name: scene_node.name.clone(),
                });
            }
        }
        scene_node.layer = None;
        Ok(())
    }

    /// Detach the direct children of `node` whose layer id equals `layer.id`.
    ///
    /// Returns them in their original order. Nothing is released.
    pub fn remove_children(
        &self,
        graph: &mut SceneGraph,
        layer: &Arc<Layer>,
        node: NodeId,
    ) -> Result<Vec<NodeId>> {
        let removed = children_in_layer(graph, layer, node)?;
        graph.detach(node, &removed)?;
        debug!(
            "detached {} children of layer '{}' from '{}'",
            removed.len(),
            layer.id,
            graph.node(node)?.name
        );
        Ok(removed)
    }

    /// Like [`remove_children`](Self::remove_children), then clean up `node`
    /// itself if it belongs to `layer` according to
    /// [`ReclaimConfig::self_match`]. The detached children are not cleaned up.
    pub fn remove_children_and_cleanup(
        &self,
        graph: &mut SceneGraph,
        layer: &Arc<Layer>,
        node: NodeId,
    ) -> Result<Vec<NodeId>> {
        let removed = self.remove_children(graph, layer, node)?;
        if self
            .config
            .self_match
            .matches(graph.node(node)?.layer.as_ref(), layer)
        {
            self.cleanup(graph, node)?;
        }
        Ok(removed)
    }

    /// Tear down everything of `layer` reachable from `node`.
    ///
    /// The candidates of a node are its children in `layer` followed by its
    /// whole link list, whatever layer the linked nodes are in. Each
    /// candidate is processed recursively first, then all candidates are
    /// detached from the node at once, then the node is cleaned up if it
    /// belongs to `layer` according to [`ReclaimConfig::recursive_self_match`].
    ///
    /// Returns the candidates of `node` only; deeper removals happen but are
    /// not reported. Each node is visited once per call, so link cycles
    /// terminate.
    pub fn remove_children_and_cleanup_recursively(
        &self,
        graph: &mut SceneGraph,
        layer: &Arc<Layer>,
        node: NodeId,
    ) -> Result<Vec<NodeId>> {
        let mut visited = HashSet::new();
        self.reclaim_subtree(graph, layer, node, &mut visited)
    }

    fn reclaim_subtree(
        &self,
        graph: &mut SceneGraph,
        layer: &Arc<Layer>,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Result<Vec<NodeId>> {
        if !visited.insert(node) {
            trace!("{:?} was already reclaimed in this pass", node);
            return Ok(Vec::new());
        }
        let mut candidates = children_in_layer(graph, layer, node)?;
        for &linked in graph.links(node)? {
            if !candidates.contains(&linked) {
                candidates.push(linked);
            }
        }

        for &candidate in &candidates {
            self.reclaim_subtree(graph, layer, candidate, visited)?;
        }
        graph.detach(node, &candidates)?;

        if self
            .config
            .recursive_self_match
            .matches(graph.node(node)?.layer.as_ref(), layer)
        {
            self.cleanup(graph, node)?;
        }
        Ok(candidates)
    }
}

fn children_in_layer(graph: &SceneGraph, layer: &Arc<Layer>, node: NodeId) -> Result<Vec<NodeId>> {
    let mut selected = Vec::new();
    for &child in graph.children(node)? {
        if LayerMatch::Id.matches(graph.node(child)?.layer.as_ref(), layer) {
            selected.push(child);
        }
    }
    Ok(selected)
}

fn release_resources(name: &str, resources: &mut Resources) -> Result<()> {
    if let Some(geometry) = resources.geometry.as_mut() {
        geometry
            .release()
            .with_context(|| format!("releasing geometry of '{}'", name))?;
    }
    match resources.material.as_mut() {
        None => (),
        Some(MaterialSlot::Single(material)) => release_material(name, material)?,
        Some(MaterialSlot::Many(materials)) => {
            if materials.is_empty() {
                bail!("'{}' has an empty material list", name);
            }
            for material in materials.iter_mut() {
                release_material(name, material)?;
            }
        }
    }
    Ok(())
}

fn release_material(name: &str, material: &mut Material) -> Result<()> {
    material
        .release()
        .and_then(|_| material.release_textures())
        .with_context(|| format!("releasing material of '{}'", name))
}
