//! Scene graph and layer-tagged scene nodes.
//!
//! Nodes live in a [`SceneGraph`] arena and refer to each other by
//! [`NodeId`]. Every node has an ordered child collection (the tree) and a
//! `link` list: extra nodes that logically belong to it without being its
//! children. Links carry no ownership and may point anywhere in the arena.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Debug,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow, bail};
use slotmap::{SlotMap, new_key_type};

use crate::{
    context::GpuContext,
    data_structures::{instance::Instance, layer::Layer, model::Resources},
};

new_key_type! {
    /// Handle of a node inside a [`SceneGraph`].
    pub struct NodeId;
}

/// Notifications queued by the graph while nodes are reclaimed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    Disposed { node: NodeId, name: String },
}

pub type EventQueue = VecDeque<SceneEvent>;

/// Nodes that tear themselves down.
///
/// Implementors release whatever they own and are responsible for queueing
/// their own notification; the reclaimer does not emit one for them.
pub trait Dispose {
    fn dispose(&mut self, node: NodeId, events: &mut EventQueue) -> Result<()>;
}

// Dummy impl so nodes can derive Debug
impl Debug for dyn Dispose + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dispose")
    }
}

/// What a node owns and how it is cleaned up.
#[derive(Debug)]
pub enum NodeKind {
    /// Owns nothing.
    Plain,
    ResourceOwning(Resources),
    /// Cleanup is delegated entirely to the node.
    Disposable(Box<dyn Dispose>),
    /// The root of a graph. Never disposed generically, its resources are
    /// always released one by one.
    SceneRoot(Resources),
}

impl NodeKind {
    pub fn resources(&self) -> Option<&Resources> {
        match self {
            NodeKind::ResourceOwning(resources) | NodeKind::SceneRoot(resources) => {
                Some(resources)
            }
            NodeKind::Plain | NodeKind::Disposable(_) => None,
        }
    }

    pub fn resources_mut(&mut self) -> Option<&mut Resources> {
        match self {
            NodeKind::ResourceOwning(resources) | NodeKind::SceneRoot(resources) => {
                Some(resources)
            }
            NodeKind::Plain | NodeKind::Disposable(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub layer: Option<Arc<Layer>>,
    pub kind: NodeKind,
    pub transform: Instance,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    link: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            layer: None,
            kind,
            transform: Instance::default(),
            parent: None,
            children: Vec::new(),
            link: Vec::new(),
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Plain)
    }

    pub fn with_resources(name: impl Into<String>, resources: Resources) -> Self {
        Self::new(name, NodeKind::ResourceOwning(resources))
    }

    pub fn disposable(name: impl Into<String>, disposable: Box<dyn Dispose>) -> Self {
        Self::new(name, NodeKind::Disposable(disposable))
    }

    pub fn in_layer(mut self, layer: &Arc<Layer>) -> Self {
        self.layer = Some(layer.clone());
        self
    }

    pub fn with_transform(mut self, transform: Instance) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn links(&self) -> &[NodeId] {
        &self.link
    }

    pub fn resources(&self) -> Option<&Resources> {
        self.kind.resources()
    }

    pub fn is_scene_root(&self) -> bool {
        matches!(self.kind, NodeKind::SceneRoot(_))
    }
}

/// Arena of scene nodes with a single root.
///
/// Detached nodes stay in the arena (they can be re-attached or inspected)
/// until they are [`prune`](SceneGraph::prune)d. The graph remembers which
/// node each of them was detached from, so pruning a subtree also frees the
/// nodes that were detached from inside it.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    events: EventQueue,
    // detached node -> node it was detached from
    detached: HashMap<NodeId, NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(
            "scene",
            NodeKind::SceneRoot(Resources::default()),
        ));
        Self {
            nodes,
            root,
            events: EventQueue::new(),
            detached: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Add a free-standing node; attach it with [`add_child`](Self::add_child).
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(SceneNode {
            parent: None,
            children: Vec::new(),
            link: Vec::new(),
            ..node
        })
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| anyhow!("node {:?} is not part of the scene graph", id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| anyhow!("node {:?} is not part of the scene graph", id))
    }

    /// A node together with the event queue, for code that mutates the node
    /// and emits notifications at the same time.
    pub(crate) fn node_and_events(
        &mut self,
        id: NodeId,
    ) -> Result<(&mut SceneNode, &mut EventQueue)> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| anyhow!("node {:?} is not part of the scene graph", id))?;
        Ok((node, &mut self.events))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    pub fn links(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.links())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Attach `child` as the last child of `parent`, moving it away from its
    /// previous parent if it had one.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(child)?;
        self.node(parent)?;
        if child == self.root {
            bail!("the scene root cannot become a child");
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                bail!(
                    "attaching '{}' under '{}' would create a cycle",
                    self.node(child)?.name,
                    self.node(parent)?.name
                );
            }
            ancestor = self.node(current)?.parent;
        }

        if let Some(previous) = self.node(child)?.parent {
            self.node_mut(previous)?.children.retain(|&id| id != child);
        }
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        self.detached.remove(&child);
        Ok(())
    }

    /// Append `linked` to the link list of `node`.
    pub fn add_link(&mut self, node: NodeId, linked: NodeId) -> Result<()> {
        self.node(linked)?;
        self.node_mut(node)?.link.push(linked);
        Ok(())
    }

    /// Remove `ids` from the child collection of `parent` in one pass.
    ///
    /// The remaining children keep their relative order. Ids that are not
    /// children of `parent` are ignored.
    pub fn detach(&mut self, parent: NodeId, ids: &[NodeId]) -> Result<()> {
        if ids.is_empty() {
            self.node(parent)?;
            return Ok(());
        }
        let targets: HashSet<NodeId> = ids.iter().copied().collect();
        let mut detached = Vec::with_capacity(targets.len());
        self.node_mut(parent)?.children.retain(|id| {
            if targets.contains(id) {
                detached.push(*id);
                false
            } else {
                true
            }
        });
        for id in detached {
            self.node_mut(id)?.parent = None;
            self.detached.insert(id, parent);
        }
        Ok(())
    }

    /// Depth-first pre-order walk over `id` and its children (links are not
    /// followed).
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            order.push(current);
            stack.extend(node.children.iter().rev());
        }
        Ok(order)
    }

    /// Drop a detached subtree from the arena and return how many nodes were
    /// freed.
    ///
    /// Nodes that were detached from a node of the subtree (for instance the
    /// nested layer content taken out by a recursive reclaim) are dropped
    /// with it. Link lists elsewhere in the graph that pointed into the
    /// freed nodes are cleaned up.
    pub fn prune(&mut self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        if id == self.root {
            bail!("the scene root cannot be pruned");
        }
        if node.parent.is_some() {
            bail!("node '{}' is still attached and cannot be pruned", node.name);
        }
        let mut removed = HashSet::new();
        let mut pending = vec![id];
        while !pending.is_empty() {
            for top in pending {
                removed.extend(self.descendants(top)?);
            }
            pending = self
                .detached
                .iter()
                .filter(|(orphan, from)| removed.contains(*from) && !removed.contains(*orphan))
                .map(|(orphan, _)| *orphan)
                .collect();
        }
        self.remove_all(&removed);
        Ok(removed.len())
    }

    /// Drop every node that is not reachable from the root through child
    /// collections, including nodes that were inserted but never attached.
    /// Returns how many nodes were freed.
    pub fn prune_detached(&mut self) -> Result<usize> {
        let reachable: HashSet<NodeId> = self.descendants(self.root)?.into_iter().collect();
        let removed: HashSet<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !reachable.contains(id))
            .collect();
        self.remove_all(&removed);
        log::debug!("pruned {} detached nodes", removed.len());
        Ok(removed.len())
    }

    fn remove_all(&mut self, removed: &HashSet<NodeId>) {
        for removed_id in removed {
            self.nodes.remove(*removed_id);
        }
        for node in self.nodes.values_mut() {
            node.link.retain(|linked| !removed.contains(linked));
        }
        self.detached
            .retain(|orphan, from| !removed.contains(orphan) && !removed.contains(from));
    }

    /// Transform of `id` in scene space.
    pub fn world_transform(&self, id: NodeId) -> Result<Instance> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            chain.push(&node.transform);
            current = node.parent;
        }
        Ok(chain
            .into_iter()
            .rev()
            .fold(Instance::default(), |world, local| &world * local))
    }

    /// Upload every pending resource of every node.
    pub fn upload(&mut self, ctx: &GpuContext) -> Result<()> {
        for node in self.nodes.values_mut() {
            if let Some(resources) = node.kind.resources_mut() {
                resources
                    .upload(ctx)
                    .with_context(|| format!("uploading resources of '{}'", node.name))?;
            }
        }
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain(..).collect()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
