#![allow(dead_code)]

use std::{cell::Cell, rc::Rc, sync::Arc};

use scene_reclaim::{
    Layer, NodeId, SceneGraph, SceneNode,
    data_structures::{
        model::{Geometry, Material, ModelVertex, ResourceState, Resources},
        scene_graph::{Dispose, EventQueue, SceneEvent},
        texture::{Texture, TextureSlot},
    },
};

pub(crate) fn triangle(label: &str) -> Geometry {
    let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .into_iter()
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    Geometry::new(label, vertices, vec![0, 1, 2])
}

pub(crate) fn pixel(label: &str) -> Texture {
    Texture::from_rgba(
        label,
        image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255])),
        false,
    )
}

pub(crate) fn textured_material(label: &str) -> Material {
    Material::new(label)
        .with_texture(TextureSlot::BaseColor, pixel(&format!("{} colour", label)))
        .with_texture(TextureSlot::Normal, pixel(&format!("{} normal", label)))
}

/// A node with a geometry and one textured material.
pub(crate) fn tile(name: &str) -> SceneNode {
    SceneNode::with_resources(
        name,
        Resources::new()
            .with_geometry(triangle(&format!("{} geometry", name)))
            .with_material(textured_material(&format!("{} material", name))),
    )
}

pub(crate) fn tile_in(name: &str, layer: &Arc<Layer>) -> SceneNode {
    tile(name).in_layer(layer)
}

/// Insert `node` and attach it under `parent`.
pub(crate) fn attach(graph: &mut SceneGraph, parent: NodeId, node: SceneNode) -> NodeId {
    let id = graph.insert(node);
    graph.add_child(parent, id).unwrap();
    id
}

/// Every geometry, material and texture of the node is in `state`.
pub(crate) fn all_resources_in(graph: &SceneGraph, id: NodeId, state: ResourceState) -> bool {
    let resources = graph
        .node(id)
        .unwrap()
        .resources()
        .expect("node owns no resources");
    let geometry_ok = resources
        .geometry
        .as_ref()
        .map_or(true, |geometry| geometry.state() == state);
    let materials_ok = resources.materials().all(|material| {
        material.state() == state && material.textures().all(|(_, texture)| texture.state() == state)
    });
    geometry_ok && materials_ok
}

pub(crate) fn is_released(graph: &SceneGraph, id: NodeId) -> bool {
    all_resources_in(graph, id, ResourceState::Released)
}

pub(crate) fn is_untouched(graph: &SceneGraph, id: NodeId) -> bool {
    all_resources_in(graph, id, ResourceState::Pending)
}

pub(crate) fn disposed_nodes(graph: &mut SceneGraph) -> Vec<NodeId> {
    graph
        .drain_events()
        .into_iter()
        .map(|event| match event {
            SceneEvent::Disposed { node, .. } => node,
        })
        .collect()
}

/// Disposable stand-in that counts how often it was disposed.
pub(crate) struct DisposeCounter {
    invocations: Rc<Cell<u32>>,
    emit_event: bool,
}

impl DisposeCounter {
    pub(crate) fn new(emit_event: bool) -> (Self, Rc<Cell<u32>>) {
        let invocations = Rc::new(Cell::new(0));
        (
            Self {
                invocations: invocations.clone(),
                emit_event,
            },
            invocations,
        )
    }
}

impl Dispose for DisposeCounter {
    fn dispose(&mut self, node: NodeId, events: &mut EventQueue) -> anyhow::Result<()> {
        self.invocations.set(self.invocations.get() + 1);
        if self.emit_event {
            events.push_back(SceneEvent::Disposed {
                node,
                name: "self-disposed".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(feature = "integration-tests")]
#[macro_export]
macro_rules! gpu_test {
    ($body:expr) => {{
        scene_reclaim::init_logging();
        let ctx = futures::executor::block_on(scene_reclaim::context::GpuContext::new())
            .expect("Failed to create a GPU context for integration test.");
        ($body)(ctx)
    }};
}
