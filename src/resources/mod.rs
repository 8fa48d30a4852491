//! Loading layer content into the scene graph.
//!
//! glTF documents are turned into scene nodes tagged with the layer they are
//! loaded for, so the layer can later be reclaimed as a whole. Buffers and
//! images must be embedded (GLB or base64 data URIs).

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

use crate::data_structures::{
    instance::Instance,
    layer::Layer,
    model::{Geometry, Material, ModelVertex, Resources},
    scene_graph::{NodeId, NodeKind, SceneGraph, SceneNode},
    texture::{Texture, TextureSlot},
};

/// Parse a glTF document and attach its default scene under `parent`.
///
/// Every created node belongs to `layer`. Returns the ids of the top-level
/// nodes, in document order.
pub fn load_gltf_layer(
    graph: &mut SceneGraph,
    parent: NodeId,
    layer: &Arc<Layer>,
    bytes: &[u8],
) -> Result<Vec<NodeId>> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).with_context(|| format!("parsing glTF for layer '{}'", layer.id))?;
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("glTF document contains no scene")?;
    let images: Vec<Option<image::RgbaImage>> = images.iter().map(to_rgba).collect();

    let mut top_level = Vec::new();
    for node in scene.nodes() {
        let id = to_scene_node(graph, node, &buffers, &images, layer)?;
        graph.add_child(parent, id)?;
        top_level.push(id);
    }
    log::debug!(
        "loaded {} top-level nodes into layer '{}'",
        top_level.len(),
        layer.id
    );
    Ok(top_level)
}

pub fn load_gltf_layer_from_path(
    graph: &mut SceneGraph,
    parent: NodeId,
    layer: &Arc<Layer>,
    path: impl AsRef<Path>,
) -> Result<Vec<NodeId>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    load_gltf_layer(graph, parent, layer, &bytes)
}

fn to_scene_node(
    graph: &mut SceneGraph,
    node: gltf::Node,
    buffers: &[gltf::buffer::Data],
    images: &[Option<image::RgbaImage>],
    layer: &Arc<Layer>,
) -> Result<NodeId> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Instance {
        position: translation.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    };

    let mut primitives = match node.mesh() {
        Some(mesh) => mesh
            .primitives()
            .map(|primitive| load_primitive(&name, &primitive, buffers, images))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    // A single primitive lives on the node itself, several get a child each.
    let kind = if primitives.len() == 1 {
        NodeKind::ResourceOwning(primitives.remove(0))
    } else {
        NodeKind::Plain
    };
    let id = graph.insert(
        SceneNode::new(name.clone(), kind)
            .in_layer(layer)
            .with_transform(transform),
    );
    for (idx, resources) in primitives.into_iter().enumerate() {
        let child = graph.insert(
            SceneNode::with_resources(format!("{}_primitive_{}", name, idx), resources)
                .in_layer(layer),
        );
        graph.add_child(id, child)?;
    }

    for child in node.children() {
        let child_id = to_scene_node(graph, child, buffers, images, layer)?;
        graph.add_child(id, child_id)?;
    }
    Ok(id)
}

fn load_primitive(
    name: &str,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    images: &[Option<image::RgbaImage>],
) -> Result<Resources> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .with_context(|| format!("primitive {} of '{}' has no positions", primitive.index(), name))?
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(vertex, tex_coord)| vertex.tex_coords = tex_coord);
    }
    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    let geometry = Geometry::new(
        &format!("{} geometry {}", name, primitive.index()),
        vertices,
        indices,
    );

    let gltf_material = primitive.material();
    let material_name = gltf_material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} material", name));
    let pbr = gltf_material.pbr_metallic_roughness();
    let mut material = Material::new(&material_name).with_base_color(pbr.base_color_factor());
    if let Some(info) = pbr.base_color_texture() {
        let source = info.texture().source().index();
        match images.get(source).and_then(Option::as_ref) {
            Some(pixels) => {
                material.set_texture(
                    TextureSlot::BaseColor,
                    Texture::from_rgba(&format!("{} base colour", material_name), pixels.clone(), false),
                );
            }
            None => log::warn!(
                "base colour image {} of material '{}' could not be decoded, skipping it",
                source,
                material_name
            ),
        }
    }
    if let Some(normal) = gltf_material.normal_texture() {
        let source = normal.texture().source().index();
        if let Some(pixels) = images.get(source).and_then(Option::as_ref) {
            material.set_texture(
                TextureSlot::Normal,
                Texture::from_rgba(&format!("{} normal", material_name), pixels.clone(), true),
            );
        }
    }

    Ok(Resources::new()
        .with_geometry(geometry)
        .with_material(material))
}

fn to_rgba(data: &gltf::image::Data) -> Option<image::RgbaImage> {
    match data.format {
        gltf::image::Format::R8G8B8A8 => {
            image::RgbaImage::from_raw(data.width, data.height, data.pixels.clone())
        }
        gltf::image::Format::R8G8B8 => {
            image::RgbImage::from_raw(data.width, data.height, data.pixels.clone())
                .map(|rgb| image::DynamicImage::ImageRgb8(rgb).to_rgba8())
        }
        other => {
            log::warn!("glTF image format {:?} is not supported", other);
            None
        }
    }
}
