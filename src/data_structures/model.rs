//! Geometry and material resources owned by scene nodes.
//!
//! Both keep their source data on the CPU until [`upload`](Geometry::upload)
//! is called. `release` destroys whatever GPU handles exist and drops the CPU
//! data. Releasing twice is an error: every resource is released exactly once.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use wgpu::util::DeviceExt;

use crate::{
    context::GpuContext,
    data_structures::texture::{Texture, TextureSlot},
};

/// Lifecycle of a releasable resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// CPU data only, nothing allocated on the GPU yet.
    Pending,
    /// Uploaded to a device.
    Resident,
    Released,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

#[derive(Debug)]
pub struct GeometryBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

/// Indexed triangle geometry.
#[derive(Debug)]
pub struct Geometry {
    label: String,
    vertices: Vec<ModelVertex>,
    indices: Vec<u32>,
    gpu: Option<GeometryBuffers>,
    state: ResourceState,
}

impl Geometry {
    /// Create a pending geometry from CPU-side data.
    ///
    /// # Arguments
    ///
    /// * `label` - Debug label, also used for the GPU buffer labels.
    /// * `vertices` - Vertex data.
    /// * `indices` - Triangle list indices into `vertices`.
    pub fn new(label: &str, vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        Self {
            label: label.to_string(),
            vertices,
            indices,
            gpu: None,
            state: ResourceState::Pending,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.state == ResourceState::Released
    }

    /// CPU-side vertices. Empty once released.
    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The vertex and index buffers while the geometry is resident.
    pub fn gpu(&self) -> Option<&GeometryBuffers> {
        self.gpu.as_ref()
    }

    /// Create the vertex and index buffers.
    ///
    /// Uploading a resident geometry does nothing; uploading a released one fails.
    pub fn upload(&mut self, ctx: &GpuContext) -> Result<()> {
        match self.state {
            ResourceState::Released => bail!("geometry '{}' was already released", self.label),
            ResourceState::Resident => return Ok(()),
            ResourceState::Pending => (),
        }
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", self.label)),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", self.label)),
                contents: bytemuck::cast_slice(&self.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.gpu = Some(GeometryBuffers {
            vertex_buffer,
            index_buffer,
            num_elements: self.indices.len() as u32,
        });
        self.state = ResourceState::Resident;
        Ok(())
    }

    /// Destroy the GPU buffers (if uploaded) and drop the CPU data.
    pub fn release(&mut self) -> Result<()> {
        if self.state == ResourceState::Released {
            bail!("geometry '{}' was already released", self.label);
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.vertex_buffer.destroy();
            gpu.index_buffer.destroy();
        }
        self.vertices = Vec::new();
        self.indices = Vec::new();
        self.state = ResourceState::Released;
        log::trace!("released geometry '{}'", self.label);
        Ok(())
    }
}

/**
 * The material uniform as laid out in GPU memory.
 */
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
}

/// A material: base colour factor, named textures and a uniform buffer.
///
/// Releasing a material only frees its own uniform buffer. The textures are
/// separate resources and are released through [`Material::release_textures`].
#[derive(Debug)]
pub struct Material {
    label: String,
    pub base_color: [f32; 4],
    textures: BTreeMap<TextureSlot, Texture>,
    uniform: Option<wgpu::Buffer>,
    state: ResourceState,
}

impl Material {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            base_color: [1.0; 4],
            textures: BTreeMap::new(),
            uniform: None,
            state: ResourceState::Pending,
        }
    }

    pub fn with_base_color(mut self, base_color: [f32; 4]) -> Self {
        self.base_color = base_color;
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: Texture) -> Self {
        self.set_texture(slot, texture);
        self
    }

    /// Put `texture` into `slot`, handing back the texture it replaces.
    pub fn set_texture(&mut self, slot: TextureSlot, texture: Texture) -> Option<Texture> {
        self.textures.insert(slot, texture)
    }

    pub fn texture(&self, slot: &TextureSlot) -> Option<&Texture> {
        self.textures.get(slot)
    }

    pub fn textures(&self) -> impl Iterator<Item = (&TextureSlot, &Texture)> {
        self.textures.iter()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.state == ResourceState::Released
    }

    pub fn uniform(&self) -> Option<&wgpu::Buffer> {
        self.uniform.as_ref()
    }

    /// Upload the uniform buffer and every pending texture.
    pub fn upload(&mut self, ctx: &GpuContext) -> Result<()> {
        match self.state {
            ResourceState::Released => bail!("material '{}' was already released", self.label),
            ResourceState::Resident => (),
            ResourceState::Pending => {
                let uniform = MaterialUniform {
                    base_color: self.base_color,
                };
                self.uniform = Some(ctx.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Material Uniform", self.label)),
                        contents: bytemuck::cast_slice(&[uniform]),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    },
                ));
                self.state = ResourceState::Resident;
            }
        }
        for texture in self.textures.values_mut() {
            if texture.state() == ResourceState::Pending {
                texture.upload(ctx)?;
            }
        }
        Ok(())
    }

    /// Destroy the uniform buffer. Textures are left alone.
    pub fn release(&mut self) -> Result<()> {
        if self.state == ResourceState::Released {
            bail!("material '{}' was already released", self.label);
        }
        if let Some(uniform) = self.uniform.take() {
            uniform.destroy();
        }
        self.state = ResourceState::Released;
        log::trace!("released material '{}'", self.label);
        Ok(())
    }

    /// Release every texture attached to this material.
    pub fn release_textures(&mut self) -> Result<()> {
        for (slot, texture) in self.textures.iter_mut() {
            texture
                .release()
                .with_context(|| format!("{:?} texture of material '{}'", slot, self.label))?;
        }
        Ok(())
    }
}

/// A node owns either one material or an ordered list of them.
#[derive(Debug)]
pub enum MaterialSlot {
    Single(Material),
    Many(Vec<Material>),
}

impl MaterialSlot {
    pub fn iter(&self) -> std::slice::Iter<'_, Material> {
        match self {
            MaterialSlot::Single(material) => std::slice::from_ref(material).iter(),
            MaterialSlot::Many(materials) => materials.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Material> {
        match self {
            MaterialSlot::Single(material) => std::slice::from_mut(material).iter_mut(),
            MaterialSlot::Many(materials) => materials.iter_mut(),
        }
    }
}

/// GPU resources a scene node may own.
#[derive(Debug, Default)]
pub struct Resources {
    pub geometry: Option<Geometry>,
    pub material: Option<MaterialSlot>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(MaterialSlot::Single(material));
        self
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.material = Some(MaterialSlot::Many(materials));
        self
    }

    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.material.iter().flat_map(MaterialSlot::iter)
    }

    /// Upload everything that is still pending. Released resources are skipped.
    pub fn upload(&mut self, ctx: &GpuContext) -> Result<()> {
        if let Some(geometry) = self.geometry.as_mut() {
            if geometry.state() == ResourceState::Pending {
                geometry.upload(ctx)?;
            }
        }
        for material in self.material.iter_mut().flat_map(MaterialSlot::iter_mut) {
            if !material.is_released() {
                material.upload(ctx)?;
            }
        }
        Ok(())
    }
}
