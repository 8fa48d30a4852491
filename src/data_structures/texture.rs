//! Textures owned by materials.
//!
//! A [`Texture`] starts out as decoded RGBA pixels on the CPU. Uploading
//! creates the `wgpu` texture, view and sampler; releasing destroys the GPU
//! texture and drops the pixels. A texture is released at most once.

use anyhow::*;
use image::{ImageFormat, load_from_memory_with_format};

use crate::{context::GpuContext, data_structures::model::ResourceState};

/// Named texture attribute of a material.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    MetallicRoughness,
    Occlusion,
    Emissive,
    Other(String),
}

/// The GPU side of a texture: texture, view and sampler.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

#[derive(Debug)]
pub struct Texture {
    label: String,
    image: Option<image::RgbaImage>,
    is_normal_map: bool,
    gpu: Option<GpuTexture>,
    state: ResourceState,
}

impl Texture {
    /// Wrap already decoded pixels.
    ///
    /// `is_normal_map` toggles between sRGB (false) and linear (true) colour
    /// space once uploaded.
    pub fn from_rgba(label: &str, image: image::RgbaImage, is_normal_map: bool) -> Self {
        Self {
            label: label.to_string(),
            image: Some(image),
            is_normal_map,
            gpu: None,
            state: ResourceState::Pending,
        }
    }

    /// Decode a texture from raw image file contents (PNG, JPEG, etc.).
    ///
    /// `format` is an optional file extension hint (e.g. "png"). If `None`
    /// the format is guessed from the bytes.
    pub fn from_bytes(
        label: &str,
        bytes: &[u8],
        format: Option<&str>,
        is_normal_map: bool,
    ) -> Result<Self> {
        let img = match format {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => {
                let format = ImageFormat::from_extension(fmt)
                    .with_context(|| format!("unknown image format '{}' for {}", fmt, label))?;
                load_from_memory_with_format(bytes, format)?
            }
        };
        Ok(Self::from_image(label, &img, is_normal_map))
    }

    pub fn from_image(label: &str, img: &image::DynamicImage, is_normal_map: bool) -> Self {
        Self::from_rgba(label, img.to_rgba8(), is_normal_map)
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

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image
            .as_ref()
            .map(|img| img.dimensions())
            .or_else(|| {
                self.gpu
                    .as_ref()
                    .map(|gpu| (gpu.texture.width(), gpu.texture.height()))
            })
    }

    pub fn gpu(&self) -> Option<&GpuTexture> {
        self.gpu.as_ref()
    }

    /// Create the GPU texture and copy the pixels into it.
    ///
    /// Uploading a resident texture does nothing; uploading a released one fails.
    pub fn upload(&mut self, ctx: &GpuContext) -> Result<()> {
        match self.state {
            ResourceState::Released => bail!("texture '{}' was already released", self.label),
            ResourceState::Resident => return Ok(()),
            ResourceState::Pending => (),
        }
        let img = self
            .image
            .as_ref()
            .with_context(|| format!("texture '{}' has no pixel data", self.label))?;
        let dimensions = img.dimensions();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let format = if self.is_normal_map {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&self.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            img,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_default_sampler(&ctx.device);
        self.gpu = Some(GpuTexture {
            texture,
            view,
            sampler,
        });
        self.state = ResourceState::Resident;
        Ok(())
    }

    /// Destroy the GPU texture (if uploaded) and drop the pixels.
    pub fn release(&mut self) -> Result<()> {
        if self.state == ResourceState::Released {
            bail!("texture '{}' was already released", self.label);
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.texture.destroy();
        }
        self.image = None;
        self.state = ResourceState::Released;
        log::trace!("released texture '{}'", self.label);
        Ok(())
    }
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}
