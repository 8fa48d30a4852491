//! Headless GPU context.
//!
//! Scene resources are created on the CPU and uploaded through a
//! [`GpuContext`]. No window or surface is involved: reclamation only needs a
//! device to allocate on and a queue to copy through.

use anyhow::Result;

#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new() -> Result<Self> {
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("device and queue on {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scene-reclaim device"),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await?;

        Ok(Self { device, queue })
    }

    /// Wrap a device and queue owned by a host application.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }
}
