use std::collections::HashMap;

use thiserror::Error;

use super::context::Capabilities;
use super::draw::{TargetId, TextureId};
use super::error::TargetError;
use super::targets::{
    check_spec, RenderTargetTextures, TargetFactory, TargetSpec, TARGET_TEXTURE_BASE,
};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("no suitable adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Device without a surface, enough to back off-screen targets.
pub struct HeadlessGpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl HeadlessGpu {
    pub async fn request(backends: wgpu::Backends) -> Result<Self, GpuInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        let adapter_info = adapter.get_info();
        log::info!("Using adapter: {:?}", adapter_info);
        log::info!("Using backend: {:?}", adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("CanvasDevice"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Depth textures and render attachments are core wgpu features.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }
}

struct GpuTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

/// Creates render targets as wgpu textures: a mipmapped RGBA colour texture
/// and an optional sampled depth texture.
pub struct WgpuTargetFactory {
    device: wgpu::Device,
    targets: HashMap<TargetId, GpuTarget>,
    next_target: u64,
    next_texture: u32,
}

impl WgpuTargetFactory {
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            targets: HashMap::new(),
            next_target: 1,
            next_texture: TARGET_TEXTURE_BASE,
        }
    }

    pub fn color_view(&self, id: TargetId) -> Option<&wgpu::TextureView> {
        self.targets.get(&id).map(|target| &target.color_view)
    }

    pub fn depth_view(&self, id: TargetId) -> Option<&wgpu::TextureView> {
        self.targets
            .get(&id)
            .and_then(|target| target.depth.as_ref().map(|(_, view)| view))
    }

    fn calculate_mip_levels(width: u32, height: u32) -> u32 {
        let max_dimension = width.max(height).max(1);
        32 - max_dimension.leading_zeros()
    }

    fn create_texture(
        &self,
        label: &str,
        spec: TargetSpec,
        format: wgpu::TextureFormat,
        mip_level_count: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn next_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }
}

impl TargetFactory for WgpuTargetFactory {
    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn create_target(&mut self, spec: TargetSpec) -> Result<RenderTargetTextures, TargetError> {
        check_spec(spec, self.max_texture_size())?;

        let id = TargetId(self.next_target);
        self.next_target += 1;

        let mip_levels = Self::calculate_mip_levels(spec.width, spec.height);
        let (color_texture, color_view) = self.create_texture(
            &format!("SceneTarget{}Color", id.0),
            spec,
            COLOR_FORMAT,
            mip_levels,
        );
        let depth = spec.depth.then(|| {
            self.create_texture(&format!("SceneTarget{}Depth", id.0), spec, DEPTH_FORMAT, 1)
        });

        let color = self.next_texture();
        let depth_id = depth.as_ref().map(|_| self.next_texture());
        self.targets.insert(
            id,
            GpuTarget {
                color: color_texture,
                color_view,
                depth,
            },
        );

        Ok(RenderTargetTextures {
            id,
            color,
            depth: depth_id,
        })
    }

    fn destroy_target(&mut self, target: &RenderTargetTextures) {
        if let Some(gpu_target) = self.targets.remove(&target.id) {
            gpu_target.color.destroy();
            if let Some((texture, _)) = gpu_target.depth {
                texture.destroy();
            }
        }
    }
}
