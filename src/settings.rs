use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_resolution")]
    pub shadow_map_resolution: u32,
    #[serde(default = "RenderSettings::enabled")]
    pub use_unit_shaders: bool,
    #[serde(default)]
    pub use_ground_shaders: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub use_lod: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub use_light: bool,
    #[serde(default)]
    pub align_selection_boxes: bool,
    #[serde(default = "RenderSettings::default_iconify_base_distance")]
    pub iconify_base_distance: f32,
    #[serde(default = "RenderSettings::default_ground_renderer")]
    pub ground_renderer: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub gpu_backend: GpuBackendSetting,
    #[serde(default)]
    pub debug: DebugSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_resolution: Self::default_shadow_map_resolution(),
            use_unit_shaders: true,
            use_ground_shaders: false,
            use_lod: true,
            use_light: true,
            align_selection_boxes: false,
            iconify_base_distance: Self::default_iconify_base_distance(),
            ground_renderer: Self::default_ground_renderer(),
            resolution: Resolution::default(),
            gpu_backend: GpuBackendSetting::default(),
            debug: DebugSettings::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("render_settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_resolution == 0 {
            warn!("Shadow map resolution must be greater than zero. Using default value.");
            self.shadow_map_resolution = Self::default_shadow_map_resolution();
        }

        if self.iconify_base_distance.is_nan() || self.iconify_base_distance <= 0.0 {
            warn!("Iconify distance must be positive. Using default value.");
            self.iconify_base_distance = Self::default_iconify_base_distance();
        }

        if self.ground_renderer.trim().is_empty() {
            warn!("Ground renderer name is empty. Using the default renderer.");
            self.ground_renderer = Self::default_ground_renderer();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        self
    }

    const fn default_shadow_map_resolution() -> u32 {
        2048
    }

    const fn default_iconify_base_distance() -> f32 {
        80.0
    }

    const fn enabled() -> bool {
        true
    }

    fn default_ground_renderer() -> String {
        "default".to_string()
    }
}

/// Pass toggles and overlays for debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugSettings {
    #[serde(default = "RenderSettings::enabled")]
    pub render_ground: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub render_items: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub render_water: bool,
    #[serde(default = "RenderSettings::enabled")]
    pub render_particles: bool,
    #[serde(default)]
    pub bounding_boxes: bool,
    #[serde(default)]
    pub wireframes: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            render_ground: true,
            render_items: true,
            render_water: true,
            render_particles: true,
            bounding_boxes: false,
            wireframes: false,
        }
    }
}

/// Viewport of the headless demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuBackendSetting {
    #[default]
    All,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl GpuBackendSetting {
    pub fn to_wgpu(self) -> wgpu::Backends {
        match self {
            GpuBackendSetting::All => wgpu::Backends::all(),
            GpuBackendSetting::Vulkan => wgpu::Backends::VULKAN,
            GpuBackendSetting::Metal => wgpu::Backends::METAL,
            GpuBackendSetting::Dx12 => wgpu::Backends::DX12,
            GpuBackendSetting::Gl => wgpu::Backends::GL,
        }
    }
}
