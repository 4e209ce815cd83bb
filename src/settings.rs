use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::math::hash::{combine_hash, make_hash_f32};
use crate::renderer::light_accumulator::{MAX_PIXEL_LIGHTS, MAX_VERTEX_LIGHTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightingMode {
    #[default]
    Forward,
    DeferredBlinnPhong,
    DeferredPbr,
}

impl LightingMode {
    pub fn is_deferred(self) -> bool {
        !matches!(self, LightingMode::Forward)
    }
}

/// Eviction policy of the light processor cache. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightProcessorCacheSettings {
    #[serde(default = "LightProcessorCacheSettings::default_budget")]
    pub budget: usize,
    #[serde(default = "LightProcessorCacheSettings::default_normal_time_to_live")]
    pub normal_time_to_live: u32,
    #[serde(default = "LightProcessorCacheSettings::default_aggressive_time_to_live")]
    pub aggressive_time_to_live: u32,
}

impl Default for LightProcessorCacheSettings {
    fn default() -> Self {
        Self {
            budget: Self::default_budget(),
            normal_time_to_live: Self::default_normal_time_to_live(),
            aggressive_time_to_live: Self::default_aggressive_time_to_live(),
        }
    }
}

impl LightProcessorCacheSettings {
    const fn default_budget() -> usize {
        64
    }

    const fn default_normal_time_to_live() -> u32 {
        60
    }

    const fn default_aggressive_time_to_live() -> u32 {
        2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub lighting_mode: LightingMode,
    #[serde(default)]
    pub linear_space_lighting: bool,
    #[serde(default = "PipelineSettings::default_true")]
    pub enable_shadows: bool,
    #[serde(default = "PipelineSettings::default_true")]
    pub enable_instancing: bool,
    #[serde(default = "PipelineSettings::default_max_vertex_lights")]
    pub max_vertex_lights: usize,
    #[serde(default = "PipelineSettings::default_max_pixel_lights")]
    pub max_pixel_lights: usize,
    #[serde(default = "PipelineSettings::default_pcf_kernel_size")]
    pub pcf_kernel_size: u32,
    #[serde(default = "PipelineSettings::default_normal_offset_scale")]
    pub normal_offset_scale: f32,
    #[serde(default = "PipelineSettings::default_directional_shadow_size")]
    pub directional_shadow_size: u32,
    #[serde(default = "PipelineSettings::default_spot_shadow_size")]
    pub spot_shadow_size: u32,
    #[serde(default = "PipelineSettings::default_point_shadow_size")]
    pub point_shadow_size: u32,
    #[serde(default = "PipelineSettings::default_shadow_atlas_page_size")]
    pub shadow_atlas_page_size: u32,
    #[serde(default = "PipelineSettings::default_occlusion_buffer_size")]
    pub occlusion_buffer_size: u32,
    #[serde(default = "PipelineSettings::default_max_occluder_triangles")]
    pub max_occluder_triangles: u32,
    #[serde(default = "PipelineSettings::default_occluder_size_threshold")]
    pub occluder_size_threshold: f32,
    #[serde(default)]
    pub light_processor_cache: LightProcessorCacheSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lighting_mode: LightingMode::default(),
            linear_space_lighting: false,
            enable_shadows: true,
            enable_instancing: true,
            max_vertex_lights: Self::default_max_vertex_lights(),
            max_pixel_lights: Self::default_max_pixel_lights(),
            pcf_kernel_size: Self::default_pcf_kernel_size(),
            normal_offset_scale: Self::default_normal_offset_scale(),
            directional_shadow_size: Self::default_directional_shadow_size(),
            spot_shadow_size: Self::default_spot_shadow_size(),
            point_shadow_size: Self::default_point_shadow_size(),
            shadow_atlas_page_size: Self::default_shadow_atlas_page_size(),
            occlusion_buffer_size: Self::default_occlusion_buffer_size(),
            max_occluder_triangles: Self::default_max_occluder_triangles(),
            occluder_size_threshold: Self::default_occluder_size_threshold(),
            light_processor_cache: LightProcessorCacheSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Loads settings, falling back to defaults when the file is missing or malformed.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load_from_path(path) {
            Ok(settings) => {
                info!("Loaded pipeline settings from {:?}", path);
                settings
            }
            Err(PipelineError::SettingsIo { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!("Pipeline settings file {:?} not found. Using default settings.", path);
                Self::default()
            }
            Err(err) => {
                warn!("{} ({}). Falling back to default pipeline settings.", err, error_source(&err));
                Self::default()
            }
        }
    }

    pub fn try_load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PipelineError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: PipelineSettings =
            serde_json::from_str(&contents).map_err(|source| PipelineError::SettingsParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(settings.validate())
    }

    pub fn validate(mut self) -> Self {
        if self.max_vertex_lights > MAX_VERTEX_LIGHTS {
            warn!(
                "max_vertex_lights {} exceeds {}. Clamping.",
                self.max_vertex_lights, MAX_VERTEX_LIGHTS
            );
            self.max_vertex_lights = MAX_VERTEX_LIGHTS;
        }

        if self.max_pixel_lights > MAX_PIXEL_LIGHTS {
            warn!(
                "max_pixel_lights {} exceeds {}. Clamping.",
                self.max_pixel_lights, MAX_PIXEL_LIGHTS
            );
            self.max_pixel_lights = MAX_PIXEL_LIGHTS;
        }

        let pcf = self.pcf_kernel_size.clamp(1, 5);
        // 4x4 kernels have no shader variant
        let pcf = if pcf == 4 { 3 } else { pcf };
        if pcf != self.pcf_kernel_size {
            warn!("PCF kernel size {} is not supported. Using {} instead.", self.pcf_kernel_size, pcf);
            self.pcf_kernel_size = pcf;
        }

        if !(self.normal_offset_scale >= 0.0) {
            warn!("Normal offset scale must not be negative. Using 0 instead.");
            self.normal_offset_scale = 0.0;
        }

        self.directional_shadow_size = closest_power_of_two(self.directional_shadow_size);
        self.spot_shadow_size = closest_power_of_two(self.spot_shadow_size);
        self.point_shadow_size = closest_power_of_two(self.point_shadow_size);

        let page_size = closest_power_of_two(self.shadow_atlas_page_size).clamp(128, 16384);
        if page_size != self.shadow_atlas_page_size {
            warn!(
                "Shadow atlas page size {} adjusted to {}.",
                self.shadow_atlas_page_size, page_size
            );
            self.shadow_atlas_page_size = page_size;
        }

        self.occlusion_buffer_size = self.occlusion_buffer_size.clamp(1, 16384);

        self
    }

    /// Hash of everything that changes pipeline states.
    pub fn pipeline_state_hash(&self) -> u32 {
        let mut hash = 0;
        combine_hash(&mut hash, self.lighting_mode as u32);
        combine_hash(&mut hash, self.linear_space_lighting as u32);
        combine_hash(&mut hash, self.enable_shadows as u32);
        combine_hash(&mut hash, self.enable_instancing as u32);
        combine_hash(&mut hash, self.max_vertex_lights as u32);
        combine_hash(&mut hash, self.max_pixel_lights as u32);
        combine_hash(&mut hash, self.pcf_kernel_size);
        combine_hash(&mut hash, make_hash_f32(self.normal_offset_scale));
        hash
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_max_vertex_lights() -> usize {
        4
    }

    const fn default_max_pixel_lights() -> usize {
        4
    }

    const fn default_pcf_kernel_size() -> u32 {
        1
    }

    const fn default_normal_offset_scale() -> f32 {
        1.0
    }

    const fn default_directional_shadow_size() -> u32 {
        1024
    }

    const fn default_spot_shadow_size() -> u32 {
        1024
    }

    const fn default_point_shadow_size() -> u32 {
        256
    }

    const fn default_shadow_atlas_page_size() -> u32 {
        2048
    }

    const fn default_occlusion_buffer_size() -> u32 {
        256
    }

    const fn default_max_occluder_triangles() -> u32 {
        5000
    }

    const fn default_occluder_size_threshold() -> f32 {
        0.025
    }
}

fn error_source(err: &PipelineError) -> String {
    std::error::Error::source(err)
        .map(|source| source.to_string())
        .unwrap_or_default()
}

/// Closest power of two, preferring the larger one on ties.
pub fn closest_power_of_two(value: u32) -> u32 {
    if value <= 1 {
        return 1;
    }
    let upper = value.checked_next_power_of_two().unwrap_or(1 << 31);
    let lower = if upper == value { value } else { upper >> 1 };
    if value - lower < upper.saturating_sub(value) {
        lower
    } else {
        upper
    }
}
