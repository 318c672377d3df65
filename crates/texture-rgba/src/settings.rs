//! Translation from `rgbaconfig` settings to pipeline and GPU options.

use std::sync::Arc;

use rgbaconfig::{
    NormalizationSetting, PowerSetting, PresentModeSetting, RendererSettings, TruncationSetting,
};

use crate::gpu::GpuOptions;
use crate::observe::PipelineObserver;
use crate::pipeline::PipelineOptions;
use crate::pixels::{Normalization, TruncationPolicy};

impl From<NormalizationSetting> for Normalization {
    fn from(value: NormalizationSetting) -> Self {
        match value {
            NormalizationSetting::Shader => Normalization::ShaderSwizzle,
            NormalizationSetting::Host => Normalization::HostReorder,
        }
    }
}

impl From<TruncationSetting> for TruncationPolicy {
    fn from(value: TruncationSetting) -> Self {
        match value {
            TruncationSetting::Reject => TruncationPolicy::RejectFrame,
            TruncationSetting::Drop => TruncationPolicy::DropRows,
            TruncationSetting::Clamp => TruncationPolicy::ClampRow,
        }
    }
}

fn power_preference(value: PowerSetting) -> wgpu::PowerPreference {
    match value {
        PowerSetting::Low => wgpu::PowerPreference::LowPower,
        PowerSetting::High => wgpu::PowerPreference::HighPerformance,
    }
}

fn present_mode(value: PresentModeSetting) -> wgpu::PresentMode {
    match value {
        PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
        PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
        PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &RendererSettings, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            normalization: settings.pipeline.normalization.into(),
            truncation: settings.pipeline.truncation.into(),
            observer,
        }
    }
}

impl GpuOptions {
    /// The shader swizzle is enabled exactly when frames are uploaded
    /// without host reordering.
    pub fn from_settings(settings: &RendererSettings) -> Self {
        let [r, g, b, a] = settings.gpu.clear_color;
        Self {
            power: power_preference(settings.gpu.power),
            present_mode: present_mode(settings.gpu.present_mode),
            frame_latency: settings.gpu.frame_latency,
            clear_color: wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: f64::from(a),
            },
            swizzle: !Normalization::from(settings.pipeline.normalization).stages_on_host(),
        }
    }
}
