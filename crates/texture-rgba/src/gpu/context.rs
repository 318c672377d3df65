use anyhow::{Context as AnyhowContext, Result};

/// Knobs for device creation and surface configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuOptions {
    pub power: wgpu::PowerPreference,
    pub present_mode: wgpu::PresentMode,
    pub frame_latency: u32,
    pub clear_color: wgpu::Color,
    /// Sample the frame texture as `.bgra` in the fragment stage.
    pub swizzle: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power: wgpu::PowerPreference::HighPerformance,
            present_mode: wgpu::PresentMode::Fifo,
            frame_latency: 2,
            clear_color: wgpu::Color::BLACK,
            swizzle: true,
        }
    }
}

/// What the selected adapter reported about itself.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub driver: String,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            driver: info.driver.clone(),
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

/// Instance, adapter, device and queue owned by one pipeline.
pub(crate) struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: AdapterProfile,
}

impl GpuContext {
    pub(crate) fn new(options: &GpuOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let limits = adapter.limits();
        let profile = AdapterProfile::from_wgpu(&adapter.get_info(), &limits);
        tracing::debug!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texture-rgba device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        // Errors outside an explicit scope would otherwise abort the process.
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            profile,
        })
    }

    /// Runs `f` inside a validation + out-of-memory error scope.
    pub(crate) fn scoped<R>(&self, f: impl FnOnce(&wgpu::Device) -> R) -> Result<R, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(memory) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}

/// Clamps a requested frame latency to what surfaces accept.
pub(crate) fn clamp_frame_latency(requested: u32) -> u32 {
    let clamped = requested.clamp(1, 3);
    if clamped != requested {
        tracing::warn!(
            requested,
            clamped,
            "GPU frame latency clamped to valid range (1-3)"
        );
    }
    clamped
}

/// Picks `requested` when the surface supports it, otherwise FIFO, which
/// every surface has to offer.
pub(crate) fn select_present_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: wgpu::PresentMode,
) -> wgpu::PresentMode {
    if caps.present_modes.contains(&requested) {
        return requested;
    }
    tracing::warn!(
        ?requested,
        available = ?caps.present_modes,
        "requested present mode unavailable; falling back to fifo"
    );
    wgpu::PresentMode::Fifo
}

/// Preferred 8-bit formats, in order. sRGB variants are skipped so the
/// uploaded bytes reach the compositor unchanged.
const PREFERRED_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Bgra8Unorm,
    wgpu::TextureFormat::Rgba8Unorm,
];

pub(crate) fn select_surface_format(caps: &wgpu::SurfaceCapabilities) -> Option<wgpu::TextureFormat> {
    if let Some(format) = PREFERRED_FORMATS
        .iter()
        .copied()
        .find(|format| caps.formats.contains(format))
    {
        return Some(format);
    }
    let fallback = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| caps.formats.first().copied())?;
    tracing::warn!(
        ?fallback,
        "no 8-bit unorm surface format available; falling back to {:?}",
        fallback
    );
    Some(fallback)
}
