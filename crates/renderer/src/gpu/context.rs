use crate::error::RenderError;
use crate::types::{AdapterProfile, GpuPowerPreference};

#[derive(Clone, Debug, Default)]
pub struct GpuOptions {
    pub power: GpuPowerPreference,
    /// Ask wgpu for its software adapter (useful in CI).
    pub force_fallback_adapter: bool,
}

/// Device, queue and the adapter they came from.
///
/// Renderers receive a shared reference in every lifecycle call and create
/// all of their GPU objects through it.
pub struct Gpu {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    profile: AdapterProfile,
}

impl Gpu {
    /// Creates a device with no presentation surface.
    pub fn headless(options: &GpuOptions) -> Result<Self, RenderError> {
        Self::from_instance(create_instance(), None, options)
    }

    pub(crate) fn from_instance(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
        options: &GpuOptions,
    ) -> Result<Self, RenderError> {
        let power_preference = match options.power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface,
            force_fallback_adapter: options.force_fallback_adapter,
        }))
        .map_err(|err| RenderError::NoAdapter(err.to_string()))?;

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
            label: Some("filterlab device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| RenderError::Device(err.to_string()))?;

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            profile,
        })
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    pub(crate) fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn supports_render_attachment(&self, format: wgpu::TextureFormat) -> bool {
        self.adapter
            .get_texture_format_features(format)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    /// Runs `f` inside a validation error scope and returns what it produced
    /// along with the first validation error raised, if any.
    pub(crate) fn validated<T>(&self, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }
}

pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}
