//! Device creation parameters.

/// Which backend a device is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// wgpu when compiled in and an adapter is found, otherwise null.
    #[default]
    Auto,
    /// Headless in-memory backend.
    Null,
    Wgpu,
}

/// Which wgpu backend to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WgpuBackendType {
    /// Let wgpu pick the best backend for the platform.
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    /// OpenGL / WebGL.
    Gl,
}

/// How the adapter is chosen when several are available.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AdapterSelector {
    /// High-performance adapter preferred by the backend.
    #[default]
    Default,
    /// Adapter at this position in the enumeration order.
    Index(usize),
    /// First adapter whose name contains this string (case-insensitive).
    Name(String),
}

impl AdapterSelector {
    /// Check whether an adapter matches this selector.
    pub fn matches(&self, index: usize, name: &str) -> bool {
        match self {
            Self::Default => index == 0,
            Self::Index(i) => *i == index,
            Self::Name(wanted) => name.to_lowercase().contains(&wanted.to_lowercase()),
        }
    }
}

/// Parameters for [`Device::new`](crate::Device::new).
///
/// # Example
///
/// ```ignore
/// let params = DeviceParameters::new()
///     .with_app_name("viewer")
///     .with_wgpu_backend(WgpuBackendType::Vulkan)
///     .with_validation(true);
/// let device = Device::new(params)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    pub app_name: String,
    pub backend: BackendType,
    pub adapter: AdapterSelector,
    pub wgpu_backend: WgpuBackendType,
    /// Enable API validation layers.
    pub validation: bool,
    /// Attach debug labels to every backend object.
    pub debug: bool,
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self {
            app_name: "redlilium".to_string(),
            backend: BackendType::Auto,
            adapter: AdapterSelector::Default,
            wgpu_backend: WgpuBackendType::Auto,
            validation: cfg!(debug_assertions),
            debug: cfg!(debug_assertions),
        }
    }
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterSelector) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_wgpu_backend(mut self, backend: WgpuBackendType) -> Self {
        self.wgpu_backend = backend;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Debug label for a backend object, when labels are enabled.
    #[cfg_attr(not(feature = "wgpu-backend"), allow(dead_code))]
    pub(crate) fn label<'a>(&self, label: &'a str) -> Option<&'a str> {
        self.debug.then_some(label)
    }
}
