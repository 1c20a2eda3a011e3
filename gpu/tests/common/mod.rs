//! Common utilities for GPU integration tests.
//!
//! Provides backend selection, a per-test device context, a `.sks` builder
//! and a way to observe messages the layer reports.

#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::{Arc, Once};

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawWindowHandle,
    WebWindowHandle, WindowHandle,
};
use redlilium_gpu::shader::file::{ShaderFile, ShaderFileStage};
use redlilium_gpu::shader::{ShaderBuffer, ShaderResource, ShaderVar, ShaderVarType};
use redlilium_gpu::{
    BackendType, Bind, Device, DeviceParameters, LogLevel, RegisterType, ShaderLanguage,
    ShaderMeta, StageBits, WgpuBackendType, set_log_callback,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Null backend (CPU-side bookkeeping only).
    Null,
    /// wgpu backend on whatever adapter the machine has.
    Wgpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Null => true,
            #[cfg(feature = "wgpu-backend")]
            Backend::Wgpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::Wgpu => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Null => "null",
            Backend::Wgpu => "wgpu",
        }
    }

    pub fn to_parameters(self) -> DeviceParameters {
        let params = DeviceParameters::new().with_app_name("redlilium-gpu tests");
        match self {
            Backend::Null => params.with_backend(BackendType::Null),
            Backend::Wgpu => params
                .with_backend(BackendType::Wgpu)
                .with_wgpu_backend(WgpuBackendType::Auto),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A device created for one test.
pub struct TestContext {
    pub backend: Backend,
    pub device: Arc<Device>,
}

impl TestContext {
    /// Create a context, or `None` if the backend is missing or no adapter
    /// could be opened on this machine.
    pub fn new(backend: Backend) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }
        match Device::new(backend.to_parameters()) {
            Ok(device) => Some(Self { backend, device }),
            Err(e) => {
                eprintln!("Failed to create {} device: {e}", backend.name());
                None
            }
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn null_device() -> Arc<Device> {
    init_logging();
    Device::new(Backend::Null.to_parameters()).expect("null device")
}

// ============================================================================
// Shader Files
// ============================================================================

/// Metadata for a small unlit shader: one constant buffer and one texture.
pub fn unlit_meta(name: &str) -> ShaderMeta {
    let both = StageBits::VERTEX | StageBits::PIXEL;
    ShaderMeta::new(name)
        .with_buffer(
            ShaderBuffer::new("$Global", Bind::new(0, both, RegisterType::Constant), 32)
                .with_var(ShaderVar::new("color", 0, 16, ShaderVarType::Float, 4))
                .with_var(ShaderVar::new("scale", 16, 4, ShaderVarType::Float, 1)),
        )
        .with_resource(
            ShaderResource::new("diffuse", Bind::new(0, StageBits::PIXEL, RegisterType::Resource))
                .with_value("white"),
        )
}

/// Serialize a vertex+pixel shader with placeholder blobs in `language`.
pub fn unlit_sks(name: &str, language: ShaderLanguage) -> Vec<u8> {
    ShaderFile {
        meta: unlit_meta(name),
        stages: vec![
            ShaderFileStage {
                language,
                stage: StageBits::VERTEX,
                code: b"vs_main".to_vec(),
            },
            ShaderFileStage {
                language,
                stage: StageBits::PIXEL,
                code: b"ps_main".to_vec(),
            },
        ],
    }
    .to_bytes()
}

// ============================================================================
// Log Capture
// ============================================================================

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(LogLevel, String)>>> = const { RefCell::new(None) };
}

static INSTALL_CALLBACK: Once = Once::new();

/// Run `f` and return what the layer reported on this thread meanwhile.
///
/// Tests run on separate threads, so each only sees its own messages.
pub fn capture_logs(f: impl FnOnce()) -> Vec<(LogLevel, String)> {
    INSTALL_CALLBACK.call_once(|| {
        set_log_callback(Some(Box::new(|level, message| {
            CAPTURED.with(|captured| {
                if let Some(captured) = captured.borrow_mut().as_mut() {
                    captured.push((level, message.to_string()));
                }
            });
        })));
    });

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    f();
    CAPTURED.with(|captured| captured.borrow_mut().take().unwrap_or_default())
}

pub fn has_warning(logs: &[(LogLevel, String)], needle: &str) -> bool {
    has_message(logs, LogLevel::Warning, needle)
}

pub fn has_critical(logs: &[(LogLevel, String)], needle: &str) -> bool {
    has_message(logs, LogLevel::Critical, needle)
}

fn has_message(logs: &[(LogLevel, String)], wanted: LogLevel, needle: &str) -> bool {
    logs.iter()
        .any(|(level, message)| *level == wanted && message.contains(needle))
}

// ============================================================================
// Windows
// ============================================================================

/// A window handle that points at nothing, for backends that never touch it.
pub struct HeadlessWindow;

impl HasWindowHandle for HeadlessWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let raw = RawWindowHandle::Web(WebWindowHandle::new(1));
        // SAFETY: the handle is never dereferenced by the null backend.
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

impl HasDisplayHandle for HeadlessWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(DisplayHandle::web())
    }
}

// ============================================================================
// Pixel Helpers
// ============================================================================

/// A width x height RGBA8 image filled with one color.
pub fn solid_rgba(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    color.repeat((width * height) as usize)
}

/// A width x height RGBA8 checkerboard of black and white texels.
pub fn checker_rgba(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    data
}
