//! GPU integration tests for the gpu crate.
//!
//! Tests are parameterized using `rstest` to run against every backend. The
//! wgpu cases skip themselves when the feature is off or the machine has no
//! usable adapter.
//!
//! # Test Categories
//!
//! - **Buffer Tests**: static readback, write-only dynamic buffers, deferred uploads
//! - **Texture Tests**: mip generation, readback, depth attachment rules
//! - **Target Tests**: render target binding and the backbuffer viewport
//! - **Shader Tests**: shared metadata and state caching (null backend only,
//!   since its placeholder blobs aren't valid SPIR-V)
//! - **Swapchain Tests**: resizing against a headless window
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test gpu_tests
//! cargo test --test gpu_tests --features wgpu-backend
//! ```

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{
    Backend, HeadlessWindow, TestContext, capture_logs, checker_rgba, has_critical, has_warning,
    null_device, solid_rgba, unlit_sks,
};
use redlilium_gpu::backend::null::NullNativeTexture;
use redlilium_gpu::{
    Bind, BufferType, GpuError, MipPolicy, NativeTexture, Rect, RegisterType, StageBits,
    TexFormat, TexType, Usage, Vertex, mip_count,
};

// ============================================================================
// Buffer Tests
// ============================================================================

/// Contents given at creation of a static buffer come back unchanged.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_static_buffer_readback(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let data: Vec<u8> = (0..64u8).collect();
    let buffer = ctx
        .device
        .create_buffer(Some(&data), 16, 4, BufferType::Compute, Usage::STATIC)
        .unwrap();
    assert_eq!(buffer.size(), 64);

    let mut out = vec![0u8; 64];
    buffer.get_contents(&mut out).unwrap();
    assert_eq!(out, data);
}

/// Vertex data keeps its interleaved layout through a readback.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_vertex_buffer_readback(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let vertices = [
        Vertex::new([0.0, 0.5, 0.0], [0.0, 0.0, 1.0], [0.5, 0.0], [255, 0, 0, 255]),
        Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0], [0, 255, 0, 255]),
        Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0], [0, 0, 255, 255]),
    ];
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);
    let buffer = ctx
        .device
        .create_buffer(
            Some(bytes),
            vertices.len() as u32,
            std::mem::size_of::<Vertex>() as u32,
            BufferType::Vertex,
            Usage::STATIC,
        )
        .unwrap();

    let mut out = vec![0u8; bytes.len()];
    buffer.get_contents(&mut out).unwrap();
    let read: &[Vertex] = bytemuck::cast_slice(&out);
    assert_eq!(read, &vertices);
}

/// Dynamic buffers are write-only; reading one back is refused.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_dynamic_buffer_readback_is_unsupported(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffer = ctx
        .device
        .create_buffer(None, 4, 16, BufferType::Constant, Usage::DYNAMIC)
        .unwrap();
    buffer.set_contents(&[7u8; 64]);

    let mut out = vec![0u8; 64];
    let result = buffer.get_contents(&mut out);
    assert!(matches!(result, Err(GpuError::Unsupported(_))));
    assert!(out.iter().all(|&b| b == 0), "a refused readback must not fill the output");
}

/// Uploads from a worker thread wait in the queue until `draw_begin`.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_uploads_from_other_threads_are_deferred(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffer = ctx
        .device
        .create_buffer(None, 16, 4, BufferType::Constant, Usage::DYNAMIC)
        .unwrap();
    let worker = Arc::clone(&buffer);
    std::thread::spawn(move || worker.set_contents(&[1u8; 64]))
        .join()
        .unwrap();

    assert_eq!(ctx.device.pending_updates(), 1);
    ctx.device.draw_begin();
    assert_eq!(ctx.device.pending_updates(), 0);

    if let Some(stats) = ctx.device.backend_stats() {
        assert_eq!(stats.uploads, 1);
    }
}

// ============================================================================
// Texture Tests
// ============================================================================

/// A 128x64 texture with generated mips gets the whole chain down to 1x1.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_generated_mip_chain(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let texture = ctx
        .device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::Generate)
        .unwrap();
    texture.set_contents(&solid_rgba(128, 64, [200, 100, 50, 255]), 128, 64);

    assert!(texture.has_contents());
    assert_eq!(texture.mip_count(), mip_count(128, 64));
    assert_eq!(texture.mip_count(), 8);

    let last = texture.mip_count() - 1;
    let mut texel = [0u8; 4];
    texture.get_mip_contents(last, &mut texel).unwrap();
    // A solid image averages to itself, within filtering error on the GPU.
    for (got, want) in texel.iter().zip([200u8, 100, 50, 255]) {
        assert!(got.abs_diff(want) <= 2, "last mip {texel:?}");
    }
}

/// Software mips weight color by alpha, so transparent texels don't darken
/// their opaque neighbours.
#[test]
fn test_software_mips_are_alpha_weighted() {
    let device = null_device();
    let texture = device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::Generate)
        .unwrap();
    let data = [
        255, 0, 0, 255, //
        0, 0, 0, 0, //
        0, 0, 0, 0, //
        0, 0, 0, 0,
    ];
    texture.set_contents(&data, 2, 2);

    let mut texel = [0u8; 4];
    texture.get_mip_contents(1, &mut texel).unwrap();
    assert_eq!(&texel[..3], &[255, 0, 0]);
    assert!(texel[3] > 0 && texel[3] < 255);
}

/// Mip 0 reads back exactly what was uploaded.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_texture_readback(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let data = checker_rgba(16, 8);
    let texture = ctx
        .device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    texture.set_contents(&data, 16, 8);
    assert_eq!(texture.mip_count(), 1);

    let mut out = vec![0u8; data.len()];
    texture.get_contents(&mut out).unwrap();
    assert_eq!(out, data);

    let mut mip = vec![0u8; 32];
    assert!(texture.get_mip_contents(1, &mut mip).is_err());
}

/// Array layers are stored and read back independently.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_texture_array_layers(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let red = solid_rgba(4, 4, [255, 0, 0, 255]);
    let blue = solid_rgba(4, 4, [0, 0, 255, 255]);
    let texture = ctx
        .device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    texture.set_contents_arr(&[&red, &blue], 2, 1, 4, 4, 1);
    assert_eq!(texture.array_count(), 2);

    let mut out = vec![0u8; red.len()];
    texture.get_mip_contents_arr(0, 1, &mut out).unwrap();
    assert_eq!(out, blue);
}

/// PVRTC is rejected up front on a backend that can't sample it.
#[test]
fn test_unsupported_format_fails_early() {
    let device = null_device();
    assert!(!device.format_supported(TexFormat::Pvrtc1Rgba));
    let result = device.create_texture(
        TexType::Image,
        Usage::STATIC,
        TexFormat::Pvrtc1Rgba,
        MipPolicy::None,
    );
    assert!(matches!(result, Err(GpuError::FormatUnsupported(TexFormat::Pvrtc1Rgba))));
}

/// Re-uploading a dynamic texture at a new size replaces its storage, so the
/// next bind must reach the backend even into the slot it already held.
#[test]
fn test_resized_dynamic_texture_is_rebound() {
    let device = null_device();
    let texture = device
        .create_texture(TexType::Image, Usage::DYNAMIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    let slot = Bind::new(0, StageBits::PIXEL, RegisterType::Resource);

    texture.set_contents(&solid_rgba(2, 2, [255; 4]), 2, 2);
    texture.bind(slot);
    texture.set_contents(&solid_rgba(2, 2, [0; 4]), 2, 2);
    texture.bind(slot);
    assert_eq!(device.backend_stats().unwrap().texture_binds, 1);

    texture.set_contents(&solid_rgba(4, 4, [9; 4]), 4, 4);
    assert_eq!(texture.width(), 4);
    texture.bind(slot);
    assert_eq!(device.backend_stats().unwrap().texture_binds, 2);
}

/// A bound dynamic target that is reallocated stays bound at its new size.
#[test]
fn test_resized_dynamic_target_stays_bound() {
    let device = null_device();
    let target = device
        .create_texture(TexType::RenderTarget, Usage::DYNAMIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents(&solid_rgba(8, 8, [0; 4]), 8, 8);
    device.target_bind(Some(&target), -1, 0);

    target.set_contents(&solid_rgba(16, 16, [0; 4]), 16, 16);
    assert_eq!(device.target_get().map(|t| t.texture), Some(target.id()));
    assert_eq!(device.viewport_get(), Rect::new(0, 0, 16, 16));

    device.target_clear(false, Some([1.0, 0.0, 0.0, 1.0]));
    let mut out = vec![0u8; 16 * 16 * 4];
    target.get_contents(&mut out).unwrap();
    assert_eq!(out, solid_rgba(16, 16, [255, 0, 0, 255]));
}

/// Data larger than the texture is rejected rather than truncated.
#[test]
fn test_oversized_texture_data_is_rejected() {
    let device = null_device();
    let texture = device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();

    let logs = capture_logs(|| texture.set_contents(&solid_rgba(4, 4, [1; 4]), 2, 2));
    assert!(has_critical(&logs, "expected exactly 16"), "{logs:?}");
    assert!(!texture.has_contents());
}

/// Sizes past 4 GiB are computed without overflowing, and sizes that can't
/// be addressed at all fail with a logged error.
#[test]
fn test_huge_texture_sizes() {
    assert_eq!(TexFormat::Rgba128.memory(16384, 16384), Some(4 << 30));

    let device = null_device();
    let texture = device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba128, MipPolicy::None)
        .unwrap();
    let logs = capture_logs(|| texture.set_contents_arr(&[], 1, 1, u32::MAX, u32::MAX, 1));
    assert!(has_critical(&logs, "too large"), "{logs:?}");
    assert!(!texture.has_contents());
}

/// A depth buffer with a different layer count than its target is refused.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_attach_depth_layer_mismatch(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let target = ctx
        .device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 2, 1, 32, 32, 1);
    let depth = ctx
        .device
        .create_texture(TexType::Depth, Usage::STATIC, TexFormat::Depth32, MipPolicy::None)
        .unwrap();
    depth.set_contents_arr(&[], 1, 1, 32, 32, 1);

    let logs = capture_logs(|| target.attach_depth(&depth));
    assert!(has_warning(&logs, "Mismatching array count"), "{logs:?}");
    assert!(target.depth().is_none());
}

// ============================================================================
// Target Tests
// ============================================================================

/// Binding a target resets the viewport to the bound mip's size.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_target_bind_sets_viewport(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let target = ctx
        .device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 1, 1, 64, 32, 1);

    ctx.device.draw_begin();
    ctx.device.target_bind(Some(&target), 0, 0);
    assert_eq!(ctx.device.viewport_get(), Rect::new(0, 0, 64, 32));
    let bound = ctx.device.target_get().unwrap();
    assert_eq!(bound.texture, target.id());
    assert_eq!((bound.layer, bound.mip), (0, 0));

    ctx.device.target_bind(None, -1, 0);
    assert!(ctx.device.target_get().is_none());
}

/// Clearing a bound target fills it with the clear color.
#[rstest]
#[case::null(Backend::Null)]
#[case::wgpu(Backend::Wgpu)]
fn test_target_clear(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let target = ctx
        .device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 1, 1, 8, 8, 1);

    ctx.device.draw_begin();
    ctx.device.target_bind(Some(&target), -1, 0);
    ctx.device.target_clear(false, Some([0.0, 1.0, 0.0, 1.0]));

    let mut out = vec![0u8; 8 * 8 * 4];
    target.get_contents(&mut out).unwrap();
    assert_eq!(out, solid_rgba(8, 8, [0, 255, 0, 255]));
}

/// Only render targets can be bound as a target.
#[test]
fn test_image_cannot_be_a_target() {
    let device = null_device();
    let image = device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    image.set_contents(&solid_rgba(4, 4, [0; 4]), 4, 4);

    let logs = capture_logs(|| device.target_bind(Some(&image), -1, 0));
    assert!(has_warning(&logs, "render target"), "{logs:?}");
    assert!(device.target_get().is_none());
}

/// Dropping the bound target falls back to the backbuffer.
#[test]
fn test_dropping_bound_target_restores_backbuffer() {
    let device = null_device();
    let target = device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 1, 1, 16, 16, 1);

    device.target_bind(Some(&target), -1, 0);
    assert!(device.target_get().is_some());
    drop(target);
    assert!(device.target_get().is_none());
    assert_eq!(device.texture_count(), 0);
}

/// One layer of a foreign two-layer texture can be wrapped and rendered to.
#[test]
fn test_texture_from_layer() {
    let device = null_device();
    let native = NullNativeTexture {
        width: 16,
        height: 16,
        array_count: 2,
        multisample: 1,
        mip_count: 1,
        format: 28,
    };

    // SAFETY: null native textures describe storage the backend allocates itself.
    let eye = unsafe {
        device.create_texture_from_layer(
            NativeTexture::Null(native),
            TexType::RenderTarget,
            TexFormat::None,
            16,
            16,
            1,
        )
    }
    .unwrap();
    assert_eq!(eye.format(), TexFormat::Rgba32Linear);
    assert_eq!(eye.array_count(), 1);
    assert_eq!(eye.desc().array_start, 1);

    device.target_bind(Some(&eye), -1, 0);
    device.target_clear(false, Some([0.0, 0.0, 1.0, 1.0]));
    let mut out = vec![0u8; 16 * 16 * 4];
    eye.get_contents(&mut out).unwrap();
    assert_eq!(out, solid_rgba(16, 16, [0, 0, 255, 255]));

    // SAFETY: as above.
    let missing = unsafe {
        device.create_texture_from_layer(
            NativeTexture::Null(native),
            TexType::RenderTarget,
            TexFormat::None,
            16,
            16,
            2,
        )
    };
    assert!(matches!(missing, Err(GpuError::Misuse(_))));
}

// ============================================================================
// Shader Tests
// ============================================================================

/// Two shaders loaded from the same bytes share one metadata object.
#[test]
fn test_identical_shader_files_share_meta() {
    let device = null_device();
    let bytes = unlit_sks("unlit", device.shader_language());

    let a = device.create_shader_from_memory(&bytes).unwrap();
    let b = device.create_shader_from_memory(&bytes).unwrap();
    assert!(Arc::ptr_eq(a.meta(), b.meta()));
    assert_eq!(Arc::strong_count(a.meta()), 2);

    let weak = Arc::downgrade(a.meta());
    drop(a);
    assert_eq!(weak.strong_count(), 1);
    assert_eq!(b.name(), "unlit");
    assert!(b.get_bind("diffuse").is_some());
    assert!(device.create_pipeline(&b).is_ok());

    drop(b);
    assert_eq!(weak.strong_count(), 0);
}

/// Binding the same pipeline again issues no state changes.
#[test]
fn test_pipeline_rebind_is_free() {
    let device = null_device();
    let shader = device
        .create_shader_from_memory(&unlit_sks("unlit", device.shader_language()))
        .unwrap();
    let pipeline = device.create_pipeline(&shader).unwrap();

    pipeline.bind();
    let after_first = device.backend_stats().unwrap().state_calls;
    assert!(after_first > 0);
    pipeline.bind();
    assert_eq!(device.backend_stats().unwrap().state_calls, after_first);

    pipeline.set_depth_write(false);
    pipeline.bind();
    assert_eq!(device.backend_stats().unwrap().state_calls, after_first + 1);
}

/// Buffers and textures already in a slot aren't rebound.
#[test]
fn test_resource_rebind_is_free() {
    let device = null_device();
    let constants = device
        .create_buffer(None, 1, 32, BufferType::Constant, Usage::DYNAMIC)
        .unwrap();
    let texture = device
        .create_texture(TexType::Image, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    texture.set_contents(&solid_rgba(2, 2, [255; 4]), 2, 2);

    let slot = Bind::new(0, StageBits::PIXEL, RegisterType::Constant);
    constants.bind(slot);
    constants.bind(slot);
    let tex_slot = Bind::new(0, StageBits::PIXEL, RegisterType::Resource);
    texture.bind(tex_slot);
    texture.bind(tex_slot);

    let stats = device.backend_stats().unwrap();
    assert_eq!(stats.buffer_binds, 1);
    assert_eq!(stats.texture_binds, 1);
}

/// A full frame against the null backend reaches every counter.
#[test]
fn test_draw_frame() {
    let device = null_device();
    let shader = device
        .create_shader_from_memory(&unlit_sks("unlit", device.shader_language()))
        .unwrap();
    let pipeline = device.create_pipeline(&shader).unwrap();

    let vertices = [Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2], [255; 4]); 3];
    let vb = device
        .create_buffer(
            Some(bytemuck::cast_slice(&vertices)),
            3,
            std::mem::size_of::<Vertex>() as u32,
            BufferType::Vertex,
            Usage::STATIC,
        )
        .unwrap();
    let ib = device
        .create_buffer(
            Some(bytemuck::cast_slice(&[0u32, 1, 2])),
            3,
            4,
            BufferType::Index,
            Usage::STATIC,
        )
        .unwrap();
    let mesh = device.create_mesh(Some(&vb), Some(&ib));
    assert_eq!(mesh.index_count(), 3);

    let target = device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 1, 1, 32, 32, 1);

    device.draw_begin();
    device.target_bind(Some(&target), -1, 0);
    device.target_clear(true, Some([0.0, 0.0, 0.0, 1.0]));
    pipeline.bind();
    mesh.bind();
    device.draw(0, 0, mesh.index_count(), 1);

    let stats = device.backend_stats().unwrap();
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.clears, 1);
    assert_eq!(stats.buffer_binds, 2);
}

/// A draw whose index range wraps past `u32::MAX` is skipped.
#[test]
fn test_overflowing_draw_is_skipped() {
    let device = null_device();
    let logs = capture_logs(|| device.draw(u32::MAX - 1, 0, 3, 1));
    assert!(has_warning(&logs, "range overflows"), "{logs:?}");
    assert_eq!(device.backend_stats().unwrap().draws, 0);
}

// ============================================================================
// Swapchain Tests
// ============================================================================

/// Resizing to the current size keeps the same target and depth textures.
#[test]
fn test_swapchain_resize_to_same_size_is_noop() {
    let device = null_device();
    let swapchain = device
        .create_swapchain(
            Arc::new(HeadlessWindow),
            TexFormat::Rgba32Linear,
            TexFormat::Depth32,
            800,
            600,
        )
        .unwrap();
    assert_eq!(swapchain.color_format(), TexFormat::Rgba32);

    let target = swapchain.target();
    let depth = swapchain.depth().unwrap();
    swapchain.resize(800, 600).unwrap();
    assert!(Arc::ptr_eq(&target, &swapchain.target()));
    assert!(Arc::ptr_eq(&depth, &swapchain.depth().unwrap()));

    swapchain.resize(1024, 768).unwrap();
    assert!(!Arc::ptr_eq(&target, &swapchain.target()));
    assert_eq!(swapchain.target().width(), 1024);
    assert_eq!(swapchain.depth().unwrap().height(), 768);
}

/// Unbinding a texture target restores the swapchain-sized viewport.
#[test]
fn test_backbuffer_viewport_is_restored() {
    let device = null_device();
    let swapchain = device
        .create_swapchain(
            Arc::new(HeadlessWindow),
            TexFormat::Rgba32,
            TexFormat::None,
            800,
            600,
        )
        .unwrap();
    assert!(swapchain.depth().is_none());

    let target = device
        .create_texture(TexType::RenderTarget, Usage::STATIC, TexFormat::Rgba32Linear, MipPolicy::None)
        .unwrap();
    target.set_contents_arr(&[], 1, 1, 64, 64, 1);

    device.draw_begin();
    swapchain.bind();
    assert_eq!(device.viewport_get(), Rect::new(0, 0, 800, 600));
    device.target_bind(Some(&target), -1, 0);
    assert_eq!(device.viewport_get(), Rect::new(0, 0, 64, 64));
    device.target_bind(None, -1, 0);
    assert_eq!(device.viewport_get(), Rect::new(0, 0, 800, 600));

    swapchain.present();
    assert_eq!(device.backend_stats().unwrap().presents, 1);
}

/// After a resize, rendering goes to the new surface without rebinding.
#[test]
fn test_swapchain_resize_moves_rendering() {
    let device = null_device();
    let swapchain = device
        .create_swapchain(
            Arc::new(HeadlessWindow),
            TexFormat::Rgba32,
            TexFormat::Depth32,
            8,
            8,
        )
        .unwrap();

    device.draw_begin();
    swapchain.bind();
    swapchain.resize(4, 4).unwrap();
    assert!(device.target_get().is_none());
    assert_eq!(device.viewport_get(), Rect::new(0, 0, 4, 4));

    device.target_clear(true, Some([1.0, 0.0, 0.0, 1.0]));
    let mut out = vec![0u8; 4 * 4 * 4];
    swapchain.target().get_contents(&mut out).unwrap();
    assert_eq!(out, solid_rgba(4, 4, [255, 0, 0, 255]));
}
