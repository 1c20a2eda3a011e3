//! Shader loading through an installed file reader.
//!
//! Kept in its own test binary because the reader is process-wide.

mod common;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{null_device, unlit_sks};
use redlilium_gpu::{GpuError, set_file_reader};

#[test]
fn test_shaders_load_through_file_reader() {
    let device = null_device();
    let mut files: HashMap<PathBuf, Vec<u8>> = HashMap::new();
    files.insert(
        PathBuf::from("assets/unlit.sks"),
        unlit_sks("unlit", device.shader_language()),
    );
    let files = Arc::new(files);

    let lookup = Arc::clone(&files);
    set_file_reader(Some(Box::new(move |path: &Path| lookup.get(path).cloned())));

    let shader = device.create_shader_from_file("assets/unlit.sks").unwrap();
    assert_eq!(shader.name(), "unlit");
    assert!(shader.is_valid());

    let missing = device.create_shader_from_file("assets/missing.sks");
    assert!(matches!(missing, Err(GpuError::FileNotFound(_))));

    // Without a reader, loads go to the real filesystem again.
    set_file_reader(None);
    let result = device.create_shader_from_file("assets/unlit.sks");
    assert!(matches!(result, Err(GpuError::FileNotFound(_))));
}

#[test]
fn test_corrupt_file_is_rejected() {
    let device = null_device();
    let mut bytes = unlit_sks("broken", device.shader_language());
    bytes[0] = b'X';
    assert!(matches!(
        device.create_shader_from_memory(&bytes),
        Err(GpuError::ShaderFormat(_))
    ));
}
