//! Pluggable file reading.
//!
//! Shader loads go through [`read_file`], so a host platform with a packaged
//! asset filesystem can install its own reader with [`set_file_reader`].

use std::path::Path;

use parking_lot::RwLock;

/// Reads a whole file, returning `None` when it cannot be read.
pub type FileReader = Box<dyn Fn(&Path) -> Option<Vec<u8>> + Send + Sync>;

static READER: RwLock<Option<FileReader>> = parking_lot::const_rwlock(None);

/// Install a custom file reader, or restore the filesystem default with `None`.
pub fn set_file_reader(reader: Option<FileReader>) {
    *READER.write() = reader;
}

/// Read a file through the installed reader.
pub fn read_file(path: impl AsRef<Path>) -> Option<Vec<u8>> {
    let path = path.as_ref();
    let reader = READER.read();
    match reader.as_ref() {
        Some(reader) => reader(path),
        None => match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::trace!("read_file: {} failed: {e}", path.display());
                None
            }
        },
    }
}
