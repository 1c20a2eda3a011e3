//! Shader binary (`.sks`) container.
//!
//! The offline compiler emits one self-describing file per shader holding
//! reflection metadata plus a compiled blob per (language, stage). All
//! integers are little-endian and strings are fixed-size NUL-padded arrays.
//!
//! ```text
//! "SKSHADER" | version u16 | stage_count u32 | name[256]
//! buffer_count u32 | resource_count u32 | vertex_input_count i32
//! ops_vertex {total, tex_read, dynamic_flow: i32} | ops_pixel {..}
//! buffers   { name[32] bind(4) size var_count default_size defaults vars{..} }
//! inputs    { format i32 | semantic i32 | semantic_slot u8 }
//! resources { name[32] value[64] tags[64] bind(4) }
//! stages    { language i32 | stage i32 | code_size u32 | code }
//! ```

use crate::error::GpuError;
use crate::format::{Semantic, VertexFormat};
use crate::types::{Bind, RegisterType, ShaderLanguage, StageBits};

use super::meta::{
    ShaderBuffer, ShaderMeta, ShaderOps, ShaderResource, ShaderVar, ShaderVarType, VertexInput,
    hash_bytes,
};

/// File magic.
pub const MAGIC: &[u8; 8] = b"SKSHADER";
/// The only container version this loader accepts.
pub const VERSION: u16 = 3;

const NAME_LEN: usize = 256;
const SHORT_NAME_LEN: usize = 32;
const EXTRA_LEN: usize = 64;

/// Version and name read from a file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFileHeader {
    pub version: u16,
    pub name: String,
}

/// One compiled stage blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFileStage {
    pub language: ShaderLanguage,
    /// Exactly one of vertex, pixel or compute.
    pub stage: StageBits,
    pub code: Vec<u8>,
}

/// A decoded shader binary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderFile {
    pub meta: ShaderMeta,
    pub stages: Vec<ShaderFileStage>,
}

/// Check magic and version without parsing anything else.
pub fn verify(bytes: &[u8]) -> bool {
    matches!(header(bytes), Some(h) if h.version == VERSION)
}

/// Read the version and shader name from a file with a valid magic.
pub fn header(bytes: &[u8]) -> Option<ShaderFileHeader> {
    if bytes.len() < 10 || &bytes[..8] != MAGIC {
        return None;
    }
    let version = u16::from_le_bytes([bytes[8], bytes[9]]);
    let name = bytes
        .get(14..14 + NAME_LEN)
        .map(fixed_str)
        .unwrap_or_default();
    Some(ShaderFileHeader { version, name })
}

impl ShaderFile {
    /// Decode every stage blob in the file.
    pub fn load(bytes: &[u8]) -> Result<Self, GpuError> {
        Self::parse(bytes, None)
    }

    /// Decode metadata and only the blobs written in `language`.
    ///
    /// Blobs in other languages are skipped without being copied.
    pub fn load_for(bytes: &[u8], language: ShaderLanguage) -> Result<Self, GpuError> {
        Self::parse(bytes, Some(language))
    }

    /// Code for `stage`, if present.
    pub fn stage(&self, stage: StageBits) -> Option<&[u8]> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.code.as_slice())
    }

    /// Code for `stage` in `language`, if present.
    pub fn stage_for(&self, language: ShaderLanguage, stage: StageBits) -> Option<&[u8]> {
        self.stages
            .iter()
            .find(|s| s.language == language && s.stage == stage)
            .map(|s| s.code.as_slice())
    }

    fn parse(bytes: &[u8], language: Option<ShaderLanguage>) -> Result<Self, GpuError> {
        match header(bytes) {
            None => return Err(GpuError::ShaderFormat("bad magic".into())),
            Some(h) if h.version != VERSION => {
                return Err(GpuError::ShaderFormat(format!(
                    "unsupported version {} (expected {VERSION})",
                    h.version
                )));
            }
            Some(_) => {}
        }

        let mut r = Reader::new(bytes, 10);
        let stage_count = r.u32()?;
        let mut meta = ShaderMeta::new(r.name(NAME_LEN)?);
        let buffer_count = r.u32()?;
        let resource_count = r.u32()?;
        let vertex_input_count = r.i32()?;
        if vertex_input_count < 0 {
            return Err(GpuError::ShaderFormat("negative vertex input count".into()));
        }
        meta.ops_vertex = r.ops()?;
        meta.ops_pixel = r.ops()?;

        for _ in 0..buffer_count {
            let name = r.name(SHORT_NAME_LEN)?;
            let bind = r.bind()?;
            let size = r.u32()?;
            let var_count = r.u32()?;
            let default_size = r.u32()? as usize;
            let mut buffer = ShaderBuffer::new(name, bind, size);
            if default_size != 0 {
                buffer.defaults = Some(r.bytes(default_size)?.to_vec());
            }
            for _ in 0..var_count {
                let name = r.name(SHORT_NAME_LEN)?;
                let extra = r.name(EXTRA_LEN)?;
                let offset = r.u32()?;
                let size = r.u32()?;
                let ty = r.u16()?;
                let ty = ShaderVarType::from_u16(ty)
                    .ok_or_else(|| GpuError::ShaderFormat(format!("unknown variable type {ty}")))?;
                let type_count = r.u16()?;
                buffer
                    .vars
                    .push(ShaderVar::new(name, offset, size, ty, type_count).with_extra(extra));
            }
            meta.buffers.push(buffer);
        }
        meta.refresh_global();

        for _ in 0..vertex_input_count {
            let format = r.i32()?;
            let semantic = r.i32()?;
            let semantic_slot = r.u8()?;
            meta.vertex_inputs.push(VertexInput {
                format: VertexFormat::from_i32(format).ok_or_else(|| {
                    GpuError::ShaderFormat(format!("unknown vertex format {format}"))
                })?,
                semantic: Semantic::from_i32(semantic).ok_or_else(|| {
                    GpuError::ShaderFormat(format!("unknown semantic {semantic}"))
                })?,
                semantic_slot,
            });
        }

        for _ in 0..resource_count {
            let name = r.name(SHORT_NAME_LEN)?;
            let value = r.name(EXTRA_LEN)?;
            let tags = r.name(EXTRA_LEN)?;
            let bind = r.bind()?;
            meta.resources
                .push(ShaderResource::new(name, bind).with_value(value).with_tags(tags));
        }

        let mut stages = Vec::new();
        for _ in 0..stage_count {
            let lang = r.i32()?;
            let lang = ShaderLanguage::from_i32(lang)
                .ok_or_else(|| GpuError::ShaderFormat(format!("unknown language {lang}")))?;
            let stage = r.i32()?;
            let stage = u8::try_from(stage)
                .ok()
                .and_then(StageBits::from_bits)
                .filter(|s| s.bits().count_ones() == 1)
                .ok_or_else(|| GpuError::ShaderFormat(format!("unknown stage {stage}")))?;
            let code_size = r.u32()? as usize;

            if language.is_some_and(|wanted| wanted != lang) {
                r.skip(code_size)?;
                continue;
            }
            stages.push(ShaderFileStage {
                language: lang,
                stage,
                code: r.bytes(code_size)?.to_vec(),
            });
        }

        log::trace!(
            "ShaderFile: loaded '{}' ({} buffers, {} resources, {} stages kept)",
            meta.name,
            meta.buffers.len(),
            meta.resources.len(),
            stages.len()
        );
        Ok(Self { meta, stages })
    }

    /// Serialize into the container layout.
    ///
    /// Names longer than their fixed field are truncated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let meta = &self.meta;
        let mut w = Writer::default();
        w.raw(MAGIC);
        w.u16(VERSION);
        w.u32(self.stages.len() as u32);
        w.name(&meta.name, NAME_LEN);
        w.u32(meta.buffers.len() as u32);
        w.u32(meta.resources.len() as u32);
        w.i32(meta.vertex_inputs.len() as i32);
        w.ops(&meta.ops_vertex);
        w.ops(&meta.ops_pixel);

        for buffer in &meta.buffers {
            w.name(&buffer.name, SHORT_NAME_LEN);
            w.bind(&buffer.bind);
            w.u32(buffer.size);
            w.u32(buffer.vars.len() as u32);
            match &buffer.defaults {
                Some(defaults) => {
                    w.u32(defaults.len() as u32);
                    w.raw(defaults);
                }
                None => w.u32(0),
            }
            for var in &buffer.vars {
                w.name(&var.name, SHORT_NAME_LEN);
                w.name(&var.extra, EXTRA_LEN);
                w.u32(var.offset);
                w.u32(var.size);
                w.u16(var.ty as u16);
                w.u16(var.type_count);
            }
        }

        for input in &meta.vertex_inputs {
            w.i32(input.format as i32);
            w.i32(input.semantic as i32);
            w.raw(&[input.semantic_slot]);
        }

        for resource in &meta.resources {
            w.name(&resource.name, SHORT_NAME_LEN);
            w.name(&resource.value, EXTRA_LEN);
            w.name(&resource.tags, EXTRA_LEN);
            w.bind(&resource.bind);
        }

        for stage in &self.stages {
            w.i32(stage.language as i32);
            w.i32(stage.stage.bits() as i32);
            w.u32(stage.code.len() as u32);
            w.raw(&stage.code);
        }

        w.0
    }
}

/// Read a NUL-terminated string out of a fixed-size field.
fn fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ============================================================================
// Cursor helpers
// ============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], at: usize) -> Self {
        Self { bytes, at }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], GpuError> {
        let end = self.at.checked_add(len).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(GpuError::ShaderFormat(format!(
                "truncated at byte {} (wanted {len} more)",
                self.at
            )));
        };
        let slice = &self.bytes[self.at..end];
        self.at = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), GpuError> {
        self.bytes(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], GpuError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, GpuError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, GpuError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, GpuError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, GpuError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn name(&mut self, len: usize) -> Result<String, GpuError> {
        self.bytes(len).map(fixed_str)
    }

    fn bind(&mut self) -> Result<Bind, GpuError> {
        let slot = self.u16()?;
        let stage_bits = self.u8()?;
        let register = self.u8()?;
        Ok(Bind {
            slot,
            stage_bits: StageBits::from_bits_truncate(stage_bits),
            register_type: RegisterType::from_u8(register).ok_or_else(|| {
                GpuError::ShaderFormat(format!("unknown register type {register}"))
            })?,
        })
    }

    fn ops(&mut self) -> Result<ShaderOps, GpuError> {
        Ok(ShaderOps {
            total: self.i32()?,
            tex_read: self.i32()?,
            dynamic_flow: self.i32()?,
        })
    }
}

#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn raw(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn u16(&mut self, v: u16) {
        self.raw(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.raw(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.raw(&v.to_le_bytes());
    }

    /// Fixed field, always NUL-terminated.
    fn name(&mut self, name: &str, len: usize) {
        let bytes = name.as_bytes();
        let used = bytes.len().min(len - 1);
        self.raw(&bytes[..used]);
        self.0.resize(self.0.len() + (len - used), 0);
    }

    fn bind(&mut self, bind: &Bind) {
        self.u16(bind.slot);
        self.raw(&[bind.stage_bits.bits(), bind.register_type as u8]);
    }

    fn ops(&mut self, ops: &ShaderOps) {
        self.i32(ops.total);
        self.i32(ops.tex_read);
        self.i32(ops.dynamic_flow);
    }
}

/// Hash of a whole file, used to intern metadata parsed from identical bytes.
pub(crate) fn content_hash(bytes: &[u8]) -> u64 {
    hash_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::meta::GLOBAL_BUFFER_NAME;

    fn sample_file() -> ShaderFile {
        let mut meta = ShaderMeta::new("unlit")
            .with_buffer(
                ShaderBuffer::new(
                    GLOBAL_BUFFER_NAME,
                    Bind::new(1, StageBits::VERTEX | StageBits::PIXEL, RegisterType::Constant),
                    32,
                )
                .with_defaults(vec![7; 32])
                .with_var(ShaderVar::new("color", 0, 16, ShaderVarType::Float, 4).with_extra("{color}"))
                .with_var(ShaderVar::new("count", 16, 4, ShaderVarType::Uint, 1)),
            )
            .with_resource(
                ShaderResource::new("diffuse", Bind::new(0, StageBits::PIXEL, RegisterType::Resource))
                    .with_value("white")
                    .with_tags("srgb"),
            )
            .with_vertex_input(VertexInput {
                format: VertexFormat::F32,
                semantic: Semantic::Position,
                semantic_slot: 0,
            });
        meta.ops_vertex = ShaderOps {
            total: 12,
            tex_read: 0,
            dynamic_flow: 1,
        };
        meta.ops_pixel = ShaderOps {
            total: 30,
            tex_read: 2,
            dynamic_flow: 0,
        };
        ShaderFile {
            meta,
            stages: vec![
                ShaderFileStage {
                    language: ShaderLanguage::Hlsl,
                    stage: StageBits::VERTEX,
                    code: vec![1, 2, 3],
                },
                ShaderFileStage {
                    language: ShaderLanguage::Spirv,
                    stage: StageBits::VERTEX,
                    code: vec![4, 5, 6, 7],
                },
                ShaderFileStage {
                    language: ShaderLanguage::Hlsl,
                    stage: StageBits::PIXEL,
                    code: vec![8],
                },
            ],
        }
    }

    #[test]
    fn test_verify() {
        let bytes = sample_file().to_bytes();
        assert!(verify(&bytes));
        assert_eq!(header(&bytes).map(|h| h.name), Some("unlit".to_string()));
        assert!(!verify(&bytes[..9]));
    }

    #[test]
    fn test_verify_rejects_bad_magic() {
        let mut bytes = sample_file().to_bytes();
        bytes[0] = b'X';
        assert!(!verify(&bytes));
        assert!(matches!(ShaderFile::load(&bytes), Err(GpuError::ShaderFormat(_))));
    }

    #[test]
    fn test_verify_rejects_other_versions() {
        let mut bytes = sample_file().to_bytes();
        bytes[8..10].copy_from_slice(&2u16.to_le_bytes());
        assert!(!verify(&bytes));
        assert_eq!(header(&bytes).map(|h| h.version), Some(2));
        assert!(ShaderFile::load(&bytes).is_err());
    }

    #[test]
    fn test_round_trip() {
        let file = sample_file();
        let loaded = ShaderFile::load(&file.to_bytes()).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.meta.global_buffer_id(), Some(0));
    }

    #[test]
    fn test_load_for_skips_other_languages() {
        let bytes = sample_file().to_bytes();
        let spirv = ShaderFile::load_for(&bytes, ShaderLanguage::Spirv).unwrap();
        assert_eq!(spirv.stages.len(), 1);
        assert_eq!(spirv.stage(StageBits::VERTEX), Some(&[4u8, 5, 6, 7][..]));
        assert_eq!(spirv.stage(StageBits::PIXEL), None);

        let glsl = ShaderFile::load_for(&bytes, ShaderLanguage::Glsl).unwrap();
        assert!(glsl.stages.is_empty());
        assert_eq!(glsl.meta, sample_file().meta);
    }

    #[test]
    fn test_truncated_file_fails_closed() {
        let bytes = sample_file().to_bytes();
        for cut in [12, 300, bytes.len() - 1] {
            assert!(ShaderFile::load(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_long_names_are_truncated() {
        let mut file = sample_file();
        file.meta.buffers[0].vars[0].name = "x".repeat(40);
        let loaded = ShaderFile::load(&file.to_bytes()).unwrap();
        assert_eq!(loaded.meta.buffers[0].vars[0].name, "x".repeat(31));
    }

    #[test]
    fn test_content_hash_differs() {
        let a = sample_file().to_bytes();
        let mut b = a.clone();
        *b.last_mut().unwrap() ^= 0xff;
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a), content_hash(&a.clone()));
    }
}
