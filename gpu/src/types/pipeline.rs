//! Fixed-function pipeline state.

/// Blending mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transparency {
    #[default]
    None,
    AlphaToCoverage,
    /// Source-alpha blending for color, max for alpha.
    Blend,
    /// Additive blending.
    Add,
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cull {
    #[default]
    Back,
    Front,
    None,
}

/// Depth comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTest {
    #[default]
    Less,
    LessOrEq,
    Greater,
    GreaterOrEq,
    Equal,
    NotEqual,
    Always,
    Never,
}

/// All fixed-function state a pipeline carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub transparency: Transparency,
    pub cull: Cull,
    pub depth_test: DepthTest,
    pub depth_write: bool,
    pub wireframe: bool,
    pub scissor: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            transparency: Transparency::None,
            cull: Cull::Back,
            depth_test: DepthTest::Less,
            depth_write: true,
            wireframe: false,
            scissor: false,
        }
    }
}

impl PipelineState {
    /// Whether a depth buffer needs to be read or written at all.
    pub fn depth_enabled(&self) -> bool {
        self.depth_write || self.depth_test != DepthTest::Always
    }
}

/// Backend state object a pipeline field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateGroup {
    /// Cull, wireframe and scissor.
    Raster,
    /// Transparency.
    Blend,
    /// Depth test and depth write.
    Depth,
}

/// One state change against the currently applied table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    /// Shader program switch, keyed by shader id.
    Program(u64),
    Transparency(Transparency),
    Cull(Cull),
    Scissor(bool),
    DepthWrite(bool),
    DepthTestEnabled(bool),
    DepthFunc(DepthTest),
    Wireframe(bool),
}
