//! Backend state cache.
//!
//! Tracks what is currently applied on the device so that redundant binds
//! never reach the backend. Pipeline state is tracked field by field, the
//! way a bound-state-machine driver sees it: re-binding an unchanged
//! pipeline produces no [`StateChange`]s at all.

use std::collections::HashMap;

use crate::types::{Cull, DepthTest, PipelineState, RegisterType, Rect, StateChange, Transparency};

/// Key for a buffer or texture binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub register: RegisterType,
    pub slot: u16,
}

/// Currently bound render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetBinding {
    /// Id of the bound texture.
    pub texture: u64,
    /// Array layer, or -1 for the aggregate view.
    pub layer: i32,
    pub mip: u32,
}

/// Table of everything currently applied on the device.
#[derive(Debug, Default)]
pub struct StateCache {
    program: Option<u64>,
    transparency: Option<Transparency>,
    cull: Option<Cull>,
    scissor: Option<bool>,
    depth_write: Option<bool>,
    depth_test: Option<bool>,
    depth_func: Option<DepthTest>,
    wireframe: Option<bool>,

    pipeline: Option<u64>,
    compute: Option<u64>,
    target: Option<TargetBinding>,
    viewport: Rect,
    slots: HashMap<SlotKey, u64>,
}

macro_rules! check {
    ($changes:ident, $field:expr, $value:expr, $change:expr) => {
        if $field != Some($value) {
            $field = Some($value);
            $changes.push($change);
        }
    };
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pipeline bind and return the field changes it implies.
    ///
    /// The second element is true when the pipeline object itself differs
    /// from the one last bound.
    pub fn bind_pipeline(
        &mut self,
        pipeline: u64,
        program: u64,
        state: &PipelineState,
    ) -> (Vec<StateChange>, bool) {
        let mut changes = Vec::new();
        check!(changes, self.program, program, StateChange::Program(program));
        check!(
            changes,
            self.transparency,
            state.transparency,
            StateChange::Transparency(state.transparency)
        );
        check!(changes, self.cull, state.cull, StateChange::Cull(state.cull));
        check!(changes, self.scissor, state.scissor, StateChange::Scissor(state.scissor));
        check!(
            changes,
            self.depth_write,
            state.depth_write,
            StateChange::DepthWrite(state.depth_write)
        );
        let depth_test = state.depth_test != DepthTest::Always;
        check!(changes, self.depth_test, depth_test, StateChange::DepthTestEnabled(depth_test));
        check!(
            changes,
            self.depth_func,
            state.depth_test,
            StateChange::DepthFunc(state.depth_test)
        );
        check!(
            changes,
            self.wireframe,
            state.wireframe,
            StateChange::Wireframe(state.wireframe)
        );

        let switched = self.pipeline != Some(pipeline);
        self.pipeline = Some(pipeline);
        if changes.first().is_some_and(|c| matches!(c, StateChange::Program(_))) {
            self.compute = None;
        }
        (changes, switched)
    }

    /// Depth writes must be on for a depth clear to take effect.
    pub fn force_depth_write(&mut self) -> Option<StateChange> {
        let mut changes = Vec::with_capacity(1);
        check!(changes, self.depth_write, true, StateChange::DepthWrite(true));
        changes.pop()
    }

    /// Record a compute bind, returning true when it changed.
    ///
    /// A compute kernel replaces the active program, so the next pipeline
    /// bind has to switch it back.
    pub fn bind_compute(&mut self, compute: u64) -> bool {
        let changed = self.compute != Some(compute);
        self.compute = Some(compute);
        if changed {
            self.program = None;
            self.pipeline = None;
        }
        changed
    }

    /// Record a resource bound to a slot, returning true when it changed.
    pub fn bind_slot(&mut self, key: SlotKey, resource: u64) -> bool {
        self.slots.insert(key, resource) != Some(resource)
    }

    pub fn set_target(&mut self, target: Option<TargetBinding>) {
        self.target = target;
    }

    pub fn target(&self) -> Option<TargetBinding> {
        self.target
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Whether `resource` is bound anywhere.
    pub fn is_bound(&self, resource: u64) -> bool {
        self.pipeline == Some(resource)
            || self.compute == Some(resource)
            || self.target.is_some_and(|t| t.texture == resource)
            || self.slots.values().any(|id| *id == resource)
    }

    /// Forget the slots `resource` occupies, so its next bind reaches the
    /// backend even into the same slot.
    pub fn forget_slots(&mut self, resource: u64) {
        self.slots.retain(|_, id| *id != resource);
    }

    /// Drop every entry that refers to a destroyed resource.
    ///
    /// Returns true when the current render target was cleared.
    pub fn forget(&mut self, resource: u64) -> bool {
        if self.pipeline == Some(resource) {
            self.pipeline = None;
        }
        if self.compute == Some(resource) {
            self.compute = None;
        }
        if self.program == Some(resource) {
            self.program = None;
        }
        self.forget_slots(resource);
        if self.target.is_some_and(|t| t.texture == resource) {
            self.target = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_bind_applies_every_field() {
        let mut cache = StateCache::new();
        let (changes, switched) = cache.bind_pipeline(1, 10, &PipelineState::default());
        assert!(switched);
        assert_eq!(changes.len(), 8);
    }

    #[test]
    fn test_rebind_is_free() {
        let mut cache = StateCache::new();
        let state = PipelineState::default();
        cache.bind_pipeline(1, 10, &state);
        let (changes, switched) = cache.bind_pipeline(1, 10, &state);
        assert!(changes.is_empty());
        assert!(!switched);
    }

    #[test]
    fn test_only_changed_fields_are_reported() {
        let mut cache = StateCache::new();
        let state = PipelineState::default();
        cache.bind_pipeline(1, 10, &state);

        let other = PipelineState {
            cull: Cull::None,
            ..state
        };
        let (changes, switched) = cache.bind_pipeline(2, 10, &other);
        assert!(switched);
        assert_eq!(changes, vec![StateChange::Cull(Cull::None)]);
    }

    #[test]
    fn test_depth_always_disables_test() {
        let mut cache = StateCache::new();
        let state = PipelineState {
            depth_test: DepthTest::Always,
            ..Default::default()
        };
        let (changes, _) = cache.bind_pipeline(1, 10, &state);
        assert!(changes.contains(&StateChange::DepthTestEnabled(false)));
        assert!(changes.contains(&StateChange::DepthFunc(DepthTest::Always)));
    }

    #[test]
    fn test_force_depth_write() {
        let mut cache = StateCache::new();
        let state = PipelineState {
            depth_write: false,
            ..Default::default()
        };
        cache.bind_pipeline(1, 10, &state);
        assert_eq!(cache.force_depth_write(), Some(StateChange::DepthWrite(true)));
        assert_eq!(cache.force_depth_write(), None);
    }

    #[test]
    fn test_compute_invalidates_program() {
        let mut cache = StateCache::new();
        let state = PipelineState::default();
        cache.bind_pipeline(1, 10, &state);
        assert!(cache.bind_compute(5));

        let (changes, switched) = cache.bind_pipeline(1, 10, &state);
        assert!(switched);
        assert_eq!(changes, vec![StateChange::Program(10)]);

        // The pipeline took the program back, so the kernel must be rebound.
        assert!(cache.bind_compute(5));
    }

    #[test]
    fn test_forget_clears_bindings() {
        let mut cache = StateCache::new();
        let key = SlotKey {
            register: RegisterType::Constant,
            slot: 0,
        };
        assert!(cache.bind_slot(key, 7));
        assert!(!cache.bind_slot(key, 7));
        cache.set_target(Some(TargetBinding {
            texture: 9,
            layer: -1,
            mip: 0,
        }));

        cache.forget(7);
        assert!(!cache.is_bound(7));
        assert!(cache.bind_slot(key, 7));

        assert!(cache.forget(9));
        assert_eq!(cache.target(), None);
    }

    #[test]
    fn test_forget_slots_keeps_target() {
        let mut cache = StateCache::new();
        let key = SlotKey {
            register: RegisterType::Resource,
            slot: 2,
        };
        cache.bind_slot(key, 4);
        cache.set_target(Some(TargetBinding {
            texture: 4,
            layer: 0,
            mip: 0,
        }));

        cache.forget_slots(4);
        assert!(cache.bind_slot(key, 4));
        assert_eq!(cache.target().map(|t| t.texture), Some(4));
    }
}
