//! Immediate-mode state on top of wgpu render passes.
//!
//! Binds and draws are recorded against the current target and replayed as
//! one render pass when something needs the results: a target change, a
//! host write or readback, a dispatch, a present or the next frame.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::types::Rect;

use super::WgpuBackend;
use super::reflect::{GROUP_CONSTANT, GROUP_READ_WRITE, GROUP_RESOURCE, GROUP_SAMPLER};
use super::resources::{ComputeShared, PipelineShared, SurfaceShared, TargetKey};

/// Where one targeted layer renders to.
pub(super) enum TargetView {
    View(Arc<wgpu::TextureView>),
    Surface(Arc<SurfaceShared>),
}

pub(super) struct BoundTarget {
    /// One entry per targeted layer with its depth view. Draws go to the
    /// first; clears reach all of them.
    pub layers: Vec<(TargetView, Option<Arc<wgpu::TextureView>>)>,
    pub key: TargetKey,
    pub size: (u32, u32),
}

/// A resource bound to a (set, binding) pair.
#[derive(Clone)]
pub(super) enum Bound {
    Buffer(Arc<wgpu::Buffer>),
    View(Arc<wgpu::TextureView>),
    Sampler(Arc<wgpu::Sampler>),
}

impl Bound {
    fn resource(&self) -> wgpu::BindingResource<'_> {
        match self {
            Self::Buffer(buffer) => buffer.as_entire_binding(),
            Self::View(view) => wgpu::BindingResource::TextureView(view),
            Self::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingClear {
    color: Option<wgpu::Color>,
    depth: bool,
}

struct DrawCmd {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex: Option<Arc<wgpu::Buffer>>,
    index: Option<(Arc<wgpu::Buffer>, wgpu::IndexFormat)>,
    viewport: Rect,
    scissor: Option<Rect>,
    indices: Range<u32>,
    index_base: i32,
    instances: u32,
}

/// Recorded state of the immediate context.
#[derive(Default)]
pub(super) struct Frame {
    target: Option<BoundTarget>,
    viewport: Rect,
    scissor: Rect,
    scissor_enabled: bool,
    pipeline: Option<Arc<PipelineShared>>,
    compute: Option<Arc<ComputeShared>>,
    vertex: Option<Arc<wgpu::Buffer>>,
    index: Option<(Arc<wgpu::Buffer>, wgpu::IndexFormat)>,
    bindings: HashMap<(u32, u32), Bound>,
    clear: Option<PendingClear>,
    draws: Vec<DrawCmd>,
}

/// Clamp `rect` to a `width` x `height` target; `None` when nothing is left.
fn clamp_rect(rect: Rect, (width, height): (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.clamp(0, width as i32);
    let y0 = rect.y.clamp(0, height as i32);
    let x1 = rect.x.saturating_add(rect.w).clamp(0, width as i32);
    let y1 = rect.y.saturating_add(rect.h).clamp(0, height as i32);
    (x1 > x0 && y1 > y0).then(|| (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

impl Frame {
    pub fn set_target(&mut self, backend: &WgpuBackend, target: Option<BoundTarget>) {
        self.flush(backend);
        self.target = target;
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    pub fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
    }

    pub fn set_scissor_enabled(&mut self, enabled: bool) {
        self.scissor_enabled = enabled;
    }

    pub fn set_pipeline(&mut self, pipeline: Arc<PipelineShared>) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_compute(&mut self, compute: Arc<ComputeShared>) {
        self.compute = Some(compute);
    }

    pub fn set_vertex(&mut self, buffer: Arc<wgpu::Buffer>) {
        self.vertex = Some(buffer);
    }

    pub fn set_index(&mut self, buffer: Arc<wgpu::Buffer>, format: wgpu::IndexFormat) {
        self.index = Some((buffer, format));
    }

    pub fn bind(&mut self, group: u32, binding: u32, bound: Bound) {
        self.bindings.insert((group, binding), bound);
    }

    /// Queue a clear. Draws already recorded are flushed first.
    pub fn clear(&mut self, backend: &WgpuBackend, color: Option<[f32; 4]>, depth: bool) {
        if !self.draws.is_empty() {
            self.flush(backend);
        }
        let pending = self.clear.get_or_insert_with(PendingClear::default);
        if let Some([r, g, b, a]) = color {
            pending.color = Some(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            });
        }
        pending.depth |= depth;
    }

    fn bind_groups(
        &self,
        backend: &WgpuBackend,
        groups: &[(wgpu::BindGroupLayout, Vec<wgpu::BindGroupLayoutEntry>)],
    ) -> Result<Vec<wgpu::BindGroup>, String> {
        groups
            .iter()
            .enumerate()
            .map(|(group, (layout, entries))| {
                let group = group as u32;
                let resources = entries
                    .iter()
                    .map(|entry| {
                        let bound = self.bindings.get(&(group, entry.binding)).ok_or_else(|| {
                            format!("nothing bound to {}{}", register_prefix(group), entry.binding)
                        })?;
                        Ok(wgpu::BindGroupEntry {
                            binding: entry.binding,
                            resource: bound.resource(),
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                Ok(backend.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout,
                    entries: &resources,
                }))
            })
            .collect()
    }

    pub fn draw(&mut self, backend: &WgpuBackend, index_start: u32, index_base: i32, index_count: u32, instances: u32) {
        let Some(target) = &self.target else {
            report_warn!("Draw call with no render target bound");
            return;
        };
        let Some(pipeline) = &self.pipeline else {
            report_warn!("Draw call with no pipeline bound");
            return;
        };
        let render_pipeline = match pipeline.variant(backend, target.key) {
            Ok(render_pipeline) => render_pipeline,
            Err(e) => {
                report_critical!("Failed to build pipeline for the bound target: {e}");
                return;
            }
        };
        let bind_groups = match self.bind_groups(backend, &pipeline.shader.groups) {
            Ok(groups) => groups,
            Err(e) => {
                report_warn!("Skipping draw with '{}': {e}", pipeline.shader.name);
                return;
            }
        };
        if pipeline.shader.vertex_input && self.vertex.is_none() {
            report_warn!("Skipping draw with '{}': no vertex buffer bound", pipeline.shader.name);
            return;
        }
        let Some(index_end) = index_start.checked_add(index_count) else {
            report_warn!("Skipping draw of {index_count} indices from {index_start}: range overflows");
            return;
        };

        let scissor_enabled = self.scissor_enabled;
        self.draws.push(DrawCmd {
            pipeline: render_pipeline,
            bind_groups,
            vertex: self.vertex.clone(),
            index: self.index.clone(),
            viewport: self.viewport,
            scissor: scissor_enabled.then_some(self.scissor),
            indices: index_start..index_end,
            index_base,
            instances,
        });
    }

    pub fn dispatch(&mut self, backend: &WgpuBackend, x: u32, y: u32, z: u32) {
        let Some(compute) = self.compute.clone() else {
            report_warn!("Dispatch with no compute kernel bound");
            return;
        };
        // Earlier draws may produce what the kernel reads.
        self.flush(backend);

        let bind_groups = match self.bind_groups(backend, &compute.shader.groups) {
            Ok(groups) => groups,
            Err(e) => {
                report_warn!("Skipping dispatch of '{}': {e}", compute.shader.name);
                return;
            }
        };
        let mut encoder = backend
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: backend.label("dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: backend.label(&compute.shader.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&compute.pipeline);
            for (i, group) in bind_groups.iter().enumerate() {
                pass.set_bind_group(i as u32, group, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }
        backend.queue.submit(Some(encoder.finish()));
    }

    /// Replay recorded work in a render pass per targeted layer and submit.
    pub fn flush(&mut self, backend: &WgpuBackend) {
        let clear = self.clear.take();
        let draws = std::mem::take(&mut self.draws);
        let Some(target) = &self.target else {
            return;
        };
        if draws.is_empty() && clear.is_none() {
            return;
        }

        let mut views = Vec::with_capacity(target.layers.len());
        for (color, depth) in &target.layers {
            let view = match color {
                TargetView::View(view) => Arc::clone(view),
                TargetView::Surface(surface) => match surface.acquire(&backend.device) {
                    Some(view) => view,
                    None => return,
                },
            };
            views.push((view, depth.clone()));
        }

        let clear = clear.unwrap_or_default();
        let has_stencil = target.key.depth.is_some_and(|f| f.has_stencil_aspect());
        let mut encoder = backend
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: backend.label("frame"),
            });

        for (i, (color, depth)) in views.iter().enumerate() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: backend.label("immediate pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: clear.color.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth.as_deref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: if clear.depth {
                                wgpu::LoadOp::Clear(1.0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: has_stencil.then_some(wgpu::Operations {
                            load: if clear.depth {
                                wgpu::LoadOp::Clear(0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if i > 0 {
                continue;
            }

            for draw in &draws {
                let Some((x, y, w, h)) = clamp_rect(draw.viewport, target.size) else {
                    continue;
                };
                pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
                match draw.scissor.map(|rect| clamp_rect(rect, target.size)) {
                    Some(Some((x, y, w, h))) => pass.set_scissor_rect(x, y, w, h),
                    Some(None) => continue,
                    None => pass.set_scissor_rect(0, 0, target.size.0, target.size.1),
                }

                pass.set_pipeline(&draw.pipeline);
                for (group, bind_group) in draw.bind_groups.iter().enumerate() {
                    pass.set_bind_group(group as u32, bind_group, &[]);
                }
                if let Some(vertex) = &draw.vertex {
                    pass.set_vertex_buffer(0, vertex.slice(..));
                }
                let indices = draw.indices.clone();
                match &draw.index {
                    Some((buffer, format)) => {
                        pass.set_index_buffer(buffer.slice(..), *format);
                        pass.draw_indexed(indices, draw.index_base, 0..draw.instances);
                    }
                    None => pass.draw(indices, 0..draw.instances),
                }
            }
        }

        log::trace!("WgpuBackend: flushed {} draws", draws.len());
        backend.queue.submit(Some(encoder.finish()));
    }
}

fn register_prefix(group: u32) -> &'static str {
    match group {
        GROUP_CONSTANT => "b",
        GROUP_RESOURCE => "t",
        GROUP_SAMPLER => "s",
        GROUP_READ_WRITE => "u",
        _ => "set ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_rect() {
        assert_eq!(clamp_rect(Rect::new(0, 0, 64, 64), (32, 32)), Some((0, 0, 32, 32)));
        assert_eq!(clamp_rect(Rect::new(-8, 4, 16, 8), (32, 32)), Some((0, 4, 8, 8)));
        assert_eq!(clamp_rect(Rect::new(40, 0, 8, 8), (32, 32)), None);
        assert_eq!(clamp_rect(Rect::new(0, 0, 0, 8), (32, 32)), None);
    }

    #[test]
    fn test_register_prefix() {
        assert_eq!(register_prefix(GROUP_CONSTANT), "b");
        assert_eq!(register_prefix(GROUP_SAMPLER), "s");
        assert_eq!(register_prefix(7), "set ");
    }
}
