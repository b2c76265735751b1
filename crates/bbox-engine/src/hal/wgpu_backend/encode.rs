//! Translation of a recorded command list into a wgpu command buffer.

use super::convert;
use super::device::{Inner, View};
use crate::hal::command::Command;
use crate::hal::error::{HalError, HalResult};
use crate::hal::types::{
    DescriptorHeapType, HeapId, IndexBufferView, PipelineId, PrimitiveTopology, ResourceId,
    RootSignatureId, ScissorRect, VertexBufferView, Viewport,
};

#[derive(Default)]
struct Bindings {
    root_signature: Option<RootSignatureId>,
    table: Option<(HeapId, u64)>,
    pipeline: Option<PipelineId>,
    rtv: Option<ResourceId>,
    dsv: Option<ResourceId>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    topology: Option<PrimitiveTopology>,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,

    clear_color: Option<(ResourceId, [f32; 4])>,
    clear_depth: Option<(ResourceId, f32, u8)>,
}

enum DrawKind {
    Plain {
        vertices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
    Indexed {
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    },
}

fn missing(what: &str) -> HalError {
    HalError::InvalidCall(format!("draw without {what}"))
}

pub(super) fn encode_list(
    device: &wgpu::Device,
    inner: &Inner,
    commands: &[Command],
) -> HalResult<wgpu::CommandBuffer> {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("bbox command list"),
    });
    let mut b = Bindings::default();

    for cmd in commands {
        match cmd {
            // wgpu tracks resource usage itself.
            Command::Barrier(_) => {}
            Command::SetViewport(vp) => b.viewport = Some(*vp),
            Command::SetScissor(rect) => b.scissor = Some(*rect),
            Command::SetRootSignature(id) => {
                b.root_signature = Some(*id);
                b.table = None;
            }
            Command::SetDescriptorHeap(_) => {}
            Command::SetRootDescriptorTable { base, .. } => {
                b.table = Some((HeapId::from_raw(base.0 >> 32), base.0 & 0xFFFF_FFFF));
            }
            Command::SetPipelineState(id) => b.pipeline = Some(*id),
            Command::SetRenderTargets { rtv, dsv } => {
                flush_clears(&mut encoder, inner, &mut b)?;
                b.rtv = match inner.view_at(rtv.0, DescriptorHeapType::Rtv)? {
                    View::Rtv(id) => Some(id),
                    _ => return Err(HalError::InvalidArgument("rtv slot holds another view".into())),
                };
                b.dsv = match dsv {
                    Some(dsv) => match inner.view_at(dsv.0, DescriptorHeapType::Dsv)? {
                        View::Dsv(id) => Some(id),
                        _ => return Err(HalError::InvalidArgument("dsv slot holds another view".into())),
                    },
                    None => None,
                };
            }
            Command::ClearRenderTarget { rtv, color } => {
                let View::Rtv(id) = inner.view_at(rtv.0, DescriptorHeapType::Rtv)? else {
                    return Err(HalError::InvalidArgument("rtv slot holds another view".into()));
                };
                if b.clear_color.is_some_and(|(pending, _)| pending != id) {
                    flush_clears(&mut encoder, inner, &mut b)?;
                }
                b.clear_color = Some((id, *color));
            }
            Command::ClearDepthStencil { dsv, depth, stencil } => {
                let View::Dsv(id) = inner.view_at(dsv.0, DescriptorHeapType::Dsv)? else {
                    return Err(HalError::InvalidArgument("dsv slot holds another view".into()));
                };
                if b.clear_depth.is_some_and(|(pending, ..)| pending != id) {
                    flush_clears(&mut encoder, inner, &mut b)?;
                }
                b.clear_depth = Some((id, *depth, *stencil));
            }
            Command::SetPrimitiveTopology(t) => b.topology = Some(*t),
            Command::SetVertexBuffer(view) => b.vertex_buffer = Some(*view),
            Command::SetIndexBuffer(view) => b.index_buffer = Some(*view),
            Command::Draw {
                vertex_count,
                instance_count,
                start_vertex,
                start_instance,
            } => {
                let kind = DrawKind::Plain {
                    vertices: *start_vertex..start_vertex + vertex_count,
                    instances: *start_instance..start_instance + instance_count,
                };
                draw(&mut encoder, device, inner, &mut b, kind)?;
            }
            Command::DrawIndexed {
                index_count,
                instance_count,
                start_index,
                base_vertex,
                start_instance,
            } => {
                let kind = DrawKind::Indexed {
                    indices: *start_index..start_index + index_count,
                    base_vertex: *base_vertex,
                    instances: *start_instance..start_instance + instance_count,
                };
                draw(&mut encoder, device, inner, &mut b, kind)?;
            }
            Command::CopyBufferRegion {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => {
                flush_clears(&mut encoder, inner, &mut b)?;
                encoder.copy_buffer_to_buffer(
                    inner.buffer(*src)?,
                    *src_offset,
                    inner.buffer(*dst)?,
                    *dst_offset,
                    convert::align_copy(*size),
                );
            }
        }
    }

    flush_clears(&mut encoder, inner, &mut b)?;
    Ok(encoder.finish())
}

fn color_load(b: &Bindings, target: ResourceId) -> wgpu::LoadOp<wgpu::Color> {
    match b.clear_color {
        Some((id, [r, g, bl, a])) if id == target => wgpu::LoadOp::Clear(wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: bl as f64,
            a: a as f64,
        }),
        _ => wgpu::LoadOp::Load,
    }
}

fn depth_attachment<'a>(
    b: &Bindings,
    target: ResourceId,
    view: &'a wgpu::TextureView,
) -> wgpu::RenderPassDepthStencilAttachment<'a> {
    let (depth, stencil) = match b.clear_depth {
        Some((id, d, s)) if id == target => (wgpu::LoadOp::Clear(d), wgpu::LoadOp::Clear(s as u32)),
        _ => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
    };
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: depth,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: Some(wgpu::Operations {
            load: stencil,
            store: wgpu::StoreOp::Store,
        }),
    }
}

/// Emits an empty pass for clears no draw consumed.
fn flush_clears(encoder: &mut wgpu::CommandEncoder, inner: &Inner, b: &mut Bindings) -> HalResult<()> {
    let color = match b.clear_color {
        Some((id, _)) => inner.target_view(id)?.map(|v| (id, v)),
        None => None,
    };
    let depth = match b.clear_depth {
        Some((id, ..)) => inner.target_view(id)?.map(|v| (id, v)),
        None => None,
    };

    if color.is_some() || depth.is_some() {
        let attachment = [color.map(|(id, view)| wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: color_load(b, id),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })];
        let color_attachments: &[Option<wgpu::RenderPassColorAttachment>] =
            if color.is_some() { &attachment } else { &[] };
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("bbox clear pass"),
            color_attachments,
            depth_stencil_attachment: depth.map(|(id, view)| depth_attachment(b, id, view)),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    b.clear_color = None;
    b.clear_depth = None;
    Ok(())
}

fn draw(
    encoder: &mut wgpu::CommandEncoder,
    device: &wgpu::Device,
    inner: &Inner,
    b: &mut Bindings,
    kind: DrawKind,
) -> HalResult<()> {
    let rt = b.rtv.ok_or_else(|| missing("a render target"))?;
    let Some(color_view) = inner.target_view(rt)? else {
        // Surface frame unavailable; drop the draw.
        b.clear_color = None;
        b.clear_depth = None;
        return Ok(());
    };
    let depth_view = match b.dsv {
        Some(id) => inner.target_view(id)?.map(|v| (id, v)),
        None => None,
    };

    let pipeline_id = b.pipeline.ok_or_else(|| missing("a pipeline"))?;
    let pipeline = inner
        .pipelines
        .get(&pipeline_id)
        .ok_or_else(|| HalError::NotFound(pipeline_id.to_string()))?;
    let root_id = b.root_signature.ok_or_else(|| missing("a root signature"))?;
    if pipeline.root_signature != root_id {
        return Err(HalError::InvalidCall("pipeline and bound root signature differ".into()));
    }
    let root = inner
        .root_signatures
        .get(&root_id)
        .ok_or_else(|| HalError::NotFound(root_id.to_string()))?;

    let bind_group = bind_table(device, inner, b, root)?;

    let viewport = b.viewport.ok_or_else(|| missing("a viewport"))?;
    let scissor = b.scissor.ok_or_else(|| missing("a scissor rect"))?;
    let (tw, th) = inner.target_size(rt);
    let sx = scissor.left.clamp(0, tw as i32) as u32;
    let sy = scissor.top.clamp(0, th as i32) as u32;
    let sw = (scissor.right.clamp(0, tw as i32) as u32).saturating_sub(sx);
    let sh = (scissor.bottom.clamp(0, th as i32) as u32).saturating_sub(sy);

    let vb = b.vertex_buffer.ok_or_else(|| missing("a vertex buffer"))?;
    let vertex_buffer = inner.buffer(vb.resource)?;

    match b.topology {
        Some(t) if convert::topology(t) == wgpu::PrimitiveTopology::TriangleList => {}
        Some(t) => return Err(HalError::Unsupported(format!("{t:?} with a triangle-list pipeline"))),
        None => return Err(missing("a primitive topology")),
    }

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("bbox draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load(b, rt),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_view.map(|(id, view)| depth_attachment(b, id, view)),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );
        pass.set_scissor_rect(sx, sy, sw, sh);
        pass.set_vertex_buffer(0, vertex_buffer.slice(vb.offset..vb.offset + vb.size as u64));

        match kind {
            DrawKind::Plain { vertices, instances } => pass.draw(vertices, instances),
            DrawKind::Indexed {
                indices,
                base_vertex,
                instances,
            } => {
                let ib = b.index_buffer.ok_or_else(|| missing("an index buffer"))?;
                let index_buffer = inner.buffer(ib.resource)?;
                pass.set_index_buffer(
                    index_buffer.slice(ib.offset..ib.offset + ib.size as u64),
                    convert::index_format(ib.format)?,
                );
                pass.draw_indexed(indices, base_vertex, instances);
            }
        }
    }

    b.clear_color = None;
    b.clear_depth = None;
    Ok(())
}

fn bind_table(
    device: &wgpu::Device,
    inner: &Inner,
    b: &Bindings,
    root: &super::device::RootSignatureEntry,
) -> HalResult<wgpu::BindGroup> {
    let (heap_id, base) = b.table.ok_or_else(|| missing("a descriptor table"))?;
    let increment = super::device::CBV_INCREMENT as u64;

    let mut entries = Vec::with_capacity(root.bindings.len());
    for (i, binding) in root.bindings.iter().enumerate() {
        let raw = (heap_id.raw() << 32) | (base + i as u64 * increment);
        let View::Cbv(cbv) = inner.view_at(raw, DescriptorHeapType::CbvSrvUav)? else {
            return Err(HalError::InvalidArgument(format!("table slot {i} is not a constant buffer view")));
        };
        entries.push(wgpu::BindGroupEntry {
            binding: *binding,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: inner.buffer(cbv.resource)?,
                offset: cbv.offset,
                size: std::num::NonZeroU64::new(cbv.size as u64),
            }),
        });
    }

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("bbox descriptor table"),
        layout: &root.bind_group_layout,
        entries: &entries,
    }))
}
