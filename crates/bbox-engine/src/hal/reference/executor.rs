use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::device::Shared;
use super::state::{DrawRecord, State, View};
use crate::hal::command::Command;
use crate::hal::types::{
    DescriptorHeapType, FenceId, Format, HeapId, HeapType, IndexBufferView, PipelineId,
    PrimitiveTopology, ResourceDimension, ResourceId, ResourceState, RootParameter,
    RootSignatureId, ScissorRect, SwapChainId, TransitionBarrier, VertexBufferView, Viewport,
};

/// Work item for the queue thread.
pub(super) enum QueueOp {
    Execute(Vec<Vec<Command>>),
    Signal { fence: FenceId, value: u64 },
    Present { swap_chain: SwapChainId, buffer: ResourceId },
    Shutdown,
}

/// Queue thread body: drains operations in submission order.
pub(super) fn run_queue(shared: Arc<Shared>, ops: Receiver<QueueOp>) {
    for op in ops.iter() {
        if matches!(op, QueueOp::Shutdown) {
            break;
        }

        let Ok(mut state) = shared.state.lock() else {
            log::error!("reference queue: state lock poisoned; stopping");
            return;
        };

        state.pending = state.pending.saturating_sub(1);

        if state.removed.is_some() {
            shared.fence_signaled.notify_all();
            continue;
        }

        let outcome = match op {
            QueueOp::Execute(lists) => lists.iter().try_for_each(|list| {
                execute_list(&mut state, list)?;
                state.stats.lists_executed += 1;
                state.last_list.clone_from(list);
                Ok(())
            }),
            QueueOp::Signal { fence, value } => match state.fences.get_mut(&fence) {
                Some(v) => {
                    *v = value;
                    Ok(())
                }
                None => Err(format!("signal of released {fence}")),
            },
            QueueOp::Present { swap_chain, buffer } => present(&mut state, swap_chain, buffer),
            QueueOp::Shutdown => Ok(()),
        };

        if let Err(reason) = outcome {
            state.remove(reason);
        }

        shared.fence_signaled.notify_all();
    }
}

fn present(state: &mut State, swap_chain: SwapChainId, buffer: ResourceId) -> Result<(), String> {
    if !state.swap_chains.contains_key(&swap_chain) {
        return Err(format!("present on released {swap_chain}"));
    }
    let entry = state.resource(buffer)?;
    if entry.state != ResourceState::Present {
        return Err(format!(
            "present of {buffer} in state {:?}; back buffers must be in Present",
            entry.state
        ));
    }
    state.stats.presents += 1;
    Ok(())
}

#[derive(Default)]
struct Bindings {
    root_signature: Option<RootSignatureId>,
    heap: Option<HeapId>,
    table: Option<(HeapId, u32)>,
    pipeline: Option<PipelineId>,
    rtv: Option<ResourceId>,
    dsv: Option<ResourceId>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    topology: Option<PrimitiveTopology>,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
}

/// Validates and applies one command list against device-side state.
pub(super) fn execute_list(state: &mut State, commands: &[Command]) -> Result<(), String> {
    let mut b = Bindings::default();

    for (i, cmd) in commands.iter().enumerate() {
        apply(state, &mut b, cmd).map_err(|e| format!("command {i} ({}): {e}", command_name(cmd)))?;
    }

    Ok(())
}

fn apply(state: &mut State, b: &mut Bindings, cmd: &Command) -> Result<(), String> {
    match cmd {
        Command::Barrier(barriers) => {
            for barrier in barriers {
                transition(state, barrier)?;
            }
            state.stats.barriers += barriers.len() as u64;
        }

        Command::SetViewport(vp) => {
            if vp.width <= 0.0 || vp.height <= 0.0 || vp.min_depth > vp.max_depth {
                return Err(format!("degenerate viewport {vp:?}"));
            }
            b.viewport = Some(*vp);
        }

        Command::SetScissor(rect) => {
            if rect.right < rect.left || rect.bottom < rect.top {
                return Err(format!("inverted scissor {rect:?}"));
            }
            b.scissor = Some(*rect);
        }

        Command::SetRootSignature(id) => {
            if !state.root_signatures.contains_key(id) {
                return Err(format!("unknown {id}"));
            }
            b.root_signature = Some(*id);
            b.table = None;
        }

        Command::SetDescriptorHeap(id) => {
            let heap = state.heaps.get(id).ok_or_else(|| format!("unknown {id}"))?;
            if heap.desc.ty != DescriptorHeapType::CbvSrvUav || !heap.desc.shader_visible {
                return Err(format!("{id} is not a shader-visible CBV/SRV/UAV heap"));
            }
            b.heap = Some(*id);
        }

        Command::SetRootDescriptorTable { index, base } => {
            let root = b.root_signature.ok_or("no root signature bound")?;
            let params = state.root_signatures[&root].parameters.len() as u32;
            if *index >= params {
                return Err(format!("root parameter {index} out of range ({params} parameters)"));
            }
            let (heap, slot) = state.locate(base.0, DescriptorHeapType::CbvSrvUav)?;
            if b.heap != Some(heap) {
                return Err(format!("table base lies in {heap}, which is not the bound heap"));
            }
            b.table = Some((heap, slot));
        }

        Command::SetPipelineState(id) => {
            if !state.pipelines.contains_key(id) {
                return Err(format!("unknown {id}"));
            }
            b.pipeline = Some(*id);
        }

        Command::SetRenderTargets { rtv, dsv } => {
            let View::Rtv(rt) = state.view_at(*rtv, DescriptorHeapType::Rtv)? else {
                return Err("rtv descriptor does not hold a render-target view".into());
            };
            require_state(state, rt, &[ResourceState::RenderTarget])?;
            b.rtv = Some(rt);

            b.dsv = match dsv {
                Some(dsv) => {
                    let View::Dsv(ds, _) = state.view_at(*dsv, DescriptorHeapType::Dsv)? else {
                        return Err("dsv descriptor does not hold a depth-stencil view".into());
                    };
                    require_state(state, ds, &[ResourceState::DepthWrite])?;
                    Some(ds)
                }
                None => None,
            };
        }

        Command::ClearRenderTarget { rtv, color } => {
            let View::Rtv(rt) = state.view_at(*rtv, DescriptorHeapType::Rtv)? else {
                return Err("rtv descriptor does not hold a render-target view".into());
            };
            require_state(state, rt, &[ResourceState::RenderTarget])?;
            let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            fill_texels(state.resource_mut(rt)?.data.as_mut_slice(), texel);
        }

        Command::ClearDepthStencil { dsv, depth, stencil } => {
            let View::Dsv(ds, _) = state.view_at(*dsv, DescriptorHeapType::Dsv)? else {
                return Err("dsv descriptor does not hold a depth-stencil view".into());
            };
            require_state(state, ds, &[ResourceState::DepthWrite])?;
            let d24 = (depth.clamp(0.0, 1.0) as f64 * 16_777_215.0).round() as u32;
            let packed = (d24 & 0x00FF_FFFF) | ((*stencil as u32) << 24);
            fill_texels(state.resource_mut(ds)?.data.as_mut_slice(), packed.to_le_bytes());
        }

        Command::SetPrimitiveTopology(t) => {
            b.topology = Some(*t);
        }

        Command::SetVertexBuffer(view) => {
            check_buffer_range(state, view.resource, view.offset, view.size as u64)?;
            if view.stride == 0 {
                return Err("vertex buffer stride is zero".into());
            }
            b.vertex_buffer = Some(*view);
        }

        Command::SetIndexBuffer(view) => {
            check_buffer_range(state, view.resource, view.offset, view.size as u64)?;
            if !matches!(view.format, Format::R16Uint | Format::R32Uint) {
                return Err(format!("index format {:?} is not R16/R32 uint", view.format));
            }
            b.index_buffer = Some(*view);
        }

        Command::Draw {
            vertex_count,
            start_vertex,
            ..
        } => {
            let record = validate_draw(state, b, false, *vertex_count)?;
            let vb = b.vertex_buffer.ok_or("no vertex buffer bound")?;
            let needed = (*start_vertex as u64 + *vertex_count as u64) * vb.stride as u64;
            if needed > vb.size as u64 {
                return Err(format!(
                    "draw reads {needed} bytes but the vertex buffer view is {} bytes",
                    vb.size
                ));
            }
            state.stats.draws += 1;
            state.stats.last_draw = Some(record);
        }

        Command::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
            ..
        } => {
            let record = validate_draw(state, b, true, *index_count)?;
            let ib = b.index_buffer.ok_or("no index buffer bound")?;
            let vb = b.vertex_buffer.ok_or("no vertex buffer bound")?;
            check_indices(state, &ib, &vb, *start_index, *index_count, *base_vertex)?;
            state.stats.draws += 1;
            state.stats.indexed_draws += 1;
            state.stats.last_draw = Some(record);
        }

        Command::CopyBufferRegion {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        } => {
            if dst == src {
                return Err("source and destination are the same resource".into());
            }
            require_state(state, *dst, &[ResourceState::CopyDest])?;
            require_state(state, *src, &[ResourceState::GenericRead, ResourceState::CopySource])?;
            check_buffer_range(state, *src, *src_offset, *size)?;
            check_buffer_range(state, *dst, *dst_offset, *size)?;

            let (s, n) = (*src_offset as usize, *size as usize);
            let bytes = state.resource(*src)?.data[s..s + n].to_vec();
            let d = *dst_offset as usize;
            state.resource_mut(*dst)?.data[d..d + n].copy_from_slice(&bytes);
            state.stats.copies += 1;
        }
    }

    Ok(())
}

fn transition(state: &mut State, barrier: &TransitionBarrier) -> Result<(), String> {
    if barrier.before == barrier.after {
        return Err(format!(
            "barrier on {} has identical before/after state {:?}",
            barrier.resource, barrier.before
        ));
    }

    let entry = state.resource_mut(barrier.resource)?;
    if entry.heap == HeapType::Upload {
        return Err(format!("{} lives in an upload heap and cannot transition", barrier.resource));
    }
    if entry.state != barrier.before {
        return Err(format!(
            "barrier on {} expects {:?} but the resource is in {:?}",
            barrier.resource, barrier.before, entry.state
        ));
    }

    entry.state = barrier.after;
    Ok(())
}

fn require_state(state: &State, id: ResourceId, allowed: &[ResourceState]) -> Result<(), String> {
    let entry = state.resource(id)?;
    if allowed.contains(&entry.state) {
        Ok(())
    } else {
        Err(format!("{id} is in {:?}, expected one of {allowed:?}", entry.state))
    }
}

fn check_buffer_range(state: &State, id: ResourceId, offset: u64, len: u64) -> Result<(), String> {
    let entry = state.resource(id)?;
    if entry.desc.dimension != ResourceDimension::Buffer {
        return Err(format!("{id} is not a buffer"));
    }
    let end = offset.checked_add(len).ok_or("buffer range overflows")?;
    if end > entry.desc.width {
        return Err(format!(
            "range {offset}..{end} exceeds {id} of {} bytes",
            entry.desc.width
        ));
    }
    Ok(())
}

fn validate_draw(state: &State, b: &Bindings, indexed: bool, count: u32) -> Result<DrawRecord, String> {
    let pipeline_id = b.pipeline.ok_or("no pipeline state bound")?;
    let pipeline = &state.pipelines[&pipeline_id];
    let root = b.root_signature.ok_or("no root signature bound")?;
    if pipeline.root_signature != root {
        return Err(format!(
            "pipeline was built for {} but {root} is bound",
            pipeline.root_signature
        ));
    }

    let viewport = b.viewport.ok_or("no viewport set")?;
    let scissor = b.scissor.ok_or("no scissor rect set")?;

    match b.topology {
        Some(PrimitiveTopology::TriangleList) | Some(PrimitiveTopology::TriangleStrip) => {}
        Some(other) => return Err(format!("topology {other:?} does not match a triangle pipeline")),
        None => return Err("no primitive topology set".into()),
    }

    let rt = b.rtv.ok_or("no render target bound")?;
    require_state(state, rt, &[ResourceState::RenderTarget])?;
    let rt_format = state.resource(rt)?.desc.format;
    if rt_format != pipeline.render_target_format {
        return Err(format!(
            "render target format {rt_format:?} does not match pipeline {:?}",
            pipeline.render_target_format
        ));
    }

    if pipeline.depth_format != Format::Unknown {
        let ds = b.dsv.ok_or("pipeline uses depth but no depth-stencil view is bound")?;
        require_state(state, ds, &[ResourceState::DepthWrite])?;
        let ds_format = state.resource(ds)?.desc.format;
        if ds_format != pipeline.depth_format {
            return Err(format!(
                "depth format {ds_format:?} does not match pipeline {:?}",
                pipeline.depth_format
            ));
        }
    }

    let vb = b.vertex_buffer.ok_or("no vertex buffer bound")?;
    require_state(
        state,
        vb.resource,
        &[ResourceState::VertexAndConstantBuffer, ResourceState::GenericRead],
    )?;
    if vb.stride < pipeline.vertex_stride {
        return Err(format!(
            "vertex stride {} is smaller than the input layout ({} bytes)",
            vb.stride, pipeline.vertex_stride
        ));
    }

    if indexed {
        let ib = b.index_buffer.ok_or("no index buffer bound")?;
        require_state(state, ib.resource, &[ResourceState::IndexBuffer, ResourceState::GenericRead])?;
    }

    check_table(state, b, root)?;

    Ok(DrawRecord {
        indexed,
        count,
        pipeline: pipeline_id,
        render_target: rt,
        depth_stencil: b.dsv,
        viewport,
        scissor,
    })
}

fn check_table(state: &State, b: &Bindings, root: RootSignatureId) -> Result<(), String> {
    let desc = &state.root_signatures[&root];
    let Some(RootParameter::DescriptorTable { ranges, .. }) = desc.parameters.first() else {
        return Ok(());
    };

    let (heap_id, base) = b.table.ok_or("root descriptor table 0 is not set")?;
    let heap = &state.heaps[&heap_id];
    let count: u32 = ranges.iter().map(|r| r.count).sum();

    for slot in base..base + count {
        let view = heap
            .slots
            .get(slot as usize)
            .copied()
            .flatten()
            .ok_or_else(|| format!("descriptor table slot {slot} is empty"))?;
        let View::Cbv(cbv) = view else {
            return Err(format!("descriptor table slot {slot} is not a constant buffer view"));
        };
        require_state(
            state,
            cbv.resource,
            &[ResourceState::VertexAndConstantBuffer, ResourceState::GenericRead],
        )?;
    }

    Ok(())
}

fn check_indices(
    state: &State,
    ib: &IndexBufferView,
    vb: &VertexBufferView,
    start_index: u32,
    index_count: u32,
    base_vertex: i32,
) -> Result<(), String> {
    let width = ib.format.bytes_per_element() as u64;
    let first = ib.offset + start_index as u64 * width;
    let len = index_count as u64 * width;
    if start_index as u64 * width + len > ib.size as u64 {
        return Err(format!("draw reads {len} index bytes past the {}-byte view", ib.size));
    }

    let vertex_total = vb.size as i64 / vb.stride as i64;
    let data = &state.resource(ib.resource)?.data[first as usize..(first + len) as usize];
    for chunk in data.chunks_exact(width as usize) {
        let index = match width {
            2 => u16::from_le_bytes([chunk[0], chunk[1]]) as i64,
            _ => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64,
        };
        let vertex = index + base_vertex as i64;
        if vertex < 0 || vertex >= vertex_total {
            return Err(format!("index {index} addresses vertex {vertex} of {vertex_total}"));
        }
    }

    Ok(())
}

fn fill_texels<const N: usize>(data: &mut [u8], texel: [u8; N]) {
    for chunk in data.chunks_exact_mut(N) {
        chunk.copy_from_slice(&texel);
    }
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Barrier(_) => "Barrier",
        Command::SetViewport(_) => "SetViewport",
        Command::SetScissor(_) => "SetScissor",
        Command::SetRootSignature(_) => "SetRootSignature",
        Command::SetDescriptorHeap(_) => "SetDescriptorHeap",
        Command::SetRootDescriptorTable { .. } => "SetRootDescriptorTable",
        Command::SetPipelineState(_) => "SetPipelineState",
        Command::SetRenderTargets { .. } => "SetRenderTargets",
        Command::ClearRenderTarget { .. } => "ClearRenderTarget",
        Command::ClearDepthStencil { .. } => "ClearDepthStencil",
        Command::SetPrimitiveTopology(_) => "SetPrimitiveTopology",
        Command::SetVertexBuffer(_) => "SetVertexBuffer",
        Command::SetIndexBuffer(_) => "SetIndexBuffer",
        Command::Draw { .. } => "Draw",
        Command::DrawIndexed { .. } => "DrawIndexed",
        Command::CopyBufferRegion { .. } => "CopyBufferRegion",
    }
}
