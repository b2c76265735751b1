use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use super::executor::{run_queue, QueueOp};
use super::state::{
    increment_for, HeapEntry, PipelineEntry, ReferenceStats, ResourceEntry, State, SwapChainEntry,
    View,
};
use crate::hal::command::Command;
use crate::hal::error::{HalError, HalResult};
use crate::hal::traits::Device;
use crate::hal::types::{
    encode_descriptor, AdapterInfo, ClearValue, ConstantBufferViewDesc, CpuDescriptor,
    DescriptorHeapDesc, DescriptorHeapType, FeatureLevel, FenceId, Format, GpuDescriptor,
    GraphicsPipelineDesc, HeapId, HeapType, PipelineId, PresentTarget, PrimitiveTopologyType,
    QueueId, ResourceDesc, ResourceDimension, ResourceId, ResourceState, ResourceUsage,
    RootParameter, RootSignatureDesc, RootSignatureId, ShaderStage, SwapChainDesc, SwapChainId,
};

/// Largest single allocation the reference device accepts.
const MAX_RESOURCE_BYTES: u64 = 1 << 30;

const MAX_SWAP_CHAIN_BUFFERS: u32 = 16;

pub(super) struct Shared {
    pub state: Mutex<State>,
    pub fence_signaled: Condvar,
}

/// Device of the reference backend. See the module docs.
pub struct ReferenceDevice {
    info: AdapterInfo,
    level: FeatureLevel,
    shared: Arc<Shared>,
    ops: Sender<QueueOp>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl ReferenceDevice {
    pub(super) fn new(info: AdapterInfo, level: FeatureLevel) -> HalResult<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            fence_signaled: Condvar::new(),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name("bbox-reference-queue".to_string())
            .spawn(move || run_queue(worker_shared, rx))
            .map_err(|e| HalError::Backend(format!("failed to spawn queue thread: {e}")))?;

        log::debug!("reference device created on {} at feature level {level}", info.name);

        Ok(Self {
            info,
            level,
            shared,
            ops: tx,
            worker: Mutex::new(Some(worker)),
            // Zero is never handed out.
            next_id: AtomicU64::new(1),
        })
    }

    /// Snapshot of the queue thread's counters.
    pub fn stats(&self) -> ReferenceStats {
        self.lock()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    /// Commands of the last list the queue thread executed successfully.
    pub fn last_executed_list(&self) -> Vec<Command> {
        self.lock()
            .map(|s| s.last_list.clone())
            .unwrap_or_default()
    }

    /// Device-side state of a resource, after all executed barriers.
    pub fn resource_state(&self, resource: ResourceId) -> Option<ResourceState> {
        self.lock().ok()?.resources.get(&resource).map(|r| r.state)
    }

    /// Marks the device removed, as a driver reset would.
    pub fn simulate_removal(&self, reason: &str) {
        if let Ok(mut s) = self.lock() {
            s.remove(reason.to_string());
        }
        self.shared.fence_signaled.notify_all();
    }

    fn lock(&self) -> HalResult<MutexGuard<'_, State>> {
        self.shared
            .state
            .lock()
            .map_err(|_| HalError::Backend("reference device state poisoned".into()))
    }

    /// Locks state and fails if the device has been removed.
    fn live(&self) -> HalResult<MutexGuard<'_, State>> {
        let state = self.lock()?;
        if let Some(reason) = &state.removed {
            return Err(HalError::DeviceRemoved(reason.clone()));
        }
        Ok(state)
    }

    fn next<T>(&self, make: fn(u64) -> T) -> T {
        make(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn enqueue(&self, mut state: MutexGuard<'_, State>, op: QueueOp) -> HalResult<()> {
        state.pending += 1;
        drop(state);
        self.ops
            .send(op)
            .map_err(|_| HalError::DeviceRemoved("queue thread has stopped".into()))
    }

    fn allocate(
        &self,
        state: &mut State,
        heap: HeapType,
        desc: &ResourceDesc,
        initial: ResourceState,
        owner: Option<SwapChainId>,
    ) -> HalResult<ResourceId> {
        let size = desc.byte_size();
        if size > MAX_RESOURCE_BYTES {
            return Err(HalError::OutOfMemory);
        }
        let id = self.next(ResourceId::from_raw);
        state.resources.insert(
            id,
            ResourceEntry {
                desc: *desc,
                heap,
                state: initial,
                data: vec![0; size as usize],
                mapped: false,
                owner,
                refs: 0,
            },
        );
        Ok(id)
    }

    fn create_back_buffers(
        &self,
        state: &mut State,
        swap_chain: SwapChainId,
        desc: &SwapChainDesc,
    ) -> HalResult<Vec<ResourceId>> {
        let rd = ResourceDesc::texture_2d(
            desc.width,
            desc.height,
            desc.format,
            ResourceUsage {
                render_target: true,
                depth_stencil: false,
            },
        );
        (0..desc.buffer_count)
            .map(|_| self.allocate(state, HeapType::Default, &rd, ResourceState::Present, Some(swap_chain)))
            .collect()
    }

    fn write_view(&self, dest: CpuDescriptor, ty: DescriptorHeapType, view: View) -> HalResult<()> {
        let mut state = self.live()?;
        let (heap, slot) = state.locate(dest.0, ty).map_err(HalError::InvalidArgument)?;
        if let Some(entry) = state.heaps.get_mut(&heap) {
            entry.slots[slot as usize] = Some(view);
        }
        Ok(())
    }
}

impl Drop for ReferenceDevice {
    fn drop(&mut self) {
        let _ = self.ops.send(QueueOp::Shutdown);
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

fn validate_pipeline(state: &State, desc: &GraphicsPipelineDesc) -> HalResult<PipelineEntry> {
    let invalid = |msg: String| Err(HalError::InvalidArgument(msg));

    if !state.root_signatures.contains_key(&desc.root_signature) {
        return invalid(format!("unknown {}", desc.root_signature));
    }
    if desc.vertex_shader.bytes.is_empty() || desc.vertex_shader.stage != ShaderStage::Vertex {
        return invalid("vertex shader bytecode is missing or not a vertex shader".into());
    }
    if desc.pixel_shader.bytes.is_empty() || desc.pixel_shader.stage != ShaderStage::Pixel {
        return invalid("pixel shader bytecode is missing or not a pixel shader".into());
    }
    if desc.input_layout.is_empty() {
        return invalid("input layout is empty".into());
    }

    let mut stride = 0u32;
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for (i, el) in desc.input_layout.iter().enumerate() {
        let size = el.format.bytes_per_element();
        if size == 0 || el.format.is_depth() {
            return invalid(format!("input element {} has unusable format {:?}", el.semantic, el.format));
        }
        if el.aligned_byte_offset % 4 != 0 {
            return invalid(format!("input element {} offset is not 4-byte aligned", el.semantic));
        }
        if desc.input_layout[..i].iter().any(|o| o.semantic == el.semantic) {
            return invalid(format!("duplicate input semantic {}", el.semantic));
        }
        let range = (el.aligned_byte_offset, el.aligned_byte_offset + size);
        if ranges.iter().any(|r| range.0 < r.1 && r.0 < range.1) {
            return invalid(format!("input element {} overlaps another element", el.semantic));
        }
        ranges.push(range);
        stride = stride.max(range.1);
    }

    if desc.render_target_formats.len() != 1 {
        return invalid("exactly one render target format is supported".into());
    }
    let rt = desc.render_target_formats[0];
    if rt == Format::Unknown || rt.is_depth() {
        return invalid(format!("render target format {rt:?} is not a color format"));
    }
    if desc.depth_stencil_format != Format::Unknown && !desc.depth_stencil_format.is_depth() {
        return invalid(format!("{:?} is not a depth format", desc.depth_stencil_format));
    }
    if desc.sample_count != 1 {
        return invalid("multisampling is not supported".into());
    }
    if desc.topology != PrimitiveTopologyType::Triangle {
        return invalid("only triangle pipelines are supported".into());
    }

    Ok(PipelineEntry {
        root_signature: desc.root_signature,
        render_target_format: rt,
        depth_format: desc.depth_stencil_format,
        vertex_stride: stride,
    })
}

impl Device for ReferenceDevice {
    fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    fn feature_level(&self) -> FeatureLevel {
        self.level
    }

    fn descriptor_increment_size(&self, ty: DescriptorHeapType) -> u32 {
        increment_for(ty)
    }

    fn removed_reason(&self) -> Option<String> {
        self.lock().ok().and_then(|s| s.removed.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    // ── queues & fences ──────────────────────────────────────────────────

    fn create_command_queue(&self) -> HalResult<QueueId> {
        let mut state = self.live()?;
        let id = self.next(QueueId::from_raw);
        state.queues.insert(id);
        Ok(id)
    }

    fn release_command_queue(&self, queue: QueueId) {
        if let Ok(mut state) = self.lock() {
            state.queues.remove(&queue);
        }
    }

    fn execute_command_lists(&self, queue: QueueId, lists: &[&[Command]]) -> HalResult<()> {
        let state = self.live()?;
        if !state.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }
        let owned = lists.iter().map(|l| l.to_vec()).collect();
        self.enqueue(state, QueueOp::Execute(owned))
    }

    fn create_fence(&self, initial_value: u64) -> HalResult<FenceId> {
        let mut state = self.live()?;
        let id = self.next(FenceId::from_raw);
        state.fences.insert(id, initial_value);
        Ok(id)
    }

    fn release_fence(&self, fence: FenceId) {
        if let Ok(mut state) = self.lock() {
            state.fences.remove(&fence);
        }
    }

    fn signal(&self, queue: QueueId, fence: FenceId, value: u64) -> HalResult<()> {
        let state = self.live()?;
        if !state.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }
        if !state.fences.contains_key(&fence) {
            return Err(HalError::NotFound(fence.to_string()));
        }
        self.enqueue(state, QueueOp::Signal { fence, value })
    }

    fn fence_completed_value(&self, fence: FenceId) -> u64 {
        self.lock()
            .ok()
            .and_then(|s| s.fences.get(&fence).copied())
            .unwrap_or(0)
    }

    fn wait_for_fence(&self, fence: FenceId, value: u64) -> HalResult<()> {
        let mut state = self.lock()?;
        loop {
            if let Some(reason) = &state.removed {
                return Err(HalError::DeviceRemoved(reason.clone()));
            }
            let current = *state
                .fences
                .get(&fence)
                .ok_or_else(|| HalError::NotFound(fence.to_string()))?;
            if current >= value {
                return Ok(());
            }
            state = self
                .shared
                .fence_signaled
                .wait(state)
                .map_err(|_| HalError::Backend("reference device state poisoned".into()))?;
        }
    }

    // ── resources ────────────────────────────────────────────────────────

    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        initial_state: ResourceState,
        clear_value: Option<ClearValue>,
    ) -> HalResult<ResourceId> {
        let mut state = self.live()?;

        if desc.width == 0 || desc.height == 0 {
            return Err(HalError::InvalidArgument("resource has a zero dimension".into()));
        }

        match desc.dimension {
            ResourceDimension::Buffer => {
                if clear_value.is_some() {
                    return Err(HalError::InvalidArgument("buffers take no clear value".into()));
                }
                if desc.usage.render_target || desc.usage.depth_stencil {
                    return Err(HalError::InvalidArgument("buffers cannot be render or depth targets".into()));
                }
            }
            ResourceDimension::Texture2D => {
                if heap == HeapType::Upload {
                    return Err(HalError::InvalidArgument("textures cannot live in an upload heap".into()));
                }
                if desc.usage.depth_stencil && !desc.format.is_depth() {
                    return Err(HalError::InvalidArgument(format!(
                        "{:?} cannot back a depth-stencil target",
                        desc.format
                    )));
                }
                match clear_value {
                    Some(ClearValue::DepthStencil { .. }) if !desc.usage.depth_stencil => {
                        return Err(HalError::InvalidArgument("depth clear value on a non-depth texture".into()));
                    }
                    Some(ClearValue::Color(_)) if !desc.usage.render_target => {
                        return Err(HalError::InvalidArgument("color clear value on a non-render-target".into()));
                    }
                    _ => {}
                }
            }
        }

        if heap == HeapType::Upload && initial_state != ResourceState::GenericRead {
            return Err(HalError::InvalidArgument(
                "upload heap resources must start in GenericRead".into(),
            ));
        }

        self.allocate(&mut state, heap, desc, initial_state, None)
    }

    fn release_resource(&self, resource: ResourceId) {
        let Ok(mut state) = self.lock() else { return };
        let Some(entry) = state.resources.get_mut(&resource) else {
            return;
        };
        if entry.owner.is_some() {
            entry.refs = entry.refs.saturating_sub(1);
        } else {
            state.resources.remove(&resource);
        }
    }

    fn map(&self, resource: ResourceId) -> HalResult<()> {
        let mut state = self.live()?;
        let entry = state
            .resources
            .get_mut(&resource)
            .ok_or_else(|| HalError::NotFound(resource.to_string()))?;
        if entry.heap != HeapType::Upload {
            return Err(HalError::InvalidCall(format!("{resource} is not CPU-visible")));
        }
        entry.mapped = true;
        Ok(())
    }

    fn unmap(&self, resource: ResourceId) {
        if let Ok(mut state) = self.lock() {
            if let Some(entry) = state.resources.get_mut(&resource) {
                entry.mapped = false;
            }
        }
    }

    fn write_mapped(&self, resource: ResourceId, offset: u64, data: &[u8]) -> HalResult<()> {
        let mut state = self.live()?;
        let entry = state
            .resources
            .get_mut(&resource)
            .ok_or_else(|| HalError::NotFound(resource.to_string()))?;
        if !entry.mapped {
            return Err(HalError::InvalidCall(format!("{resource} is not mapped")));
        }
        let end = offset as usize + data.len();
        if end > entry.data.len() {
            return Err(HalError::InvalidArgument(format!(
                "write of {} bytes at {offset} overruns {resource} ({} bytes)",
                data.len(),
                entry.data.len()
            )));
        }
        entry.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn read_resource(&self, resource: ResourceId, offset: u64, len: usize) -> HalResult<Vec<u8>> {
        let state = self.lock()?;
        let entry = state
            .resources
            .get(&resource)
            .ok_or_else(|| HalError::NotFound(resource.to_string()))?;
        let start = offset as usize;
        let end = start + len;
        if end > entry.data.len() {
            return Err(HalError::InvalidArgument(format!("read past the end of {resource}")));
        }
        Ok(entry.data[start..end].to_vec())
    }

    // ── descriptors ──────────────────────────────────────────────────────

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> HalResult<HeapId> {
        let mut state = self.live()?;
        if desc.capacity == 0 {
            return Err(HalError::InvalidArgument("descriptor heap capacity is zero".into()));
        }
        if desc.shader_visible && desc.ty != DescriptorHeapType::CbvSrvUav {
            return Err(HalError::InvalidArgument(format!(
                "{:?} heaps cannot be shader-visible",
                desc.ty
            )));
        }
        let id = self.next(HeapId::from_raw);
        state.heaps.insert(
            id,
            HeapEntry {
                desc: *desc,
                slots: vec![None; desc.capacity as usize],
            },
        );
        Ok(id)
    }

    fn release_descriptor_heap(&self, heap: HeapId) {
        if let Ok(mut state) = self.lock() {
            state.heaps.remove(&heap);
        }
    }

    fn cpu_descriptor_start(&self, heap: HeapId) -> CpuDescriptor {
        CpuDescriptor(encode_descriptor(heap, 0))
    }

    fn gpu_descriptor_start(&self, heap: HeapId) -> Option<GpuDescriptor> {
        let state = self.lock().ok()?;
        let entry = state.heaps.get(&heap)?;
        entry
            .desc
            .shader_visible
            .then(|| GpuDescriptor(encode_descriptor(heap, 0)))
    }

    fn create_render_target_view(&self, resource: ResourceId, dest: CpuDescriptor) -> HalResult<()> {
        {
            let state = self.live()?;
            let entry = state
                .resources
                .get(&resource)
                .ok_or_else(|| HalError::NotFound(resource.to_string()))?;
            if entry.desc.dimension != ResourceDimension::Texture2D || !entry.desc.usage.render_target {
                return Err(HalError::InvalidArgument(format!("{resource} does not allow render-target use")));
            }
        }
        self.write_view(dest, DescriptorHeapType::Rtv, View::Rtv(resource))
    }

    fn create_depth_stencil_view(&self, resource: ResourceId, format: Format, dest: CpuDescriptor) -> HalResult<()> {
        {
            let state = self.live()?;
            let entry = state
                .resources
                .get(&resource)
                .ok_or_else(|| HalError::NotFound(resource.to_string()))?;
            if !entry.desc.usage.depth_stencil || entry.desc.format != format {
                return Err(HalError::InvalidArgument(format!(
                    "{resource} does not allow depth-stencil use as {format:?}"
                )));
            }
        }
        self.write_view(dest, DescriptorHeapType::Dsv, View::Dsv(resource, format))
    }

    fn create_constant_buffer_view(&self, view: &ConstantBufferViewDesc, dest: CpuDescriptor) -> HalResult<()> {
        {
            let state = self.live()?;
            let entry = state
                .resources
                .get(&view.resource)
                .ok_or_else(|| HalError::NotFound(view.resource.to_string()))?;
            if entry.desc.dimension != ResourceDimension::Buffer {
                return Err(HalError::InvalidArgument("constant buffer views need a buffer".into()));
            }
            if view.size == 0 || view.size % 256 != 0 || view.offset % 256 != 0 {
                return Err(HalError::InvalidArgument(format!(
                    "constant buffer view offset {} / size {} must be non-zero multiples of 256",
                    view.offset, view.size
                )));
            }
            if view.offset + view.size as u64 > entry.desc.width {
                return Err(HalError::InvalidArgument("constant buffer view exceeds its buffer".into()));
            }
        }
        self.write_view(dest, DescriptorHeapType::CbvSrvUav, View::Cbv(*view))
    }

    // ── pipeline ─────────────────────────────────────────────────────────

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> HalResult<RootSignatureId> {
        let mut state = self.live()?;
        for param in &desc.parameters {
            let RootParameter::DescriptorTable { ranges, .. } = param;
            if ranges.is_empty() || ranges.iter().any(|r| r.count == 0) {
                return Err(HalError::InvalidArgument("descriptor table with an empty range".into()));
            }
        }
        let id = self.next(RootSignatureId::from_raw);
        state.root_signatures.insert(id, desc.clone());
        Ok(id)
    }

    fn release_root_signature(&self, root_signature: RootSignatureId) {
        if let Ok(mut state) = self.lock() {
            state.root_signatures.remove(&root_signature);
        }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> HalResult<PipelineId> {
        let mut state = self.live()?;
        let entry = validate_pipeline(&state, desc)?;
        let id = self.next(PipelineId::from_raw);
        state.pipelines.insert(id, entry);
        Ok(id)
    }

    fn release_pipeline(&self, pipeline: PipelineId) {
        if let Ok(mut state) = self.lock() {
            state.pipelines.remove(&pipeline);
        }
    }

    // ── swap chain ───────────────────────────────────────────────────────

    fn create_swap_chain(
        &self,
        queue: QueueId,
        target: &PresentTarget,
        desc: &SwapChainDesc,
    ) -> HalResult<SwapChainId> {
        let mut state = self.live()?;
        if !state.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }
        if desc.buffer_count < 2 || desc.buffer_count > MAX_SWAP_CHAIN_BUFFERS {
            return Err(HalError::InvalidArgument(format!(
                "flip-model swap chains need 2..={MAX_SWAP_CHAIN_BUFFERS} buffers, got {}",
                desc.buffer_count
            )));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(HalError::InvalidArgument("swap chain has a zero dimension".into()));
        }
        if desc.format != Format::R8G8B8A8Unorm {
            return Err(HalError::Unsupported(format!("back buffer format {:?}", desc.format)));
        }
        if let PresentTarget::Window(_) = target {
            log::warn!("reference backend renders off-screen; the window will not show frames");
        }

        let id = self.next(SwapChainId::from_raw);
        let buffers = self.create_back_buffers(&mut state, id, desc)?;
        state.swap_chains.insert(
            id,
            SwapChainEntry {
                desc: *desc,
                buffers,
                current: 0,
            },
        );
        Ok(id)
    }

    fn release_swap_chain(&self, swap_chain: SwapChainId) {
        let Ok(mut state) = self.lock() else { return };
        if let Some(entry) = state.swap_chains.remove(&swap_chain) {
            for b in entry.buffers {
                state.resources.remove(&b);
            }
        }
    }

    fn swap_chain_buffer(&self, swap_chain: SwapChainId, index: u32) -> HalResult<ResourceId> {
        let mut state = self.live()?;
        let entry = state
            .swap_chains
            .get(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        let id = *entry
            .buffers
            .get(index as usize)
            .ok_or_else(|| HalError::InvalidArgument(format!("back buffer index {index}")))?;
        if let Some(r) = state.resources.get_mut(&id) {
            r.refs += 1;
        }
        Ok(id)
    }

    fn resize_swap_chain(&self, swap_chain: SwapChainId, width: u32, height: u32) -> HalResult<()> {
        let mut state = self.live()?;
        if width == 0 || height == 0 {
            return Err(HalError::InvalidArgument("swap chain has a zero dimension".into()));
        }
        if state.pending > 0 {
            return Err(HalError::InvalidCall(
                "swap chain resized while queue work is still in flight".into(),
            ));
        }

        let entry = state
            .swap_chains
            .get(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        let old = entry.buffers.clone();
        let mut desc = entry.desc;

        let referenced: Vec<ResourceId> = old
            .iter()
            .copied()
            .filter(|b| state.resources.get(b).is_some_and(|r| r.refs > 0))
            .collect();
        if !referenced.is_empty() {
            return Err(HalError::InvalidCall(format!(
                "back buffers {referenced:?} are still referenced; release them before resizing"
            )));
        }

        for b in &old {
            state.resources.remove(b);
        }

        desc.width = width;
        desc.height = height;
        let buffers = self.create_back_buffers(&mut state, swap_chain, &desc)?;
        if let Some(entry) = state.swap_chains.get_mut(&swap_chain) {
            entry.desc = desc;
            entry.buffers = buffers;
            entry.current = 0;
        }
        Ok(())
    }

    fn current_back_buffer_index(&self, swap_chain: SwapChainId) -> u32 {
        self.lock()
            .ok()
            .and_then(|s| s.swap_chains.get(&swap_chain).map(|e| e.current))
            .unwrap_or(0)
    }

    fn present(&self, swap_chain: SwapChainId) -> HalResult<()> {
        let mut state = self.live()?;
        let entry = state
            .swap_chains
            .get_mut(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        let buffer = entry.buffers[entry.current as usize];
        entry.current = (entry.current + 1) % entry.desc.buffer_count;
        self.enqueue(state, QueueOp::Present { swap_chain, buffer })
    }
}

impl std::fmt::Debug for ReferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceDevice")
            .field("adapter", &self.info.name)
            .field("level", &self.level)
            .finish()
    }
}
