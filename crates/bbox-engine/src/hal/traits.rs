use std::any::Any;
use std::sync::Arc;

use super::command::Command;
use super::error::HalResult;
use super::types::{
    Adapter, AdapterInfo, ClearValue, ConstantBufferViewDesc, CpuDescriptor, DescriptorHeapDesc,
    DescriptorHeapType, FeatureLevel, FenceId, Format, GpuDescriptor, GpuPreference,
    GraphicsPipelineDesc, HeapId, HeapType, PipelineId, PresentTarget, QueueId, ResourceDesc,
    ResourceId, ResourceState, RootSignatureDesc, RootSignatureId, SwapChainDesc, SwapChainId,
};

/// Backend entry point: adapter enumeration and device creation.
pub trait Instance: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Adapters in the requested order. `None` when the backend cannot honor
    /// the ordering; callers then fall back to `GpuPreference::Unspecified`.
    fn enumerate_adapters(&self, preference: GpuPreference) -> Option<Vec<Adapter>>;

    /// The software rasterizer adapter.
    fn software_adapter(&self) -> HalResult<Adapter>;

    fn create_device(&self, adapter: &Adapter, min_level: FeatureLevel) -> HalResult<Arc<dyn Device>>;

    /// Names of the display outputs attached to `adapter`.
    fn adapter_outputs(&self, _adapter: &Adapter) -> Vec<String> {
        Vec::new()
    }
}

/// Logical device in the explicit model.
///
/// Objects are addressed by id. Every `create_*` has a matching `release_*`;
/// releasing an unknown id is a no-op. Work is only ever submitted through
/// `execute_command_lists` and ordered by queue position.
pub trait Device: Send + Sync {
    fn adapter_info(&self) -> &AdapterInfo;

    fn feature_level(&self) -> FeatureLevel;

    /// Byte distance between adjacent descriptors of a heap type.
    fn descriptor_increment_size(&self, ty: DescriptorHeapType) -> u32;

    /// `Some` once the device has been lost; every later call fails.
    fn removed_reason(&self) -> Option<String>;

    fn as_any(&self) -> &dyn Any;

    // ── queues & fences ──────────────────────────────────────────────────

    fn create_command_queue(&self) -> HalResult<QueueId>;
    fn release_command_queue(&self, queue: QueueId);

    /// Enqueues closed command lists. Returns before the GPU executes them.
    fn execute_command_lists(&self, queue: QueueId, lists: &[&[Command]]) -> HalResult<()>;

    fn create_fence(&self, initial_value: u64) -> HalResult<FenceId>;
    fn release_fence(&self, fence: FenceId);

    /// Enqueues a signal that sets `fence` to `value` once prior work on `queue` finishes.
    fn signal(&self, queue: QueueId, fence: FenceId, value: u64) -> HalResult<()>;

    fn fence_completed_value(&self, fence: FenceId) -> u64;

    /// Blocks until `fence` reaches `value`.
    fn wait_for_fence(&self, fence: FenceId, value: u64) -> HalResult<()>;

    // ── resources ────────────────────────────────────────────────────────

    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        initial_state: ResourceState,
        clear_value: Option<ClearValue>,
    ) -> HalResult<ResourceId>;

    fn release_resource(&self, resource: ResourceId);

    /// Maps an upload-heap resource for CPU writes.
    fn map(&self, resource: ResourceId) -> HalResult<()>;

    fn unmap(&self, resource: ResourceId);

    /// Copies `data` into a mapped resource at `offset`.
    fn write_mapped(&self, resource: ResourceId, offset: u64, data: &[u8]) -> HalResult<()>;

    /// Reads resource bytes back. Backends may restrict this to CPU-visible memory.
    fn read_resource(&self, resource: ResourceId, offset: u64, len: usize) -> HalResult<Vec<u8>>;

    // ── descriptors ──────────────────────────────────────────────────────

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> HalResult<HeapId>;
    fn release_descriptor_heap(&self, heap: HeapId);

    fn cpu_descriptor_start(&self, heap: HeapId) -> CpuDescriptor;

    /// `None` for heaps that are not shader-visible.
    fn gpu_descriptor_start(&self, heap: HeapId) -> Option<GpuDescriptor>;

    fn create_render_target_view(&self, resource: ResourceId, dest: CpuDescriptor) -> HalResult<()>;

    fn create_depth_stencil_view(
        &self,
        resource: ResourceId,
        format: Format,
        dest: CpuDescriptor,
    ) -> HalResult<()>;

    fn create_constant_buffer_view(
        &self,
        view: &ConstantBufferViewDesc,
        dest: CpuDescriptor,
    ) -> HalResult<()>;

    // ── pipeline ─────────────────────────────────────────────────────────

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> HalResult<RootSignatureId>;
    fn release_root_signature(&self, root_signature: RootSignatureId);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> HalResult<PipelineId>;
    fn release_pipeline(&self, pipeline: PipelineId);

    // ── swap chain ───────────────────────────────────────────────────────

    fn create_swap_chain(
        &self,
        queue: QueueId,
        target: &PresentTarget,
        desc: &SwapChainDesc,
    ) -> HalResult<SwapChainId>;

    fn release_swap_chain(&self, swap_chain: SwapChainId);

    /// Returns a new reference to back buffer `index`, initially in `Present`.
    /// Every reference must be released before `resize_swap_chain`.
    fn swap_chain_buffer(&self, swap_chain: SwapChainId, index: u32) -> HalResult<ResourceId>;

    /// Reallocates the back buffers. Old buffer ids become invalid.
    fn resize_swap_chain(&self, swap_chain: SwapChainId, width: u32, height: u32) -> HalResult<()>;

    fn current_back_buffer_index(&self, swap_chain: SwapChainId) -> u32;

    /// Queues a present of the current back buffer and advances the index.
    fn present(&self, swap_chain: SwapChainId) -> HalResult<()>;
}
