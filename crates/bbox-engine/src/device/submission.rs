use std::sync::Arc;

use crate::hal::{
    Command, CpuDescriptor, Device, Format, GpuDescriptor, IndexBufferView, PrimitiveTopology,
    QueueId, ResourceState, ScissorRect, TransitionBarrier, VertexBufferView, Viewport,
};

use super::{DescriptorHeap, FrameFence, GpuError, PipelineState, Resource, RootSignature};

/// The single direct queue. Released on drop.
pub struct CommandQueue {
    device: Arc<dyn Device>,
    id: QueueId,
}

impl CommandQueue {
    pub fn new(device: &Arc<dyn Device>) -> Result<Self, GpuError> {
        let id = device
            .create_command_queue()
            .map_err(|e| GpuError::DeviceCreation(format!("command queue: {e}")))?;
        Ok(Self {
            device: device.clone(),
            id,
        })
    }

    pub fn id(&self) -> QueueId {
        self.id
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.device.release_command_queue(self.id);
    }
}

/// Backing store for recorded commands.
///
/// Remembers the fence ticket that will cover its last submission; resetting
/// before the fence gets there would recycle memory the GPU may still read.
#[derive(Debug, Default)]
pub struct CommandAllocator {
    pending: Option<u64>,
}

impl CommandAllocator {
    pub fn reset(&mut self, fence: &FrameFence) -> Result<(), GpuError> {
        if let Some(pending) = self.pending {
            let completed = fence.completed_value();
            if completed < pending {
                return Err(GpuError::AllocatorInFlight { pending, completed });
            }
        }
        self.pending = None;
        Ok(())
    }

    fn submitted(&mut self, ticket: u64) {
        self.pending = Some(ticket);
    }

    /// Fence value the last submission is waiting on, if any.
    pub fn pending_ticket(&self) -> Option<u64> {
        self.pending
    }
}

/// Records commands between `reset` and `close`.
///
/// Calls that consume a resource check its tracked state first.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
    open: bool,
}

impl CommandList {
    fn ensure_open(&self) -> Result<(), GpuError> {
        if self.open {
            Ok(())
        } else {
            Err(GpuError::InvalidCall("recording into a closed command list".into()))
        }
    }

    fn push(&mut self, cmd: Command) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.commands.push(cmd);
        Ok(())
    }

    fn begin(&mut self) {
        self.commands.clear();
        self.open = true;
    }

    pub fn close(&mut self) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn resource_barrier(&mut self, barriers: Vec<TransitionBarrier>) -> Result<(), GpuError> {
        if barriers.is_empty() {
            return self.ensure_open();
        }
        self.push(Command::Barrier(barriers))
    }

    /// Moves `resource` to `required`, recording a barrier only if its state changes.
    pub fn transition(&mut self, resource: &Resource, required: ResourceState) -> Result<(), GpuError> {
        self.ensure_open()?;
        if let Some(barrier) = resource.transition_to(required) {
            self.commands.push(Command::Barrier(vec![barrier]));
        }
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), GpuError> {
        self.push(Command::SetViewport(viewport))
    }

    pub fn set_scissor(&mut self, rect: ScissorRect) -> Result<(), GpuError> {
        self.push(Command::SetScissor(rect))
    }

    pub fn set_root_signature(&mut self, root_signature: &RootSignature) -> Result<(), GpuError> {
        self.push(Command::SetRootSignature(root_signature.id()))
    }

    pub fn set_descriptor_heap(&mut self, heap: &DescriptorHeap) -> Result<(), GpuError> {
        self.push(Command::SetDescriptorHeap(heap.id()))
    }

    pub fn set_root_descriptor_table(&mut self, index: u32, base: GpuDescriptor) -> Result<(), GpuError> {
        self.push(Command::SetRootDescriptorTable { index, base })
    }

    pub fn set_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<(), GpuError> {
        self.push(Command::SetPipelineState(pipeline.id()))
    }

    pub fn set_render_targets(
        &mut self,
        rtv: CpuDescriptor,
        render_target: &Resource,
        depth: Option<(CpuDescriptor, &Resource)>,
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        render_target.require(ResourceState::RenderTarget)?;
        if let Some((_, ds)) = depth {
            ds.require(ResourceState::DepthWrite)?;
        }
        self.push(Command::SetRenderTargets {
            rtv,
            dsv: depth.map(|(dsv, _)| dsv),
        })
    }

    pub fn clear_render_target(
        &mut self,
        rtv: CpuDescriptor,
        render_target: &Resource,
        color: [f32; 4],
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        render_target.require(ResourceState::RenderTarget)?;
        self.push(Command::ClearRenderTarget { rtv, color })
    }

    pub fn clear_depth_stencil(
        &mut self,
        dsv: CpuDescriptor,
        depth_buffer: &Resource,
        depth: f32,
        stencil: u8,
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        depth_buffer.require(ResourceState::DepthWrite)?;
        self.push(Command::ClearDepthStencil { dsv, depth, stencil })
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<(), GpuError> {
        self.push(Command::SetPrimitiveTopology(topology))
    }

    pub fn set_vertex_buffer(&mut self, buffer: &Resource, size: u32, stride: u32) -> Result<(), GpuError> {
        self.ensure_open()?;
        require_readable(buffer, ResourceState::VertexAndConstantBuffer)?;
        self.push(Command::SetVertexBuffer(VertexBufferView {
            resource: buffer.id(),
            offset: 0,
            size,
            stride,
        }))
    }

    pub fn set_index_buffer(&mut self, buffer: &Resource, size: u32, format: Format) -> Result<(), GpuError> {
        self.ensure_open()?;
        require_readable(buffer, ResourceState::IndexBuffer)?;
        self.push(Command::SetIndexBuffer(IndexBufferView {
            resource: buffer.id(),
            offset: 0,
            size,
            format,
        }))
    }

    pub fn draw(&mut self, vertex_count: u32) -> Result<(), GpuError> {
        self.push(Command::Draw {
            vertex_count,
            instance_count: 1,
            start_vertex: 0,
            start_instance: 0,
        })
    }

    pub fn draw_indexed(&mut self, index_count: u32) -> Result<(), GpuError> {
        self.push(Command::DrawIndexed {
            index_count,
            instance_count: 1,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0,
        })
    }

    /// Copies `size` bytes from the start of `src` to the start of `dst`.
    pub fn copy_buffer(&mut self, dst: &Resource, src: &Resource, size: u64) -> Result<(), GpuError> {
        self.ensure_open()?;
        dst.require(ResourceState::CopyDest)?;
        require_readable(src, ResourceState::CopySource)?;
        self.push(Command::CopyBufferRegion {
            dst: dst.id(),
            dst_offset: 0,
            src: src.id(),
            src_offset: 0,
            size,
        })
    }
}

/// Upload-heap resources stay in `GenericRead`, which covers every read state.
fn require_readable(resource: &Resource, required: ResourceState) -> Result<(), GpuError> {
    if resource.state() == ResourceState::GenericRead {
        return Ok(());
    }
    resource.require(required)
}

/// One allocator, one list, one direct queue.
pub struct CommandSubmissionEngine {
    device: Arc<dyn Device>,
    queue: CommandQueue,
    allocator: CommandAllocator,
    list: CommandList,
}

impl CommandSubmissionEngine {
    /// Starts with a closed list, ready for `reset`.
    pub fn new(device: &Arc<dyn Device>) -> Result<Self, GpuError> {
        Ok(Self {
            device: device.clone(),
            queue: CommandQueue::new(device)?,
            allocator: CommandAllocator::default(),
            list: CommandList::default(),
        })
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn allocator(&self) -> &CommandAllocator {
        &self.allocator
    }

    /// Reopens the list for recording. The previous submission must have
    /// completed, i.e. the fence must have been flushed since `submit`.
    pub fn reset(&mut self, fence: &FrameFence, pipeline: Option<&PipelineState>) -> Result<&mut CommandList, GpuError> {
        if self.list.is_open() {
            return Err(GpuError::InvalidCall("reset of a command list that is still recording".into()));
        }
        self.allocator.reset(fence)?;
        self.list.begin();
        if let Some(pipeline) = pipeline {
            self.list.set_pipeline_state(pipeline)?;
        }
        Ok(&mut self.list)
    }

    pub fn list(&mut self) -> &mut CommandList {
        &mut self.list
    }

    /// Closes the list and executes it. Returns without waiting.
    pub fn submit(&mut self, fence: &FrameFence) -> Result<(), GpuError> {
        if !self.list.is_open() {
            return Err(GpuError::InvalidCall("submit of a command list that is not recording".into()));
        }
        self.list.close()?;
        self.device
            .execute_command_lists(self.queue.id(), &[self.list.commands()])?;
        self.allocator.submitted(fence.current_value() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::reference_device;
    use crate::hal::{HeapType, ResourceDesc};

    fn setup() -> (Arc<dyn Device>, CommandSubmissionEngine, FrameFence) {
        let device = reference_device();
        let engine = CommandSubmissionEngine::new(&device).unwrap();
        let fence = FrameFence::new(&device, engine.queue()).unwrap();
        (device, engine, fence)
    }

    #[test]
    fn recording_on_a_closed_list_is_invalid() {
        let (_device, mut engine, fence) = setup();
        let err = engine.list().draw(3).unwrap_err();
        assert!(matches!(err, GpuError::InvalidCall(_)));
        assert!(matches!(engine.submit(&fence), Err(GpuError::InvalidCall(_))));
    }

    #[test]
    fn reset_before_flush_is_allocator_in_flight() {
        let (_device, mut engine, mut fence) = setup();
        engine.reset(&fence, None).unwrap();
        engine.submit(&fence).unwrap();

        let err = engine.reset(&fence, None).err().unwrap();
        assert!(matches!(err, GpuError::AllocatorInFlight { pending: 1, .. }));

        fence.flush().unwrap();
        assert!(engine.reset(&fence, None).is_ok());
        assert!(engine.list().is_open());
    }

    #[test]
    fn binding_in_the_wrong_state_is_a_mismatch() {
        let (device, mut engine, fence) = setup();
        let buffer = Resource::committed(
            &device,
            HeapType::Default,
            ResourceDesc::buffer(120),
            ResourceState::CopyDest,
            None,
            "vertex buffer",
        )
        .unwrap();

        let list = engine.reset(&fence, None).unwrap();
        let err = list.set_vertex_buffer(&buffer, 120, 40).unwrap_err();
        assert!(matches!(
            err,
            GpuError::StateMismatch {
                actual: ResourceState::CopyDest,
                required: ResourceState::VertexAndConstantBuffer,
                ..
            }
        ));

        list.transition(&buffer, ResourceState::VertexAndConstantBuffer).unwrap();
        list.set_vertex_buffer(&buffer, 120, 40).unwrap();
    }

    #[test]
    fn redundant_transitions_are_elided() {
        let (device, mut engine, fence) = setup();
        let buffer = Resource::committed(
            &device,
            HeapType::Default,
            ResourceDesc::buffer(16),
            ResourceState::CopyDest,
            None,
            "buffer",
        )
        .unwrap();

        let list = engine.reset(&fence, None).unwrap();
        list.transition(&buffer, ResourceState::CopyDest).unwrap();
        assert!(list.commands().is_empty());

        list.transition(&buffer, ResourceState::IndexBuffer).unwrap();
        list.transition(&buffer, ResourceState::IndexBuffer).unwrap();
        assert_eq!(list.commands().len(), 1);
    }
}
