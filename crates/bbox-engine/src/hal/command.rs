use super::types::{
    CpuDescriptor, GpuDescriptor, HeapId, IndexBufferView, PipelineId, PrimitiveTopology,
    ResourceId, RootSignatureId, ScissorRect, TransitionBarrier, VertexBufferView, Viewport,
};

/// One recorded command. A closed command list is a `Vec<Command>` executed in order.
///
/// Binding state (pipeline, root signature, targets, buffers) does not carry
/// over between lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Barrier(Vec<TransitionBarrier>),

    SetViewport(Viewport),
    SetScissor(ScissorRect),

    SetRootSignature(RootSignatureId),
    SetDescriptorHeap(HeapId),
    SetRootDescriptorTable { index: u32, base: GpuDescriptor },
    SetPipelineState(PipelineId),

    SetRenderTargets {
        rtv: CpuDescriptor,
        dsv: Option<CpuDescriptor>,
    },
    ClearRenderTarget {
        rtv: CpuDescriptor,
        color: [f32; 4],
    },
    ClearDepthStencil {
        dsv: CpuDescriptor,
        depth: f32,
        stencil: u8,
    },

    SetPrimitiveTopology(PrimitiveTopology),
    SetVertexBuffer(VertexBufferView),
    SetIndexBuffer(IndexBufferView),

    Draw {
        vertex_count: u32,
        instance_count: u32,
        start_vertex: u32,
        start_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },

    CopyBufferRegion {
        dst: ResourceId,
        dst_offset: u64,
        src: ResourceId,
        src_offset: u64,
        size: u64,
    },
}
