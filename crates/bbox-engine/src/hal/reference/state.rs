use std::collections::{HashMap, HashSet};

use crate::hal::command::Command;

use crate::hal::types::{
    decode_descriptor, ConstantBufferViewDesc, CpuDescriptor, DescriptorHeapDesc,
    DescriptorHeapType, FenceId, Format, HeapId, HeapType, PipelineId, QueueId, ResourceDesc,
    ResourceId, ResourceState, RootSignatureDesc, RootSignatureId, ScissorRect, SwapChainDesc,
    SwapChainId, Viewport,
};

pub(super) const RTV_INCREMENT: u32 = 32;
pub(super) const DSV_INCREMENT: u32 = 8;
pub(super) const CBV_SRV_UAV_INCREMENT: u32 = 64;

pub(super) fn increment_for(ty: DescriptorHeapType) -> u32 {
    match ty {
        DescriptorHeapType::Rtv => RTV_INCREMENT,
        DescriptorHeapType::Dsv => DSV_INCREMENT,
        DescriptorHeapType::CbvSrvUav => CBV_SRV_UAV_INCREMENT,
    }
}

pub(super) struct ResourceEntry {
    pub desc: ResourceDesc,
    pub heap: HeapType,
    /// State as seen by the queue, i.e. after all executed barriers.
    pub state: ResourceState,
    pub data: Vec<u8>,
    pub mapped: bool,
    /// Back buffers belong to their swap chain and are only reference-counted here.
    pub owner: Option<SwapChainId>,
    pub refs: u32,
}

#[derive(Debug, Copy, Clone)]
pub(super) enum View {
    Rtv(ResourceId),
    Dsv(ResourceId, Format),
    Cbv(ConstantBufferViewDesc),
}

pub(super) struct HeapEntry {
    pub desc: DescriptorHeapDesc,
    pub slots: Vec<Option<View>>,
}

pub(super) struct PipelineEntry {
    pub root_signature: RootSignatureId,
    pub render_target_format: Format,
    pub depth_format: Format,
    pub vertex_stride: u32,
}

pub(super) struct SwapChainEntry {
    pub desc: SwapChainDesc,
    pub buffers: Vec<ResourceId>,
    pub current: u32,
}

/// One validated draw, kept for inspection.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawRecord {
    pub indexed: bool,
    /// Vertex count, or index count for indexed draws.
    pub count: u32,
    pub pipeline: PipelineId,
    pub render_target: ResourceId,
    pub depth_stencil: Option<ResourceId>,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
}

/// Counters the queue thread maintains while executing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceStats {
    pub lists_executed: u64,
    pub barriers: u64,
    pub draws: u64,
    pub indexed_draws: u64,
    pub copies: u64,
    pub presents: u64,
    pub last_draw: Option<DrawRecord>,
}

#[derive(Default)]
pub(super) struct State {
    pub queues: HashSet<QueueId>,
    pub fences: HashMap<FenceId, u64>,
    pub resources: HashMap<ResourceId, ResourceEntry>,
    pub heaps: HashMap<HeapId, HeapEntry>,
    pub root_signatures: HashMap<RootSignatureId, RootSignatureDesc>,
    pub pipelines: HashMap<PipelineId, PipelineEntry>,
    pub swap_chains: HashMap<SwapChainId, SwapChainEntry>,

    /// Queue operations sent but not yet drained.
    pub pending: usize,
    pub removed: Option<String>,
    pub stats: ReferenceStats,
    /// Most recently executed command list.
    pub last_list: Vec<Command>,
}

impl State {
    /// Marks the device lost. Fences jump to `u64::MAX` so no waiter hangs.
    pub fn remove(&mut self, reason: String) {
        if self.removed.is_some() {
            return;
        }
        log::error!("reference device removed: {reason}");
        self.removed = Some(reason);
        for v in self.fences.values_mut() {
            *v = u64::MAX;
        }
    }

    pub fn resource(&self, id: ResourceId) -> Result<&ResourceEntry, String> {
        self.resources
            .get(&id)
            .ok_or_else(|| format!("{id} does not exist (released or never created)"))
    }

    pub fn resource_mut(&mut self, id: ResourceId) -> Result<&mut ResourceEntry, String> {
        self.resources
            .get_mut(&id)
            .ok_or_else(|| format!("{id} does not exist (released or never created)"))
    }

    /// Resolves a descriptor address to `(heap, slot)`, checking heap type and bounds.
    pub fn locate(&self, raw: u64, expected: DescriptorHeapType) -> Result<(HeapId, u32), String> {
        let heap_id = HeapId::from_raw(raw >> 32);
        let heap = self
            .heaps
            .get(&heap_id)
            .ok_or_else(|| format!("descriptor {raw:#x} points into unknown {heap_id}"))?;

        if heap.desc.ty != expected {
            return Err(format!(
                "descriptor {raw:#x} is in a {:?} heap, expected {expected:?}",
                heap.desc.ty
            ));
        }

        let increment = increment_for(heap.desc.ty);
        if (raw & 0xFFFF_FFFF) % increment as u64 != 0 {
            return Err(format!("descriptor {raw:#x} is not aligned to the heap increment {increment}"));
        }

        let (_, slot) = decode_descriptor(raw, increment);
        if slot >= heap.desc.capacity {
            return Err(format!(
                "descriptor slot {slot} is outside {heap_id} (capacity {})",
                heap.desc.capacity
            ));
        }

        Ok((heap_id, slot))
    }

    pub fn view_at(&self, raw: CpuDescriptor, expected: DescriptorHeapType) -> Result<View, String> {
        let (heap_id, slot) = self.locate(raw.0, expected)?;
        self.heaps[&heap_id].slots[slot as usize]
            .ok_or_else(|| format!("descriptor slot {slot} of {heap_id} holds no view"))
    }
}
