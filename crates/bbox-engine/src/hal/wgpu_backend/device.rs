use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::convert;
use super::encode;
use crate::hal::command::Command;
use crate::hal::error::{HalError, HalResult};
use crate::hal::traits::Device;
use crate::hal::types::{
    decode_descriptor, encode_descriptor, AdapterInfo, ClearValue, ConstantBufferViewDesc,
    CpuDescriptor, DescriptorHeapDesc, DescriptorHeapType, DescriptorRangeKind, FeatureLevel,
    FenceId, FillMode, Format, GpuDescriptor, GraphicsPipelineDesc, HeapId, HeapType, PipelineId,
    PresentTarget, PrimitiveTopologyType, QueueId, ResourceDesc, ResourceDimension, ResourceId,
    ResourceState, RootParameter, RootSignatureDesc, RootSignatureId, ShaderVisibility,
    SwapChainDesc, SwapChainId,
};

const RTV_INCREMENT: u32 = 32;
const DSV_INCREMENT: u32 = 8;
pub(super) const CBV_INCREMENT: u32 = 32;

fn increment_for(ty: DescriptorHeapType) -> u32 {
    match ty {
        DescriptorHeapType::Rtv => RTV_INCREMENT,
        DescriptorHeapType::Dsv => DSV_INCREMENT,
        DescriptorHeapType::CbvSrvUav => CBV_INCREMENT,
    }
}

pub(super) enum Backing {
    Buffer {
        buffer: wgpu::Buffer,
        /// CPU copy of upload-heap contents, flushed at submission.
        shadow: Option<Vec<u8>>,
        dirty: bool,
        mapped: bool,
    },
    Texture {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
    BackBuffer {
        swap_chain: SwapChainId,
        index: u32,
    },
}

pub(super) struct GpuResource {
    pub desc: ResourceDesc,
    pub backing: Backing,
}

#[derive(Debug, Copy, Clone)]
pub(super) enum View {
    Rtv(ResourceId),
    Dsv(ResourceId),
    Cbv(ConstantBufferViewDesc),
}

pub(super) struct HeapEntry {
    pub desc: DescriptorHeapDesc,
    pub slots: Vec<Option<View>>,
}

pub(super) struct RootSignatureEntry {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    /// Binding numbers of the first descriptor table, in slot order.
    pub bindings: Vec<u32>,
}

pub(super) struct PipelineEntry {
    pub pipeline: wgpu::RenderPipeline,
    pub root_signature: RootSignatureId,
}

pub(super) struct AcquiredFrame {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

pub(super) struct SwapChainEntry {
    pub desc: SwapChainDesc,
    pub surface: Option<(wgpu::Surface<'static>, wgpu::SurfaceConfiguration)>,
    /// Surface texture for the current back buffer, acquired on first use.
    pub frame: Option<AcquiredFrame>,
    /// Backing textures when there is no surface.
    pub offscreen: Vec<(wgpu::Texture, wgpu::TextureView)>,
    pub buffers: Vec<ResourceId>,
    pub current: u32,
}

#[derive(Default)]
pub(super) struct Inner {
    pub queues: HashSet<QueueId>,
    pub fences: HashMap<FenceId, Arc<AtomicU64>>,
    pub resources: HashMap<ResourceId, GpuResource>,
    pub heaps: HashMap<HeapId, HeapEntry>,
    pub root_signatures: HashMap<RootSignatureId, RootSignatureEntry>,
    pub pipelines: HashMap<PipelineId, PipelineEntry>,
    pub swap_chains: HashMap<SwapChainId, SwapChainEntry>,
    pub surface_format: Option<wgpu::TextureFormat>,
}

impl Inner {
    /// Resolves a descriptor address to the view stored there.
    pub fn view_at(&self, raw: u64, expected: DescriptorHeapType) -> HalResult<View> {
        let increment = increment_for(expected);
        let (heap_id, slot) = decode_descriptor(raw, increment);
        let heap = self
            .heaps
            .get(&heap_id)
            .ok_or_else(|| HalError::NotFound(heap_id.to_string()))?;
        if heap.desc.ty != expected {
            return Err(HalError::InvalidArgument(format!(
                "descriptor in a {:?} heap used as {expected:?}",
                heap.desc.ty
            )));
        }
        heap.slots
            .get(slot as usize)
            .copied()
            .flatten()
            .ok_or_else(|| HalError::InvalidArgument(format!("descriptor slot {slot} of {heap_id} is empty")))
    }

    pub fn buffer(&self, id: ResourceId) -> HalResult<&wgpu::Buffer> {
        match self.resources.get(&id).map(|r| &r.backing) {
            Some(Backing::Buffer { buffer, .. }) => Ok(buffer),
            Some(_) => Err(HalError::InvalidArgument(format!("{id} is not a buffer"))),
            None => Err(HalError::NotFound(id.to_string())),
        }
    }

    /// Color or depth view for a texture or back buffer. `None` when the
    /// surface frame could not be acquired and the target should be skipped.
    pub fn target_view(&self, id: ResourceId) -> HalResult<Option<&wgpu::TextureView>> {
        match self.resources.get(&id).map(|r| &r.backing) {
            Some(Backing::Texture { view, .. }) => Ok(Some(view)),
            Some(Backing::BackBuffer { swap_chain, index }) => {
                let sc = self
                    .swap_chains
                    .get(swap_chain)
                    .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
                if sc.surface.is_some() {
                    Ok(sc.frame.as_ref().map(|f| &f.view))
                } else {
                    Ok(sc.offscreen.get(*index as usize).map(|(_, v)| v))
                }
            }
            Some(Backing::Buffer { .. }) => Err(HalError::InvalidArgument(format!("{id} is a buffer"))),
            None => Err(HalError::NotFound(id.to_string())),
        }
    }

    pub fn target_size(&self, id: ResourceId) -> (u32, u32) {
        self.resources
            .get(&id)
            .map(|r| (r.desc.width as u32, r.desc.height))
            .unwrap_or((0, 0))
    }
}

/// Device of the wgpu backend.
pub struct WgpuDevice {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: AdapterInfo,
    level: FeatureLevel,
    inner: Mutex<Inner>,
    removed: Arc<Mutex<Option<String>>>,
    next_id: AtomicU64,
}

impl WgpuDevice {
    pub(super) fn new(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        info: AdapterInfo,
        level: FeatureLevel,
    ) -> Self {
        let removed = Arc::new(Mutex::new(None));
        let lost = removed.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            if let Ok(mut slot) = lost.lock() {
                slot.get_or_insert(format!("{reason:?}: {message}"));
            }
        });

        log::info!("wgpu device created on {}", info.name);

        Self {
            instance,
            adapter,
            device,
            queue,
            info,
            level,
            inner: Mutex::new(Inner::default()),
            removed,
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> HalResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| HalError::Backend("wgpu device state poisoned".into()))
    }

    fn live(&self) -> HalResult<MutexGuard<'_, Inner>> {
        if let Some(reason) = self.removed_reason() {
            return Err(HalError::DeviceRemoved(reason));
        }
        self.lock()
    }

    fn next<T>(&self, make: fn(u64) -> T) -> T {
        make(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn create_target_texture(&self, desc: &ResourceDesc, format: wgpu::TextureFormat) -> (wgpu::Texture, wgpu::TextureView) {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if !format.has_depth_aspect() {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("bbox target"),
            size: wgpu::Extent3d {
                width: desc.width as u32,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn populate_back_buffers(&self, inner: &mut Inner, id: SwapChainId) -> HalResult<()> {
        let format = inner.surface_format;
        let Some(sc) = inner.swap_chains.get(&id) else {
            return Err(HalError::NotFound(id.to_string()));
        };
        let desc = sc.desc;
        let needs_offscreen = sc.surface.is_none();

        let rd = ResourceDesc::texture_2d(
            desc.width,
            desc.height,
            desc.format,
            crate::hal::types::ResourceUsage {
                render_target: true,
                depth_stencil: false,
            },
        );

        let mut buffers = Vec::with_capacity(desc.buffer_count as usize);
        let mut offscreen = Vec::new();
        for index in 0..desc.buffer_count {
            let rid = self.next(ResourceId::from_raw);
            inner.resources.insert(
                rid,
                GpuResource {
                    desc: rd,
                    backing: Backing::BackBuffer { swap_chain: id, index },
                },
            );
            buffers.push(rid);
            if needs_offscreen {
                offscreen.push(self.create_target_texture(&rd, convert::texture_format(desc.format, format)?));
            }
        }

        if let Some(sc) = inner.swap_chains.get_mut(&id) {
            sc.buffers = buffers;
            sc.offscreen = offscreen;
            sc.current = 0;
        }
        Ok(())
    }

    fn acquire(&self, sc: &mut SwapChainEntry) -> HalResult<()> {
        let Some((surface, config)) = &sc.surface else {
            return Ok(());
        };
        if sc.frame.is_some() {
            return Ok(());
        }

        let texture = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.device, config);
                surface
                    .get_current_texture()
                    .map_err(|e| HalError::Backend(format!("surface acquire after reconfigure: {e}")))?
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(HalError::OutOfMemory),
            Err(e) => {
                log::warn!("skipping frame, surface not ready: {e}");
                return Ok(());
            }
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        sc.frame = Some(AcquiredFrame { texture, view });
        Ok(())
    }

    /// Acquires surface frames for every back buffer these lists render to.
    fn acquire_targets(&self, inner: &mut Inner, lists: &[&[Command]]) -> HalResult<()> {
        let mut wanted: Vec<SwapChainId> = Vec::new();
        for cmd in lists.iter().flat_map(|l| l.iter()) {
            let rtv = match cmd {
                Command::SetRenderTargets { rtv, .. } | Command::ClearRenderTarget { rtv, .. } => rtv,
                _ => continue,
            };
            if let View::Rtv(id) = inner.view_at(rtv.0, DescriptorHeapType::Rtv)? {
                if let Some(Backing::BackBuffer { swap_chain, .. }) = inner.resources.get(&id).map(|r| &r.backing) {
                    if !wanted.contains(swap_chain) {
                        wanted.push(*swap_chain);
                    }
                }
            }
        }
        for id in wanted {
            if let Some(sc) = inner.swap_chains.get_mut(&id) {
                self.acquire(sc)?;
            }
        }
        Ok(())
    }

    fn flush_uploads(&self, inner: &mut Inner) {
        for res in inner.resources.values_mut() {
            if let Backing::Buffer {
                buffer,
                shadow: Some(shadow),
                dirty,
                ..
            } = &mut res.backing
            {
                if *dirty {
                    let len = (shadow.len() as u64 / wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
                    self.queue.write_buffer(buffer, 0, &shadow[..len as usize]);
                    *dirty = false;
                }
            }
        }
    }

    fn shader_module(&self, bytes: &[u8], label: &str) -> HalResult<wgpu::ShaderModule> {
        let src = std::str::from_utf8(bytes)
            .map_err(|e| HalError::InvalidArgument(format!("{label} is not WGSL text: {e}")))?;
        Ok(self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(src.into()),
        }))
    }
}

impl Device for WgpuDevice {
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
        self.removed.lock().ok().and_then(|r| r.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    // ── queues & fences ──────────────────────────────────────────────────

    fn create_command_queue(&self) -> HalResult<QueueId> {
        let mut inner = self.live()?;
        if !inner.queues.is_empty() {
            return Err(HalError::Unsupported("wgpu exposes a single queue per device".into()));
        }
        let id = self.next(QueueId::from_raw);
        inner.queues.insert(id);
        Ok(id)
    }

    fn release_command_queue(&self, queue: QueueId) {
        if let Ok(mut inner) = self.lock() {
            inner.queues.remove(&queue);
        }
    }

    fn execute_command_lists(&self, queue: QueueId, lists: &[&[Command]]) -> HalResult<()> {
        let mut inner = self.live()?;
        if !inner.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }

        self.flush_uploads(&mut inner);
        self.acquire_targets(&mut inner, lists)?;

        let mut buffers = Vec::with_capacity(lists.len());
        for list in lists {
            buffers.push(encode::encode_list(&self.device, &inner, list)?);
        }
        self.queue.submit(buffers);
        Ok(())
    }

    fn create_fence(&self, initial_value: u64) -> HalResult<FenceId> {
        let mut inner = self.live()?;
        let id = self.next(FenceId::from_raw);
        inner.fences.insert(id, Arc::new(AtomicU64::new(initial_value)));
        Ok(id)
    }

    fn release_fence(&self, fence: FenceId) {
        if let Ok(mut inner) = self.lock() {
            inner.fences.remove(&fence);
        }
    }

    fn signal(&self, queue: QueueId, fence: FenceId, value: u64) -> HalResult<()> {
        let inner = self.live()?;
        if !inner.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }
        let counter = inner
            .fences
            .get(&fence)
            .cloned()
            .ok_or_else(|| HalError::NotFound(fence.to_string()))?;
        drop(inner);

        // An empty submission marks the point in the queue the signal follows.
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        self.queue.on_submitted_work_done(move || {
            counter.fetch_max(value, Ordering::AcqRel);
        });
        Ok(())
    }

    fn fence_completed_value(&self, fence: FenceId) -> u64 {
        let _ = self.device.poll(wgpu::PollType::Poll);
        if self.removed_reason().is_some() {
            return u64::MAX;
        }
        self.lock()
            .ok()
            .and_then(|i| i.fences.get(&fence).map(|c| c.load(Ordering::Acquire)))
            .unwrap_or(0)
    }

    fn wait_for_fence(&self, fence: FenceId, value: u64) -> HalResult<()> {
        let counter = self
            .lock()?
            .fences
            .get(&fence)
            .cloned()
            .ok_or_else(|| HalError::NotFound(fence.to_string()))?;

        loop {
            if counter.load(Ordering::Acquire) >= value {
                return Ok(());
            }
            if let Some(reason) = self.removed_reason() {
                return Err(HalError::DeviceRemoved(reason));
            }
            // Blocks until the latest submission, which carries the signal's
            // completion callback, has finished.
            if let Err(e) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
                return Err(HalError::Backend(format!("device poll failed: {e}")));
            }
            if counter.load(Ordering::Acquire) < value && self.removed_reason().is_none() {
                return Err(HalError::Backend(format!(
                    "fence {fence} reached {} after the queue drained, expected {value}",
                    counter.load(Ordering::Acquire)
                )));
            }
        }
    }

    // ── resources ────────────────────────────────────────────────────────

    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        _initial_state: ResourceState,
        _clear_value: Option<ClearValue>,
    ) -> HalResult<ResourceId> {
        let mut inner = self.live()?;
        if desc.width == 0 || desc.height == 0 {
            return Err(HalError::InvalidArgument("resource has a zero dimension".into()));
        }

        let backing = match desc.dimension {
            ResourceDimension::Buffer => {
                let size = convert::align_copy(desc.width).max(wgpu::COPY_BUFFER_ALIGNMENT);
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(match heap {
                        HeapType::Upload => "bbox upload buffer",
                        HeapType::Default => "bbox default buffer",
                    }),
                    size,
                    usage: wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::UNIFORM
                        | wgpu::BufferUsages::VERTEX
                        | wgpu::BufferUsages::INDEX,
                    mapped_at_creation: false,
                });
                Backing::Buffer {
                    buffer,
                    shadow: (heap == HeapType::Upload).then(|| vec![0; size as usize]),
                    dirty: false,
                    mapped: false,
                }
            }
            ResourceDimension::Texture2D => {
                if heap == HeapType::Upload {
                    return Err(HalError::InvalidArgument("textures cannot live in an upload heap".into()));
                }
                let format = convert::texture_format(desc.format, inner.surface_format)?;
                let (texture, view) = self.create_target_texture(desc, format);
                Backing::Texture { texture, view }
            }
        };

        let id = self.next(ResourceId::from_raw);
        inner.resources.insert(id, GpuResource { desc: *desc, backing });
        Ok(id)
    }

    fn release_resource(&self, resource: ResourceId) {
        let Ok(mut inner) = self.lock() else { return };
        if let Some(res) = inner.resources.get(&resource) {
            if !matches!(res.backing, Backing::BackBuffer { .. }) {
                inner.resources.remove(&resource);
            }
        }
    }

    fn map(&self, resource: ResourceId) -> HalResult<()> {
        let mut inner = self.live()?;
        match inner.resources.get_mut(&resource).map(|r| &mut r.backing) {
            Some(Backing::Buffer {
                shadow: Some(_),
                mapped,
                ..
            }) => {
                *mapped = true;
                Ok(())
            }
            Some(_) => Err(HalError::InvalidCall(format!("{resource} is not CPU-visible"))),
            None => Err(HalError::NotFound(resource.to_string())),
        }
    }

    fn unmap(&self, resource: ResourceId) {
        let Ok(mut inner) = self.lock() else { return };
        if let Some(Backing::Buffer { mapped, .. }) = inner.resources.get_mut(&resource).map(|r| &mut r.backing) {
            *mapped = false;
        }
    }

    fn write_mapped(&self, resource: ResourceId, offset: u64, data: &[u8]) -> HalResult<()> {
        let mut inner = self.live()?;
        let Some(Backing::Buffer {
            shadow: Some(shadow),
            dirty,
            mapped: true,
            ..
        }) = inner.resources.get_mut(&resource).map(|r| &mut r.backing)
        else {
            return Err(HalError::InvalidCall(format!("{resource} is not a mapped upload buffer")));
        };
        let end = offset as usize + data.len();
        if end > shadow.len() {
            return Err(HalError::InvalidArgument(format!("write overruns {resource}")));
        }
        shadow[offset as usize..end].copy_from_slice(data);
        *dirty = true;
        Ok(())
    }

    fn read_resource(&self, resource: ResourceId, offset: u64, len: usize) -> HalResult<Vec<u8>> {
        let inner = self.lock()?;
        match inner.resources.get(&resource).map(|r| &r.backing) {
            Some(Backing::Buffer {
                shadow: Some(shadow), ..
            }) => {
                let start = offset as usize;
                shadow
                    .get(start..start + len)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| HalError::InvalidArgument(format!("read past the end of {resource}")))
            }
            Some(_) => Err(HalError::Unsupported("readback of GPU-only memory".into())),
            None => Err(HalError::NotFound(resource.to_string())),
        }
    }

    // ── descriptors ──────────────────────────────────────────────────────

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> HalResult<HeapId> {
        let mut inner = self.live()?;
        if desc.capacity == 0 {
            return Err(HalError::InvalidArgument("descriptor heap capacity is zero".into()));
        }
        let id = self.next(HeapId::from_raw);
        inner.heaps.insert(
            id,
            HeapEntry {
                desc: *desc,
                slots: vec![None; desc.capacity as usize],
            },
        );
        Ok(id)
    }

    fn release_descriptor_heap(&self, heap: HeapId) {
        if let Ok(mut inner) = self.lock() {
            inner.heaps.remove(&heap);
        }
    }

    fn cpu_descriptor_start(&self, heap: HeapId) -> CpuDescriptor {
        CpuDescriptor(encode_descriptor(heap, 0))
    }

    fn gpu_descriptor_start(&self, heap: HeapId) -> Option<GpuDescriptor> {
        let inner = self.lock().ok()?;
        let entry = inner.heaps.get(&heap)?;
        entry
            .desc
            .shader_visible
            .then(|| GpuDescriptor(encode_descriptor(heap, 0)))
    }

    fn create_render_target_view(&self, resource: ResourceId, dest: CpuDescriptor) -> HalResult<()> {
        write_view(&mut *self.live()?, dest, DescriptorHeapType::Rtv, View::Rtv(resource))
    }

    fn create_depth_stencil_view(&self, resource: ResourceId, format: Format, dest: CpuDescriptor) -> HalResult<()> {
        if !format.is_depth() {
            return Err(HalError::InvalidArgument(format!("{format:?} is not a depth format")));
        }
        write_view(&mut *self.live()?, dest, DescriptorHeapType::Dsv, View::Dsv(resource))
    }

    fn create_constant_buffer_view(&self, view: &ConstantBufferViewDesc, dest: CpuDescriptor) -> HalResult<()> {
        if view.size == 0 || view.size % 256 != 0 || view.offset % 256 != 0 {
            return Err(HalError::InvalidArgument(
                "constant buffer views must be non-zero multiples of 256 bytes".into(),
            ));
        }
        write_view(&mut *self.live()?, dest, DescriptorHeapType::CbvSrvUav, View::Cbv(*view))
    }

    // ── pipeline ─────────────────────────────────────────────────────────

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> HalResult<RootSignatureId> {
        let mut inner = self.live()?;
        if desc.parameters.len() > 1 {
            return Err(HalError::Unsupported("more than one root parameter".into()));
        }

        let mut entries = Vec::new();
        let mut bindings = Vec::new();
        if let Some(RootParameter::DescriptorTable { ranges, visibility }) = desc.parameters.first() {
            let stages = match visibility {
                ShaderVisibility::All => wgpu::ShaderStages::VERTEX_FRAGMENT,
                ShaderVisibility::Vertex => wgpu::ShaderStages::VERTEX,
                ShaderVisibility::Pixel => wgpu::ShaderStages::FRAGMENT,
            };
            for range in ranges {
                if range.kind != DescriptorRangeKind::Cbv {
                    return Err(HalError::Unsupported(format!("{:?} descriptor ranges", range.kind)));
                }
                for r in 0..range.count {
                    let binding = range.base_register + r;
                    bindings.push(binding);
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding,
                        visibility: stages,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    });
                }
            }
        }

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bbox root signature"),
            entries: &entries,
        });
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bbox pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let id = self.next(RootSignatureId::from_raw);
        inner.root_signatures.insert(
            id,
            RootSignatureEntry {
                bind_group_layout,
                pipeline_layout,
                bindings,
            },
        );
        Ok(id)
    }

    fn release_root_signature(&self, root_signature: RootSignatureId) {
        if let Ok(mut inner) = self.lock() {
            inner.root_signatures.remove(&root_signature);
        }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> HalResult<PipelineId> {
        let mut inner = self.live()?;
        let layout = &inner
            .root_signatures
            .get(&desc.root_signature)
            .ok_or_else(|| HalError::NotFound(desc.root_signature.to_string()))?
            .pipeline_layout;

        if desc.rasterizer.fill_mode == FillMode::Wireframe {
            return Err(HalError::Unsupported("wireframe fill".into()));
        }
        if desc.topology != PrimitiveTopologyType::Triangle {
            return Err(HalError::Unsupported(format!("{:?} pipelines", desc.topology)));
        }
        let [rt_format] = desc.render_target_formats.as_slice() else {
            return Err(HalError::InvalidArgument("exactly one render target format is supported".into()));
        };

        let vs = self.shader_module(&desc.vertex_shader.bytes, "bbox vertex shader")?;
        let ps = self.shader_module(&desc.pixel_shader.bytes, "bbox pixel shader")?;

        let mut attributes = Vec::with_capacity(desc.input_layout.len());
        let mut stride = 0u64;
        for (location, el) in desc.input_layout.iter().enumerate() {
            attributes.push(wgpu::VertexAttribute {
                format: convert::vertex_format(el.format)?,
                offset: el.aligned_byte_offset as u64,
                shader_location: location as u32,
            });
            stride = stride.max(el.aligned_byte_offset as u64 + el.format.bytes_per_element() as u64);
        }

        let color_format = convert::texture_format(*rt_format, inner.surface_format)?;
        let ds = desc.depth_stencil;
        let depth_stencil = (desc.depth_stencil_format != Format::Unknown)
            .then(|| -> HalResult<wgpu::DepthStencilState> {
                Ok(wgpu::DepthStencilState {
                    format: convert::texture_format(desc.depth_stencil_format, None)?,
                    depth_write_enabled: ds.depth_enable && ds.depth_write,
                    depth_compare: if ds.depth_enable {
                        convert::compare(ds.depth_func)
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                })
            })
            .transpose()?;

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("bbox pipeline"),
            layout: Some(layout),

            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some(desc.vertex_shader.entry_point.as_str()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &ps,
                entry_point: Some(desc.pixel_shader.entry_point.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: desc.blend.enabled.then_some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: convert::write_mask(desc.blend.write_mask),
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: convert::front_face(desc.rasterizer.front_counter_clockwise),
                cull_mode: convert::cull(desc.rasterizer.cull_mode),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: desc.sample_count,
                mask: desc.sample_mask as u64,
                alpha_to_coverage_enabled: false,
            },

            multiview_mask: None,
            cache: None,
        });

        let id = self.next(PipelineId::from_raw);
        inner.pipelines.insert(
            id,
            PipelineEntry {
                pipeline,
                root_signature: desc.root_signature,
            },
        );
        Ok(id)
    }

    fn release_pipeline(&self, pipeline: PipelineId) {
        if let Ok(mut inner) = self.lock() {
            inner.pipelines.remove(&pipeline);
        }
    }

    // ── swap chain ───────────────────────────────────────────────────────

    fn create_swap_chain(
        &self,
        queue: QueueId,
        target: &PresentTarget,
        desc: &SwapChainDesc,
    ) -> HalResult<SwapChainId> {
        let mut inner = self.live()?;
        if !inner.queues.contains(&queue) {
            return Err(HalError::NotFound(queue.to_string()));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(HalError::InvalidArgument("swap chain has a zero dimension".into()));
        }

        let surface = match target {
            PresentTarget::Window(window) => {
                let surface = self
                    .instance
                    .create_surface(window.clone())
                    .map_err(|e| HalError::Backend(format!("failed to create wgpu surface: {e}")))?;

                let caps = surface.get_capabilities(&self.adapter);
                let format = [wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Bgra8Unorm]
                    .into_iter()
                    .find(|f| caps.formats.contains(f))
                    .ok_or_else(|| HalError::Unsupported("surface has no 8-bit UNORM format".into()))?;
                let alpha_mode = caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto);

                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: desc.width,
                    height: desc.height,
                    present_mode: wgpu::PresentMode::Fifo,
                    alpha_mode,
                    view_formats: vec![],
                    desired_maximum_frame_latency: desc.buffer_count.saturating_sub(1).max(1),
                };
                surface.configure(&self.device, &config);
                inner.surface_format = Some(format);
                Some((surface, config))
            }
            PresentTarget::Offscreen => None,
        };

        let id = self.next(SwapChainId::from_raw);
        inner.swap_chains.insert(
            id,
            SwapChainEntry {
                desc: *desc,
                surface,
                frame: None,
                offscreen: Vec::new(),
                buffers: Vec::new(),
                current: 0,
            },
        );
        self.populate_back_buffers(&mut inner, id)?;
        Ok(id)
    }

    fn release_swap_chain(&self, swap_chain: SwapChainId) {
        let Ok(mut inner) = self.lock() else { return };
        if let Some(sc) = inner.swap_chains.remove(&swap_chain) {
            for b in sc.buffers {
                inner.resources.remove(&b);
            }
        }
    }

    fn swap_chain_buffer(&self, swap_chain: SwapChainId, index: u32) -> HalResult<ResourceId> {
        let inner = self.live()?;
        let sc = inner
            .swap_chains
            .get(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        sc.buffers
            .get(index as usize)
            .copied()
            .ok_or_else(|| HalError::InvalidArgument(format!("back buffer index {index}")))
    }

    fn resize_swap_chain(&self, swap_chain: SwapChainId, width: u32, height: u32) -> HalResult<()> {
        let mut inner = self.live()?;
        if width == 0 || height == 0 {
            return Err(HalError::InvalidArgument("swap chain has a zero dimension".into()));
        }

        let sc = inner
            .swap_chains
            .get_mut(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        sc.frame = None;
        sc.desc.width = width;
        sc.desc.height = height;
        if let Some((surface, config)) = &mut sc.surface {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
        }
        let old = std::mem::take(&mut sc.buffers);

        for b in old {
            inner.resources.remove(&b);
        }
        self.populate_back_buffers(&mut inner, swap_chain)
    }

    fn current_back_buffer_index(&self, swap_chain: SwapChainId) -> u32 {
        self.lock()
            .ok()
            .and_then(|i| i.swap_chains.get(&swap_chain).map(|sc| sc.current))
            .unwrap_or(0)
    }

    fn present(&self, swap_chain: SwapChainId) -> HalResult<()> {
        let mut inner = self.live()?;
        let sc = inner
            .swap_chains
            .get_mut(&swap_chain)
            .ok_or_else(|| HalError::NotFound(swap_chain.to_string()))?;
        if let Some(AcquiredFrame { texture, view }) = sc.frame.take() {
            drop(view);
            texture.present();
        }
        sc.current = (sc.current + 1) % sc.desc.buffer_count;
        Ok(())
    }
}

fn write_view(inner: &mut Inner, dest: CpuDescriptor, ty: DescriptorHeapType, view: View) -> HalResult<()> {
    let (heap_id, slot) = decode_descriptor(dest.0, increment_for(ty));
    let heap = inner
        .heaps
        .get_mut(&heap_id)
        .ok_or_else(|| HalError::NotFound(heap_id.to_string()))?;
    if heap.desc.ty != ty {
        return Err(HalError::InvalidArgument(format!(
            "{ty:?} view written into a {:?} heap",
            heap.desc.ty
        )));
    }
    let cell = heap
        .slots
        .get_mut(slot as usize)
        .ok_or_else(|| HalError::InvalidArgument(format!("descriptor slot {slot} outside {heap_id}")))?;
    *cell = Some(view);
    Ok(())
}
