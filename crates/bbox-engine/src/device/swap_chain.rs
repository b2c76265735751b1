use std::sync::Arc;

use crate::hal::{
    ClearValue, CpuDescriptor, DescriptorHeapType, Device, Format, HeapType, PresentTarget,
    ResourceDesc, ResourceState, ResourceUsage, ScissorRect, SwapChainDesc, SwapChainId, Viewport,
};

use super::{CommandSubmissionEngine, DescriptorHeap, FrameFence, GpuError, GpuInit, Resource};

/// Flip-model back-buffer ring plus the matching depth buffer.
///
/// Back buffers and the depth buffer exist only after the first `resize`.
pub struct SwapChainManager {
    device: Arc<dyn Device>,
    id: SwapChainId,
    desc: SwapChainDesc,
    depth_format: Format,

    rtv_heap: DescriptorHeap,
    dsv_heap: DescriptorHeap,

    back_buffers: Vec<Resource>,
    depth: Option<Resource>,

    current: u32,
    viewport: Viewport,
    scissor: ScissorRect,
}

impl SwapChainManager {
    pub fn new(
        device: &Arc<dyn Device>,
        engine: &CommandSubmissionEngine,
        target: &PresentTarget,
        init: &GpuInit,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let desc = SwapChainDesc {
            width: width.max(1),
            height: height.max(1),
            format: init.back_buffer_format,
            buffer_count: init.swap_chain_buffers,
        };
        let id = device
            .create_swap_chain(engine.queue().id(), target, &desc)
            .map_err(GpuError::resource("swap chain"))?;

        Ok(Self {
            device: device.clone(),
            id,
            desc,
            depth_format: init.depth_format,
            rtv_heap: DescriptorHeap::new(device, DescriptorHeapType::Rtv, desc.buffer_count, false)?,
            dsv_heap: DescriptorHeap::new(device, DescriptorHeapType::Dsv, 1, false)?,
            back_buffers: Vec::new(),
            depth: None,
            current: 0,
            viewport: full_viewport(desc.width, desc.height),
            scissor: full_scissor(desc.width, desc.height),
        })
    }

    /// Recreates every size-dependent object. Must not be called mid-recording.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        engine: &mut CommandSubmissionEngine,
        fence: &mut FrameFence,
    ) -> Result<(), GpuError> {
        if width == 0 || height == 0 {
            return Err(GpuError::InvalidCall(format!("resize to {width}x{height}")));
        }

        fence.flush()?;

        self.back_buffers.clear();
        self.depth = None;

        self.device.resize_swap_chain(self.id, width, height)?;
        self.desc.width = width;
        self.desc.height = height;
        self.current = self.device.current_back_buffer_index(self.id);

        let color_desc = ResourceDesc::texture_2d(
            width,
            height,
            self.desc.format,
            ResourceUsage {
                render_target: true,
                depth_stencil: false,
            },
        );
        for i in 0..self.desc.buffer_count {
            let id = self.device.swap_chain_buffer(self.id, i)?;
            let buffer = Resource::back_buffer(&self.device, id, color_desc);
            self.device
                .create_render_target_view(buffer.id(), self.rtv_heap.cpu_handle(i)?)
                .map_err(GpuError::resource("render target view"))?;
            self.back_buffers.push(buffer);
        }

        let depth = Resource::committed(
            &self.device,
            HeapType::Default,
            ResourceDesc::texture_2d(
                width,
                height,
                self.depth_format,
                ResourceUsage {
                    render_target: false,
                    depth_stencil: true,
                },
            ),
            ResourceState::Common,
            Some(ClearValue::DepthStencil { depth: 1.0, stencil: 0 }),
            "depth buffer",
        )?;
        self.device
            .create_depth_stencil_view(depth.id(), self.depth_format, self.dsv_heap.cpu_handle(0)?)
            .map_err(GpuError::resource("depth-stencil view"))?;

        let list = engine.reset(fence, None)?;
        list.transition(&depth, ResourceState::DepthWrite)?;
        engine.submit(fence)?;
        fence.flush()?;
        self.depth = Some(depth);

        self.viewport = full_viewport(width, height);
        self.scissor = full_scissor(width, height);

        log::debug!("swap chain resized to {width}x{height}");
        Ok(())
    }

    /// Presents the current back buffer and advances the ring.
    pub fn present(&mut self) -> Result<(), GpuError> {
        self.device.present(self.id)?;
        self.current = self.device.current_back_buffer_index(self.id);
        Ok(())
    }

    pub fn current_index(&self) -> u32 {
        self.current
    }

    pub fn buffer_count(&self) -> u32 {
        self.desc.buffer_count
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn current_back_buffer(&self) -> Result<&Resource, GpuError> {
        self.back_buffers
            .get(self.current as usize)
            .ok_or_else(|| GpuError::InvalidCall("swap chain has no back buffers yet".into()))
    }

    pub fn current_back_buffer_view(&self) -> Result<CpuDescriptor, GpuError> {
        self.rtv_heap.cpu_handle(self.current)
    }

    pub fn depth_buffer(&self) -> Result<&Resource, GpuError> {
        self.depth
            .as_ref()
            .ok_or_else(|| GpuError::InvalidCall("swap chain has no depth buffer yet".into()))
    }

    pub fn depth_stencil_view(&self) -> Result<CpuDescriptor, GpuError> {
        self.dsv_heap.cpu_handle(0)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scissor(&self) -> ScissorRect {
        self.scissor
    }
}

impl Drop for SwapChainManager {
    fn drop(&mut self) {
        self.back_buffers.clear();
        self.depth = None;
        self.device.release_swap_chain(self.id);
    }
}

fn full_viewport(width: u32, height: u32) -> Viewport {
    Viewport {
        x: 0.0,
        y: 0.0,
        width: width as f32,
        height: height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn full_scissor(width: u32, height: u32) -> ScissorRect {
    ScissorRect {
        left: 0,
        top: 0,
        right: width as i32,
        bottom: height as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::{reference_device, reference_state_of};

    fn setup(w: u32, h: u32) -> (Arc<dyn Device>, CommandSubmissionEngine, FrameFence, SwapChainManager) {
        let device = reference_device();
        let mut engine = CommandSubmissionEngine::new(&device).unwrap();
        let mut fence = FrameFence::new(&device, engine.queue()).unwrap();
        let mut sc =
            SwapChainManager::new(&device, &engine, &PresentTarget::Offscreen, &GpuInit::default(), w, h).unwrap();
        sc.resize(w, h, &mut engine, &mut fence).unwrap();
        (device, engine, fence, sc)
    }

    #[test]
    fn resize_leaves_depth_in_depth_write() {
        let (device, _engine, _fence, sc) = setup(64, 32);
        let depth = sc.depth_buffer().unwrap();
        assert_eq!(depth.state(), ResourceState::DepthWrite);
        assert_eq!(reference_state_of(&device, depth.id()), Some(ResourceState::DepthWrite));
        assert_eq!(sc.viewport().width, 64.0);
        assert_eq!(sc.scissor().bottom, 32);
        assert_eq!(sc.current_index(), 0);
    }

    #[test]
    fn present_advances_the_ring() {
        let (_device, _engine, mut fence, mut sc) = setup(16, 16);
        let before = sc.current_index();
        sc.present().unwrap();
        fence.flush().unwrap();
        assert_eq!(sc.current_index(), (before + 1) % 2);
        sc.present().unwrap();
        assert_eq!(sc.current_index(), before);
    }

    #[test]
    fn zero_sized_resize_is_refused() {
        let (_device, mut engine, mut fence, mut sc) = setup(16, 16);
        assert!(matches!(
            sc.resize(0, 16, &mut engine, &mut fence),
            Err(GpuError::InvalidCall(_))
        ));
    }
}
