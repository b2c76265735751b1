use std::sync::Arc;

use bytemuck::Pod;

use crate::device::{
    CommandList, CommandSubmissionEngine, DescriptorHeap, DeviceManager, FrameFence, GpuError,
    GpuInit, PipelineState, PipelineStateBuilder, Resource, RootSignature, SwapChainManager,
    UploadBuffer,
};
use crate::hal::{
    DescriptorHeapType, Device, Format, HeapType, Instance, PresentTarget, PrimitiveTopology,
    ResourceDesc, ResourceState,
};
use crate::input::InputState;
use crate::math::Mat4;
use crate::mesh::{Bounds, MeshError, MeshImporter, ObjImporter};
use crate::shader::{ShaderCompiler, WgslCompiler};

use super::{build_box, CameraController, ObjectConstants, PassConstants, RendererConfig, Vertex};

/// Default-heap buffer holding static geometry.
struct GeometryBuffer {
    buffer: Resource,
    size: u32,
    count: u32,
}

struct Model {
    vertices: GeometryBuffer,
    world: Mat4,
}

/// Frame orchestrator: owns every GPU object and records one frame per `draw`.
///
/// The frame is fully synchronous: `draw` submits, presents and flushes, so
/// the single allocator and both constant buffers are free again on return.
pub struct Renderer {
    config: RendererConfig,
    camera: CameraController,

    devices: DeviceManager,
    engine: CommandSubmissionEngine,
    fence: FrameFence,
    swap_chain: SwapChainManager,

    cbv_heap: DescriptorHeap,
    object_cb: UploadBuffer<ObjectConstants>,
    pass_cb: UploadBuffer<PassConstants>,

    root_signature: RootSignature,
    pipeline: PipelineState,

    box_vertices: GeometryBuffer,
    box_indices: GeometryBuffer,
    model: Option<Model>,

    width: u32,
    height: u32,
}

impl Renderer {
    /// Initializes with the WGSL compiler and the OBJ importer.
    pub fn new(
        instance: &dyn Instance,
        target: PresentTarget,
        width: u32,
        height: u32,
        config: RendererConfig,
        gpu: &GpuInit,
    ) -> Result<Self, GpuError> {
        Self::with_collaborators(instance, target, width, height, config, gpu, &WgslCompiler::new(), &ObjImporter::new())
    }

    /// Full initialization: device, queue and fence, swap chain, constant
    /// buffers, pipeline, static geometry, then the first resize.
    #[allow(clippy::too_many_arguments)]
    pub fn with_collaborators(
        instance: &dyn Instance,
        target: PresentTarget,
        width: u32,
        height: u32,
        config: RendererConfig,
        gpu: &GpuInit,
        compiler: &dyn ShaderCompiler,
        importer: &dyn MeshImporter,
    ) -> Result<Self, GpuError> {
        let devices = DeviceManager::initialize(instance, gpu)?;
        let device = devices.device().clone();
        log::info!("rendering on {} ({})", devices.adapter().name(), instance.backend_name());

        let mut engine = CommandSubmissionEngine::new(&device)?;
        let mut fence = FrameFence::new(&device, engine.queue())?;
        let swap_chain = SwapChainManager::new(&device, &engine, &target, gpu, width, height)?;

        let cbv_heap = DescriptorHeap::new(&device, DescriptorHeapType::CbvSrvUav, 2, true)?;
        let object_cb = UploadBuffer::<ObjectConstants>::new(&device, 1, true)?;
        let pass_cb = UploadBuffer::<PassConstants>::new(&device, 1, true)?;
        device
            .create_constant_buffer_view(&object_cb.view(0)?, cbv_heap.cpu_handle(0)?)
            .map_err(GpuError::resource("object constant buffer view"))?;
        device
            .create_constant_buffer_view(&pass_cb.view(0)?, cbv_heap.cpu_handle(1)?)
            .map_err(GpuError::resource("pass constant buffer view"))?;

        let vs = compiler.compile(&config.shader_path, &config.vertex_entry, &config.vertex_profile)?;
        let ps = compiler.compile(&config.shader_path, &config.pixel_entry, &config.pixel_profile)?;
        let builder = PipelineStateBuilder::new(gpu);
        let root_signature = builder.build_root_signature(&device)?;
        let pipeline = builder.build(&device, &vs, &ps, &root_signature)?;

        let cube = build_box();
        let model_vertices = match &config.mesh_path {
            Some(path) => Some(importer.load(path)?),
            None => None,
        };

        let (box_vertices, box_indices, model) = {
            let mut staging = StaticUploads::new(&device, &mut engine, &fence)?;
            let box_vertices = staging.stage(&cube.vertices, ResourceState::VertexAndConstantBuffer, "box vertex buffer")?;
            let box_indices = staging.stage(&cube.indices, ResourceState::IndexBuffer, "box index buffer")?;
            let model = match model_vertices {
                Some(vertices) => {
                    let bounds = Bounds::from_vertices(&vertices).ok_or_else(|| {
                        MeshError::Empty {
                            path: config.mesh_path.clone().unwrap_or_default(),
                        }
                    })?;
                    log::debug!(
                        "model center {:?}, scale {}",
                        bounds.center(),
                        bounds.normalize_scale()
                    );
                    Some(Model {
                        vertices: staging.stage(&vertices, ResourceState::VertexAndConstantBuffer, "model vertex buffer")?,
                        world: bounds.normalizing_transform(),
                    })
                }
                None => None,
            };
            staging.finish(&mut fence)?;
            (box_vertices, box_indices, model)
        };

        let mut renderer = Self {
            camera: CameraController::new(config.camera),
            config,
            devices,
            engine,
            fence,
            swap_chain,
            cbv_heap,
            object_cb,
            pass_cb,
            root_signature,
            pipeline,
            box_vertices,
            box_indices,
            model,
            width: 0,
            height: 0,
        };
        renderer.resize(width.max(1), height.max(1))?;
        Ok(renderer)
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        self.devices.device()
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn swap_chain(&self) -> &SwapChainManager {
        &self.swap_chain
    }

    pub fn fence(&self) -> &FrameFence {
        &self.fence
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Rebuilds the size-dependent objects. Zero sizes and the current size
    /// are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return Ok(());
        }
        self.swap_chain.resize(width, height, &mut self.engine, &mut self.fence)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Moves the camera and rewrites both constant buffers.
    pub fn update(&mut self, dt: f32, input: &InputState) -> Result<(), GpuError> {
        self.camera.update(dt, input);

        let world = self.model.as_ref().map_or(Mat4::IDENTITY, |m| m.world);
        self.object_cb.write(0, &ObjectConstants::from_world(world))?;

        let aspect = self.width.max(1) as f32 / self.height.max(1) as f32;
        let pass = PassConstants {
            view_proj: self.camera.view_proj(aspect).to_cols_array_2d(),
            eye_pos_w: self.camera.position().to_array(),
            ..PassConstants::default()
        };
        self.pass_cb.write(0, &pass)?;
        Ok(())
    }

    /// Records, submits and presents one frame, then waits for the GPU.
    pub fn draw(&mut self) -> Result<(), GpuError> {
        self.devices.check_removed()?;

        let list = self.engine.reset(&self.fence, Some(&self.pipeline))?;
        let back_buffer = self.swap_chain.current_back_buffer()?;
        let depth = self.swap_chain.depth_buffer()?;
        let rtv = self.swap_chain.current_back_buffer_view()?;
        let dsv = self.swap_chain.depth_stencil_view()?;

        list.transition(back_buffer, ResourceState::RenderTarget)?;
        list.set_viewport(self.swap_chain.viewport())?;
        list.set_scissor(self.swap_chain.scissor())?;

        list.set_root_signature(&self.root_signature)?;
        list.set_descriptor_heap(&self.cbv_heap)?;
        list.set_root_descriptor_table(0, self.cbv_heap.gpu_handle(0)?)?;

        list.set_render_targets(rtv, back_buffer, Some((dsv, depth)))?;
        list.clear_render_target(rtv, back_buffer, self.config.clear_color)?;
        list.clear_depth_stencil(dsv, depth, 1.0, 0)?;

        list.set_primitive_topology(PrimitiveTopology::TriangleList)?;
        record_geometry(list, self.model.as_ref(), &self.box_vertices, &self.box_indices)?;

        list.transition(back_buffer, ResourceState::Present)?;

        self.engine.submit(&self.fence)?;
        self.swap_chain.present()?;
        self.fence.flush()
    }
}

fn record_geometry(
    list: &mut CommandList,
    model: Option<&Model>,
    box_vertices: &GeometryBuffer,
    box_indices: &GeometryBuffer,
) -> Result<(), GpuError> {
    let stride = std::mem::size_of::<Vertex>() as u32;
    match model {
        Some(model) => {
            let vb = &model.vertices;
            list.set_vertex_buffer(&vb.buffer, vb.size, stride)?;
            list.draw(vb.count)
        }
        None => {
            list.set_vertex_buffer(&box_vertices.buffer, box_vertices.size, stride)?;
            list.set_index_buffer(&box_indices.buffer, box_indices.size, Format::R16Uint)?;
            list.draw_indexed(box_indices.count)
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.fence.flush() {
            log::warn!("final GPU flush failed: {e}");
        }
    }
}

/// One command list that copies static data from upload buffers into
/// default-heap buffers. The upload buffers live until the copy has completed.
struct StaticUploads<'a> {
    device: &'a Arc<dyn Device>,
    engine: &'a mut CommandSubmissionEngine,
    staging: Vec<UploadBuffer<u8>>,
}

impl<'a> StaticUploads<'a> {
    fn new(device: &'a Arc<dyn Device>, engine: &'a mut CommandSubmissionEngine, fence: &FrameFence) -> Result<Self, GpuError> {
        engine.reset(fence, None)?;
        Ok(Self {
            device,
            engine,
            staging: Vec::new(),
        })
    }

    fn stage<T: Pod>(&mut self, data: &[T], final_state: ResourceState, what: &'static str) -> Result<GeometryBuffer, GpuError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mut upload = UploadBuffer::<u8>::new(self.device, bytes.len(), false)?;
        upload.write_all(0, bytes)?;
        let size = upload.byte_size();

        let buffer = Resource::committed(
            self.device,
            HeapType::Default,
            ResourceDesc::buffer(size),
            ResourceState::CopyDest,
            None,
            what,
        )?;

        let list = self.engine.list();
        list.copy_buffer(&buffer, upload.resource(), size)?;
        list.transition(&buffer, final_state)?;

        self.staging.push(upload);
        Ok(GeometryBuffer {
            buffer,
            size: u32::try_from(size).map_err(|_| GpuError::InvalidCall(format!("{what} exceeds 4 GiB")))?,
            count: data.len() as u32,
        })
    }

    fn finish(self, fence: &mut FrameFence) -> Result<(), GpuError> {
        self.engine.submit(fence)?;
        fence.flush()?;
        log::debug!("uploaded {} static buffers", self.staging.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::reference::ReferenceInstance;
    use std::io::Write;

    fn reference_renderer(config: RendererConfig) -> Result<Renderer, GpuError> {
        let instance = ReferenceInstance::new();
        Renderer::new(&instance, PresentTarget::Offscreen, 1280, 720, config, &GpuInit::default())
    }

    #[test]
    fn draws_the_cube_and_keeps_the_fence_caught_up() {
        let mut r = reference_renderer(RendererConfig::default()).unwrap();
        let input = InputState::default();
        for frame in 0..3u32 {
            let before = r.swap_chain().current_index();
            r.update(1.0 / 60.0, &input).unwrap();
            r.draw().unwrap();
            assert_eq!(r.swap_chain().current_index(), (before + 1) % 2, "frame {frame}");
            assert!(r.fence().completed_value() >= r.fence().current_value());
        }
        assert!(!r.has_model());
    }

    #[test]
    fn loads_and_draws_an_obj_model() {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        writeln!(file, "v 0 0 0\nv 4 0 0\nv 0 4 0\nf 1 2 3").unwrap();
        file.flush().unwrap();

        let config = RendererConfig {
            mesh_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let mut r = reference_renderer(config).unwrap();
        assert!(r.has_model());
        r.update(0.0, &InputState::default()).unwrap();
        r.draw().unwrap();
    }

    #[test]
    fn missing_shader_aborts_initialization() {
        let config = RendererConfig {
            shader_path: "/no/such/shader.wgsl".into(),
            ..Default::default()
        };
        let err = reference_renderer(config).err().unwrap();
        assert!(matches!(err, GpuError::Shader(_)));
    }

    #[test]
    fn zero_resize_is_ignored() {
        let mut r = reference_renderer(RendererConfig::default()).unwrap();
        r.resize(0, 600).unwrap();
        assert_eq!(r.size(), (1280, 720));
    }

    #[test]
    fn resize_to_the_current_size_keeps_buffers_and_skips_the_flush() {
        let mut r = reference_renderer(RendererConfig::default()).unwrap();
        let back_buffer = r.swap_chain().current_back_buffer().unwrap().id();
        let depth = r.swap_chain().depth_buffer().unwrap().id();
        let ticket = r.fence().current_value();

        r.resize(1280, 720).unwrap();

        assert_eq!(r.swap_chain().current_back_buffer().unwrap().id(), back_buffer);
        assert_eq!(r.swap_chain().depth_buffer().unwrap().id(), depth);
        assert_eq!(r.fence().current_value(), ticket);
    }
}
