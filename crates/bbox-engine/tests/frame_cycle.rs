//! End-to-end frame scenarios on the reference backend.

use std::io::Write;
use std::sync::Arc;

use bbox_engine::device::{
    CommandSubmissionEngine, DeviceManager, FrameFence, GpuError, GpuInit, Resource, UploadBuffer,
};
use bbox_engine::hal::reference::{ReferenceDevice, ReferenceInstance, ScriptedAdapter};
use bbox_engine::hal::{
    Command, Device, FeatureLevel, Format, HeapType, PresentTarget, PrimitiveTopology, ResourceDesc,
    ResourceId, ResourceState, ScissorRect, TransitionBarrier, Viewport,
};
use bbox_engine::input::InputState;
use bbox_engine::mesh::MeshError;
use bbox_engine::scene::{ObjectConstants, PassConstants, Renderer, RendererConfig};

const GIB: u64 = 1 << 30;

fn renderer(instance: &ReferenceInstance, config: RendererConfig) -> Result<Renderer, GpuError> {
    Renderer::new(instance, PresentTarget::Offscreen, 1280, 720, config, &GpuInit::default())
}

fn reference(device: &Arc<dyn Device>) -> &ReferenceDevice {
    device
        .as_any()
        .downcast_ref::<ReferenceDevice>()
        .expect("reference backend")
}

#[test]
fn clean_resize_replaces_size_dependent_objects() {
    let instance = ReferenceInstance::new();
    let mut r = renderer(&instance, RendererConfig::default()).unwrap();
    let input = InputState::default();

    r.update(1.0 / 60.0, &input).unwrap();
    r.draw().unwrap();

    let old_back = r.swap_chain().current_back_buffer().unwrap().id();
    let old_depth = r.swap_chain().depth_buffer().unwrap().id();

    r.resize(1920, 1080).unwrap();

    let sc = r.swap_chain();
    assert_ne!(sc.current_back_buffer().unwrap().id(), old_back);
    assert_ne!(sc.depth_buffer().unwrap().id(), old_depth);
    assert_eq!(sc.depth_buffer().unwrap().state(), ResourceState::DepthWrite);
    assert_eq!(sc.size(), (1920, 1080));
    assert_eq!(
        sc.viewport(),
        Viewport {
            x: 0.0,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    );
    assert_eq!(
        sc.scissor(),
        ScissorRect {
            left: 0,
            top: 0,
            right: 1920,
            bottom: 1080,
        }
    );
    assert_eq!(sc.current_index(), 0);

    r.update(1.0 / 60.0, &input).unwrap();
    r.draw().unwrap();

    let stats = reference(r.device()).stats();
    assert_eq!(stats.presents, 2);
    assert_eq!(stats.indexed_draws, 2);
}

fn command_kind(cmd: &Command) -> &'static str {
    match cmd {
        Command::Barrier(_) => "barrier",
        Command::SetViewport(_) => "viewport",
        Command::SetScissor(_) => "scissor",
        Command::SetRootSignature(_) => "root signature",
        Command::SetDescriptorHeap(_) => "descriptor heap",
        Command::SetRootDescriptorTable { .. } => "descriptor table",
        Command::SetPipelineState(_) => "pipeline",
        Command::SetRenderTargets { .. } => "render targets",
        Command::ClearRenderTarget { .. } => "clear color",
        Command::ClearDepthStencil { .. } => "clear depth",
        Command::SetPrimitiveTopology(_) => "topology",
        Command::SetVertexBuffer(_) => "vertex buffer",
        Command::SetIndexBuffer(_) => "index buffer",
        Command::Draw { .. } => "draw",
        Command::DrawIndexed { .. } => "draw indexed",
        Command::CopyBufferRegion { .. } => "copy",
    }
}

fn barrier(cmd: &Command) -> (ResourceId, ResourceState, ResourceState) {
    match cmd {
        Command::Barrier(b) if b.len() == 1 => (b[0].resource, b[0].before, b[0].after),
        other => panic!("expected a single barrier, got {other:?}"),
    }
}

#[test]
fn cube_frame_records_commands_in_order() {
    let instance = ReferenceInstance::new();
    let mut r = renderer(&instance, RendererConfig::default()).unwrap();
    let back_buffer = r.swap_chain().current_back_buffer().unwrap().id();

    r.update(1.0 / 60.0, &InputState::default()).unwrap();
    r.draw().unwrap();

    let list = reference(r.device()).last_executed_list();
    let kinds: Vec<&str> = list.iter().map(command_kind).collect();
    assert_eq!(
        kinds,
        vec![
            "pipeline",
            "barrier",
            "viewport",
            "scissor",
            "root signature",
            "descriptor heap",
            "descriptor table",
            "render targets",
            "clear color",
            "clear depth",
            "topology",
            "vertex buffer",
            "index buffer",
            "draw indexed",
            "barrier",
        ]
    );

    assert_eq!(
        barrier(&list[1]),
        (back_buffer, ResourceState::Present, ResourceState::RenderTarget)
    );
    assert_eq!(
        barrier(&list[14]),
        (back_buffer, ResourceState::RenderTarget, ResourceState::Present)
    );
    assert!(matches!(list[6], Command::SetRootDescriptorTable { index: 0, .. }));
    assert!(matches!(list[8], Command::ClearRenderTarget { color, .. } if color == [1.0; 4]));
    assert!(matches!(list[9], Command::ClearDepthStencil { depth, stencil: 0, .. } if depth == 1.0));
    assert!(matches!(list[10], Command::SetPrimitiveTopology(PrimitiveTopology::TriangleList)));
    assert!(matches!(&list[12], Command::SetIndexBuffer(ib) if ib.format == Format::R16Uint));
    assert!(matches!(list[13], Command::DrawIndexed { index_count: 36, instance_count: 1, .. }));
}

#[test]
fn model_frame_draws_non_indexed() {
    let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
    writeln!(file, "v 0 0 0\nv 4 0 0\nv 0 4 0\nf 1 2 3").unwrap();
    file.flush().unwrap();

    let instance = ReferenceInstance::new();
    let config = RendererConfig {
        mesh_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let mut r = renderer(&instance, config).unwrap();
    let back_buffer = r.swap_chain().current_back_buffer().unwrap().id();
    r.update(0.0, &InputState::default()).unwrap();
    r.draw().unwrap();

    let device = reference(r.device());
    let kinds: Vec<&str> = device.last_executed_list().iter().map(command_kind).collect();
    assert_eq!(
        &kinds[kinds.len() - 4..],
        ["topology", "vertex buffer", "draw", "barrier"]
    );
    assert!(!kinds.contains(&"index buffer"));

    let stats = device.stats();
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.indexed_draws, 0);
    let draw = stats.last_draw.expect("a draw was recorded");
    assert!(!draw.indexed);
    assert_eq!(draw.count, 3);
    assert_eq!(draw.render_target, back_buffer);
}

#[test]
fn present_rotates_the_back_buffer_ring() {
    let instance = ReferenceInstance::new();
    let mut r = renderer(&instance, RendererConfig::default()).unwrap();
    let input = InputState::default();

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(r.swap_chain().current_index());
        r.update(0.016, &input).unwrap();
        r.draw().unwrap();
        assert!(r.fence().completed_value() >= r.fence().current_value());
    }
    assert_eq!(seen, vec![0, 1, 0, 1]);
}

#[test]
fn zero_vertex_mesh_is_rejected() {
    let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
    writeln!(file, "# no faces\nv 0 0 0\nv 1 1 1").unwrap();
    file.flush().unwrap();

    let instance = ReferenceInstance::new();
    let config = RendererConfig {
        mesh_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let err = renderer(&instance, config).err().expect("empty mesh must fail");
    assert!(matches!(err, GpuError::Mesh(MeshError::Empty { .. })), "{err}");
}

#[test]
fn adapter_below_minimum_level_falls_back_to_software() {
    let instance = ReferenceInstance::with_adapters(vec![ScriptedAdapter::hardware(
        "Legacy GPU",
        FeatureLevel::L11_0,
        4 * GIB,
    )]);
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    assert!(manager.adapter().is_software());
}

#[test]
fn failing_hardware_device_falls_back_to_software() {
    let instance = ReferenceInstance::with_adapters(vec![
        ScriptedAdapter::hardware("Flaky GPU", FeatureLevel::L12_1, 8 * GIB).failing(),
    ]);
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    assert!(manager.adapter().is_software());
}

#[test]
fn highest_memory_hardware_adapter_wins() {
    let instance = ReferenceInstance::with_adapters(vec![
        ScriptedAdapter::hardware("Integrated", FeatureLevel::L12_0, GIB / 2),
        ScriptedAdapter::hardware("Discrete", FeatureLevel::L12_1, 8 * GIB),
    ]);
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    assert_eq!(manager.adapter().name(), "Discrete");
}

#[test]
fn flush_reaches_the_last_ticket() {
    let instance = ReferenceInstance::new();
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    let device = manager.device();
    let mut engine = CommandSubmissionEngine::new(device).unwrap();
    let mut fence = FrameFence::new(device, engine.queue()).unwrap();

    for _ in 0..3 {
        engine.reset(&fence, None).unwrap();
        engine.submit(&fence).unwrap();
        let ticket = fence.signal().unwrap();
        fence.wait(ticket).unwrap();
        assert!(fence.completed_value() >= ticket);
    }
    fence.flush().unwrap();
    assert_eq!(fence.completed_value(), fence.current_value());
}

#[test]
fn constant_buffers_use_256_byte_slots_and_round_trip() {
    let instance = ReferenceInstance::new();
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    let device = manager.device();

    let object = UploadBuffer::<ObjectConstants>::new(device, 3, true).unwrap();
    let mut pass = UploadBuffer::<PassConstants>::new(device, 2, true).unwrap();
    assert_eq!(object.stride(), 256);
    assert_eq!(pass.stride(), 256);
    assert_eq!(object.view(2).unwrap().offset, 512);

    let value = PassConstants {
        eye_pos_w: [1.0, 2.0, 3.0],
        spec_power: 8.0,
        ..PassConstants::default()
    };
    pass.write(1, &value).unwrap();
    assert_eq!(pass.read(1).unwrap(), value);
    assert!(matches!(
        pass.write(2, &value),
        Err(GpuError::IndexOutOfRange { .. })
    ));
}

#[test]
fn mismatched_barrier_removes_the_device() {
    let instance = ReferenceInstance::new();
    let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
    let device = manager.device();
    let mut engine = CommandSubmissionEngine::new(device).unwrap();
    let mut fence = FrameFence::new(device, engine.queue()).unwrap();

    let buffer = Resource::committed(
        device,
        HeapType::Default,
        ResourceDesc::buffer(256),
        ResourceState::CopyDest,
        None,
        "test buffer",
    )
    .unwrap();

    let list = engine.reset(&fence, None).unwrap();
    list.resource_barrier(vec![TransitionBarrier {
        resource: buffer.id(),
        before: ResourceState::RenderTarget,
        after: ResourceState::CopySource,
    }])
    .unwrap();
    engine.submit(&fence).unwrap();

    let err = fence.flush().unwrap_err();
    assert!(matches!(err, GpuError::DeviceRemoved(_)), "{err}");
    assert!(matches!(manager.check_removed(), Err(GpuError::DeviceRemoved(_))));
}
