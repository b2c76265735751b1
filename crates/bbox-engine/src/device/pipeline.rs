use std::sync::Arc;

use crate::hal::{
    BlendState, ComparisonFunc, CullMode, DepthStencilState, DescriptorRange, DescriptorRangeKind,
    Device, FillMode, Format, GraphicsPipelineDesc, InputElement, PipelineId, PrimitiveTopologyType,
    RasterizerState, RootParameter, RootSignatureDesc, RootSignatureFlags, RootSignatureId,
    ShaderBytecode, ShaderVisibility,
};

use super::{GpuError, GpuInit};

/// Immutable root signature. Released on drop.
pub struct RootSignature {
    device: Arc<dyn Device>,
    id: RootSignatureId,
}

impl RootSignature {
    pub fn id(&self) -> RootSignatureId {
        self.id
    }
}

impl Drop for RootSignature {
    fn drop(&mut self) {
        self.device.release_root_signature(self.id);
    }
}

/// Immutable graphics pipeline. Released on drop.
pub struct PipelineState {
    device: Arc<dyn Device>,
    id: PipelineId,
}

impl PipelineState {
    pub fn id(&self) -> PipelineId {
        self.id
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        self.device.release_pipeline(self.id);
    }
}

/// Builds the single opaque, depth-tested pipeline the viewer uses.
#[derive(Debug, Clone)]
pub struct PipelineStateBuilder {
    back_buffer_format: Format,
    depth_format: Format,
}

impl PipelineStateBuilder {
    /// Position, normal, color; 40 bytes per vertex.
    pub const INPUT_LAYOUT: [InputElement; 3] = [
        InputElement {
            semantic: "POSITION",
            format: Format::R32G32B32Float,
            input_slot: 0,
            aligned_byte_offset: 0,
        },
        InputElement {
            semantic: "NORMAL",
            format: Format::R32G32B32Float,
            input_slot: 0,
            aligned_byte_offset: 12,
        },
        InputElement {
            semantic: "COLOR",
            format: Format::R32G32B32A32Float,
            input_slot: 0,
            aligned_byte_offset: 24,
        },
    ];

    pub fn new(init: &GpuInit) -> Self {
        Self {
            back_buffer_format: init.back_buffer_format,
            depth_format: init.depth_format,
        }
    }

    /// One descriptor table with two CBVs (b0 object, b1 pass).
    pub fn root_signature_desc() -> RootSignatureDesc {
        RootSignatureDesc {
            parameters: vec![RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange {
                    kind: DescriptorRangeKind::Cbv,
                    count: 2,
                    base_register: 0,
                    register_space: 0,
                }],
                visibility: ShaderVisibility::All,
            }],
            flags: RootSignatureFlags {
                allow_input_assembler_input_layout: true,
                deny_hull_shader_root_access: true,
                deny_domain_shader_root_access: true,
                deny_geometry_shader_root_access: true,
            },
        }
    }

    pub fn build_root_signature(&self, device: &Arc<dyn Device>) -> Result<RootSignature, GpuError> {
        let id = device
            .create_root_signature(&Self::root_signature_desc())
            .map_err(GpuError::PipelineCreation)?;
        Ok(RootSignature {
            device: device.clone(),
            id,
        })
    }

    pub fn pipeline_desc(&self, vs: &ShaderBytecode, ps: &ShaderBytecode, root_signature: &RootSignature) -> GraphicsPipelineDesc {
        GraphicsPipelineDesc {
            root_signature: root_signature.id(),
            vertex_shader: vs.clone(),
            pixel_shader: ps.clone(),
            input_layout: Self::INPUT_LAYOUT.to_vec(),
            rasterizer: RasterizerState {
                fill_mode: FillMode::Solid,
                cull_mode: CullMode::Back,
                front_counter_clockwise: false,
                depth_clip: true,
            },
            blend: BlendState {
                enabled: false,
                write_mask: 0xF,
            },
            depth_stencil: DepthStencilState {
                depth_enable: true,
                depth_write: true,
                depth_func: ComparisonFunc::Less,
                stencil_enable: false,
            },
            sample_mask: u32::MAX,
            topology: PrimitiveTopologyType::Triangle,
            render_target_formats: vec![self.back_buffer_format],
            depth_stencil_format: self.depth_format,
            sample_count: 1,
        }
    }

    /// Backend rejection is reported as `PipelineCreation`.
    pub fn build(
        &self,
        device: &Arc<dyn Device>,
        vs: &ShaderBytecode,
        ps: &ShaderBytecode,
        root_signature: &RootSignature,
    ) -> Result<PipelineState, GpuError> {
        let id = device
            .create_graphics_pipeline(&self.pipeline_desc(vs, ps, root_signature))
            .map_err(GpuError::PipelineCreation)?;
        log::debug!("pipeline {id} created");
        Ok(PipelineState {
            device: device.clone(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::reference_device;
    use crate::hal::ShaderStage;

    fn blob(stage: ShaderStage, entry: &str) -> ShaderBytecode {
        ShaderBytecode {
            stage,
            entry_point: entry.to_string(),
            bytes: Arc::from(&b"@vertex fn vs_main() {}"[..]),
        }
    }

    #[test]
    fn layout_covers_forty_bytes() {
        let end = PipelineStateBuilder::INPUT_LAYOUT
            .iter()
            .map(|e| e.aligned_byte_offset + e.format.bytes_per_element())
            .max();
        assert_eq!(end, Some(40));
    }

    #[test]
    fn builds_on_the_reference_device() {
        let device = reference_device();
        let builder = PipelineStateBuilder::new(&GpuInit::default());
        let root = builder.build_root_signature(&device).unwrap();
        let vs = blob(ShaderStage::Vertex, "vs_main");
        let ps = blob(ShaderStage::Pixel, "ps_main");
        assert!(builder.build(&device, &vs, &ps, &root).is_ok());
    }

    #[test]
    fn malformed_layouts_are_rejected() {
        let device = reference_device();
        let builder = PipelineStateBuilder::new(&GpuInit::default());
        let root = builder.build_root_signature(&device).unwrap();
        let vs = blob(ShaderStage::Vertex, "vs_main");
        let ps = blob(ShaderStage::Pixel, "ps_main");

        let mut desc = builder.pipeline_desc(&vs, &ps, &root);
        desc.input_layout[1].aligned_byte_offset = 8;
        assert!(device.create_graphics_pipeline(&desc).is_err());

        let mut desc = builder.pipeline_desc(&vs, &ps, &root);
        desc.pixel_shader = blob(ShaderStage::Vertex, "vs_main");
        assert!(device.create_graphics_pipeline(&desc).is_err());

        let mut desc = builder.pipeline_desc(&vs, &ps, &root);
        desc.render_target_formats = vec![Format::D24UnormS8Uint];
        assert!(device.create_graphics_pipeline(&desc).is_err());
    }
}
