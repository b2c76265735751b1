use std::fmt;
use std::sync::Arc;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub(crate) const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Command queue owned by a device.
    QueueId
);
define_id!(
    /// GPU-signaled monotonic fence.
    FenceId
);
define_id!(
    /// Committed buffer or texture, including swap-chain back buffers.
    ResourceId
);
define_id!(
    /// Descriptor heap.
    HeapId
);
define_id!(RootSignatureId);
define_id!(PipelineId);
define_id!(SwapChainId);

// ── adapters ─────────────────────────────────────────────────────────────

/// Minimum hardware capability tier a device is created against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum FeatureLevel {
    L11_0,
    L11_1,
    L12_0,
    L12_1,
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureLevel::L11_0 => "11_0",
            FeatureLevel::L11_1 => "11_1",
            FeatureLevel::L12_0 => "12_0",
            FeatureLevel::L12_1 => "12_1",
        };
        f.write_str(s)
    }
}

/// Adapter enumeration order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GpuPreference {
    /// Most capable adapter first.
    HighPerformance,
    /// Whatever order the platform reports.
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dedicated_video_memory: u64,
    /// Software rasterizer (WARP-class). Never chosen by hardware selection.
    pub software: bool,
    pub max_feature_level: FeatureLevel,
}

/// Enumerated adapter. `ordinal` is backend-private.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub(crate) ordinal: usize,
    pub info: AdapterInfo,
}

impl Adapter {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_software(&self) -> bool {
        self.info.software
    }
}

// ── resources ────────────────────────────────────────────────────────────

/// Memory pool a committed resource lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HeapType {
    /// GPU-local; filled by copies.
    Default,
    /// CPU-writable, GPU-readable. Always in `GenericRead`.
    Upload,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Format {
    Unknown,
    R8G8B8A8Unorm,
    D24UnormS8Uint,
    R32G32B32Float,
    R32G32B32A32Float,
    R16Uint,
    R32Uint,
}

impl Format {
    pub fn bytes_per_element(self) -> u32 {
        match self {
            Format::Unknown => 0,
            Format::R16Uint => 2,
            Format::R8G8B8A8Unorm | Format::D24UnormS8Uint | Format::R32Uint => 4,
            Format::R32G32B32Float => 12,
            Format::R32G32B32A32Float => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Format::D24UnormS8Uint)
    }
}

/// Resource usage state. Transitions between them are explicit barriers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceState {
    Common,
    Present,
    RenderTarget,
    DepthWrite,
    CopyDest,
    CopySource,
    GenericRead,
    VertexAndConstantBuffer,
    IndexBuffer,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceDimension {
    Buffer,
    Texture2D,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ResourceUsage {
    pub render_target: bool,
    pub depth_stencil: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    /// Byte size for buffers, texel width for textures.
    pub width: u64,
    pub height: u32,
    pub format: Format,
    pub usage: ResourceUsage,
}

impl ResourceDesc {
    pub fn buffer(size: u64) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            width: size,
            height: 1,
            format: Format::Unknown,
            usage: ResourceUsage::default(),
        }
    }

    pub fn texture_2d(width: u32, height: u32, format: Format, usage: ResourceUsage) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            width: width as u64,
            height,
            format,
            usage,
        }
    }

    /// Bytes of backing storage.
    pub fn byte_size(&self) -> u64 {
        match self.dimension {
            ResourceDimension::Buffer => self.width,
            ResourceDimension::Texture2D => {
                self.width * self.height as u64 * self.format.bytes_per_element() as u64
            }
        }
    }
}

/// Optimized clear value supplied at creation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u8 },
}

// ── descriptors ──────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DescriptorHeapType {
    Rtv,
    Dsv,
    CbvSrvUav,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DescriptorHeapDesc {
    pub ty: DescriptorHeapType,
    pub capacity: u32,
    pub shader_visible: bool,
}

/// CPU descriptor address: heap id in the high word, byte offset in the low word.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CpuDescriptor(pub u64);

/// GPU descriptor address, same encoding as [`CpuDescriptor`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GpuDescriptor(pub u64);

impl CpuDescriptor {
    pub fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

impl GpuDescriptor {
    pub fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

pub(crate) fn encode_descriptor(heap: HeapId, byte_offset: u64) -> u64 {
    (heap.raw() << 32) | (byte_offset & 0xFFFF_FFFF)
}

/// Splits a descriptor address into `(heap, slot)`.
pub(crate) fn decode_descriptor(raw: u64, increment: u32) -> (HeapId, u32) {
    let heap = HeapId::from_raw(raw >> 32);
    let offset = raw & 0xFFFF_FFFF;
    (heap, (offset / increment.max(1) as u64) as u32)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConstantBufferViewDesc {
    pub resource: ResourceId,
    pub offset: u64,
    /// Must be a multiple of 256.
    pub size: u32,
}

// ── root signature & pipeline ────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DescriptorRangeKind {
    Cbv,
    Srv,
    Uav,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DescriptorRange {
    pub kind: DescriptorRangeKind,
    pub count: u32,
    pub base_register: u32,
    pub register_space: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RootParameter {
    DescriptorTable {
        ranges: Vec<DescriptorRange>,
        visibility: ShaderVisibility,
    },
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RootSignatureFlags {
    pub allow_input_assembler_input_layout: bool,
    pub deny_hull_shader_root_access: bool,
    pub deny_domain_shader_root_access: bool,
    pub deny_geometry_shader_root_access: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub flags: RootSignatureFlags,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// Compiled shader handed to pipeline creation. Opaque to everything but the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InputElement {
    pub semantic: &'static str,
    pub format: Format,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_clip: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    /// RGBA bits, 0xF writes all channels.
    pub write_mask: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ComparisonFunc {
    Never,
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DepthStencilState {
    pub depth_enable: bool,
    pub depth_write: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_enable: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrimitiveTopologyType {
    Triangle,
    Line,
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineDesc {
    pub root_signature: RootSignatureId,
    pub vertex_shader: ShaderBytecode,
    pub pixel_shader: ShaderBytecode,
    pub input_layout: Vec<InputElement>,
    pub rasterizer: RasterizerState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub sample_mask: u32,
    pub topology: PrimitiveTopologyType,
    pub render_target_formats: Vec<Format>,
    pub depth_stencil_format: Format,
    pub sample_count: u32,
}

// ── swap chain ───────────────────────────────────────────────────────────

/// What a swap chain presents into.
#[derive(Debug, Clone)]
pub enum PresentTarget {
    Window(Arc<winit::window::Window>),
    /// Back buffers that are never shown. Used for headless runs.
    Offscreen,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub buffer_count: u32,
}

// ── per-command parameters ───────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexBufferView {
    pub resource: ResourceId,
    pub offset: u64,
    pub size: u32,
    pub stride: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IndexBufferView {
    pub resource: ResourceId,
    pub offset: u64,
    pub size: u32,
    pub format: Format,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransitionBarrier {
    pub resource: ResourceId,
    pub before: ResourceState,
    pub after: ResourceState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_address_round_trips_heap_and_slot() {
        let heap = HeapId::from_raw(7);
        let raw = encode_descriptor(heap, 3 * 32);
        assert_eq!(decode_descriptor(raw, 32), (heap, 3));
    }

    #[test]
    fn texture_byte_size_uses_format_width() {
        let desc = ResourceDesc::texture_2d(4, 2, Format::D24UnormS8Uint, ResourceUsage::default());
        assert_eq!(desc.byte_size(), 32);
    }

    #[test]
    fn feature_levels_are_ordered() {
        assert!(FeatureLevel::L11_0 < FeatureLevel::L12_0);
        assert_eq!(FeatureLevel::L12_0.to_string(), "12_0");
    }
}
