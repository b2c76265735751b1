//! Mapping from explicit-API enums to their wgpu equivalents.

use crate::hal::error::{HalError, HalResult};
use crate::hal::types::{ComparisonFunc, CullMode, Format, PrimitiveTopology};

pub(super) fn texture_format(format: Format, surface: Option<wgpu::TextureFormat>) -> HalResult<wgpu::TextureFormat> {
    match format {
        // Back buffers follow whatever the surface actually supports.
        Format::R8G8B8A8Unorm => Ok(surface.unwrap_or(wgpu::TextureFormat::Rgba8Unorm)),
        Format::D24UnormS8Uint => Ok(wgpu::TextureFormat::Depth24PlusStencil8),
        other => Err(HalError::Unsupported(format!("{other:?} as a texture format"))),
    }
}

pub(super) fn vertex_format(format: Format) -> HalResult<wgpu::VertexFormat> {
    match format {
        Format::R32G32B32Float => Ok(wgpu::VertexFormat::Float32x3),
        Format::R32G32B32A32Float => Ok(wgpu::VertexFormat::Float32x4),
        other => Err(HalError::Unsupported(format!("{other:?} as a vertex format"))),
    }
}

pub(super) fn index_format(format: Format) -> HalResult<wgpu::IndexFormat> {
    match format {
        Format::R16Uint => Ok(wgpu::IndexFormat::Uint16),
        Format::R32Uint => Ok(wgpu::IndexFormat::Uint32),
        other => Err(HalError::InvalidArgument(format!("{other:?} as an index format"))),
    }
}

pub(super) fn compare(func: ComparisonFunc) -> wgpu::CompareFunction {
    match func {
        ComparisonFunc::Never => wgpu::CompareFunction::Never,
        ComparisonFunc::Less => wgpu::CompareFunction::Less,
        ComparisonFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        ComparisonFunc::Always => wgpu::CompareFunction::Always,
    }
}

pub(super) fn cull(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub(super) fn front_face(counter_clockwise: bool) -> wgpu::FrontFace {
    if counter_clockwise {
        wgpu::FrontFace::Ccw
    } else {
        wgpu::FrontFace::Cw
    }
}

pub(super) fn topology(t: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match t {
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
    }
}

pub(super) fn write_mask(mask: u8) -> wgpu::ColorWrites {
    wgpu::ColorWrites::from_bits_truncate(mask as u32)
}

/// Rounds a byte size up to `wgpu::COPY_BUFFER_ALIGNMENT`.
pub(super) fn align_copy(size: u64) -> u64 {
    let a = wgpu::COPY_BUFFER_ALIGNMENT;
    size.div_ceil(a) * a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_buffer_format_tracks_surface() {
        let f = texture_format(Format::R8G8B8A8Unorm, Some(wgpu::TextureFormat::Bgra8Unorm)).unwrap();
        assert_eq!(f, wgpu::TextureFormat::Bgra8Unorm);
        let f = texture_format(Format::R8G8B8A8Unorm, None).unwrap();
        assert_eq!(f, wgpu::TextureFormat::Rgba8Unorm);
        assert!(texture_format(Format::R16Uint, None).is_err());
    }

    #[test]
    fn copy_sizes_round_to_four() {
        assert_eq!(align_copy(0), 0);
        assert_eq!(align_copy(6), 8);
        assert_eq!(align_copy(72), 72);
    }

    #[test]
    fn full_write_mask_is_all_channels() {
        assert_eq!(write_mask(0xF), wgpu::ColorWrites::ALL);
    }
}
