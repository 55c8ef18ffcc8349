// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Tables from crate enums to wgpu enums.

use crate::command_buffer::IndexFormat;
use crate::resources::bindings::StageFlags;
use crate::resources::pipeline::{CompareOp, CullMode, FrontFace, Topology};
use crate::resources::render_target::{ColorFormat, DepthFormat};
use crate::vertex_layout::VertexFormat;

pub(super) fn color_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

pub(super) fn depth_format(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub(super) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float => wgpu::VertexFormat::Float32,
        VertexFormat::Float2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::UInt => wgpu::VertexFormat::Uint32,
        VertexFormat::UInt2 => wgpu::VertexFormat::Uint32x2,
        VertexFormat::UInt3 => wgpu::VertexFormat::Uint32x3,
        VertexFormat::UInt4 => wgpu::VertexFormat::Uint32x4,
        VertexFormat::SInt => wgpu::VertexFormat::Sint32,
        VertexFormat::SInt2 => wgpu::VertexFormat::Sint32x2,
        VertexFormat::SInt3 => wgpu::VertexFormat::Sint32x3,
        VertexFormat::SInt4 => wgpu::VertexFormat::Sint32x4,
        VertexFormat::UNormByte4 => wgpu::VertexFormat::Unorm8x4,
    }
}

/// `None` for topologies wgpu cannot draw.
pub(super) fn topology(topology: Topology) -> Option<wgpu::PrimitiveTopology> {
    match topology {
        Topology::Triangles => Some(wgpu::PrimitiveTopology::TriangleList),
        Topology::TriangleStrip => Some(wgpu::PrimitiveTopology::TriangleStrip),
        Topology::Lines => Some(wgpu::PrimitiveTopology::LineList),
        Topology::LineStrip => Some(wgpu::PrimitiveTopology::LineStrip),
        Topology::Points => Some(wgpu::PrimitiveTopology::PointList),
        Topology::Patches { .. } => None,
    }
}

pub(super) fn cull_mode(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub(super) fn front_face(face: FrontFace) -> wgpu::FrontFace {
    match face {
        FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
        FrontFace::Clockwise => wgpu::FrontFace::Cw,
    }
}

pub(super) fn compare(op: CompareOp) -> wgpu::CompareFunction {
    match op {
        CompareOp::Never => wgpu::CompareFunction::Never,
        CompareOp::Less => wgpu::CompareFunction::Less,
        CompareOp::Equal => wgpu::CompareFunction::Equal,
        CompareOp::LessOrEqual => wgpu::CompareFunction::LessEqual,
        CompareOp::Greater => wgpu::CompareFunction::Greater,
        CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareOp::GreaterOrEqual => wgpu::CompareFunction::GreaterEqual,
        CompareOp::Always => wgpu::CompareFunction::Always,
    }
}

pub(super) fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::UInt16 => wgpu::IndexFormat::Uint16,
        IndexFormat::UInt32 => wgpu::IndexFormat::Uint32,
    }
}

/// Tessellation and geometry stages have no wgpu counterpart and are dropped.
pub(super) fn stages(flags: StageFlags) -> wgpu::ShaderStages {
    let mut stages = wgpu::ShaderStages::NONE;
    if flags.contains(StageFlags::VERTEX) {
        stages |= wgpu::ShaderStages::VERTEX;
    }
    if flags.contains(StageFlags::FRAGMENT) {
        stages |= wgpu::ShaderStages::FRAGMENT;
    }
    stages
}
