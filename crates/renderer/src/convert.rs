//! Translation of fixed-function descriptors into `wgpu` state, for devices built on it.
use crate::state::{
    AddressMode, BlendDesc, BlendFactor, BlendOp, ColorMask, CompareFunc, DepthStencilDesc,
    Filter, SamplerDesc, StencilOp, Topology,
};

pub fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::Constant => wgpu::BlendFactor::Constant,
        BlendFactor::InvConstant => wgpu::BlendFactor::OneMinusConstant,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
    }
}

pub fn blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
    }
}

/// Blend state of a colour target, `None` when blending is off.
pub fn blend_state(desc: &BlendDesc) -> Option<wgpu::BlendState> {
    desc.enabled.then(|| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(desc.src),
            dst_factor: blend_factor(desc.dst),
            operation: blend_op(desc.op),
        },
        alpha: wgpu::BlendComponent::REPLACE,
    })
}

pub fn color_writes(mask: ColorMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask.r {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask.g {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask.b {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask.a {
        writes |= wgpu::ColorWrites::ALPHA;
    }

    writes
}

pub fn color_target(desc: &BlendDesc, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: blend_state(desc),
        write_mask: color_writes(desc.write_mask),
    }
}

pub fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Always => wgpu::CompareFunction::Always,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
    }
}

fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
    }
}

pub fn depth_stencil(
    desc: &DepthStencilDesc,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    let stencil = match desc.stencil {
        Some(stencil) => {
            let face = wgpu::StencilFaceState {
                compare: compare(stencil.func),
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: stencil_op(stencil.pass),
            };

            wgpu::StencilState {
                front: face,
                back: face,
                read_mask: u32::from(stencil.read_mask),
                write_mask: u32::from(stencil.write_mask),
            }
        }
        None => wgpu::StencilState::default(),
    };

    let (depth_write_enabled, depth_compare) = if desc.depth_test {
        (desc.depth_write, compare(desc.depth_func))
    } else {
        (false, wgpu::CompareFunction::Always)
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled,
        depth_compare,
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn sampler(desc: &SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let address_mode = |mode| match mode {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
    };

    let (filter, anisotropy_clamp) = match desc.filter {
        Filter::Point => (wgpu::FilterMode::Nearest, 1),
        Filter::Linear => (wgpu::FilterMode::Linear, 1),
        // anisotropic filtering requires every filter to be linear
        Filter::Anisotropic(n) => (wgpu::FilterMode::Linear, u16::from(n.max(1))),
    };

    wgpu::SamplerDescriptor {
        label: None,
        address_mode_u: address_mode(desc.address_u),
        address_mode_v: address_mode(desc.address_v),
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        anisotropy_clamp,
        ..Default::default()
    }
}

pub fn topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::PointList => wgpu::PrimitiveTopology::PointList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}
