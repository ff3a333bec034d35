use crate::resources::format::{SurfaceFormat, UsageContext};

/// render surface state 的格式编码
pub struct RenderFormatCode;
impl RenderFormatCode {
    pub const R32G32B32A32_FLOAT: u32 = 0x000;
    pub const R16G16B16A16_UNORM: u32 = 0x080;
    pub const R16G16B16A16_FLOAT: u32 = 0x084;
    pub const B8G8R8A8_UNORM: u32 = 0x0C0;
    pub const R10G10B10A2_UNORM: u32 = 0x0C2;
    pub const R8G8B8A8_UNORM: u32 = 0x0C7;
    pub const R16G16_UNORM: u32 = 0x0CC;
    pub const B10G10R10A2_UNORM: u32 = 0x0D1;
    pub const R32_UINT: u32 = 0x0D7;
    pub const R32_FLOAT: u32 = 0x0D8;
    pub const B8G8R8X8_UNORM: u32 = 0x0E9;
    pub const R8G8B8X8_UNORM: u32 = 0x0EB;
    pub const R8G8_UNORM: u32 = 0x106;
    pub const R16_UNORM: u32 = 0x10A;
    pub const R16_UINT: u32 = 0x10D;
    pub const R8_UNORM: u32 = 0x140;
    pub const YCRCB_NORMAL: u32 = 0x182;
    pub const YCRCB_SWAPUVY: u32 = 0x183;
    pub const YCRCB_SWAPUV: u32 = 0x18F;
    pub const YCRCB_SWAPY: u32 = 0x190;
    pub const PLANAR_420_8: u32 = 0x1A5;
    pub const PLANAR_420_16: u32 = 0x1A6;
    pub const RAW: u32 = 0x1FF;
}

/// media surface state 的格式编码
pub struct MediaFormatCode;
impl MediaFormatCode {
    pub const YCRCB_NORMAL: u32 = 0;
    pub const YCRCB_SWAPUVY: u32 = 1;
    pub const YCRCB_SWAPUV: u32 = 2;
    pub const YCRCB_SWAPY: u32 = 3;
    pub const PLANAR_420_8: u32 = 4;
    pub const R10G10B10A2_UNORM: u32 = 8;
    pub const R8G8B8A8_UNORM: u32 = 9;
    pub const R8B8_UNORM_CRCB: u32 = 10;
    pub const R8_UNORM_CRCB: u32 = 11;
    pub const Y8_UNORM: u32 = 12;
    pub const A8Y8U8V8_UNORM: u32 = 13;
    pub const B8G8R8A8_UNORM: u32 = 14;
    pub const R16G16B16A16: u32 = 15;
    pub const PLANAR_422_8: u32 = 18;
    pub const PLANAR_420_16: u32 = 23;
    pub const R16B16_UNORM_CRCB: u32 = 24;
    pub const R16_UNORM_CRCB: u32 = 25;
    pub const Y16_UNORM: u32 = 26;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneId {
    Generic,
    Y,
    U,
    V,
}

/// 单个 plane 的布局模板
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneTemplate {
    pub plane_id: PlaneId,
    /// 宽度除数（色度下采样）
    pub scale_width: u32,
    /// 高度除数，向上取整
    pub scale_height: u32,
    /// 宽度向下对齐的单位
    pub align_width: u32,
    /// 高度向下对齐的单位
    pub align_height: u32,
    /// 每个 dword 包含的像素数；0 表示像素大于 dword（64/128 bit 格式）
    pub pixels_per_dword: u32,
    /// true 时使用 media surface state 编码
    pub advanced: bool,
    /// 硬件格式编码，advanced 时为 media 编码，否则为 render 编码
    pub format_code: u32,
}
impl PlaneTemplate {
    pub const fn simple(plane_id: PlaneId, scale: (u32, u32), align: (u32, u32), ppd: u32, format_code: u32) -> Self {
        Self {
            plane_id,
            scale_width: scale.0,
            scale_height: scale.1,
            align_width: align.0,
            align_height: align.1,
            pixels_per_dword: ppd,
            advanced: false,
            format_code,
        }
    }

    pub const fn advanced(plane_id: PlaneId, scale: (u32, u32), align: (u32, u32), ppd: u32, format_code: u32) -> Self {
        Self {
            advanced: true,
            ..Self::simple(plane_id, scale, align, ppd, format_code)
        }
    }
}

/// 一个 (format, context) 对应的全部 plane 模板
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaneLayoutTemplate {
    pub planes: Vec<PlaneTemplate>,
}
impl PlaneLayoutTemplate {
    pub fn new(planes: &[PlaneTemplate]) -> Self {
        Self { planes: planes.to_vec() }
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// 是否为 advanced (media) 布局
    #[inline]
    pub fn is_advanced(&self) -> bool {
        !self.planes.is_empty() && self.planes.iter().all(|p| p.advanced)
    }
}

/// 像素格式布局表
///
/// 表的内容由外部提供；查不到时返回 None，由调用方决定是否回退。
pub trait FormatLayoutTable: Send + Sync {
    fn lookup(&self, format: SurfaceFormat, ctx: UsageContext) -> Option<PlaneLayoutTemplate>;
}

use PlaneId::{Generic, U, V, Y};

const R8: &[PlaneTemplate] = &[PlaneTemplate::simple(Generic, (1, 1), (1, 1), 4, RenderFormatCode::R8_UNORM)];
const NV12_2PLANES: &[PlaneTemplate] = &[
    PlaneTemplate::simple(Y, (1, 1), (1, 1), 4, RenderFormatCode::R8_UNORM),
    PlaneTemplate::simple(U, (2, 2), (1, 1), 2, RenderFormatCode::R8G8_UNORM),
];
const NV12: &[PlaneTemplate] = &[PlaneTemplate::simple(Y, (1, 1), (1, 1), 4, RenderFormatCode::PLANAR_420_8)];
const P010_2PLANES: &[PlaneTemplate] = &[
    PlaneTemplate::simple(Y, (1, 1), (1, 1), 2, RenderFormatCode::R16_UNORM),
    PlaneTemplate::simple(U, (2, 2), (1, 1), 1, RenderFormatCode::R16G16_UNORM),
];
const P010_1PLANE: &[PlaneTemplate] =
    &[PlaneTemplate::simple(Y, (1, 1), (2, 2), 2, RenderFormatCode::PLANAR_420_16)];
const P208: &[PlaneTemplate] = &[
    PlaneTemplate::simple(Y, (1, 1), (1, 1), 4, RenderFormatCode::R8_UNORM),
    PlaneTemplate::simple(U, (2, 1), (1, 1), 2, RenderFormatCode::R8G8_UNORM),
];

/// 3 plane 格式，参数为 U/V 的下采样比例
const fn pl3(scale: (u32, u32)) -> [PlaneTemplate; 3] {
    [
        PlaneTemplate::simple(Y, (1, 1), (1, 1), 4, RenderFormatCode::R8_UNORM),
        PlaneTemplate::simple(U, scale, (1, 1), 4, RenderFormatCode::R8_UNORM),
        PlaneTemplate::simple(V, scale, (1, 1), 4, RenderFormatCode::R8_UNORM),
    ]
}
const PL3_420: [PlaneTemplate; 3] = pl3((2, 2));
const PL3_422H: [PlaneTemplate; 3] = pl3((2, 1));
const PL3_422V: [PlaneTemplate; 3] = pl3((1, 2));
const PL3_411P: [PlaneTemplate; 3] = pl3((4, 1));
const PL3_444P: [PlaneTemplate; 3] = pl3((1, 1));

const fn single(ppd: u32, format_code: u32) -> [PlaneTemplate; 1] {
    [PlaneTemplate::simple(Generic, (1, 1), (1, 1), ppd, format_code)]
}

const NV12_ADV: &[PlaneTemplate] = &[PlaneTemplate::advanced(Y, (1, 1), (2, 2), 4, MediaFormatCode::PLANAR_420_8)];
const NV12_2PLANES_ADV: &[PlaneTemplate] = &[
    PlaneTemplate::advanced(Y, (1, 1), (2, 2), 4, MediaFormatCode::Y8_UNORM),
    PlaneTemplate::advanced(U, (2, 2), (1, 1), 2, MediaFormatCode::R8B8_UNORM_CRCB),
];
const P010_ADV: &[PlaneTemplate] =
    &[PlaneTemplate::advanced(Y, (1, 1), (2, 2), 2, MediaFormatCode::PLANAR_420_16)];
const P208_ADV: &[PlaneTemplate] = &[PlaneTemplate::advanced(Y, (1, 1), (2, 1), 4, MediaFormatCode::PLANAR_422_8)];

const fn single_adv(align: (u32, u32), ppd: u32, format_code: u32) -> [PlaneTemplate; 1] {
    [PlaneTemplate::advanced(Generic, (1, 1), align, ppd, format_code)]
}

/// 默认的格式布局表
///
/// - RenderTarget: 多 plane 拆分，每个 plane 用普通的 render 格式读写
/// - Sampler3D: sampler 原生支持的 planar 格式使用单 plane，其余同 RenderTarget
/// - AdaptiveSampler: media 格式，不支持的格式返回 None
/// - CompositeRef: 同 AdaptiveSampler，NV12 使用 2 plane
#[derive(Default)]
pub struct StandardFormatTable;
impl StandardFormatTable {
    fn simple_layout(format: SurfaceFormat, ctx: UsageContext) -> PlaneLayoutTemplate {
        use SurfaceFormat as F;
        let sampler = ctx == UsageContext::Sampler3D;
        match format {
            F::Nv12 if sampler => PlaneLayoutTemplate::new(NV12),
            F::Nv12 | F::Nv21 => PlaneLayoutTemplate::new(NV12_2PLANES),
            F::P010 | F::P016 if sampler => PlaneLayoutTemplate::new(P010_1PLANE),
            F::P010 | F::P016 => PlaneLayoutTemplate::new(P010_2PLANES),
            F::P208 => PlaneLayoutTemplate::new(P208),

            F::Yv12 | F::I420 | F::Imc3 => PlaneLayoutTemplate::new(&PL3_420),
            F::Format422H => PlaneLayoutTemplate::new(&PL3_422H),
            F::Format422V => PlaneLayoutTemplate::new(&PL3_422V),
            F::Format411P => PlaneLayoutTemplate::new(&PL3_411P),
            F::Format444P | F::Rgbp | F::Bgrp => PlaneLayoutTemplate::new(&PL3_444P),

            F::Yuy2 => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::YCRCB_NORMAL)),
            F::Uyvy => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::YCRCB_SWAPY)),
            F::Yvyu => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::YCRCB_SWAPUV)),
            F::Vyuy => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::YCRCB_SWAPUVY)),
            F::Ayuv | F::A8R8G8B8 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::B8G8R8A8_UNORM)),
            F::X8R8G8B8 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::B8G8R8X8_UNORM)),
            F::A8B8G8R8 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::R8G8B8A8_UNORM)),
            F::X8B8G8R8 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::R8G8B8X8_UNORM)),
            F::Y410 | F::R10G10B10A2 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::R10G10B10A2_UNORM)),
            F::B10G10R10A2 => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::B10G10R10A2_UNORM)),
            F::Y416 | F::A16B16G16R16 => PlaneLayoutTemplate::new(&single(0, RenderFormatCode::R16G16B16A16_UNORM)),
            F::A16B16G16R16F => PlaneLayoutTemplate::new(&single(0, RenderFormatCode::R16G16B16A16_FLOAT)),
            F::R32G32B32A32F => PlaneLayoutTemplate::new(&single(0, RenderFormatCode::R32G32B32A32_FLOAT)),

            F::R32F => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::R32_FLOAT)),
            F::R32U => PlaneLayoutTemplate::new(&single(1, RenderFormatCode::R32_UINT)),
            F::R16U => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::R16_UINT)),
            F::R16Unorm => PlaneLayoutTemplate::new(&single(2, RenderFormatCode::R16_UNORM)),
            F::R8Unorm | F::L8 | F::Raw => PlaneLayoutTemplate::new(R8),
        }
    }

    fn advanced_layout(format: SurfaceFormat, ctx: UsageContext) -> Option<PlaneLayoutTemplate> {
        use SurfaceFormat as F;
        let layout = match format {
            F::Nv12 if ctx == UsageContext::CompositeRef => PlaneLayoutTemplate::new(NV12_2PLANES_ADV),
            F::Nv12 => PlaneLayoutTemplate::new(NV12_ADV),
            F::P010 | F::P016 => PlaneLayoutTemplate::new(P010_ADV),
            F::P208 => PlaneLayoutTemplate::new(P208_ADV),

            F::Yuy2 => PlaneLayoutTemplate::new(&single_adv((2, 1), 2, MediaFormatCode::YCRCB_NORMAL)),
            F::Uyvy => PlaneLayoutTemplate::new(&single_adv((2, 1), 2, MediaFormatCode::YCRCB_SWAPY)),
            F::Yvyu => PlaneLayoutTemplate::new(&single_adv((2, 1), 2, MediaFormatCode::YCRCB_SWAPUV)),
            F::Vyuy => PlaneLayoutTemplate::new(&single_adv((2, 1), 2, MediaFormatCode::YCRCB_SWAPUVY)),
            F::Ayuv => PlaneLayoutTemplate::new(&single_adv((1, 1), 1, MediaFormatCode::A8Y8U8V8_UNORM)),
            F::A8R8G8B8 | F::X8R8G8B8 => {
                PlaneLayoutTemplate::new(&single_adv((1, 1), 1, MediaFormatCode::B8G8R8A8_UNORM))
            }
            F::A8B8G8R8 | F::X8B8G8R8 => {
                PlaneLayoutTemplate::new(&single_adv((1, 1), 1, MediaFormatCode::R8G8B8A8_UNORM))
            }
            F::Y410 | F::R10G10B10A2 => {
                PlaneLayoutTemplate::new(&single_adv((1, 1), 1, MediaFormatCode::R10G10B10A2_UNORM))
            }
            F::Y416 | F::A16B16G16R16 => PlaneLayoutTemplate::new(&single_adv((1, 1), 0, MediaFormatCode::R16G16B16A16)),
            F::R8Unorm | F::L8 => PlaneLayoutTemplate::new(&single_adv((1, 1), 4, MediaFormatCode::Y8_UNORM)),
            F::R16Unorm => PlaneLayoutTemplate::new(&single_adv((1, 1), 2, MediaFormatCode::Y16_UNORM)),
            _ => return None,
        };
        Some(layout)
    }
}
impl FormatLayoutTable for StandardFormatTable {
    fn lookup(&self, format: SurfaceFormat, ctx: UsageContext) -> Option<PlaneLayoutTemplate> {
        if ctx.prefers_advanced() {
            Self::advanced_layout(format, ctx)
        } else {
            Some(Self::simple_layout(format, ctx))
        }
    }
}
