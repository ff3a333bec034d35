use bitflags::bitflags;
use serde::Deserialize;
use std::fmt::Display;

/// surface 的像素格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum SurfaceFormat {
    // 2 plane YUV
    Nv12,
    Nv21,
    P010,
    P016,
    P208,

    // 3 plane YUV / RGB
    Yv12,
    I420,
    Imc3,
    Format422H,
    Format422V,
    Format411P,
    Format444P,
    Rgbp,
    Bgrp,

    // packed YUV
    Yuy2,
    Uyvy,
    Yvyu,
    Vyuy,
    Ayuv,
    Y410,
    Y416,

    // RGB
    A8R8G8B8,
    X8R8G8B8,
    A8B8G8R8,
    X8B8G8R8,
    R10G10B10A2,
    B10G10R10A2,
    A16B16G16R16,
    A16B16G16R16F,
    R32G32B32A32F,

    // 单通道
    R32F,
    R32U,
    R16U,
    R16Unorm,
    R8Unorm,
    L8,

    /// 无格式的字节数据
    Raw,
}
impl Display for SurfaceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
// 格式属性
impl SurfaceFormat {
    /// 第一个 plane 每个像素的字节数，用于 pitch 校验
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Nv12
            | Self::Nv21
            | Self::P208
            | Self::Yv12
            | Self::I420
            | Self::Imc3
            | Self::Format422H
            | Self::Format422V
            | Self::Format411P
            | Self::Format444P
            | Self::Rgbp
            | Self::Bgrp
            | Self::R8Unorm
            | Self::L8
            | Self::Raw => 1,

            Self::P010 | Self::P016 | Self::R16U | Self::R16Unorm => 2,
            Self::Yuy2 | Self::Uyvy | Self::Yvyu | Self::Vyuy => 2,

            Self::Ayuv
            | Self::Y410
            | Self::A8R8G8B8
            | Self::X8R8G8B8
            | Self::A8B8G8R8
            | Self::X8B8G8R8
            | Self::R10G10B10A2
            | Self::B10G10R10A2
            | Self::R32F
            | Self::R32U => 4,

            Self::Y416 | Self::A16B16G16R16 | Self::A16B16G16R16F => 8,
            Self::R32G32B32A32F => 16,
        }
    }

    /// 64 bit 像素，width-in-dword 时宽度乘 2
    #[inline]
    pub fn is_64bit(self) -> bool {
        self.bytes_per_pixel() == 8
    }

    /// 128 bit 像素，width-in-dword 时宽度乘 4
    #[inline]
    pub fn is_128bit(self) -> bool {
        self.bytes_per_pixel() == 16
    }

    /// 是否为多 plane 的 YUV / RGB 平面格式
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            Self::Nv12
                | Self::Nv21
                | Self::P010
                | Self::P016
                | Self::P208
                | Self::Yv12
                | Self::I420
                | Self::Imc3
                | Self::Format422H
                | Self::Format422V
                | Self::Format411P
                | Self::Format444P
                | Self::Rgbp
                | Self::Bgrp
        )
    }

    /// 高度需要按 2 对齐的格式（packed 4:2:2 与 P208）
    #[inline]
    pub fn needs_even_height(self) -> bool {
        matches!(self, Self::Yuy2 | Self::Uyvy | Self::Yvyu | Self::Vyuy | Self::P208)
    }

    /// 色度 plane 的 pitch 右移位数
    #[inline]
    pub fn chroma_pitch_shift(self) -> u32 {
        match self {
            Self::I420 | Self::Yv12 => 1,
            _ => 0,
        }
    }

    /// 硬件 media compression / render compression 是否支持该格式
    pub fn is_compressible(self) -> bool {
        matches!(
            self,
            Self::Yuy2
                | Self::Y410
                | Self::Y416
                | Self::P010
                | Self::P016
                | Self::Ayuv
                | Self::Nv21
                | Self::Nv12
                | Self::Uyvy
                | Self::A8B8G8R8
                | Self::X8B8G8R8
                | Self::A8R8G8B8
                | Self::X8R8G8B8
                | Self::B10G10R10A2
                | Self::R10G10B10A2
                | Self::A16B16G16R16F
        )
    }

    #[inline]
    pub fn is_tileable(self) -> bool {
        !matches!(self, Self::Raw)
    }

    /// 所有 plane 合计的行数相对于第一个 plane 高度的比例 (分子, 分母)
    pub fn total_rows_ratio(self) -> (u64, u64) {
        match self {
            Self::Nv12 | Self::Nv21 | Self::P010 | Self::P016 | Self::Yv12 | Self::I420 => (3, 2),
            Self::P208 | Self::Imc3 | Self::Format422V => (2, 1),
            Self::Format422H | Self::Format411P | Self::Format444P | Self::Rgbp | Self::Bgrp => (3, 1),
            _ => (1, 1),
        }
    }
}

/// 内存排布方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum TileMode {
    #[default]
    Linear,
    XMajor,
    YMajor,
}
impl TileMode {
    /// surface state 中 TileMode 字段的编码
    #[inline]
    pub fn hw_code(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::XMajor => 2,
            Self::YMajor => 3,
        }
    }

    #[inline]
    pub fn is_tiled(self) -> bool {
        self != Self::Linear
    }
}

/// 内存压缩模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum CompressionMode {
    #[default]
    None,
    /// media compression
    Media,
    /// render compression
    Render,
}

/// 压缩状态：模式 + 压缩格式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct CompressionState {
    pub mode: CompressionMode,
    /// 硬件压缩格式编码（低 5 bit 有效）
    pub format: u32,
}
impl CompressionState {
    pub const NONE: Self = Self {
        mode: CompressionMode::None,
        format: 0,
    };

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.mode != CompressionMode::None
    }
}

/// 旋转与镜像
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum Rotation {
    #[default]
    Identity,
    Rotate90,
    Rotate180,
    Rotate270,
    MirrorHorizontal,
    MirrorVertical,
    Rotate90MirrorVertical,
    Rotate90MirrorHorizontal,
}
impl Rotation {
    /// 8 种输入映射到硬件支持的 4 种旋转编码，镜像由采样坐标处理
    const HW_CODES: [u32; 8] = [0, 1, 2, 3, 0, 2, 3, 1];

    #[inline]
    pub fn hw_code(self) -> u32 {
        Self::HW_CODES[self as usize]
    }
}

bitflags! {
    /// 色度采样位置
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChromaSiting: u32 {
        const HORZ_LEFT = 1 << 0;
        const HORZ_CENTER = 1 << 1;
        const HORZ_RIGHT = 1 << 2;
        const VERT_CENTER = 1 << 3;
        const VERT_TOP = 1 << 4;
        const VERT_BOTTOM = 1 << 5;
    }
}
impl ChromaSiting {
    /// 硬件的色度方向编码：bit3 为水平方向，bit[2:0] 为垂直方向
    pub fn direction(self) -> u32 {
        let horizontal = if self.contains(Self::HORZ_CENTER) { 1 } else { 0 };
        let vertical = if self.contains(Self::VERT_TOP) {
            0
        } else if self.contains(Self::VERT_BOTTOM) {
            4
        } else {
            2
        };
        (horizontal << 3) | vertical
    }
}

/// 帧/场属性
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum FrameParity {
    #[default]
    Frame,
    TopField,
    BottomField,
}
impl FrameParity {
    #[inline]
    pub fn is_field(self) -> bool {
        self != Self::Frame
    }
}

/// descriptor 的使用场景
///
/// 同一个 surface 在不同场景下有不同的、可同时有效的 descriptor。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum UsageContext {
    /// 通过 data port 读写，宽度以 dword 计
    RenderTarget,
    /// 3D sampler
    Sampler3D,
    /// composite (motion estimation) 的参考帧
    CompositeRef,
    /// advanced sampler，使用 media surface state
    AdaptiveSampler,
}
impl UsageContext {
    pub const COUNT: usize = 4;
    pub const ALL: [UsageContext; Self::COUNT] =
        [Self::RenderTarget, Self::Sampler3D, Self::CompositeRef, Self::AdaptiveSampler];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn as_flags(self) -> UsageContexts {
        match self {
            Self::RenderTarget => UsageContexts::RENDER_TARGET,
            Self::Sampler3D => UsageContexts::SAMPLER_3D,
            Self::CompositeRef => UsageContexts::COMPOSITE_REF,
            Self::AdaptiveSampler => UsageContexts::ADAPTIVE_SAMPLER,
        }
    }

    /// 是否倾向使用 advanced (media) 布局
    #[inline]
    pub fn prefers_advanced(self) -> bool {
        matches!(self, Self::CompositeRef | Self::AdaptiveSampler)
    }
}
impl Display for UsageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

bitflags! {
    /// UsageContext 的集合，用于按分区失效缓存
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct UsageContexts: u32 {
        const RENDER_TARGET = 1 << 0;
        const SAMPLER_3D = 1 << 1;
        const COMPOSITE_REF = 1 << 2;
        const ADAPTIVE_SAMPLER = 1 << 3;
    }
}
impl UsageContexts {
    pub fn contexts(self) -> impl Iterator<Item = UsageContext> {
        UsageContext::ALL.into_iter().filter(move |ctx| self.contains(ctx.as_flags()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_table() {
        let codes = [
            Rotation::Identity,
            Rotation::Rotate90,
            Rotation::Rotate180,
            Rotation::Rotate270,
            Rotation::MirrorHorizontal,
            Rotation::MirrorVertical,
            Rotation::Rotate90MirrorVertical,
            Rotation::Rotate90MirrorHorizontal,
        ]
        .map(Rotation::hw_code);
        assert_eq!(codes, [0, 1, 2, 3, 0, 2, 3, 1]);
    }

    #[test]
    fn test_chroma_direction() {
        assert_eq!(ChromaSiting::empty().direction(), 2);
        assert_eq!((ChromaSiting::HORZ_CENTER | ChromaSiting::VERT_TOP).direction(), 0b1000);
        assert_eq!((ChromaSiting::HORZ_LEFT | ChromaSiting::VERT_BOTTOM).direction(), 4);
        assert_eq!((ChromaSiting::HORZ_CENTER | ChromaSiting::VERT_CENTER).direction(), 0b1010);
    }

    #[test]
    fn test_usage_contexts_iter() {
        let ctxs = (UsageContexts::SAMPLER_3D | UsageContexts::ADAPTIVE_SAMPLER).contexts().collect::<Vec<_>>();
        assert_eq!(ctxs, vec![UsageContext::Sampler3D, UsageContext::AdaptiveSampler]);
        assert_eq!(UsageContexts::all().contexts().count(), UsageContext::COUNT);
        for (i, ctx) in UsageContext::ALL.iter().enumerate() {
            assert_eq!(ctx.index(), i);
        }
    }

    #[test]
    fn test_format_properties() {
        assert_eq!(SurfaceFormat::Nv12.total_rows_ratio(), (3, 2));
        assert!(SurfaceFormat::Nv12.is_compressible());
        assert!(!SurfaceFormat::I420.is_compressible());
        assert!(SurfaceFormat::A16B16G16R16.is_64bit());
        assert!(SurfaceFormat::R32G32B32A32F.is_128bit());
        assert_eq!(SurfaceFormat::Yv12.chroma_pitch_shift(), 1);
        assert!(!SurfaceFormat::Raw.is_tileable());
    }
}
