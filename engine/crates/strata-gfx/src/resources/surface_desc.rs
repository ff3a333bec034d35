use crate::error::DescriptorError;
use crate::foundation::device::DeviceCaps;
use crate::resources::format::{ChromaSiting, CompressionState, FrameParity, Rotation, SurfaceFormat, TileMode};
use serde::Deserialize;

/// surface 的种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum SurfaceKind {
    Buffer,
    Image2D,
    Image3D,
    /// 使用用户提供的系统内存的 2D image，只能是 linear
    Image2DUp,
    /// 由当前帧和前后参考帧组合而成，自身不占用设备内存
    Composite,
}
impl SurfaceKind {
    pub const COUNT: usize = 5;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_image(self) -> bool {
        matches!(self, Self::Image2D | Self::Image3D | Self::Image2DUp)
    }
}

/// surface state 中使用的宽高深，可以和物理尺寸不同
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceDims {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// 外部（例如分配器）给出的 plane 布局，替代按格式推导的偏移
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExternalPlaneLayout {
    /// U plane 相对 surface 起始的字节偏移
    pub u_offset: u64,
    /// V plane 相对 surface 起始的字节偏移
    pub v_offset: u64,
    /// U plane 在 tile 内的行偏移
    pub u_y_offset: u32,
    /// V plane 在 tile 内的行偏移
    pub v_y_offset: u32,
}

/// surface 的元数据，descriptor 构建的全部输入
///
/// buffer 使用 `width` 作为字节数，其余尺寸字段为 1。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceMetadata {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// 每行字节数
    pub pitch: u32,
    pub format: SurfaceFormat,
    pub tiling: TileMode,
    pub compression: CompressionState,
    pub rotation: Rotation,
    pub chroma_siting: ChromaSiting,
    pub frame_parity: FrameParity,
    /// 缓存控制（MOCS）
    pub memory_object_control: u32,
    pub external_layout: Option<ExternalPlaneLayout>,
    /// surface state 的默认尺寸，未设置时使用物理尺寸
    pub default_dims: Option<SurfaceDims>,
}
// new & init
impl SurfaceMetadata {
    pub fn buffer(size: u32) -> Self {
        Self {
            width: size,
            height: 1,
            depth: 1,
            pitch: 0,
            format: SurfaceFormat::Raw,
            ..Self::image_2d(1, 1, SurfaceFormat::Raw)
        }
    }

    /// pitch 默认为紧密排列的 `width * bytes_per_pixel`
    pub fn image_2d(width: u32, height: u32, format: SurfaceFormat) -> Self {
        Self {
            width,
            height,
            depth: 1,
            pitch: width.saturating_mul(format.bytes_per_pixel()),
            format,
            tiling: TileMode::Linear,
            compression: CompressionState::NONE,
            rotation: Rotation::Identity,
            chroma_siting: ChromaSiting::empty(),
            frame_parity: FrameParity::Frame,
            memory_object_control: 0,
            external_layout: None,
            default_dims: None,
        }
    }

    pub fn image_3d(width: u32, height: u32, depth: u32, format: SurfaceFormat) -> Self {
        Self {
            depth,
            ..Self::image_2d(width, height, format)
        }
    }

    #[inline]
    pub fn with_pitch(mut self, pitch: u32) -> Self {
        self.pitch = pitch;
        self
    }

    #[inline]
    pub fn with_tiling(mut self, tiling: TileMode) -> Self {
        self.tiling = tiling;
        self
    }

    #[inline]
    pub fn with_compression(mut self, compression: CompressionState) -> Self {
        self.compression = compression;
        self
    }

    #[inline]
    pub fn with_external_layout(mut self, layout: ExternalPlaneLayout) -> Self {
        self.external_layout = Some(layout);
        self
    }
}
// tools
impl SurfaceMetadata {
    /// 分配时的尺寸校验
    pub fn validate(&self, kind: SurfaceKind, caps: &DeviceCaps) -> Result<(), DescriptorError> {
        let invalid = |reason: String| Err(DescriptorError::InvalidDimensions(reason));
        match kind {
            SurfaceKind::Buffer => {
                if self.width == 0 || self.width as u64 > caps.max_buffer_size {
                    return invalid(format!("buffer size {} out of range 1..={}", self.width, caps.max_buffer_size));
                }
            }
            SurfaceKind::Image2D | SurfaceKind::Image2DUp | SurfaceKind::Image3D => {
                if self.width == 0 || self.height == 0 || self.depth == 0 {
                    return invalid(format!("zero extent {}x{}x{}", self.width, self.height, self.depth));
                }
                let (max_w, max_h, max_d) = if kind == SurfaceKind::Image3D {
                    (caps.max_3d_extent, caps.max_3d_extent, caps.max_3d_extent)
                } else {
                    (caps.max_2d_width, caps.max_2d_height, 1)
                };
                if self.width > max_w || self.height > max_h || self.depth > max_d {
                    return invalid(format!(
                        "extent {}x{}x{} exceeds {}x{}x{}",
                        self.width, self.height, self.depth, max_w, max_h, max_d
                    ));
                }
                let min_pitch = self.width as u64 * self.format.bytes_per_pixel() as u64;
                if (self.pitch as u64) < min_pitch {
                    return invalid(format!("pitch {} smaller than row size {}", self.pitch, min_pitch));
                }
            }
            SurfaceKind::Composite => {
                return invalid("composite surfaces carry no metadata of their own".to_string());
            }
        }
        Ok(())
    }

    /// 需要申请的设备内存字节数
    pub fn allocation_size(&self, kind: SurfaceKind) -> u64 {
        match kind {
            SurfaceKind::Buffer => self.width as u64,
            SurfaceKind::Composite => 0,
            _ => {
                let (num, den) = self.format.total_rows_ratio();
                let rows = (self.height as u64 * num).div_ceil(den);
                self.pitch as u64 * rows * self.depth as u64
            }
        }
    }

    /// 生效的 surface state 尺寸
    #[inline]
    pub fn effective_dims(&self) -> SurfaceDims {
        self.default_dims.unwrap_or(SurfaceDims {
            width: self.width,
            height: self.height,
            depth: self.depth,
        })
    }
}
