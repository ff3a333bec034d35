use crate::resources::format::{SurfaceFormat, UsageContext};

/// descriptor 构建失败的原因
///
/// 只有调用方的误用才会返回错误；设备不支持某个特性时构建器会回退并记录在 descriptor 上。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("override offset ({x}, {y}) is not aligned: x must be a multiple of 4, y a multiple of {y_align}")]
    MisalignedOverrideOffset { x: u32, y: u32, y_align: u32 },
    #[error("format {format} has no surface layout for {context}")]
    UnsupportedFormatForContext { format: SurfaceFormat, context: UsageContext },
    #[error("composite surfaces are built from their references")]
    CompositeRequiresReferences,
    #[error("invalid surface dimensions: {0}")]
    InvalidDimensions(String),
}
