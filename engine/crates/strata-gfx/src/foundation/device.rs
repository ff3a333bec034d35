use serde::Deserialize;

/// 设备能力
///
/// descriptor 构建时据此决定 tiling / 压缩 / advanced 布局是否可用，
/// 不支持时强制关闭并记录 fallback，而不是报错。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceCaps {
    /// 是否支持 X/Y tiling
    pub tiling_supported: bool,
    /// 是否支持 media compression (MC)
    pub media_compression_supported: bool,
    /// 是否支持 render compression (RC)
    pub render_compression_supported: bool,
    /// render target 是否可以输出压缩数据
    pub compressed_render_target_supported: bool,
    /// 是否有 advanced sampler（media surface state）
    pub advanced_sampler_supported: bool,

    pub max_2d_width: u32,
    pub max_2d_height: u32,
    pub max_3d_extent: u32,
    /// buffer 最大字节数
    pub max_buffer_size: u64,
}
impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            tiling_supported: true,
            media_compression_supported: true,
            render_compression_supported: true,
            compressed_render_target_supported: true,
            advanced_sampler_supported: true,

            max_2d_width: 16384,
            max_2d_height: 16384,
            max_3d_extent: 2048,
            max_buffer_size: 1 << 31,
        }
    }
}
impl DeviceCaps {
    /// 不支持任何可选特性的设备，只能使用 linear + 非压缩 + 简单布局
    pub fn minimal() -> Self {
        Self {
            tiling_supported: false,
            media_compression_supported: false,
            render_compression_supported: false,
            compressed_render_target_supported: false,
            advanced_sampler_supported: false,
            ..Default::default()
        }
    }
}
