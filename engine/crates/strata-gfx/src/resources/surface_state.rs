use crate::basic::bitfield::BitField;
use crate::resources::format::{CompressionMode, TileMode};
use crate::resources::format_table::RenderFormatCode;

/// 每条硬件记录占用的 dword 数（64 字节步长）
pub const SURFACE_STATE_DWORDS: usize = 16;
pub const SURFACE_STATE_BYTES: usize = SURFACE_STATE_DWORDS * 4;

/// render surface state 中的 SurfaceType 字段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderSurfaceType {
    Surface1D = 0,
    Surface2D = 1,
    Surface3D = 2,
    Buffer = 4,
    Null = 7,
}

/// 单 plane 的 planar 格式需要的色度 plane 偏移
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChromaPlaneOffsets {
    pub u_x: u32,
    pub u_y: u32,
    pub v_x: u32,
    pub v_y: u32,
    pub half_pitch_chroma: bool,
    pub separate_uv: bool,
}

/// render surface state 的输入，尺寸使用真实值（编码时减 1）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSurfaceStateParams {
    pub surface_type: RenderSurfaceType,
    pub format_code: u32,
    pub tile_mode: TileMode,
    pub vertical_line_stride: bool,
    pub vertical_line_stride_offset: bool,
    pub memory_object_control: u32,
    /// 3D surface 两个 slice 之间的行数
    pub qpitch: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub pitch: u32,
    pub rotation_code: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub chroma_offsets: Option<ChromaPlaneOffsets>,
    pub compression: CompressionMode,
    pub compression_format: u32,
}

/// RENDER_SURFACE_STATE 编码
pub struct RenderSurfaceState {}
impl RenderSurfaceState {
    const HALIGN_4: u32 = 1;
    const VALIGN_4: u32 = 1;
    const AUX_CCS_E: u32 = 5;
    const SCS_RED: u32 = 4;
    const SCS_GREEN: u32 = 5;
    const SCS_BLUE: u32 = 6;
    const SCS_ALPHA: u32 = 7;

    pub fn encode(params: &RenderSurfaceStateParams) -> [u32; SURFACE_STATE_DWORDS] {
        let mut dw = [0u32; SURFACE_STATE_DWORDS];

        BitField::flag(&mut dw[0], 10, params.vertical_line_stride_offset);
        BitField::flag(&mut dw[0], 11, params.vertical_line_stride);
        BitField::set(&mut dw[0], 12, 13, params.tile_mode.hw_code());
        BitField::set(&mut dw[0], 14, 15, Self::HALIGN_4);
        BitField::set(&mut dw[0], 16, 17, Self::VALIGN_4);
        BitField::set(&mut dw[0], 18, 26, params.format_code);
        BitField::set(&mut dw[0], 29, 31, params.surface_type as u32);

        BitField::set(&mut dw[1], 0, 14, params.qpitch >> 2);
        BitField::set(&mut dw[1], 24, 30, params.memory_object_control);

        BitField::set(&mut dw[2], 0, 13, params.width.saturating_sub(1));
        BitField::set(&mut dw[2], 16, 29, params.height.saturating_sub(1));

        BitField::set(&mut dw[3], 0, 17, params.pitch.saturating_sub(1));
        BitField::set(&mut dw[3], 21, 31, params.depth.saturating_sub(1));

        BitField::set(&mut dw[4], 29, 30, params.rotation_code);

        BitField::set(&mut dw[5], 21, 23, params.y_offset >> 2);
        BitField::set(&mut dw[5], 25, 31, params.x_offset >> 2);

        if let Some(chroma) = params.chroma_offsets {
            BitField::set(&mut dw[6], 0, 13, chroma.u_y);
            BitField::set(&mut dw[6], 16, 29, chroma.u_x);
            BitField::flag(&mut dw[6], 30, chroma.half_pitch_chroma);
            BitField::flag(&mut dw[6], 31, chroma.separate_uv);

            BitField::set(&mut dw[11], 0, 13, chroma.v_y);
            BitField::set(&mut dw[11], 16, 29, chroma.v_x);
        }

        BitField::set(&mut dw[7], 16, 18, Self::SCS_ALPHA);
        BitField::set(&mut dw[7], 19, 21, Self::SCS_BLUE);
        BitField::set(&mut dw[7], 22, 24, Self::SCS_GREEN);
        BitField::set(&mut dw[7], 25, 27, Self::SCS_RED);

        match params.compression {
            CompressionMode::None => {}
            CompressionMode::Media => {
                BitField::flag(&mut dw[4], 31, true);
                BitField::flag(&mut dw[7], 30, true);
                BitField::set(&mut dw[12], 0, 4, params.compression_format);
            }
            CompressionMode::Render => {
                BitField::flag(&mut dw[4], 31, true);
                // planar 格式的 DW6 已用于色度偏移，不能再设置 aux mode
                if params.chroma_offsets.is_none() {
                    BitField::set(&mut dw[6], 0, 2, Self::AUX_CCS_E);
                }
                BitField::set(&mut dw[12], 0, 4, params.compression_format);
            }
        }

        dw
    }
}

/// media surface state 的输入
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaSurfaceStateParams {
    pub format_code: u32,
    pub tile_mode: TileMode,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub rotation_code: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    /// 色度方向，bit3 为 U 方向，bit[2:0] 为 V 方向
    pub chroma_direction: u32,
    pub interleave_chroma: bool,
    pub half_pitch_chroma: bool,
    pub u_offset: (u32, u32),
    pub v_offset: (u32, u32),
    pub memory_object_control: u32,
    pub compression: CompressionMode,
}

/// MEDIA_SURFACE_STATE 编码，8 个 dword，其余补 0 到 64 字节
pub struct MediaSurfaceState {}
impl MediaSurfaceState {
    pub fn encode(params: &MediaSurfaceStateParams) -> [u32; SURFACE_STATE_DWORDS] {
        let mut dw = [0u32; SURFACE_STATE_DWORDS];
        let u_direction = params.chroma_direction >> 3;
        let v_direction = params.chroma_direction & 0x7;

        BitField::set(&mut dw[0], 16, 19, params.y_offset >> 2);
        BitField::set(&mut dw[0], 20, 26, params.x_offset >> 2);
        BitField::set(&mut dw[0], 30, 31, params.rotation_code);

        BitField::set(&mut dw[1], 0, 1, v_direction & 0x3);
        BitField::set(&mut dw[1], 4, 17, params.width.saturating_sub(1));
        BitField::set(&mut dw[1], 18, 31, params.height.saturating_sub(1));

        BitField::set(&mut dw[2], 0, 1, params.tile_mode.hw_code());
        BitField::flag(&mut dw[2], 2, params.half_pitch_chroma);
        BitField::set(&mut dw[2], 3, 20, params.pitch.saturating_sub(1));
        BitField::flag(&mut dw[2], 22, params.compression != CompressionMode::None);
        BitField::flag(&mut dw[2], 23, params.compression == CompressionMode::Render);
        BitField::set(&mut dw[2], 24, 24, v_direction >> 2);
        BitField::set(&mut dw[2], 25, 25, u_direction);
        BitField::flag(&mut dw[2], 26, params.interleave_chroma);
        BitField::set(&mut dw[2], 27, 31, params.format_code);

        BitField::set(&mut dw[3], 0, 13, params.u_offset.1);
        BitField::set(&mut dw[3], 16, 29, params.u_offset.0);

        BitField::set(&mut dw[4], 0, 14, params.v_offset.1);
        BitField::set(&mut dw[4], 16, 29, params.v_offset.0);

        BitField::set(&mut dw[5], 0, 6, params.memory_object_control);

        dw
    }
}

/// buffer 的 surface state
///
/// `size - 1` 被拆到 width(bit 0..=6)、height(bit 7..=20)、depth(bit 21..=30) 三个字段中，不再减 1。
pub struct BufferSurfaceState {}
impl BufferSurfaceState {
    pub fn encode(size: u32, memory_object_control: u32) -> [u32; SURFACE_STATE_DWORDS] {
        let mut dw = [0u32; SURFACE_STATE_DWORDS];
        let n = size.saturating_sub(1);

        BitField::set(&mut dw[0], 18, 26, RenderFormatCode::RAW);
        BitField::set(&mut dw[0], 29, 31, RenderSurfaceType::Buffer as u32);
        BitField::set(&mut dw[1], 24, 30, memory_object_control);

        BitField::set(&mut dw[2], 0, 13, BitField::get(n, 0, 6));
        BitField::set(&mut dw[2], 16, 29, BitField::get(n, 7, 20));
        BitField::set(&mut dw[3], 21, 31, BitField::get(n, 21, 30));

        dw
    }

    /// 从编码后的记录中还原 `size - 1`
    pub fn decode_size_minus_one(dw: &[u32]) -> u32 {
        let width = BitField::get(dw[2], 0, 13);
        let height = BitField::get(dw[2], 16, 29);
        let depth = BitField::get(dw[3], 21, 31);
        width | (height << 7) | (depth << 21)
    }
}
