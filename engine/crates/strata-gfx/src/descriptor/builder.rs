use crate::descriptor::override_params::OverrideParams;
use crate::descriptor::surface_descriptor::{Descriptor, FallbackFlags, PlaneMeta};
use crate::error::DescriptorError;
use crate::foundation::device::DeviceCaps;
use crate::resources::format::{CompressionMode, CompressionState, FrameParity, SurfaceFormat, TileMode, UsageContext};
use crate::resources::format_table::{FormatLayoutTable, PlaneId, PlaneLayoutTemplate, PlaneTemplate, RenderFormatCode};
use crate::resources::surface_desc::{SurfaceKind, SurfaceMetadata};
use crate::resources::surface_state::{
    BufferSurfaceState, ChromaPlaneOffsets, MediaSurfaceState, MediaSurfaceStateParams, RenderSurfaceState,
    RenderSurfaceStateParams, RenderSurfaceType,
};
use itertools::Itertools;

/// tiled surface 的 plane 起始行对齐到 tile 高度，余下的行写入 Y offset 字段
const TILE_ROWS: u32 = 32;
/// render surface state 中 X/Y offset 字段可表示的最大值
const RENDER_MAX_X_OFFSET: u32 = 0x7F << 2;
const RENDER_MAX_Y_OFFSET: u32 = 0x7 << 2;
/// media surface state 中 X/Y offset 字段可表示的最大值
const MEDIA_MAX_X_OFFSET: u32 = 0x7F << 2;
const MEDIA_MAX_Y_OFFSET: u32 = 0xF << 2;

/// 覆盖参数与 surface 自身属性合并后的结果
#[derive(Clone, Copy, Debug)]
struct ResolvedSurface {
    format: SurfaceFormat,
    width: u32,
    height: u32,
    depth: u32,
    pitch: u32,
    x_offset: u32,
    y_offset: u32,
    memory_object_control: u32,
}
impl ResolvedSurface {
    /// 优先级：override > 默认 surface state 尺寸 > 物理尺寸
    fn resolve(meta: &SurfaceMetadata, ovr: Option<&OverrideParams>) -> Self {
        let dims = meta.effective_dims();
        let ovr = ovr.copied().unwrap_or_default();
        Self {
            format: ovr.format.unwrap_or(meta.format),
            width: ovr.width.unwrap_or(dims.width),
            height: ovr.height.unwrap_or(dims.height),
            depth: ovr.depth.unwrap_or(dims.depth),
            pitch: ovr.pitch.unwrap_or(meta.pitch),
            x_offset: ovr.x_offset.unwrap_or(0),
            y_offset: ovr.y_offset.unwrap_or(0),
            memory_object_control: ovr.memory_object_control.unwrap_or(meta.memory_object_control),
        }
    }
}

/// 每个 plane 相对 surface 起始位置的偏移：(字节偏移, tile 内行偏移)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PlaneOffset {
    bytes: u64,
    rows: u32,
}

/// descriptor 构建器
///
/// 纯函数：只读取传入的元数据、格式表与设备能力，相同输入得到逐字节相同的输出。
pub struct DescriptorBuilder<'a> {
    table: &'a dyn FormatLayoutTable,
    caps: &'a DeviceCaps,
}
// new & init
impl<'a> DescriptorBuilder<'a> {
    pub fn new(table: &'a dyn FormatLayoutTable, caps: &'a DeviceCaps) -> Self {
        Self { table, caps }
    }
}
// build
impl DescriptorBuilder<'_> {
    pub fn build(
        &self,
        kind: SurfaceKind,
        meta: &SurfaceMetadata,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
    ) -> Result<Descriptor, DescriptorError> {
        match kind {
            SurfaceKind::Buffer => self.build_buffer(meta, ctx, ovr),
            SurfaceKind::Image2D | SurfaceKind::Image2DUp | SurfaceKind::Image3D => {
                self.build_image(kind, meta, ctx, ovr)
            }
            SurfaceKind::Composite => Err(DescriptorError::CompositeRequiresReferences),
        }
    }

    /// buffer：单条记录，override 可以修改大小、字节偏移和缓存控制
    pub fn build_buffer(
        &self,
        meta: &SurfaceMetadata,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
    ) -> Result<Descriptor, DescriptorError> {
        let _span = tracy_client::span!("DescriptorBuilder::build_buffer");

        let ovr = ovr.copied().unwrap_or_default();
        let size = ovr.width.unwrap_or(meta.width);
        let offset = ovr.x_offset.unwrap_or(0);
        let mocs = ovr.memory_object_control.unwrap_or(meta.memory_object_control);

        if offset % 4 != 0 {
            return Err(DescriptorError::MisalignedOverrideOffset {
                x: offset,
                y: 0,
                y_align: 1,
            });
        }
        if size == 0 || offset as u64 + size as u64 > meta.width as u64 {
            return Err(DescriptorError::InvalidDimensions(format!(
                "buffer view [{}, {}) exceeds buffer size {}",
                offset,
                offset as u64 + size as u64,
                meta.width
            )));
        }

        let record = BufferSurfaceState::encode(size, mocs);
        let plane = PlaneMeta {
            plane_id: PlaneId::Generic,
            offset: offset as u64,
            x_offset: 0,
            y_offset: 0,
            width: size,
            height: 1,
            pitch: 0,
            format_code: RenderFormatCode::RAW,
            advanced: false,
        };
        Ok(Descriptor::new(SurfaceKind::Buffer, ctx, vec![record], vec![plane], FallbackFlags::empty()))
    }

    /// 2D / 3D / 2D-UP image
    pub fn build_image(
        &self,
        kind: SurfaceKind,
        meta: &SurfaceMetadata,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
    ) -> Result<Descriptor, DescriptorError> {
        let _span = tracy_client::span!("DescriptorBuilder::build_image");

        let resolved = ResolvedSurface::resolve(meta, ovr);
        let mut fallbacks = FallbackFlags::empty();

        let tiling = self.resolve_tiling(kind, meta, resolved.format, &mut fallbacks);
        Self::check_override_alignment(ovr, tiling)?;
        let template = self.resolve_layout(resolved.format, ctx, &mut fallbacks)?;
        let compression = self.resolve_compression(meta.compression, resolved.format, ctx, tiling, &mut fallbacks);

        // composite 参考帧总是按帧处理，场属性只影响其余分区
        let parity = if ctx == UsageContext::CompositeRef { FrameParity::Frame } else { meta.frame_parity };
        let rotation_code = match ctx {
            UsageContext::Sampler3D | UsageContext::AdaptiveSampler => meta.rotation.hw_code(),
            _ => 0,
        };
        let offsets = Self::plane_offsets(meta, &resolved, tiling);
        let single_planar = template.plane_count() == 1 && resolved.format.is_planar();

        let mut records = Vec::with_capacity(template.plane_count());
        let mut planes = Vec::with_capacity(template.plane_count());
        for plane in &template.planes {
            let (width, height) = Self::plane_extent(plane, &resolved, ctx, parity);
            let pitch = match plane.plane_id {
                PlaneId::U | PlaneId::V => resolved.pitch >> resolved.format.chroma_pitch_shift(),
                PlaneId::Y | PlaneId::Generic => resolved.pitch,
            };
            let base = match plane.plane_id {
                PlaneId::U => offsets[1],
                PlaneId::V => offsets[2],
                PlaneId::Y | PlaneId::Generic => offsets[0],
            };

            // linear 时覆盖偏移折算进字节偏移；tiled 时写入 X/Y offset 字段
            let ovr_rows = resolved.y_offset / plane.scale_height;
            let ovr_cols = resolved.x_offset / plane.scale_width;
            let (offset, x_offset, y_offset) = if tiling.is_tiled() {
                (base.bytes, resolved.x_offset, base.rows + ovr_rows)
            } else {
                let bytes = base.bytes
                    + ovr_rows as u64 * pitch as u64
                    + ovr_cols as u64 * Self::plane_bytes_per_pixel(plane, resolved.format) as u64;
                (bytes, 0, base.rows)
            };
            let (max_x, max_y) = if plane.advanced {
                (MEDIA_MAX_X_OFFSET, MEDIA_MAX_Y_OFFSET)
            } else {
                (RENDER_MAX_X_OFFSET, RENDER_MAX_Y_OFFSET)
            };
            if x_offset > max_x || y_offset > max_y {
                return Err(DescriptorError::InvalidDimensions(format!(
                    "tile offset ({}, {}) exceeds ({}, {})",
                    x_offset, y_offset, max_x, max_y
                )));
            }

            // 单 plane 的 planar 格式需要在记录中给出色度 plane 的行偏移
            let chroma_rows = if single_planar {
                let rows = (offsets[1].bytes / resolved.pitch.max(1) as u64) as u32 + offsets[1].rows;
                if tiling.is_tiled() { rows } else { (rows + resolved.y_offset / 2).saturating_sub(resolved.y_offset) }
            } else {
                0
            };

            let compression_format = Self::plane_compression_format(resolved.format, plane.plane_id, compression);
            let record = if plane.advanced {
                MediaSurfaceState::encode(&MediaSurfaceStateParams {
                    format_code: plane.format_code,
                    tile_mode: tiling,
                    width,
                    height,
                    pitch,
                    rotation_code,
                    x_offset,
                    y_offset,
                    chroma_direction: meta.chroma_siting.direction(),
                    interleave_chroma: single_planar,
                    half_pitch_chroma: false,
                    u_offset: (0, chroma_rows),
                    v_offset: (0, chroma_rows),
                    memory_object_control: resolved.memory_object_control,
                    compression: compression.mode,
                })
            } else {
                RenderSurfaceState::encode(&RenderSurfaceStateParams {
                    surface_type: if kind == SurfaceKind::Image3D {
                        RenderSurfaceType::Surface3D
                    } else {
                        RenderSurfaceType::Surface2D
                    },
                    format_code: plane.format_code,
                    tile_mode: tiling,
                    vertical_line_stride: parity.is_field(),
                    vertical_line_stride_offset: parity == FrameParity::BottomField,
                    memory_object_control: resolved.memory_object_control,
                    qpitch: if kind == SurfaceKind::Image3D { meta.height.next_multiple_of(4) } else { 0 },
                    width,
                    height,
                    depth: if kind == SurfaceKind::Image3D { resolved.depth } else { 1 },
                    pitch,
                    rotation_code,
                    x_offset,
                    y_offset,
                    chroma_offsets: single_planar.then_some(ChromaPlaneOffsets {
                        u_x: 0,
                        u_y: chroma_rows,
                        v_x: 0,
                        v_y: chroma_rows,
                        half_pitch_chroma: false,
                        separate_uv: false,
                    }),
                    compression: compression.mode,
                    compression_format,
                })
            };

            records.push(record);
            planes.push(PlaneMeta {
                plane_id: plane.plane_id,
                offset,
                x_offset,
                y_offset,
                width,
                height,
                pitch,
                format_code: plane.format_code,
                advanced: plane.advanced,
            });
        }

        Ok(Descriptor::new(kind, ctx, records, planes, fallbacks))
    }
}
// tools
impl DescriptorBuilder<'_> {
    /// x 必须 4 对齐；y 在 linear 时 2 对齐（色度 plane 需要整除），tiled 时 4 对齐
    fn check_override_alignment(ovr: Option<&OverrideParams>, tiling: TileMode) -> Result<(), DescriptorError> {
        let Some(ovr) = ovr else {
            return Ok(());
        };
        let x = ovr.x_offset.unwrap_or(0);
        let y = ovr.y_offset.unwrap_or(0);
        let y_align = if tiling.is_tiled() { 4 } else { 2 };
        if x % 4 != 0 || y % y_align != 0 {
            return Err(DescriptorError::MisalignedOverrideOffset { x, y, y_align });
        }
        Ok(())
    }

    fn resolve_tiling(
        &self,
        kind: SurfaceKind,
        meta: &SurfaceMetadata,
        format: SurfaceFormat,
        fallbacks: &mut FallbackFlags,
    ) -> TileMode {
        if !meta.tiling.is_tiled() {
            return TileMode::Linear;
        }
        if !self.caps.tiling_supported || !format.is_tileable() || kind == SurfaceKind::Image2DUp {
            log::debug!("tiling {:?} disabled for {:?} {}", meta.tiling, kind, format);
            *fallbacks |= FallbackFlags::TILING_DISABLED;
            return TileMode::Linear;
        }
        meta.tiling
    }

    /// advanced 布局不可用时回退到 Sampler3D 的简单布局
    fn resolve_layout(
        &self,
        format: SurfaceFormat,
        ctx: UsageContext,
        fallbacks: &mut FallbackFlags,
    ) -> Result<PlaneLayoutTemplate, DescriptorError> {
        let unsupported = || DescriptorError::UnsupportedFormatForContext { format, context: ctx };
        if !ctx.prefers_advanced() {
            return self.table.lookup(format, ctx).ok_or_else(unsupported);
        }

        if self.caps.advanced_sampler_supported {
            if let Some(template) = self.table.lookup(format, ctx) {
                return Ok(template);
            }
        }

        let template = self.table.lookup(format, UsageContext::Sampler3D).ok_or_else(unsupported)?;
        log::debug!(
            "{} has no advanced layout for {}, falling back to simple layout [{}]",
            format,
            ctx,
            template.planes.iter().map(|p| format!("{:?}:{:#x}", p.plane_id, p.format_code)).join(", ")
        );
        *fallbacks |= FallbackFlags::SIMPLE_LAYOUT;
        Ok(template)
    }

    fn resolve_compression(
        &self,
        requested: CompressionState,
        format: SurfaceFormat,
        ctx: UsageContext,
        tiling: TileMode,
        fallbacks: &mut FallbackFlags,
    ) -> CompressionState {
        let supported = match requested.mode {
            CompressionMode::None => return CompressionState::NONE,
            CompressionMode::Media => self.caps.media_compression_supported,
            CompressionMode::Render => {
                self.caps.render_compression_supported
                    && (ctx != UsageContext::RenderTarget || self.caps.compressed_render_target_supported)
            }
        };
        if supported && format.is_compressible() && tiling.is_tiled() {
            requested
        } else {
            log::debug!("{:?} compression disabled for {} in {}", requested.mode, format, ctx);
            *fallbacks |= FallbackFlags::COMPRESSION_DISABLED;
            CompressionState::NONE
        }
    }

    /// plane 的宽高，RenderTarget 下宽度以 dword 为单位
    fn plane_extent(
        plane: &PlaneTemplate,
        resolved: &ResolvedSurface,
        ctx: UsageContext,
        parity: FrameParity,
    ) -> (u32, u32) {
        let align_unit_height = if resolved.format.needs_even_height() { 2 } else { 1 };
        let adjusted_height = resolved.height.next_multiple_of(align_unit_height);

        let mut height = adjusted_height.div_ceil(plane.scale_height);
        let mut width = resolved.width / plane.scale_width;

        if ctx == UsageContext::RenderTarget && !plane.advanced {
            width = if resolved.format.is_128bit() {
                width << 2
            } else if resolved.format.is_64bit() {
                width << 1
            } else {
                width.div_ceil(plane.pixels_per_dword.max(1))
            };
        }

        if parity.is_field() {
            height = (height / 2).max(1);
        }

        height = (height / plane.align_height * plane.align_height).max(1);
        width = (width / plane.align_width * plane.align_width).max(1);
        (width, height)
    }

    fn plane_bytes_per_pixel(plane: &PlaneTemplate, format: SurfaceFormat) -> u32 {
        if plane.pixels_per_dword == 0 { format.bytes_per_pixel() } else { 4 / plane.pixels_per_dword }
    }

    /// Y/U/V 三个 plane 相对 surface 起始的偏移，按生效的格式与 pitch 排布
    ///
    /// 物理格式本身是 planar 时，亮度 plane 占用物理高度的行数；
    /// 单 plane 的 surface 被重新解释为 planar 时，各 plane 紧随生效高度依次排布。
    fn plane_offsets(meta: &SurfaceMetadata, resolved: &ResolvedSurface, tiling: TileMode) -> [PlaneOffset; 3] {
        use SurfaceFormat as F;

        if let Some(ext) = meta.external_layout {
            return [
                PlaneOffset::default(),
                PlaneOffset {
                    bytes: ext.u_offset,
                    rows: ext.u_y_offset,
                },
                PlaneOffset {
                    bytes: ext.v_offset,
                    rows: ext.v_y_offset,
                },
            ];
        }

        let luma_rows = if meta.format.is_planar() { meta.height } else { resolved.height };
        let height = luma_rows as u64;
        let pitch = resolved.pitch as u64;
        // 以行数给出的偏移，tiled 时按 tile 高度拆分
        let rows_offset = |rows: u64| -> PlaneOffset {
            if tiling.is_tiled() {
                let rem = rows % TILE_ROWS as u64;
                PlaneOffset {
                    bytes: (rows - rem) * pitch,
                    rows: rem as u32,
                }
            } else {
                PlaneOffset {
                    bytes: rows * pitch,
                    rows: 0,
                }
            }
        };
        let bytes_offset = |bytes: u64| PlaneOffset { bytes, rows: 0 };

        let (u, v) = match resolved.format {
            F::Nv12 | F::Nv21 | F::P010 | F::P016 | F::P208 => (rows_offset(height), rows_offset(height)),
            F::I420 => (bytes_offset(height * pitch), bytes_offset(height * pitch * 5 / 4)),
            F::Yv12 => (bytes_offset(height * pitch * 5 / 4), bytes_offset(height * pitch)),
            F::Imc3 | F::Format422V => (rows_offset(height), rows_offset(height * 3 / 2)),
            F::Format422H | F::Format411P | F::Format444P | F::Rgbp | F::Bgrp => {
                (rows_offset(height), rows_offset(height * 2))
            }
            _ => (PlaneOffset::default(), PlaneOffset::default()),
        };
        [PlaneOffset::default(), u, v]
    }

    /// NV12/P010/P016 的 UV plane 使用单独的压缩格式编码
    fn plane_compression_format(format: SurfaceFormat, plane_id: PlaneId, compression: CompressionState) -> u32 {
        if !compression.is_enabled() {
            return 0;
        }
        match (format, plane_id) {
            (SurfaceFormat::Nv12 | SurfaceFormat::P010 | SurfaceFormat::P016, PlaneId::U) => {
                0x10 | (compression.format & 0xF)
            }
            _ => compression.format & 0x1F,
        }
    }
}
