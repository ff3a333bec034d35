use crate::basic::bitfield::BitField;
use crate::resources::format::UsageContext;
use crate::resources::format_table::PlaneId;
use crate::resources::surface_desc::SurfaceKind;
use crate::resources::surface_state::SURFACE_STATE_DWORDS;
use bitflags::bitflags;

bitflags! {
    /// 构建时发生的策略回退
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FallbackFlags: u32 {
        /// advanced 布局不可用，使用了 Sampler3D 的简单布局
        const SIMPLE_LAYOUT = 1 << 0;
        /// 格式或设备不支持 tiling，按 linear 编码
        const TILING_DISABLED = 1 << 1;
        /// 格式或设备不支持压缩，压缩被关闭
        const COMPRESSION_DISABLED = 1 << 2;
    }
}

/// 单个 plane 的元数据，与硬件记录一一对应
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneMeta {
    pub plane_id: PlaneId,
    /// plane 起始位置相对 surface 基地址的字节偏移
    pub offset: u64,
    pub x_offset: u32,
    pub y_offset: u32,
    /// RenderTarget 下以 dword 为单位
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub format_code: u32,
    pub advanced: bool,
}

/// 不可变的硬件 descriptor
///
/// 每个 plane 一条 64 字节的记录，`plane_meta` 与记录一一对应。
/// 创建后不再修改，surface 属性变化时整体重建。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    kind: SurfaceKind,
    context: UsageContext,
    dwords: Vec<u32>,
    bytes: Vec<u8>,
    planes: Vec<PlaneMeta>,
    fallbacks: FallbackFlags,
}
// new & init
impl Descriptor {
    pub fn new(
        kind: SurfaceKind,
        context: UsageContext,
        records: Vec<[u32; SURFACE_STATE_DWORDS]>,
        planes: Vec<PlaneMeta>,
        fallbacks: FallbackFlags,
    ) -> Self {
        debug_assert_eq!(records.len(), planes.len());
        let dwords = records.concat();
        let bytes = BitField::dwords_to_le_bytes(&dwords);
        Self {
            kind,
            context,
            dwords,
            bytes,
            planes,
            fallbacks,
        }
    }
}
// getters
impl Descriptor {
    /// 全部记录按小端序展开后的字节
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn dwords(&self) -> &[u32] {
        &self.dwords
    }

    /// 第 `plane` 个 plane 的记录
    #[inline]
    pub fn record(&self, plane: usize) -> &[u32] {
        &self.dwords[plane * SURFACE_STATE_DWORDS..(plane + 1) * SURFACE_STATE_DWORDS]
    }

    #[inline]
    pub fn plane_meta(&self) -> &[PlaneMeta] {
        &self.planes
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    #[inline]
    pub fn fallbacks(&self) -> FallbackFlags {
        self.fallbacks
    }

    #[inline]
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    #[inline]
    pub fn context(&self) -> UsageContext {
        self.context
    }

    #[inline]
    pub fn is_advanced(&self) -> bool {
        self.planes.iter().any(|p| p.advanced)
    }
}
