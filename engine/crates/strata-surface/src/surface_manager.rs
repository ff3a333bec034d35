use crate::composite::{CompositeDescriptor, CompositeRefs};
use crate::descriptor_cache::DescriptorCache;
use crate::errors::SurfaceError;
use crate::handles::{DescriptorHandle, SurfaceIndex};
use crate::pool_settings::SurfacePoolSettings;
use crate::surface_pool::{FreeMode, FreeOutcome, SurfacePool};
use std::sync::Arc;
use strata_gfx::commands::fence::CompletionCounter;
use strata_gfx::descriptor::override_params::OverrideParams;
use strata_gfx::descriptor::surface_descriptor::Descriptor;
use strata_gfx::foundation::allocator::DeviceAllocator;
use strata_gfx::foundation::device::DeviceCaps;
use strata_gfx::resources::format::{
    ChromaSiting, CompressionState, FrameParity, Rotation, SurfaceFormat, TileMode, UsageContext, UsageContexts,
};
use strata_gfx::resources::format_table::FormatLayoutTable;
use strata_gfx::resources::surface_desc::{SurfaceDims, SurfaceKind, SurfaceMetadata};

/// 会影响 descriptor 内容的 surface 属性
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceProperty {
    Rotation,
    ChromaSiting,
    FrameParity,
    DefaultDims,
    Format,
    Pitch,
    Tiling,
    Compression,
    MemoryObjectControl,
}
impl SurfaceProperty {
    /// 属性修改后需要失效的分区
    pub fn dependent_contexts(self) -> UsageContexts {
        match self {
            Self::Rotation => UsageContexts::SAMPLER_3D | UsageContexts::ADAPTIVE_SAMPLER,
            Self::ChromaSiting => UsageContexts::ADAPTIVE_SAMPLER | UsageContexts::COMPOSITE_REF,
            Self::FrameParity => {
                UsageContexts::RENDER_TARGET | UsageContexts::SAMPLER_3D | UsageContexts::ADAPTIVE_SAMPLER
            }
            Self::DefaultDims
            | Self::Format
            | Self::Pitch
            | Self::Tiling
            | Self::Compression
            | Self::MemoryObjectControl => UsageContexts::all(),
        }
    }
}

/// surface 系统的门面
///
/// 持有资源池与 descriptor 缓存，保证：
/// - 元数据修改只失效依赖该属性的分区
/// - 槽位回收后立即清除该槽位的缓存
pub struct SurfaceManager {
    pool: SurfacePool,
    cache: DescriptorCache,
}
// new & init
impl SurfaceManager {
    pub fn new(
        settings: SurfacePoolSettings,
        caps: DeviceCaps,
        table: Arc<dyn FormatLayoutTable>,
        completion: Arc<dyn CompletionCounter>,
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Self {
        Self {
            pool: SurfacePool::new(settings, caps, completion, allocator),
            cache: DescriptorCache::new(table, caps),
        }
    }
}
// destroy
impl SurfaceManager {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        let _span = tracy_client::span!("SurfaceManager::destroy");
        self.cache.clear();
        self.pool.destroy_all();
    }
}
// getters
impl SurfaceManager {
    #[inline]
    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    #[inline]
    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    #[inline]
    pub fn descriptor(&self, handle: DescriptorHandle) -> Option<&Descriptor> {
        self.cache.descriptor(handle)
    }

    #[inline]
    pub fn metadata(&self, surface: SurfaceIndex) -> Result<&SurfaceMetadata, SurfaceError> {
        let slot = self.pool.active_surface(surface)?;
        slot.metadata().ok_or(SurfaceError::WrongSurfaceKind {
            index: surface,
            actual: slot.kind(),
            expected: "buffer or image",
        })
    }
}
// lifetime
impl SurfaceManager {
    pub fn allocate(
        &mut self,
        kind: SurfaceKind,
        metadata: SurfaceMetadata,
        debug_name: impl AsRef<str>,
    ) -> Result<SurfaceIndex, SurfaceError> {
        let result = self.pool.allocate(kind, metadata, debug_name);
        // 分配时可能回收了延迟列表
        self.sync_reclaimed();
        result
    }

    pub fn allocate_composite(
        &mut self,
        refs: CompositeRefs,
        debug_name: impl AsRef<str>,
    ) -> Result<SurfaceIndex, SurfaceError> {
        let result = self.pool.allocate_composite(refs, debug_name);
        self.sync_reclaimed();
        result
    }

    pub fn free(&mut self, surface: SurfaceIndex, mode: FreeMode) -> Result<FreeOutcome, SurfaceError> {
        let outcome = self.pool.free(surface, mode)?;
        self.sync_reclaimed();
        Ok(outcome)
    }

    #[inline]
    pub fn increase_usage(&mut self, surface: SurfaceIndex) -> Result<u32, SurfaceError> {
        self.pool.increase_usage(surface)
    }

    #[inline]
    pub fn decrease_usage(&mut self, surface: SurfaceIndex) -> Result<u32, SurfaceError> {
        self.pool.decrease_usage(surface)
    }

    #[inline]
    pub fn track_gpu_use(&mut self, surface: SurfaceIndex, fence: u64) -> Result<(), SurfaceError> {
        self.pool.track_gpu_use(surface, fence)
    }

    /// 回收已完成的延迟销毁，并清除对应的缓存
    pub fn refresh_deferred(&mut self) -> usize {
        let count = self.pool.refresh_deferred();
        self.sync_reclaimed();
        count
    }
}
// descriptors
impl SurfaceManager {
    pub fn get_descriptor(
        &mut self,
        surface: SurfaceIndex,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
    ) -> Result<DescriptorHandle, SurfaceError> {
        self.cache.get_descriptor(&self.pool, surface, ctx, ovr)
    }

    pub fn get_composite_descriptor(
        &mut self,
        composite: SurfaceIndex,
        dims: Option<(u32, u32)>,
    ) -> Result<CompositeDescriptor, SurfaceError> {
        self.cache.get_composite_descriptor(&self.pool, composite, dims)
    }
}
// metadata update
impl SurfaceManager {
    pub fn set_rotation(&mut self, surface: SurfaceIndex, rotation: Rotation) -> Result<(), SurfaceError> {
        self.pool.set_rotation(surface, rotation)?;
        self.invalidate(surface, SurfaceProperty::Rotation);
        Ok(())
    }

    pub fn set_chroma_siting(&mut self, surface: SurfaceIndex, siting: ChromaSiting) -> Result<(), SurfaceError> {
        self.pool.set_chroma_siting(surface, siting)?;
        self.invalidate(surface, SurfaceProperty::ChromaSiting);
        Ok(())
    }

    pub fn set_frame_parity(&mut self, surface: SurfaceIndex, parity: FrameParity) -> Result<(), SurfaceError> {
        self.pool.set_frame_parity(surface, parity)?;
        self.invalidate(surface, SurfaceProperty::FrameParity);
        Ok(())
    }

    /// `None` 恢复为物理尺寸
    pub fn set_default_dims(&mut self, surface: SurfaceIndex, dims: Option<SurfaceDims>) -> Result<(), SurfaceError> {
        self.pool.set_default_dims(surface, dims)?;
        self.invalidate(surface, SurfaceProperty::DefaultDims);
        Ok(())
    }

    pub fn set_format(&mut self, surface: SurfaceIndex, format: SurfaceFormat) -> Result<(), SurfaceError> {
        self.pool.set_format(surface, format)?;
        self.invalidate(surface, SurfaceProperty::Format);
        Ok(())
    }

    pub fn set_pitch(&mut self, surface: SurfaceIndex, pitch: u32) -> Result<(), SurfaceError> {
        self.pool.set_pitch(surface, pitch)?;
        self.invalidate(surface, SurfaceProperty::Pitch);
        Ok(())
    }

    pub fn set_tiling(&mut self, surface: SurfaceIndex, tiling: TileMode) -> Result<(), SurfaceError> {
        self.pool.set_tiling(surface, tiling)?;
        self.invalidate(surface, SurfaceProperty::Tiling);
        Ok(())
    }

    pub fn set_compression(
        &mut self,
        surface: SurfaceIndex,
        compression: CompressionState,
    ) -> Result<(), SurfaceError> {
        self.pool.set_compression(surface, compression)?;
        self.invalidate(surface, SurfaceProperty::Compression);
        Ok(())
    }

    pub fn set_memory_object_control(&mut self, surface: SurfaceIndex, mocs: u32) -> Result<(), SurfaceError> {
        self.pool.set_memory_object_control(surface, mocs)?;
        self.invalidate(surface, SurfaceProperty::MemoryObjectControl);
        Ok(())
    }
}
// tools
impl SurfaceManager {
    #[inline]
    fn invalidate(&mut self, surface: SurfaceIndex, property: SurfaceProperty) {
        self.cache.invalidate(surface, property.dependent_contexts());
    }

    fn sync_reclaimed(&mut self) {
        for surface in self.pool.take_reclaimed() {
            self.cache.evict_surface(surface);
        }
    }
}
