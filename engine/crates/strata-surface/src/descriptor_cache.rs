use crate::composite::CompositeDescriptor;
use crate::errors::SurfaceError;
use crate::handles::{DescriptorHandle, SurfaceIndex};
use crate::surface_pool::SurfacePool;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::sync::Arc;
use strata_gfx::descriptor::builder::DescriptorBuilder;
use strata_gfx::descriptor::composite::{CompositeEntry, CompositeLayout, CompositeSlot};
use strata_gfx::descriptor::override_params::OverrideParams;
use strata_gfx::descriptor::surface_descriptor::Descriptor;
use strata_gfx::foundation::device::DeviceCaps;
use strata_gfx::resources::format::{UsageContext, UsageContexts};
use strata_gfx::resources::format_table::FormatLayoutTable;

/// 单个 (surface, usage context) 的缓存分区
#[derive(Default)]
struct CachePartition {
    /// 置位后在下一次查询时整体清空
    dirty: bool,
    default: Option<DescriptorHandle>,
    /// 以 override 的组合哈希分桶，桶内按完整参数比较
    aliases: HashMap<u64, Vec<(OverrideParams, DescriptorHandle)>>,
}
impl CachePartition {
    fn handles(&self) -> impl Iterator<Item = DescriptorHandle> + '_ {
        self.default.into_iter().chain(self.aliases.values().flatten().map(|(_, handle)| *handle))
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.aliases.is_empty()
    }
}

struct SurfaceCacheEntry {
    /// 构建这些 descriptor 时 surface 槽位的代数
    generation: u32,
    partitions: [CachePartition; UsageContext::COUNT],
}
impl SurfaceCacheEntry {
    fn new(generation: u32) -> Self {
        Self {
            generation,
            partitions: Default::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub lazy_clears: u64,
    pub evictions: u64,
}

/// descriptor 缓存
///
/// 以 (surface, usage context, override) 为键缓存构建结果。
/// descriptor 存放在 `SlotMap` 中，对外只暴露带代数的 `DescriptorHandle`，
/// 被清除的 descriptor 对应的旧 handle 永远不会解析到其他 descriptor。
pub struct DescriptorCache {
    descriptors: SlotMap<DescriptorHandle, Descriptor>,
    surfaces: HashMap<SurfaceIndex, SurfaceCacheEntry>,

    table: Arc<dyn FormatLayoutTable>,
    caps: DeviceCaps,

    stats: CacheStats,
}
// new & init
impl DescriptorCache {
    pub fn new(table: Arc<dyn FormatLayoutTable>, caps: DeviceCaps) -> Self {
        Self {
            descriptors: SlotMap::with_key(),
            surfaces: HashMap::new(),
            table,
            caps,
            stats: CacheStats::default(),
        }
    }
}
// getters
impl DescriptorCache {
    #[inline]
    pub fn descriptor(&self, handle: DescriptorHandle) -> Option<&Descriptor> {
        self.descriptors.get(handle)
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// 当前存活的 descriptor 数量
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
// lookup
impl DescriptorCache {
    /// 获取或构建 descriptor
    ///
    /// 没有 override（或 override 为空）时使用该分区唯一的默认项。
    pub fn get_descriptor(
        &mut self,
        pool: &SurfacePool,
        surface: SurfaceIndex,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
    ) -> Result<DescriptorHandle, SurfaceError> {
        let hash = ovr.map(OverrideParams::param_hash).unwrap_or_default();
        self.get_descriptor_with_hash(pool, surface, ctx, ovr, hash)
    }

    /// `hash` 只用于分桶，命中后仍比较完整的 override
    pub(crate) fn get_descriptor_with_hash(
        &mut self,
        pool: &SurfacePool,
        surface: SurfaceIndex,
        ctx: UsageContext,
        ovr: Option<&OverrideParams>,
        hash: u64,
    ) -> Result<DescriptorHandle, SurfaceError> {
        let _span = tracy_client::span!("DescriptorCache::get_descriptor");

        let slot = pool.active_surface(surface)?;
        let Some(metadata) = slot.metadata() else {
            return Err(SurfaceError::WrongSurfaceKind {
                index: surface,
                actual: slot.kind(),
                expected: "buffer or image, use get_composite_descriptor",
            });
        };
        let ovr = ovr.filter(|ovr| !ovr.is_empty());

        let entry = self.surfaces.entry(surface).or_insert_with(|| SurfaceCacheEntry::new(slot.generation()));
        if entry.generation != slot.generation() {
            log::debug!(
                "surface {} reallocated (generation {} -> {}), drop stale descriptors",
                surface,
                entry.generation,
                slot.generation()
            );
            for partition in &mut entry.partitions {
                Self::release(&mut self.descriptors, partition);
            }
            *entry = SurfaceCacheEntry::new(slot.generation());
            self.stats.evictions += 1;
        }

        let partition = &mut entry.partitions[ctx.index()];
        if partition.dirty {
            Self::release(&mut self.descriptors, partition);
            partition.dirty = false;
            self.stats.lazy_clears += 1;
        }

        let cached = match ovr {
            None => partition.default,
            Some(ovr) => partition
                .aliases
                .get(&hash)
                .and_then(|bucket| bucket.iter().find(|(params, _)| params == ovr))
                .map(|(_, handle)| *handle),
        };
        if let Some(handle) = cached {
            self.stats.hits += 1;
            return Ok(handle);
        }
        self.stats.misses += 1;

        let descriptor = DescriptorBuilder::new(self.table.as_ref(), &self.caps).build(slot.kind(), metadata, ctx, ovr)?;
        if !descriptor.fallbacks().is_empty() {
            log::debug!("descriptor for {} {:?} built with fallbacks {:?}", surface, ctx, descriptor.fallbacks());
        }
        self.stats.builds += 1;

        let handle = self.descriptors.insert(descriptor);
        match ovr {
            None => partition.default = Some(handle),
            Some(ovr) => partition.aliases.entry(hash).or_default().push((*ovr, handle)),
        }
        Ok(handle)
    }

    /// composite 的 descriptor 列表
    ///
    /// 每个参考帧的子 descriptor 来自该帧的 CompositeRef 分区；
    /// 已失效的参考帧写入 `Absent`，当前帧失效则返回错误。
    pub fn get_composite_descriptor(
        &mut self,
        pool: &SurfacePool,
        composite: SurfaceIndex,
        dims: Option<(u32, u32)>,
    ) -> Result<CompositeDescriptor, SurfaceError> {
        let _span = tracy_client::span!("DescriptorCache::get_composite_descriptor");

        let slot = pool.active_surface(composite)?;
        let Some(refs) = slot.composite_refs() else {
            return Err(SurfaceError::WrongSurfaceKind {
                index: composite,
                actual: slot.kind(),
                expected: "composite",
            });
        };
        if !pool.is_bound_active(refs.current) {
            return Err(SurfaceError::NullResource(refs.current.index));
        }

        let settings = pool.settings();
        let layout = CompositeLayout::new(
            refs.forward.len(),
            refs.backward.len(),
            settings.max_forward_refs as usize,
            settings.max_backward_refs as usize,
        );
        let ovr = dims.map(|(width, height)| OverrideParams::with_dims(width, height));

        let mut entries = Vec::with_capacity(layout.entry_count());
        for position in layout.slots() {
            let reference = match position {
                CompositeSlot::Current => refs.current,
                CompositeSlot::Forward(i) => refs.forward[i],
                CompositeSlot::Backward(i) => refs.backward[i],
                CompositeSlot::Absent => {
                    entries.push(CompositeEntry::Absent);
                    continue;
                }
            };
            if !pool.is_bound_active(reference) {
                log::warn!(
                    "composite {} references surface {} (generation {}) that is no longer active",
                    composite,
                    reference.index,
                    reference.generation
                );
                entries.push(CompositeEntry::Absent);
                continue;
            }
            let handle = self.get_descriptor(pool, reference.index, UsageContext::CompositeRef, ovr.as_ref())?;
            entries.push(CompositeEntry::Present(handle));
        }
        Ok(entries)
    }
}
// invalidate
impl DescriptorCache {
    /// 标记分区失效，分区内容在下一次查询时才清空
    pub fn invalidate(&mut self, surface: SurfaceIndex, contexts: UsageContexts) {
        let Some(entry) = self.surfaces.get_mut(&surface) else {
            return;
        };
        for ctx in contexts.contexts() {
            entry.partitions[ctx.index()].dirty = true;
        }
    }

    /// 槽位被回收后立即丢弃它的全部 descriptor
    pub fn evict_surface(&mut self, surface: SurfaceIndex) {
        let Some(mut entry) = self.surfaces.remove(&surface) else {
            return;
        };
        for partition in &mut entry.partitions {
            Self::release(&mut self.descriptors, partition);
        }
        self.stats.evictions += 1;
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.surfaces.clear();
    }
}
// tools
impl DescriptorCache {
    fn release(descriptors: &mut SlotMap<DescriptorHandle, Descriptor>, partition: &mut CachePartition) {
        if partition.is_empty() {
            return;
        }
        for handle in partition.handles() {
            descriptors.remove(handle);
        }
        partition.default = None;
        partition.aliases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::CompositeRefs;
    use crate::pool_settings::SurfacePoolSettings;
    use crate::surface_pool::FreeMode;
    use strata_gfx::commands::fence::TimelineFence;
    use strata_gfx::foundation::allocator::HostDeviceAllocator;
    use strata_gfx::resources::format::SurfaceFormat;
    use strata_gfx::resources::format_table::StandardFormatTable;
    use strata_gfx::resources::surface_desc::{SurfaceKind, SurfaceMetadata};

    struct Fixture {
        pool: SurfacePool,
        cache: DescriptorCache,
    }
    impl Fixture {
        fn new() -> Self {
            let settings = SurfacePoolSettings {
                table_size: 32,
                reserved_indices: 1,
                ..Default::default()
            };
            let pool = SurfacePool::new(
                settings,
                DeviceCaps::default(),
                Arc::new(TimelineFence::new(0, "test")),
                Arc::new(HostDeviceAllocator::default()),
            );
            let cache = DescriptorCache::new(Arc::new(StandardFormatTable::default()), DeviceCaps::default());
            Self { pool, cache }
        }

        fn nv12(&mut self) -> SurfaceIndex {
            self.pool.allocate(SurfaceKind::Image2D, SurfaceMetadata::image_2d(640, 480, SurfaceFormat::Nv12), "nv12").unwrap()
        }

        fn get(&mut self, surface: SurfaceIndex, ctx: UsageContext, ovr: Option<&OverrideParams>) -> DescriptorHandle {
            self.cache.get_descriptor(&self.pool, surface, ctx, ovr).unwrap()
        }
    }
    impl Drop for Fixture {
        fn drop(&mut self) {
            self.pool.destroy_all();
        }
    }

    #[test]
    fn test_stable_handle_without_invalidate() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let a = f.get(s, UsageContext::RenderTarget, None);
        let b = f.get(s, UsageContext::RenderTarget, None);
        assert_eq!(a, b);
        // 空 override 等价于默认项
        assert_eq!(f.get(s, UsageContext::RenderTarget, Some(&OverrideParams::default())), a);

        let stats = f.cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(f.cache.descriptor(a).unwrap().plane_count(), 2);
    }

    #[test]
    fn test_alias_descriptors() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let default = f.get(s, UsageContext::RenderTarget, None);
        let small = OverrideParams::with_dims(320, 240);
        let alias = f.get(s, UsageContext::RenderTarget, Some(&small));
        assert_ne!(default, alias);
        assert_eq!(f.get(s, UsageContext::RenderTarget, Some(&small)), alias);
        assert_eq!(f.cache.descriptor(alias).unwrap().plane_meta()[0].height, 240);
        assert_eq!(f.cache.descriptor(default).unwrap().plane_meta()[0].height, 480);
    }

    #[test]
    fn test_hash_collision_does_not_alias() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let a = OverrideParams::with_dims(320, 240);
        let b = OverrideParams::with_dims(160, 120);
        let ha = f.cache.get_descriptor_with_hash(&f.pool, s, UsageContext::Sampler3D, Some(&a), 42).unwrap();
        let hb = f.cache.get_descriptor_with_hash(&f.pool, s, UsageContext::Sampler3D, Some(&b), 42).unwrap();
        assert_ne!(ha, hb);
        assert_ne!(f.cache.descriptor(ha).unwrap().bytes(), f.cache.descriptor(hb).unwrap().bytes());
        assert_eq!(f.cache.get_descriptor_with_hash(&f.pool, s, UsageContext::Sampler3D, Some(&a), 42).unwrap(), ha);
        assert_eq!(f.cache.get_descriptor_with_hash(&f.pool, s, UsageContext::Sampler3D, Some(&b), 42).unwrap(), hb);
    }

    #[test]
    fn test_partition_isolation_and_lazy_clear() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let rt = f.get(s, UsageContext::RenderTarget, None);
        let sampler = f.get(s, UsageContext::Sampler3D, None);

        f.cache.invalidate(s, UsageContexts::RENDER_TARGET);
        // 失效只置位，descriptor 仍然存在
        assert!(f.cache.descriptor(rt).is_some());
        assert_eq!(f.cache.stats().lazy_clears, 0);

        let rt2 = f.get(s, UsageContext::RenderTarget, None);
        assert_ne!(rt, rt2);
        assert!(f.cache.descriptor(rt).is_none());
        assert_eq!(f.get(s, UsageContext::Sampler3D, None), sampler);
        assert_eq!(f.cache.stats().lazy_clears, 1);
    }

    #[test]
    fn test_generation_change_drops_stale_entries() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let old = f.get(s, UsageContext::RenderTarget, None);
        f.pool.free(s, FreeMode::Immediate).unwrap();

        let t = f
            .pool
            .allocate(SurfaceKind::Image2D, SurfaceMetadata::image_2d(64, 64, SurfaceFormat::A8R8G8B8), "argb")
            .unwrap();
        assert_eq!(s, t);
        let new = f.get(t, UsageContext::RenderTarget, None);
        assert_ne!(old, new);
        assert!(f.cache.descriptor(old).is_none());
        assert_eq!(f.cache.descriptor(new).unwrap().plane_count(), 1);
    }

    #[test]
    fn test_inactive_surface_is_rejected() {
        let mut f = Fixture::new();
        let s = f.nv12();
        f.pool.free(s, FreeMode::Deferred).unwrap();
        assert_eq!(
            f.cache.get_descriptor(&f.pool, s, UsageContext::RenderTarget, None),
            Err(SurfaceError::UseAfterFree(s))
        );
    }

    #[test]
    fn test_evict_surface() {
        let mut f = Fixture::new();
        let s = f.nv12();
        let a = f.get(s, UsageContext::RenderTarget, None);
        let b = f.get(s, UsageContext::AdaptiveSampler, None);
        f.cache.evict_surface(s);
        assert!(f.cache.descriptor(a).is_none());
        assert!(f.cache.descriptor(b).is_none());
        assert!(f.cache.is_empty());
    }

    #[test]
    fn test_composite_descriptor() {
        let mut f = Fixture::new();
        let cur = f.nv12();
        let fwd0 = f.nv12();
        let fwd1 = f.nv12();
        let composite = f.pool.allocate_composite(CompositeRefs::new(cur, &[fwd0, fwd1], &[]), "vme").unwrap();

        f.pool.free(fwd1, FreeMode::Immediate).unwrap();
        let entries = f.cache.get_composite_descriptor(&f.pool, composite, None).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries[0].present().is_some());
        assert!(entries[1].present().is_some());
        assert_eq!(entries[2], CompositeEntry::Absent);
        assert_eq!(entries[3], CompositeEntry::Absent);
        assert_eq!(entries[4], CompositeEntry::Absent);

        // 子 descriptor 来自参考帧的 CompositeRef 分区
        let cur_ref = f.get(cur, UsageContext::CompositeRef, None);
        assert_eq!(entries[0].present(), Some(cur_ref));

        let resized = f.cache.get_composite_descriptor(&f.pool, composite, Some((320, 240))).unwrap();
        assert_ne!(resized[0], entries[0]);

        f.pool.free(cur, FreeMode::Immediate).unwrap();
        assert_eq!(
            f.cache.get_composite_descriptor(&f.pool, composite, None),
            Err(SurfaceError::NullResource(cur))
        );
    }

    #[test]
    fn test_composite_ignores_reallocated_reference() {
        let mut f = Fixture::new();
        let cur = f.nv12();
        let fwd = f.nv12();
        let composite = f.pool.allocate_composite(CompositeRefs::new(cur, &[fwd], &[]), "vme").unwrap();

        f.pool.free(fwd, FreeMode::Immediate).unwrap();
        let other = f.nv12();
        assert_eq!(other, fwd);
        let entries = f.cache.get_composite_descriptor(&f.pool, composite, None).unwrap();
        assert!(entries[0].present().is_some());
        assert_eq!(entries[1], CompositeEntry::Absent);

        // 当前帧的槽位被重新分配同样视为已释放
        f.pool.free(cur, FreeMode::Immediate).unwrap();
        let reused = f.nv12();
        assert_eq!(reused, cur);
        assert_eq!(
            f.cache.get_composite_descriptor(&f.pool, composite, None),
            Err(SurfaceError::NullResource(cur))
        );
    }

    #[test]
    fn test_composite_is_not_a_plain_surface() {
        let mut f = Fixture::new();
        let cur = f.nv12();
        let composite = f.pool.allocate_composite(CompositeRefs::new(cur, &[], &[]), "vme").unwrap();
        assert!(matches!(
            f.cache.get_descriptor(&f.pool, composite, UsageContext::CompositeRef, None),
            Err(SurfaceError::WrongSurfaceKind { .. })
        ));
        assert!(matches!(
            f.cache.get_composite_descriptor(&f.pool, cur, None),
            Err(SurfaceError::WrongSurfaceKind { .. })
        ));
    }
}
