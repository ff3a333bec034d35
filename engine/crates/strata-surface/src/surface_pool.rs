use crate::composite::{BoundComposite, BoundRef, CompositeRefs};
use crate::deferred_destroy::{DeferredDestroyList, PendingDestroyEntry};
use crate::errors::SurfaceError;
use crate::handles::SurfaceIndex;
use crate::pool_settings::SurfacePoolSettings;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::task::Poll;
use strata_gfx::commands::fence::CompletionCounter;
use strata_gfx::foundation::allocator::{DeviceAllocator, DeviceMemory};
use strata_gfx::foundation::device::DeviceCaps;
use strata_gfx::resources::format::{
    ChromaSiting, CompressionState, FrameParity, Rotation, SurfaceFormat, TileMode,
};
use strata_gfx::resources::surface_desc::{SurfaceDims, SurfaceKind, SurfaceMetadata};

/// 销毁方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeMode {
    /// 应用主动销毁：无引用且 GPU 已完成时立即回收，否则进入延迟列表
    Immediate,
    /// 垃圾回收：总是进入延迟列表，由下一次 refresh 回收
    Deferred,
    /// 跳过引用与 fence 检查立即回收，仅用于异常路径
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeOutcome {
    Reclaimed,
    Deferred,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Active,
    /// 等待 GPU 到达 `fence` 后回收
    PendingDestroy { fence: u64 },
}

/// 槽位中保存的资源
#[derive(Clone, Debug)]
pub enum SurfacePayload {
    Resource {
        metadata: SurfaceMetadata,
        memory: DeviceMemory,
    },
    Composite(BoundComposite),
}

/// 绑定表中的一个 surface
#[derive(Clone, Debug)]
pub struct SurfaceSlot {
    kind: SurfaceKind,
    payload: SurfacePayload,
    state: SurfaceState,
    refcount: u32,
    /// 最近一次引用该 surface 的提交所对应的 fence 值
    last_use_fence: u64,
    /// 槽位每被分配一次加 1，用于识别旧的缓存
    generation: u32,
    debug_name: String,
}
// getters
impl SurfaceSlot {
    #[inline]
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SurfaceState::Active
    }

    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    #[inline]
    pub fn last_use_fence(&self) -> u64 {
        self.last_use_fence
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// composite 没有元数据
    #[inline]
    pub fn metadata(&self) -> Option<&SurfaceMetadata> {
        match &self.payload {
            SurfacePayload::Resource { metadata, .. } => Some(metadata),
            SurfacePayload::Composite(_) => None,
        }
    }

    #[inline]
    pub fn composite_refs(&self) -> Option<&BoundComposite> {
        match &self.payload {
            SurfacePayload::Composite(refs) => Some(refs),
            SurfacePayload::Resource { .. } => None,
        }
    }

    #[inline]
    pub fn memory(&self) -> Option<DeviceMemory> {
        match &self.payload {
            SurfacePayload::Resource { memory, .. } => Some(*memory),
            SurfacePayload::Composite(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 每种 surface 占用的数量（包含待销毁的）
    pub kind_counts: [u32; SurfaceKind::COUNT],
    pub pending_destroy: usize,
    pub reclaimed: u64,
    pub deferred: u64,
    pub forced: u64,
}

/// surface 资源池
///
/// 定长的槽位表，索引即 surface 在绑定表中的位置。
/// 回收依赖 GPU 完成计数器：只有 fence 已完成且无 CPU 引用的 surface 才会被真正释放。
pub struct SurfacePool {
    settings: SurfacePoolSettings,
    caps: DeviceCaps,

    slots: Vec<Option<SurfaceSlot>>,
    /// 每个槽位的代数，槽位释放后保留
    generations: Vec<u32>,
    kind_counts: [u32; SurfaceKind::COUNT],

    deferred: Arc<DeferredDestroyList>,
    /// 已回收、尚未被 `take_reclaimed` 取走的索引，每个槽位至多一项
    reclaimed: BTreeSet<SurfaceIndex>,

    completion: Arc<dyn CompletionCounter>,
    allocator: Arc<dyn DeviceAllocator>,

    stats: PoolStats,
    destroyed: bool,
}
// new & init
impl SurfacePool {
    pub fn new(
        settings: SurfacePoolSettings,
        caps: DeviceCaps,
        completion: Arc<dyn CompletionCounter>,
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Self {
        let table_size = settings.table_size as usize;
        if settings.reserved_indices >= settings.table_size {
            log::warn!(
                "surface table has {} slots but reserves {}, no surface can be allocated",
                settings.table_size,
                settings.reserved_indices
            );
        }
        log::info!(
            "surface pool: {} slots ({} reserved), max buffer {}, 2D {}, 3D {}, 2D-UP {}, composite {}",
            settings.table_size,
            settings.reserved_indices,
            settings.max_buffers,
            settings.max_images_2d,
            settings.max_images_3d,
            settings.max_images_2d_up,
            settings.max_composites
        );

        Self {
            settings,
            caps,

            slots: vec![None; table_size],
            generations: vec![0; table_size],
            kind_counts: [0; SurfaceKind::COUNT],

            deferred: Arc::new(DeferredDestroyList::new()),
            reclaimed: BTreeSet::new(),

            completion,
            allocator,

            stats: PoolStats::default(),
            destroyed: false,
        }
    }
}
// destroy
impl SurfacePool {
    /// 强制回收所有 surface，仍被引用的会记录为泄漏
    pub fn destroy_all(&mut self) {
        let _span = tracy_client::span!("SurfacePool::destroy_all");

        let in_use = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(|slot| slot.refcount > 0 || !slot.is_active()))
            .map(|(index, _)| SurfaceIndex(index as u32))
            .collect_vec();
        if !in_use.is_empty() {
            log::warn!("force reclaim {} surfaces still in use: {}", in_use.len(), in_use.iter().join(", "));
        }

        for index in 0..self.slots.len() {
            self.reclaim(SurfaceIndex(index as u32));
        }
        self.deferred.clear();
        self.reclaimed.clear();
        self.destroyed = true;
    }
}
impl Drop for SurfacePool {
    fn drop(&mut self) {
        if !self.destroyed && self.slots.iter().any(Option::is_some) {
            log::error!("surface pool dropped with live surfaces, call destroy_all first");
        }
    }
}
// getters
impl SurfacePool {
    #[inline]
    pub fn settings(&self) -> &SurfacePoolSettings {
        &self.settings
    }

    #[inline]
    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    /// 延迟销毁列表，可以在其他线程中查询
    #[inline]
    pub fn deferred_list(&self) -> Arc<DeferredDestroyList> {
        self.deferred.clone()
    }

    #[inline]
    pub fn completed_fence(&self) -> u64 {
        self.completion.read()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            kind_counts: self.kind_counts,
            pending_destroy: self.deferred.len(),
            ..self.stats
        }
    }

    #[inline]
    pub fn kind_count(&self, kind: SurfaceKind) -> u32 {
        self.kind_counts[kind.index()]
    }

    /// 保留区之后、表容量之内
    #[inline]
    pub fn is_valid_index(&self, index: SurfaceIndex) -> bool {
        index.0 >= self.settings.reserved_indices && index.0 < self.settings.table_size
    }

    #[inline]
    pub fn is_reserved_index(&self, index: SurfaceIndex) -> bool {
        index.0 < self.settings.reserved_indices
    }

    /// 处于 Active 状态的 surface
    pub fn is_active(&self, index: SurfaceIndex) -> bool {
        self.surface(index).is_ok_and(SurfaceSlot::is_active)
    }

    /// 引用仍指向分配 composite 时的那个 surface，且处于 Active 状态
    pub fn is_bound_active(&self, reference: BoundRef) -> bool {
        self.surface(reference.index)
            .is_ok_and(|slot| slot.is_active() && slot.generation == reference.generation)
    }

    /// 获取槽位，包括待销毁的
    pub fn surface(&self, index: SurfaceIndex) -> Result<&SurfaceSlot, SurfaceError> {
        self.check_index(index)?;
        self.slots[index.as_usize()].as_ref().ok_or(SurfaceError::UseAfterFree(index))
    }

    /// 获取 Active 状态的槽位，待销毁的视为已释放
    pub fn active_surface(&self, index: SurfaceIndex) -> Result<&SurfaceSlot, SurfaceError> {
        let slot = self.surface(index)?;
        if slot.is_active() { Ok(slot) } else { Err(SurfaceError::UseAfterFree(index)) }
    }

    /// 所有 Active surface 的索引
    pub fn active_indices(&self) -> impl Iterator<Item = SurfaceIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(SurfaceSlot::is_active))
            .map(|(index, _)| SurfaceIndex(index as u32))
    }
}
// allocate & free
impl SurfacePool {
    /// 分配 buffer / image
    pub fn allocate(
        &mut self,
        kind: SurfaceKind,
        metadata: SurfaceMetadata,
        debug_name: impl AsRef<str>,
    ) -> Result<SurfaceIndex, SurfaceError> {
        let _span = tracy_client::span!("SurfacePool::allocate");

        if kind == SurfaceKind::Composite {
            return Err(SurfaceError::WrongSurfaceKind {
                index: SurfaceIndex(u32::MAX),
                actual: kind,
                expected: "buffer or image, use allocate_composite",
            });
        }
        metadata.validate(kind, &self.caps)?;

        let index = self.find_free_slot(kind)?;
        let memory = self.allocator.allocate(metadata.allocation_size(kind), debug_name.as_ref())?;
        self.occupy(index, kind, SurfacePayload::Resource { metadata, memory }, debug_name.as_ref());

        log::debug!("allocate {:?} {} ({}) {:?}", kind, index, debug_name.as_ref(), metadata.format);
        Ok(index)
    }

    /// 分配 composite，当前帧必须是 Active 的 2D image
    pub fn allocate_composite(
        &mut self,
        refs: CompositeRefs,
        debug_name: impl AsRef<str>,
    ) -> Result<SurfaceIndex, SurfaceError> {
        let _span = tracy_client::span!("SurfacePool::allocate_composite");

        let current = self.active_surface(refs.current).map_err(|_| SurfaceError::NullResource(refs.current))?;
        if !matches!(current.kind, SurfaceKind::Image2D | SurfaceKind::Image2DUp) {
            return Err(SurfaceError::WrongSurfaceKind {
                index: refs.current,
                actual: current.kind,
                expected: "2D image",
            });
        }
        for reference in refs.forward.iter().chain(refs.backward.iter()) {
            self.check_index(*reference)?;
        }

        let index = self.find_free_slot(SurfaceKind::Composite)?;
        let bound = BoundComposite::bind(&refs, |surface| self.generations[surface.as_usize()]);
        self.occupy(index, SurfaceKind::Composite, SurfacePayload::Composite(bound), debug_name.as_ref());
        Ok(index)
    }

    /// 释放 surface
    pub fn free(&mut self, index: SurfaceIndex, mode: FreeMode) -> Result<FreeOutcome, SurfaceError> {
        let _span = tracy_client::span!("SurfacePool::free");

        let completed = self.completion.read();
        let slot = self.slot_mut(index)?;
        if !slot.is_active() && mode != FreeMode::Forced {
            return Err(SurfaceError::DoubleFree(index));
        }
        let (kind, refcount, fence) = (slot.kind, slot.refcount, slot.last_use_fence);

        match mode {
            FreeMode::Forced => {
                if refcount > 0 || fence > completed {
                    log::warn!(
                        "force destroy surface {} with refcount {} and fence {} > {}",
                        index,
                        refcount,
                        fence,
                        completed
                    );
                }
                self.deferred.remove(index);
                self.reclaim(index);
                self.stats.forced += 1;
                Ok(FreeOutcome::Reclaimed)
            }
            FreeMode::Immediate if refcount == 0 && fence <= completed => {
                self.reclaim(index);
                Ok(FreeOutcome::Reclaimed)
            }
            FreeMode::Immediate | FreeMode::Deferred => {
                slot.state = SurfaceState::PendingDestroy { fence };
                self.deferred.push(PendingDestroyEntry {
                    index,
                    fence,
                    kind,
                    mode,
                });
                self.stats.deferred += 1;
                log::debug!("surface {} waits for fence {} (completed {})", index, fence, completed);
                Ok(FreeOutcome::Deferred)
            }
        }
    }

    /// 回收延迟列表中已经可以释放的 surface
    ///
    /// # return
    /// 回收的数量
    pub fn refresh_deferred(&mut self) -> usize {
        let _span = tracy_client::span!("SurfacePool::refresh_deferred");

        let completed = self.completion.read();
        let slots = &self.slots;
        let ready = self.deferred.drain_ready(completed, |index| {
            slots[index.as_usize()].as_ref().is_none_or(|slot| slot.refcount == 0)
        });
        for entry in &ready {
            self.reclaim(entry.index);
        }
        ready.len()
    }

    /// 查询一个可用的空闲索引，不占用
    ///
    /// 容量不足时会先尝试回收延迟列表。
    pub fn get_free_index(&mut self, kind: SurfaceKind) -> Result<SurfaceIndex, SurfaceError> {
        self.find_free_slot(kind)
    }
}
// usage
impl SurfacePool {
    pub fn increase_usage(&mut self, index: SurfaceIndex) -> Result<u32, SurfaceError> {
        let slot = self.slot_mut(index)?;
        if !slot.is_active() {
            return Err(SurfaceError::UseAfterFree(index));
        }
        slot.refcount += 1;
        Ok(slot.refcount)
    }

    /// 引用计数减 1，减到 0 以下视为重复释放
    pub fn decrease_usage(&mut self, index: SurfaceIndex) -> Result<u32, SurfaceError> {
        let slot = self.slot_mut(index)?;
        if slot.refcount == 0 {
            return Err(SurfaceError::DoubleFree(index));
        }
        slot.refcount -= 1;
        Ok(slot.refcount)
    }

    /// 记录一次引用该 surface 的 GPU 提交
    pub fn track_gpu_use(&mut self, index: SurfaceIndex, fence: u64) -> Result<(), SurfaceError> {
        let slot = self.slot_mut(index)?;
        if !slot.is_active() {
            return Err(SurfaceError::UseAfterFree(index));
        }
        slot.last_use_fence = slot.last_use_fence.max(fence);
        Ok(())
    }
}
// metadata update，由 SurfaceManager 调用并同步失效缓存
impl SurfacePool {
    fn update_metadata(
        &mut self,
        index: SurfaceIndex,
        update: impl FnOnce(&mut SurfaceMetadata),
    ) -> Result<(), SurfaceError> {
        let slot = self.slot_mut(index)?;
        if !slot.is_active() {
            return Err(SurfaceError::UseAfterFree(index));
        }
        let kind = slot.kind;
        match &mut slot.payload {
            SurfacePayload::Resource { metadata, .. } => {
                update(metadata);
                Ok(())
            }
            SurfacePayload::Composite(_) => Err(SurfaceError::WrongSurfaceKind {
                index,
                actual: kind,
                expected: "buffer or image",
            }),
        }
    }

    pub(crate) fn set_rotation(&mut self, index: SurfaceIndex, rotation: Rotation) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.rotation = rotation)
    }

    pub(crate) fn set_chroma_siting(&mut self, index: SurfaceIndex, siting: ChromaSiting) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.chroma_siting = siting)
    }

    pub(crate) fn set_frame_parity(&mut self, index: SurfaceIndex, parity: FrameParity) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.frame_parity = parity)
    }

    pub(crate) fn set_default_dims(&mut self, index: SurfaceIndex, dims: Option<SurfaceDims>) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.default_dims = dims)
    }

    pub(crate) fn set_format(&mut self, index: SurfaceIndex, format: SurfaceFormat) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.format = format)
    }

    pub(crate) fn set_memory_object_control(&mut self, index: SurfaceIndex, mocs: u32) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.memory_object_control = mocs)
    }

    pub(crate) fn set_compression(
        &mut self,
        index: SurfaceIndex,
        compression: CompressionState,
    ) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.compression = compression)
    }

    pub(crate) fn set_pitch(&mut self, index: SurfaceIndex, pitch: u32) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.pitch = pitch)
    }

    pub(crate) fn set_tiling(&mut self, index: SurfaceIndex, tiling: TileMode) -> Result<(), SurfaceError> {
        self.update_metadata(index, |m| m.tiling = tiling)
    }

    /// 取出自上次调用以来被回收的索引，按索引升序
    ///
    /// `SurfaceManager` 在每次分配、释放和刷新后调用，用来丢弃对应的缓存；
    /// 直接使用 `SurfacePool` 并自行缓存 descriptor 时需要同样调用。
    pub fn take_reclaimed(&mut self) -> Vec<SurfaceIndex> {
        std::mem::take(&mut self.reclaimed).into_iter().collect()
    }
}
// tools
impl SurfacePool {
    fn check_index(&self, index: SurfaceIndex) -> Result<(), SurfaceError> {
        if self.is_reserved_index(index) {
            return Err(SurfaceError::ReservedIndex(index));
        }
        if !self.is_valid_index(index) {
            return Err(SurfaceError::InvalidIndex(index));
        }
        Ok(())
    }

    fn slot_mut(&mut self, index: SurfaceIndex) -> Result<&mut SurfaceSlot, SurfaceError> {
        self.check_index(index)?;
        self.slots[index.as_usize()].as_mut().ok_or(SurfaceError::UseAfterFree(index))
    }

    fn first_free_slot(&self) -> Option<SurfaceIndex> {
        let start = self.settings.reserved_indices as usize;
        self.slots.iter().skip(start).position(Option::is_none).map(|pos| SurfaceIndex((start + pos) as u32))
    }

    fn has_room(&self, kind: SurfaceKind) -> Option<SurfaceIndex> {
        if self.kind_counts[kind.index()] >= self.settings.max_for(kind) {
            return None;
        }
        self.first_free_slot()
    }

    /// 容量不足时先回收延迟列表，仍不足时按等待策略轮询完成计数器
    fn find_free_slot(&mut self, kind: SurfaceKind) -> Result<SurfaceIndex, SurfaceError> {
        if let Some(index) = self.has_room(kind) {
            return Ok(index);
        }

        let wait = self.settings.wait;
        let found = wait.poll(|| {
            if self.refresh_deferred() > 0 {
                if let Some(index) = self.has_room(kind) {
                    return Poll::Ready(Some(index));
                }
            }
            // 延迟列表已空，继续等待不会腾出槽位
            if self.deferred.is_empty() { Poll::Ready(None) } else { Poll::Pending }
        });
        if let Some(index) = found {
            return Ok(index);
        }

        let kind_limited = self.kind_counts[kind.index()] >= self.settings.max_for(kind);
        let pending = if kind_limited { self.deferred.count_kind(kind) } else { self.deferred.len() };
        if pending > 0 {
            log::warn!("{:?} allocation blocked by {} surfaces pending destroy", kind, pending);
            return Err(SurfaceError::StillBusy { kind, pending });
        }
        let max = if kind_limited {
            self.settings.max_for(kind)
        } else {
            self.settings.table_size - self.settings.reserved_indices
        };
        log::error!("{:?} capacity exceeded (max {})", kind, max);
        Err(SurfaceError::CapacityExceeded { kind, max })
    }

    fn occupy(&mut self, index: SurfaceIndex, kind: SurfaceKind, payload: SurfacePayload, debug_name: &str) {
        let generation = &mut self.generations[index.as_usize()];
        *generation = generation.wrapping_add(1);
        self.slots[index.as_usize()] = Some(SurfaceSlot {
            kind,
            payload,
            state: SurfaceState::Active,
            refcount: 0,
            last_use_fence: 0,
            generation: *generation,
            debug_name: debug_name.to_string(),
        });
        self.kind_counts[kind.index()] += 1;
    }

    /// 真正释放槽位与设备内存
    fn reclaim(&mut self, index: SurfaceIndex) {
        let Some(slot) = self.slots[index.as_usize()].take() else {
            return;
        };
        if let Some(memory) = slot.memory() {
            if let Err(err) = self.allocator.free(memory) {
                log::error!("failed to free device memory of surface {}: {}", index, err);
            }
        }
        self.kind_counts[slot.kind.index()] -= 1;
        self.reclaimed.insert(index);
        self.stats.reclaimed += 1;
        log::debug!("reclaim {:?} {} ({})", slot.kind, index, slot.debug_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_gfx::commands::fence::{TimelineFence, WaitPolicy};
    use strata_gfx::foundation::allocator::HostDeviceAllocator;

    struct Fixture {
        fence: Arc<TimelineFence>,
        allocator: Arc<HostDeviceAllocator>,
        pool: SurfacePool,
    }
    impl Fixture {
        fn new(settings: SurfacePoolSettings) -> Self {
            let fence = Arc::new(TimelineFence::new(0, "test"));
            let allocator = Arc::new(HostDeviceAllocator::default());
            let pool = SurfacePool::new(settings, DeviceCaps::default(), fence.clone(), allocator.clone());
            Self { fence, allocator, pool }
        }
    }
    impl Drop for Fixture {
        fn drop(&mut self) {
            self.pool.destroy_all();
        }
    }

    fn small_settings() -> SurfacePoolSettings {
        SurfacePoolSettings {
            table_size: 8,
            reserved_indices: 2,
            max_images_2d: 2,
            ..Default::default()
        }
    }

    fn image() -> SurfaceMetadata {
        SurfaceMetadata::image_2d(64, 64, SurfaceFormat::A8R8G8B8)
    }

    #[test]
    fn test_allocate_starts_after_reserved() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        assert_eq!(a, SurfaceIndex(2));
        assert!(f.pool.is_valid_index(a));
        assert!(f.pool.is_reserved_index(SurfaceIndex(1)));
        assert!(!f.pool.is_valid_index(SurfaceIndex(8)));
        assert_eq!(f.allocator.live_count(), 1);
        assert_eq!(f.pool.surface(a).unwrap().refcount(), 0);
        assert_eq!(f.pool.surface(SurfaceIndex(1)).unwrap_err(), SurfaceError::ReservedIndex(SurfaceIndex(1)));
        assert_eq!(f.pool.surface(SurfaceIndex(9)).unwrap_err(), SurfaceError::InvalidIndex(SurfaceIndex(9)));
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        let _b = f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        assert_eq!(
            f.pool.allocate(SurfaceKind::Image2D, image(), "c"),
            Err(SurfaceError::CapacityExceeded {
                kind: SurfaceKind::Image2D,
                max: 2
            })
        );
        // 其他种类不受影响
        assert!(f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "buf").is_ok());

        assert_eq!(f.pool.free(a, FreeMode::Immediate), Ok(FreeOutcome::Reclaimed));
        let c = f.pool.allocate(SurfaceKind::Image2D, image(), "c").unwrap();
        assert_eq!(c, a);
        assert_eq!(f.pool.surface(c).unwrap().generation(), 2);
    }

    #[test]
    fn test_table_full() {
        let mut f = Fixture::new(SurfacePoolSettings {
            table_size: 4,
            reserved_indices: 2,
            ..Default::default()
        });
        f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "a").unwrap();
        f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "b").unwrap();
        assert_eq!(
            f.pool.get_free_index(SurfaceKind::Image2D),
            Err(SurfaceError::CapacityExceeded {
                kind: SurfaceKind::Image2D,
                max: 2
            })
        );
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut f = Fixture::new(small_settings());
        let result = f.pool.allocate(SurfaceKind::Image2D, SurfaceMetadata::image_2d(0, 64, SurfaceFormat::Nv12), "bad");
        assert!(matches!(result, Err(SurfaceError::InvalidDimensions(_))));
        assert_eq!(f.pool.kind_count(SurfaceKind::Image2D), 0);
        assert_eq!(f.allocator.live_count(), 0);
    }

    #[test]
    fn test_deferred_destroy_waits_for_fence() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.track_gpu_use(a, 5).unwrap();

        assert_eq!(f.pool.free(a, FreeMode::Immediate), Ok(FreeOutcome::Deferred));
        assert_eq!(f.pool.surface(a).unwrap().state(), SurfaceState::PendingDestroy { fence: 5 });
        assert!(!f.pool.is_active(a));

        f.fence.signal(4);
        assert_eq!(f.pool.refresh_deferred(), 0);
        assert_eq!(f.allocator.live_count(), 1);

        f.fence.signal(5);
        assert_eq!(f.pool.refresh_deferred(), 1);
        assert_eq!(f.pool.surface(a).unwrap_err(), SurfaceError::UseAfterFree(a));
        assert_eq!(f.allocator.live_count(), 0);
        assert_eq!(f.pool.take_reclaimed(), vec![a]);
    }

    #[test]
    fn test_deferred_waits_for_refcount() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.increase_usage(a).unwrap();

        assert_eq!(f.pool.free(a, FreeMode::Immediate), Ok(FreeOutcome::Deferred));
        assert_eq!(f.pool.refresh_deferred(), 0);
        assert_eq!(f.pool.decrease_usage(a), Ok(0));
        assert_eq!(f.pool.refresh_deferred(), 1);
    }

    #[test]
    fn test_deferred_mode_always_queues() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        assert_eq!(f.pool.free(a, FreeMode::Deferred), Ok(FreeOutcome::Deferred));
        assert_eq!(f.pool.stats().pending_destroy, 1);
        assert_eq!(f.pool.refresh_deferred(), 1);
        assert_eq!(f.pool.stats().pending_destroy, 0);
    }

    #[test]
    fn test_double_free_and_use_after_free() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.track_gpu_use(a, 1).unwrap();
        f.pool.free(a, FreeMode::Immediate).unwrap();
        assert_eq!(f.pool.free(a, FreeMode::Immediate), Err(SurfaceError::DoubleFree(a)));
        assert_eq!(f.pool.increase_usage(a), Err(SurfaceError::UseAfterFree(a)));

        f.fence.signal(1);
        f.pool.refresh_deferred();
        assert_eq!(f.pool.free(a, FreeMode::Immediate), Err(SurfaceError::UseAfterFree(a)));
        assert_eq!(f.pool.decrease_usage(a), Err(SurfaceError::UseAfterFree(a)));

        let b = f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        assert_eq!(f.pool.decrease_usage(b), Err(SurfaceError::DoubleFree(b)));
    }

    #[test]
    fn test_forced_free() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.increase_usage(a).unwrap();
        f.pool.track_gpu_use(a, 100).unwrap();
        assert_eq!(f.pool.free(a, FreeMode::Forced), Ok(FreeOutcome::Reclaimed));
        assert_eq!(f.allocator.live_count(), 0);

        // 待销毁的 surface 也可以被强制回收
        let b = f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        f.pool.track_gpu_use(b, 100).unwrap();
        f.pool.free(b, FreeMode::Deferred).unwrap();
        assert_eq!(f.pool.free(b, FreeMode::Forced), Ok(FreeOutcome::Reclaimed));
        assert!(f.pool.deferred_list().is_empty());
        assert_eq!(f.pool.stats().forced, 2);
    }

    #[test]
    fn test_pending_counts_toward_capacity() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        f.pool.track_gpu_use(a, 3).unwrap();
        f.pool.free(a, FreeMode::Immediate).unwrap();

        assert_eq!(
            f.pool.allocate(SurfaceKind::Image2D, image(), "c"),
            Err(SurfaceError::StillBusy {
                kind: SurfaceKind::Image2D,
                pending: 1
            })
        );

        // 分配时自动回收已完成的条目
        f.fence.signal(3);
        let c = f.pool.allocate(SurfaceKind::Image2D, image(), "c").unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_wait_policy_polls_completion() {
        let mut f = Fixture::new(SurfacePoolSettings {
            wait: WaitPolicy {
                enabled: true,
                max_retries: 2000,
                poll_interval_ms: 1,
            },
            ..small_settings()
        });
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        f.pool.track_gpu_use(a, 1).unwrap();
        f.pool.free(a, FreeMode::Immediate).unwrap();

        let fence = f.fence.clone();
        let signaler = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            fence.signal(1);
        });
        assert_eq!(f.pool.allocate(SurfaceKind::Image2D, image(), "c"), Ok(a));
        signaler.join().unwrap();
    }

    #[test]
    fn test_composite_allocation() {
        let mut f = Fixture::new(small_settings());
        let cur = f.pool.allocate(SurfaceKind::Image2D, image(), "cur").unwrap();
        let buf = f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "buf").unwrap();

        let composite = f.pool.allocate_composite(CompositeRefs::new(cur, &[], &[]), "vme").unwrap();
        assert_eq!(f.pool.surface(composite).unwrap().kind(), SurfaceKind::Composite);
        assert!(f.pool.surface(composite).unwrap().memory().is_none());
        // composite 不占用设备内存
        assert_eq!(f.allocator.live_count(), 2);

        assert!(matches!(
            f.pool.allocate_composite(CompositeRefs::new(buf, &[], &[]), "bad"),
            Err(SurfaceError::WrongSurfaceKind { .. })
        ));
        assert_eq!(
            f.pool.allocate_composite(CompositeRefs::new(SurfaceIndex(7), &[], &[]), "bad"),
            Err(SurfaceError::NullResource(SurfaceIndex(7)))
        );
    }

    #[test]
    fn test_destroy_all_frees_memory() {
        let mut f = Fixture::new(small_settings());
        let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.increase_usage(a).unwrap();
        f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "b").unwrap();
        f.pool.destroy_all();
        assert_eq!(f.allocator.live_count(), 0);
        assert_eq!(f.pool.active_indices().count(), 0);
        assert_eq!(f.pool.stats().kind_counts, [0; SurfaceKind::COUNT]);
        assert!(f.pool.take_reclaimed().is_empty());
    }

    #[test]
    fn test_reclaimed_keeps_one_entry_per_slot() {
        let mut f = Fixture::new(small_settings());
        for _ in 0..16 {
            let a = f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
            f.pool.free(a, FreeMode::Immediate).unwrap();
        }
        let b = f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "b").unwrap();
        let c = f.pool.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(64), "c").unwrap();
        f.pool.free(c, FreeMode::Immediate).unwrap();
        f.pool.free(b, FreeMode::Immediate).unwrap();

        assert_eq!(f.pool.stats().reclaimed, 18);
        assert_eq!(f.pool.take_reclaimed(), vec![b, c]);
        assert!(f.pool.take_reclaimed().is_empty());
    }

    #[test]
    fn test_wait_stops_when_nothing_is_pending() {
        let mut f = Fixture::new(SurfacePoolSettings {
            wait: WaitPolicy {
                enabled: true,
                max_retries: u32::MAX,
                poll_interval_ms: 1000,
            },
            ..small_settings()
        });
        f.pool.allocate(SurfaceKind::Image2D, image(), "a").unwrap();
        f.pool.allocate(SurfaceKind::Image2D, image(), "b").unwrap();
        assert_eq!(
            f.pool.allocate(SurfaceKind::Image2D, image(), "c"),
            Err(SurfaceError::CapacityExceeded {
                kind: SurfaceKind::Image2D,
                max: 2
            })
        );
    }
}
