use crate::handles::SurfaceIndex;
use crate::surface_pool::FreeMode;
use parking_lot::Mutex;
use strata_gfx::resources::surface_desc::SurfaceKind;

/// 等待 GPU 完成后才能回收的 surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDestroyEntry {
    pub index: SurfaceIndex,
    /// 入队时 surface 最后一次被 GPU 使用的 fence 值
    pub fence: u64,
    pub kind: SurfaceKind,
    pub mode: FreeMode,
}

/// 延迟销毁列表
///
/// 使用独立的锁保护，可以通过 `Arc` 在其他线程中查询。
/// 扫描只遍历列表本身，代价与待销毁数量成正比，与表大小无关。
#[derive(Default)]
pub struct DeferredDestroyList {
    entries: Mutex<Vec<PendingDestroyEntry>>,
}
// new & init
impl DeferredDestroyList {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl DeferredDestroyList {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn count_kind(&self, kind: SurfaceKind) -> usize {
        self.entries.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn contains(&self, index: SurfaceIndex) -> bool {
        self.entries.lock().iter().any(|e| e.index == index)
    }

    pub fn snapshot(&self) -> Vec<PendingDestroyEntry> {
        self.entries.lock().clone()
    }
}
// tools
impl DeferredDestroyList {
    pub fn push(&self, entry: PendingDestroyEntry) {
        self.entries.lock().push(entry);
    }

    pub fn remove(&self, index: SurfaceIndex) -> Option<PendingDestroyEntry> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|e| e.index == index)?;
        Some(entries.swap_remove(pos))
    }

    /// 取出 fence 已完成且已无 CPU 引用的条目
    pub fn drain_ready(
        &self,
        completed: u64,
        is_released: impl Fn(SurfaceIndex) -> bool,
    ) -> Vec<PendingDestroyEntry> {
        let mut ready = Vec::new();
        self.entries.lock().retain(|entry| {
            if entry.fence <= completed && is_released(entry.index) {
                ready.push(*entry);
                false
            } else {
                true
            }
        });
        ready
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, fence: u64) -> PendingDestroyEntry {
        PendingDestroyEntry {
            index: SurfaceIndex(index),
            fence,
            kind: SurfaceKind::Image2D,
            mode: FreeMode::Immediate,
        }
    }

    #[test]
    fn test_drain_ready_respects_fence_and_refcount() {
        let list = DeferredDestroyList::new();
        list.push(entry(10, 1));
        list.push(entry(11, 5));
        list.push(entry(12, 2));

        let ready = list.drain_ready(2, |index| index != SurfaceIndex(12));
        assert_eq!(ready, vec![entry(10, 1)]);
        assert_eq!(list.len(), 2);

        let ready = list.drain_ready(5, |_| true);
        assert_eq!(ready.len(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_and_count() {
        let list = DeferredDestroyList::new();
        list.push(entry(10, 1));
        list.push(PendingDestroyEntry {
            kind: SurfaceKind::Buffer,
            ..entry(11, 1)
        });
        assert_eq!(list.count_kind(SurfaceKind::Image2D), 1);
        assert!(list.contains(SurfaceIndex(11)));
        assert_eq!(list.remove(SurfaceIndex(11)).map(|e| e.kind), Some(SurfaceKind::Buffer));
        assert_eq!(list.remove(SurfaceIndex(11)), None);
        assert_eq!(list.snapshot(), vec![entry(10, 1)]);
    }
}
