/// composite 中某个位置引用的 surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeSlot {
    Current,
    Forward(usize),
    Backward(usize),
    /// 超出前向或后向参考数量的位置
    Absent,
}

/// composite descriptor 中的一项
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeEntry<H> {
    Present(H),
    /// 该位置没有有效的参考帧，硬件需要显式的空值
    Absent,
}
impl<H: Copy> CompositeEntry<H> {
    #[inline]
    pub fn present(&self) -> Option<H> {
        match self {
            Self::Present(h) => Some(*h),
            Self::Absent => None,
        }
    }
}

/// composite 的位置排布
///
/// 共 `2 * max(forward, backward) + 1` 个位置：
/// 位置 0 为当前帧，奇数位置依次为前向参考，偶数位置依次为后向参考。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeLayout {
    forward_count: usize,
    backward_count: usize,
}
// new & init
impl CompositeLayout {
    /// 参考数量分别被截断到 `max_forward` / `max_backward`
    pub fn new(forward_count: usize, backward_count: usize, max_forward: usize, max_backward: usize) -> Self {
        if forward_count > max_forward || backward_count > max_backward {
            log::warn!(
                "composite references ({}, {}) capped to ({}, {})",
                forward_count,
                backward_count,
                max_forward,
                max_backward
            );
        }
        Self {
            forward_count: forward_count.min(max_forward),
            backward_count: backward_count.min(max_backward),
        }
    }
}
// getters
impl CompositeLayout {
    #[inline]
    pub fn forward_count(&self) -> usize {
        self.forward_count
    }

    #[inline]
    pub fn backward_count(&self) -> usize {
        self.backward_count
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        2 * self.forward_count.max(self.backward_count) + 1
    }
}
// tools
impl CompositeLayout {
    pub fn slot(&self, position: usize) -> CompositeSlot {
        if position == 0 {
            return CompositeSlot::Current;
        }
        let pair = (position - 1) / 2;
        if position % 2 == 1 {
            if pair < self.forward_count { CompositeSlot::Forward(pair) } else { CompositeSlot::Absent }
        } else if pair < self.backward_count {
            CompositeSlot::Backward(pair)
        } else {
            CompositeSlot::Absent
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = CompositeSlot> + '_ {
        (0..self.entry_count()).map(|position| self.slot(position))
    }
}
