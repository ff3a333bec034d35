use crate::handles::{DescriptorHandle, SurfaceIndex};
use strata_gfx::descriptor::composite::CompositeEntry;

/// composite surface 的组成：当前帧 + 有序的前向 / 后向参考帧
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeRefs {
    pub current: SurfaceIndex,
    pub forward: Vec<SurfaceIndex>,
    pub backward: Vec<SurfaceIndex>,
}
impl CompositeRefs {
    pub fn new(current: SurfaceIndex, forward: &[SurfaceIndex], backward: &[SurfaceIndex]) -> Self {
        Self {
            current,
            forward: forward.to_vec(),
            backward: backward.to_vec(),
        }
    }
}

/// 参考帧的索引与分配 composite 时该槽位的代数
///
/// 槽位被回收后再分配给其他 surface 时代数改变，引用随之失效。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundRef {
    pub index: SurfaceIndex,
    pub generation: u32,
}

/// 保存在 composite 槽位中的参考帧
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundComposite {
    pub current: BoundRef,
    pub forward: Vec<BoundRef>,
    pub backward: Vec<BoundRef>,
}
impl BoundComposite {
    pub fn bind(refs: &CompositeRefs, generation_of: impl Fn(SurfaceIndex) -> u32) -> Self {
        let bind = |index: SurfaceIndex| BoundRef {
            index,
            generation: generation_of(index),
        };
        Self {
            current: bind(refs.current),
            forward: refs.forward.iter().copied().map(&bind).collect(),
            backward: refs.backward.iter().copied().map(&bind).collect(),
        }
    }
}

/// composite descriptor：每个位置一个子 descriptor 或显式的空值
pub type CompositeDescriptor = Vec<CompositeEntry<DescriptorHandle>>;
