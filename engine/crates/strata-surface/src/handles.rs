use slotmap::new_key_type;
use std::fmt::Display;

new_key_type! { pub struct DescriptorHandle; }

/// surface 在绑定表中的索引，也是 surface 的身份
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceIndex(pub u32);
impl SurfaceIndex {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}
impl Display for SurfaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
