use crate::resources::format::SurfaceFormat;

/// alias descriptor 的覆盖参数，None 表示使用 surface 自身的值
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverrideParams {
    pub format: Option<SurfaceFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    pub pitch: Option<u32>,
    pub x_offset: Option<u32>,
    pub y_offset: Option<u32>,
    pub memory_object_control: Option<u32>,
}
// new & init
impl OverrideParams {
    /// 只覆盖宽高，composite 的逐次尺寸覆盖使用
    pub fn with_dims(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }
}
// tools
impl OverrideParams {
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 按字段顺序组合的哈希
    ///
    /// 字段顺序参与计算，两个字段的值互换会得到不同的结果；
    /// 每个字段带有存在位，`None` 与 `Some(0)` 不同。
    pub fn param_hash(&self) -> u64 {
        let fields = [
            self.format.map(|f| f as u64),
            self.width.map(u64::from),
            self.height.map(u64::from),
            self.depth.map(u64::from),
            self.pitch.map(u64::from),
            self.x_offset.map(u64::from),
            self.y_offset.map(u64::from),
            self.memory_object_control.map(u64::from),
        ];
        fields.iter().fold(0u64, |seed, field| {
            let value = match field {
                Some(v) => (v << 1) | 1,
                None => 0,
            };
            Self::hash_combine(seed, value)
        })
    }

    #[inline]
    fn hash_combine(seed: u64, value: u64) -> u64 {
        seed ^ value.wrapping_add(0x9e37_79b9_7f4a_7c15).wrapping_add(seed << 6).wrapping_add(seed >> 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = OverrideParams {
            width: Some(64),
            height: Some(32),
            ..Default::default()
        };
        let b = OverrideParams {
            width: Some(32),
            height: Some(64),
            ..Default::default()
        };
        assert_ne!(a.param_hash(), b.param_hash());
        assert_eq!(a.param_hash(), a.param_hash());
    }

    #[test]
    fn test_hash_distinguishes_none_and_zero() {
        let none = OverrideParams::default();
        let zero = OverrideParams {
            x_offset: Some(0),
            ..Default::default()
        };
        assert!(none.is_empty());
        assert!(!zero.is_empty());
        assert_ne!(none.param_hash(), zero.param_hash());
    }
}
