use serde::Deserialize;
use strata_gfx::commands::fence::WaitPolicy;
use strata_gfx::resources::surface_desc::SurfaceKind;

/// surface 池配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SurfacePoolSettings {
    /// 绑定表的总槽位数
    pub table_size: u32,
    /// 表头保留给全局 surface 的槽位数，分配从这之后开始
    pub reserved_indices: u32,

    pub max_buffers: u32,
    pub max_images_2d: u32,
    pub max_images_3d: u32,
    pub max_images_2d_up: u32,
    pub max_composites: u32,

    /// composite 的前向参考上限
    pub max_forward_refs: u32,
    /// composite 的后向参考上限
    pub max_backward_refs: u32,

    /// 容量不足时的等待策略
    pub wait: WaitPolicy,
}
impl Default for SurfacePoolSettings {
    fn default() -> Self {
        Self {
            table_size: 4096,
            reserved_indices: 8,

            max_buffers: 1024,
            max_images_2d: 1024,
            max_images_3d: 64,
            max_images_2d_up: 256,
            max_composites: 256,

            max_forward_refs: 4,
            max_backward_refs: 4,

            wait: WaitPolicy::default(),
        }
    }
}
impl SurfacePoolSettings {
    /// 每种 surface 的最大数量（包含待销毁的）
    pub fn max_for(&self, kind: SurfaceKind) -> u32 {
        match kind {
            SurfaceKind::Buffer => self.max_buffers,
            SurfaceKind::Image2D => self.max_images_2d,
            SurfaceKind::Image3D => self.max_images_3d,
            SurfaceKind::Image2DUp => self.max_images_2d_up,
            SurfaceKind::Composite => self.max_composites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_toml() {
        let settings: SurfacePoolSettings = toml::from_str(
            r#"
            table_size = 64
            max_images_3d = 2

            [wait]
            enabled = true
            max_retries = 4
            "#,
        )
        .unwrap();
        assert_eq!(settings.table_size, 64);
        assert_eq!(settings.max_for(SurfaceKind::Image3D), 2);
        assert_eq!(settings.max_for(SurfaceKind::Buffer), 1024);
        assert!(settings.wait.enabled);
        assert_eq!(settings.wait.max_retries, 4);
    }
}
