use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = StrataPath::config_path("strata.toml"); // <workspace>/strata.toml
/// ```
pub struct StrataPath {}
// 核心路径
impl StrataPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // strata-crate-tools 直接位于工作区根目录下
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| manifest_dir.to_path_buf())
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl StrataPath {
    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }

    /// 获取工作区根目录下的配置文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }

    /// 默认配置文件 `strata.toml`
    pub fn default_config_path() -> PathBuf {
        Self::config_path("strata.toml")
    }
}
