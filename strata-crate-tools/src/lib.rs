//! Strata 工具集
//!
//! 提供日志初始化、工作区路径管理、TOML 配置加载等通用工具。
//!
//! # StrataPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # 配置加载
//! `load_toml` 将任意实现了 `Deserialize` 的配置结构从 TOML 文件中读出。

pub mod config;
pub mod init_log;
pub mod resource;
