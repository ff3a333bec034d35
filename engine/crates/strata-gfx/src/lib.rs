//! Strata 的 GFX 层
//!
//! 负责把 surface 的元数据翻译为硬件可直接读取的二进制 surface state。
//! 本 crate 中的所有构建函数都是纯函数：相同的输入总是得到逐字节相同的输出。
//!
//! # 模块
//! - `basic`: dword 位域读写
//! - `commands`: GPU 完成计数器（timeline fence）
//! - `foundation`: 设备能力与设备内存分配器
//! - `resources`: 像素格式、格式布局表、surface 元数据、硬件记录编码
//! - `descriptor`: descriptor 构建（image / buffer / composite）

pub mod basic;
pub mod commands;
pub mod descriptor;
pub mod error;
pub mod foundation;
pub mod resources;
