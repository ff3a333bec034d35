//! Surface 资源池与 descriptor 缓存
//!
//! - `SurfacePool`: 定长的 surface 槽位表，按 GPU 完成计数器延迟回收
//! - `DescriptorCache`: 按 (surface, usage context, override) 缓存构建好的 descriptor
//! - `SurfaceManager`: 对外的门面，元数据修改时只失效受影响的缓存分区
//!
//! # 使用示例
//! ```ignore
//! let mut manager = SurfaceManager::new(settings, caps, table, fence.clone(), allocator);
//! let surface = manager.allocate(SurfaceKind::Image2D, SurfaceMetadata::image_2d(640, 480, SurfaceFormat::Nv12), "frame")?;
//! let handle = manager.get_descriptor(surface, UsageContext::RenderTarget, None)?;
//! let bytes = manager.descriptor(handle).unwrap().bytes();
//! ```

pub mod composite;
pub mod deferred_destroy;
pub mod descriptor_cache;
pub mod errors;
pub mod handles;
pub mod pool_settings;
pub mod surface_manager;
pub mod surface_pool;
