use anyhow::Context;
use itertools::Itertools;
use serde::Deserialize;
use std::sync::Arc;
use strata_crate_tools::config::load_toml_or_default;
use strata_crate_tools::init_log::{init_log_with_level, parse_level};
use strata_crate_tools::resource::StrataPath;
use strata_gfx::commands::fence::TimelineFence;
use strata_gfx::descriptor::override_params::OverrideParams;
use strata_gfx::descriptor::surface_descriptor::Descriptor;
use strata_gfx::foundation::allocator::HostDeviceAllocator;
use strata_gfx::foundation::device::DeviceCaps;
use strata_gfx::resources::format::{ChromaSiting, Rotation, SurfaceFormat, TileMode, UsageContext};
use strata_gfx::resources::format_table::StandardFormatTable;
use strata_gfx::resources::surface_desc::{SurfaceKind, SurfaceMetadata};
use strata_surface::composite::CompositeRefs;
use strata_surface::handles::SurfaceIndex;
use strata_surface::pool_settings::SurfacePoolSettings;
use strata_surface::surface_manager::SurfaceManager;
use strata_surface::surface_pool::FreeMode;

/// `strata.toml` 的内容
#[derive(Debug, Deserialize)]
#[serde(default)]
struct StrataConfig {
    log_level: String,
    /// 模拟的帧数
    frames: u64,
    /// GPU 落后 CPU 的帧数
    frames_in_flight: u64,
    pool: SurfacePoolSettings,
    device: DeviceCaps,
}
impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 8,
            frames_in_flight: 2,
            pool: SurfacePoolSettings::default(),
            device: DeviceCaps::default(),
        }
    }
}

struct Demo {
    fence: Arc<TimelineFence>,
    allocator: Arc<HostDeviceAllocator>,
    manager: SurfaceManager,
}
// new & init
impl Demo {
    fn new(config: &StrataConfig) -> Self {
        let fence = Arc::new(TimelineFence::new(0, "gpu-timeline"));
        let allocator = Arc::new(HostDeviceAllocator::default());
        let manager = SurfaceManager::new(
            config.pool,
            config.device,
            Arc::new(StandardFormatTable),
            fence.clone(),
            allocator.clone(),
        );
        Self {
            fence,
            allocator,
            manager,
        }
    }
}
// tools
impl Demo {
    fn dump(label: &str, desc: &Descriptor) {
        log::info!(
            "{label}: {:?} {:?}, {} plane(s), fallbacks {:?}",
            desc.kind(),
            desc.context(),
            desc.plane_count(),
            desc.fallbacks()
        );
        for (plane, meta) in desc.plane_meta().iter().enumerate() {
            log::info!(
                "  plane {plane} {:?}: offset {} xy ({}, {}) {}x{} pitch {} format {:#x}",
                meta.plane_id,
                meta.offset,
                meta.x_offset,
                meta.y_offset,
                meta.width,
                meta.height,
                meta.pitch,
                meta.format_code
            );
            log::debug!("  {}", desc.record(plane).iter().map(|dw| format!("{dw:08x}")).join(" "));
        }
    }

    fn show(&mut self, label: &str, surface: SurfaceIndex, ctx: UsageContext, ovr: Option<&OverrideParams>) -> anyhow::Result<()> {
        let handle = self
            .manager
            .get_descriptor(surface, ctx, ovr)
            .with_context(|| format!("build {label} descriptor for surface {surface}"))?;
        if let Some(desc) = self.manager.descriptor(handle) {
            Self::dump(label, desc);
        }
        Ok(())
    }
}
// phases
impl Demo {
    /// 每种格式在所有 usage context 下各构建一次
    fn build_descriptors(&mut self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Demo::build_descriptors");

        let nv12 = self
            .manager
            .allocate(SurfaceKind::Image2D, SurfaceMetadata::image_2d(640, 480, SurfaceFormat::Nv12), "nv12")?;
        let p010 = self.manager.allocate(
            SurfaceKind::Image2D,
            SurfaceMetadata::image_2d(1920, 1080, SurfaceFormat::P010).with_tiling(TileMode::YMajor),
            "p010",
        )?;
        let buffer = self.manager.allocate(SurfaceKind::Buffer, SurfaceMetadata::buffer(4096), "buffer")?;

        for ctx in UsageContext::ALL {
            self.show("nv12", nv12, ctx, None)?;
            self.show("p010", p010, ctx, None)?;
        }
        self.show("buffer", buffer, UsageContext::RenderTarget, None)?;
        self.show("nv12 half", nv12, UsageContext::Sampler3D, Some(&OverrideParams::with_dims(320, 240)))?;

        self.manager.set_rotation(nv12, Rotation::Rotate90)?;
        self.manager.set_chroma_siting(nv12, ChromaSiting::HORZ_LEFT | ChromaSiting::VERT_CENTER)?;
        self.show("nv12 rotated", nv12, UsageContext::AdaptiveSampler, None)?;

        let composite = self.manager.allocate_composite(CompositeRefs::new(nv12, &[p010], &[]), "composite")?;
        let entries = self.manager.get_composite_descriptor(composite, None)?;
        log::info!(
            "composite {}: [{}]",
            composite,
            entries.iter().map(|entry| if entry.present().is_some() { "present" } else { "absent" }).join(", ")
        );

        for surface in [composite, buffer, p010, nv12] {
            self.manager.free(surface, FreeMode::Immediate)?;
        }
        Ok(())
    }

    /// 每帧分配一个 surface 并在提交后释放，GPU 落后若干帧
    fn simulate_frames(&mut self, frames: u64, frames_in_flight: u64) -> anyhow::Result<()> {
        let _span = tracy_client::span!("Demo::simulate_frames");

        let meta = SurfaceMetadata::image_2d(1280, 720, SurfaceFormat::Nv12);
        for frame in 1..=frames {
            let surface = self
                .manager
                .allocate(SurfaceKind::Image2D, meta, format!("frame-{frame}"))
                .with_context(|| format!("allocate surface for frame {frame}"))?;
            self.manager.get_descriptor(surface, UsageContext::RenderTarget, None)?;
            self.manager.track_gpu_use(surface, frame)?;
            let outcome = self.manager.free(surface, FreeMode::Immediate)?;

            self.fence.signal(frame.saturating_sub(frames_in_flight));
            let reclaimed = self.manager.refresh_deferred();
            log::info!(
                "frame {frame}: surface {surface} {outcome:?}, gpu at {}, reclaimed {reclaimed}, pending {}",
                self.fence.value(),
                self.manager.pool().deferred_list().len()
            );
        }

        self.fence.signal(frames);
        self.manager.refresh_deferred();
        Ok(())
    }

    fn report(&self) {
        let pool = self.manager.pool().stats();
        let cache = self.manager.cache().stats();
        log::info!(
            "pool: reclaimed {}, deferred {}, forced {}, pending {}",
            pool.reclaimed,
            pool.deferred,
            pool.forced,
            pool.pending_destroy
        );
        log::info!(
            "cache: hits {}, misses {}, builds {}, lazy clears {}, evictions {}",
            cache.hits,
            cache.misses,
            cache.builds,
            cache.lazy_clears,
            cache.evictions
        );
        log::info!("device memory: {} live allocations, {} bytes", self.allocator.live_count(), self.allocator.used_bytes());
    }
}

fn main() -> anyhow::Result<()> {
    #[cfg(feature = "profiling")]
    let _tracy = tracy_client::Client::start();

    let config: StrataConfig = load_toml_or_default(StrataPath::default_config_path())?;
    init_log_with_level(parse_level(&config.log_level));
    log::info!("strata demo: {} frames, {} in flight", config.frames, config.frames_in_flight);

    let mut demo = Demo::new(&config);
    demo.build_descriptors()?;
    demo.simulate_frames(config.frames, config.frames_in_flight)?;
    demo.report();

    demo.manager.destroy();
    Ok(())
}
