use crate::handles::SurfaceIndex;
use strata_gfx::error::DescriptorError;
use strata_gfx::foundation::allocator::DeviceAllocError;
use strata_gfx::resources::surface_desc::SurfaceKind;

/// surface 池与 descriptor 缓存的错误
///
/// 误用在修改任何状态之前检测并返回。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("{kind:?} capacity exceeded (max {max})")]
    CapacityExceeded { kind: SurfaceKind, max: u32 },
    #[error("{kind:?} capacity exhausted while {pending} surfaces wait for the GPU")]
    StillBusy { kind: SurfaceKind, pending: usize },
    #[error("invalid surface dimensions: {0}")]
    InvalidDimensions(String),
    #[error("surface index {0} is out of range")]
    InvalidIndex(SurfaceIndex),
    #[error("surface index {0} is reserved")]
    ReservedIndex(SurfaceIndex),
    #[error("surface {0} freed or released twice")]
    DoubleFree(SurfaceIndex),
    #[error("surface {0} has been destroyed")]
    UseAfterFree(SurfaceIndex),
    #[error("surface {0} referenced by a composite is not active")]
    NullResource(SurfaceIndex),
    #[error("surface {index} is {actual:?}, expected {expected}")]
    WrongSurfaceKind {
        index: SurfaceIndex,
        actual: SurfaceKind,
        expected: &'static str,
    },
    #[error(transparent)]
    Descriptor(DescriptorError),
    #[error(transparent)]
    DeviceAllocation(#[from] DeviceAllocError),
}
impl From<DescriptorError> for SurfaceError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::InvalidDimensions(reason) => Self::InvalidDimensions(reason),
            other => Self::Descriptor(other),
        }
    }
}
