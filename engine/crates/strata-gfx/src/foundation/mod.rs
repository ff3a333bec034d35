pub mod allocator;
pub mod device;
