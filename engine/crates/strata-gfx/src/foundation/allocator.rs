use parking_lot::Mutex;
use std::collections::HashMap;

/// 设备内存分配结果
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceMemory {
    id: u64,
    size: u64,
}
// getters
impl DeviceMemory {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceAllocError {
    #[error("out of device memory: requested {requested} bytes, {available} bytes available")]
    OutOfMemory { requested: u64, available: u64 },
    #[error("allocation {0} is not live")]
    UnknownAllocation(u64),
}

/// 设备内存分配器
///
/// surface 池只通过这个 trait 申请和归还设备内存。
pub trait DeviceAllocator: Send + Sync {
    fn allocate(&self, size: u64, debug_name: &str) -> Result<DeviceMemory, DeviceAllocError>;

    fn free(&self, memory: DeviceMemory) -> Result<(), DeviceAllocError>;
}

struct HostAllocState {
    next_id: u64,
    used: u64,
    live: HashMap<u64, u64>,
}

/// 在主机侧记账的分配器，不真正申请显存
///
/// 用于测试和演示程序：可以查询存活分配数与已用字节数。
pub struct HostDeviceAllocator {
    budget: u64,
    state: Mutex<HostAllocState>,
}
// new & init
impl HostDeviceAllocator {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            state: Mutex::new(HostAllocState {
                next_id: 1,
                used: 0,
                live: HashMap::new(),
            }),
        }
    }
}
impl Default for HostDeviceAllocator {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}
// getters
impl HostDeviceAllocator {
    #[inline]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    #[inline]
    pub fn used_bytes(&self) -> u64 {
        self.state.lock().used
    }
}
impl DeviceAllocator for HostDeviceAllocator {
    fn allocate(&self, size: u64, debug_name: &str) -> Result<DeviceMemory, DeviceAllocError> {
        let mut state = self.state.lock();
        let available = self.budget - state.used;
        if size > available {
            return Err(DeviceAllocError::OutOfMemory {
                requested: size,
                available,
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.used += size;
        state.live.insert(id, size);
        log::debug!("allocate device memory #{} ({} bytes) for {}", id, size, debug_name);

        Ok(DeviceMemory { id, size })
    }

    fn free(&self, memory: DeviceMemory) -> Result<(), DeviceAllocError> {
        let mut state = self.state.lock();
        let size = state.live.remove(&memory.id).ok_or(DeviceAllocError::UnknownAllocation(memory.id))?;
        state.used -= size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_allocator_accounting() {
        let allocator = HostDeviceAllocator::new(1024);
        let a = allocator.allocate(512, "a").unwrap();
        let b = allocator.allocate(256, "b").unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(allocator.live_count(), 2);
        assert_eq!(allocator.used_bytes(), 768);

        assert_eq!(
            allocator.allocate(512, "c"),
            Err(DeviceAllocError::OutOfMemory {
                requested: 512,
                available: 256
            })
        );

        allocator.free(a).unwrap();
        assert_eq!(allocator.used_bytes(), 256);
        assert_eq!(allocator.free(a), Err(DeviceAllocError::UnknownAllocation(a.id())));
    }
}
