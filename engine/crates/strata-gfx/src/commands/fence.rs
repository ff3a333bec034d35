use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Poll;
use std::time::Duration;

/// GPU 完成计数器
///
/// 单调递增，表示 GPU 已经执行完毕的最大 fence 值。
/// 本系统只读取；推进由外部（提交队列）负责。
pub trait CompletionCounter: Send + Sync {
    fn read(&self) -> u64;
}

/// 内存中的 timeline fence，行为类似 timeline semaphore
///
/// 由提交侧调用 `signal` 推进，数值只增不减。
pub struct TimelineFence {
    value: AtomicU64,
    name: String,
}
// new & init
impl TimelineFence {
    pub fn new(initial_value: u64, debug_name: impl AsRef<str>) -> Self {
        Self {
            value: AtomicU64::new(initial_value),
            name: debug_name.as_ref().to_string(),
        }
    }
}
// getters
impl TimelineFence {
    #[inline]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
// tools
impl TimelineFence {
    /// 推进到 `value`；小于当前值时忽略
    #[inline]
    pub fn signal(&self, value: u64) {
        let prev = self.value.fetch_max(value, Ordering::AcqRel);
        if value < prev {
            log::debug!("fence {} ignores backwards signal {} < {}", self.name, value, prev);
        }
    }
}
impl CompletionCounter for TimelineFence {
    #[inline]
    fn read(&self) -> u64 {
        self.value()
    }
}

/// 资源紧张时的等待策略：有界轮询
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    /// 为 false 时容量不足立刻返回错误
    pub enabled: bool,
    pub max_retries: u32,
    pub poll_interval_ms: u64,
}
impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 8,
            poll_interval_ms: 1,
        }
    }
}
impl WaitPolicy {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 反复调用 `attempt` 直到它返回 `Poll::Ready`
    ///
    /// 第一次调用不等待，之后每次间隔 `poll_interval`；策略关闭时只调用一次。
    ///
    /// # return
    /// `Ready` 携带的值，重试次数用完时为 None
    pub fn poll<T>(&self, mut attempt: impl FnMut() -> Poll<Option<T>>) -> Option<T> {
        let _span = tracy_client::span!("WaitPolicy::poll");
        let retries = if self.enabled { self.max_retries } else { 0 };
        for retry in 0..=retries {
            if retry > 0 {
                std::thread::sleep(self.poll_interval());
            }
            if let Poll::Ready(result) = attempt() {
                return result;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_signal_is_monotonic() {
        let fence = TimelineFence::new(0, "test");
        fence.signal(5);
        fence.signal(3);
        assert_eq!(fence.read(), 5);
        assert_eq!(fence.name(), "test");
    }

    #[test]
    fn test_poll_disabled_tries_once() {
        let policy = WaitPolicy::default();
        let mut calls = 0;
        let result: Option<u32> = policy.poll(|| {
            calls += 1;
            Poll::Pending
        });
        assert_eq!(result, None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_poll_stops_on_ready() {
        let policy = WaitPolicy {
            enabled: true,
            max_retries: 3,
            poll_interval_ms: 0,
        };
        let mut calls = 0;
        let pending: Option<u32> = policy.poll(|| {
            calls += 1;
            Poll::Pending
        });
        assert_eq!(pending, None);
        assert_eq!(calls, 4);

        calls = 0;
        let given_up: Option<u32> = policy.poll(|| {
            calls += 1;
            Poll::Ready(None)
        });
        assert_eq!(given_up, None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_poll_fence_signaled_from_other_thread() {
        let fence = Arc::new(TimelineFence::new(0, "test"));
        let signaler = {
            let fence = fence.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                fence.signal(10);
            })
        };
        let policy = WaitPolicy {
            enabled: true,
            max_retries: 2000,
            poll_interval_ms: 1,
        };
        let value = policy.poll(|| {
            let value = fence.read();
            if value >= 10 { Poll::Ready(Some(value)) } else { Poll::Pending }
        });
        assert_eq!(value, Some(10));
        signaler.join().unwrap();
    }

    #[test]
    fn test_wait_policy_from_toml() {
        let policy: WaitPolicy = toml::from_str("enabled = true\nmax_retries = 3").unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.poll_interval_ms, 1);
    }
}
