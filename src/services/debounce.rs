//! 文本输入防抖
//!
//! 每次调用 `wait` 都会取消上一次尚未结束的等待（基于 tokio-util 的 CancellationToken），
//! 只有在延迟期间没有新输入的那次调用返回 true。

use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    current: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 等待防抖延迟，被后续调用取代时返回 false
    pub async fn wait(&self) -> bool {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }

        if self.delay.is_zero() {
            return !token.is_cancelled();
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!("Debounced edit superseded");
                false
            }
            _ = tokio::time::sleep(self.delay) => !token.is_cancelled(),
        }
    }

    /// 取消正在等待的调用
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_edit_fires() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(200)));

        let first = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.wait().await }
        });

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_wait() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(200)));
        let pending = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.wait().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        debouncer.cancel();
        assert!(!pending.await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_delay_fires_immediately() {
        let debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.wait().await);
    }
}
