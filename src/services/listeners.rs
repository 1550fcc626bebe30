//! 显式的订阅 / 取消订阅回调注册表
//!
//! 回调在发布方的串行化点上同步执行，回调内部不得再调用发布方的方法。

use tracing::debug;

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

pub struct Listeners<T> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            callbacks: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        debug!(subscription = id.0, "Listener subscribed");
        id
    }

    /// 取消订阅，句柄不存在时返回 false
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        let removed = self.callbacks.len() != before;
        if removed {
            debug!(subscription = id.0, "Listener unsubscribed");
        }
        removed
    }

    /// 按订阅顺序依次通知
    pub fn notify(&self, value: &T) {
        for (_, callback) in &self.callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}
