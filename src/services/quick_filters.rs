//! 快捷过滤器（最近提交的搜索文本）
//!
//! 特性：
//! - 自动去重（相同文本只保留最新）
//! - 最新的在前
//! - 超过 `max_size` 时删除最旧的

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickFilters {
    tokens: VecDeque<String>,
    max_size: usize,
}

impl QuickFilters {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            tokens: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// 记录一次提交的搜索文本，空白文本被忽略
    pub fn add(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        self.tokens.retain(|existing| existing != text);
        self.tokens.push_front(text.to_string());
        self.tokens.truncate(self.max_size);
        true
    }

    pub fn remove(&mut self, text: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|existing| existing != text);
        self.tokens.len() != before
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

impl Default for QuickFilters {
    fn default() -> Self {
        Self::new(10)
    }
}
