//! # 文本匹配器
//!
//! 对单个文本搜索配置（类型、大小写敏感性、匹配规则）求值：
//! - **Text**: 按规则做子串比较（包含 / 前缀 / 后缀 / 相等）
//! - **Regex**: 编译后的正则，按 (模式, 大小写敏感性) 缓存
//!
//! 非法正则不会向调用方报错，而是视为"不匹配"。失败的编译结果同样被缓存，
//! 因此同一个非法模式不会被反复编译。
//!
//! 缓存使用 `lru::LruCache`，容量有上限，最久未使用的条目被淘汰。

use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::criteria::{CaseSensitivity, MatchingRule, SearchKind, TextSearchOptions};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternKey {
    pattern: String,
    case_sensitivity: CaseSensitivity,
}

/// 缓存条目：编译成功的正则或编译错误信息
type CachedPattern = std::result::Result<Arc<Regex>, Arc<str>>;

/// 已编译的文本搜索配置，可以对大量候选字符串重复求值
#[derive(Debug, Clone)]
pub enum CompiledText {
    /// 普通文本匹配，`needle` 在大小写不敏感时已转为小写
    Text {
        needle: String,
        rule: MatchingRule,
        case_sensitivity: CaseSensitivity,
    },
    Regex(Arc<Regex>),
    /// 非法正则，永远不匹配
    Invalid { error: Arc<str> },
}

impl CompiledText {
    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            CompiledText::Text {
                needle,
                rule,
                case_sensitivity: CaseSensitivity::Sensitive,
            } => apply_rule(*rule, candidate, needle),
            CompiledText::Text {
                needle,
                rule,
                case_sensitivity: CaseSensitivity::Insensitive,
            } => {
                if needle.is_ascii() && candidate.is_ascii() {
                    apply_rule_ascii_insensitive(*rule, candidate.as_bytes(), needle.as_bytes())
                } else {
                    apply_rule(*rule, &candidate.to_lowercase(), needle)
                }
            }
            CompiledText::Regex(regex) => regex.is_match(candidate),
            CompiledText::Invalid { .. } => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, CompiledText::Invalid { .. })
    }
}

fn apply_rule(rule: MatchingRule, candidate: &str, needle: &str) -> bool {
    match rule {
        MatchingRule::Contains => candidate.contains(needle),
        MatchingRule::BeginsWith => candidate.starts_with(needle),
        MatchingRule::EndsWith => candidate.ends_with(needle),
        MatchingRule::Equals => candidate == needle,
    }
}

// 两侧都是 ASCII 时避免为候选字符串分配小写副本
fn apply_rule_ascii_insensitive(rule: MatchingRule, candidate: &[u8], needle: &[u8]) -> bool {
    if needle.len() > candidate.len() {
        return false;
    }
    match rule {
        MatchingRule::Contains => {
            needle.is_empty()
                || candidate
                    .windows(needle.len())
                    .any(|window| window.eq_ignore_ascii_case(needle))
        }
        MatchingRule::BeginsWith => candidate[..needle.len()].eq_ignore_ascii_case(needle),
        MatchingRule::EndsWith => {
            candidate[candidate.len() - needle.len()..].eq_ignore_ascii_case(needle)
        }
        MatchingRule::Equals => candidate.eq_ignore_ascii_case(needle),
    }
}

/// 匹配器统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatcherStats {
    /// 正则编译次数（包括失败的编译）
    pub compilations: u64,
    /// 缓存命中次数
    pub cache_hits: u64,
    /// 当前缓存条目数
    pub cached_patterns: usize,
}

/**
 * 文本匹配器
 *
 * 线程安全，通常以 `Arc<TextMatcher>` 的形式在谓词编译器和会话之间共享。
 */
pub struct TextMatcher {
    cache: Mutex<LruCache<PatternKey, CachedPattern>>,
    compilations: AtomicU64,
    cache_hits: AtomicU64,
}

impl TextMatcher {
    /**
     * 创建新的匹配器
     *
     * # 参数
     * * `capacity` - 正则缓存容量（为 0 时按 1 处理）
     */
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            compilations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// 编译一个文本搜索配置
    pub fn compile(&self, pattern: &str, options: TextSearchOptions) -> CompiledText {
        match options.kind {
            SearchKind::Text => CompiledText::Text {
                needle: match options.case_sensitivity {
                    CaseSensitivity::Sensitive => pattern.to_string(),
                    CaseSensitivity::Insensitive => pattern.to_lowercase(),
                },
                rule: options.rule,
                case_sensitivity: options.case_sensitivity,
            },
            // 正则模式下匹配规则被忽略
            SearchKind::Regex => match self.regex(pattern, options.case_sensitivity) {
                Ok(regex) => CompiledText::Regex(regex),
                Err(error) => CompiledText::Invalid { error },
            },
        }
    }

    /**
     * 单次匹配
     *
     * 非法正则返回 `false`，不会报错。
     */
    pub fn is_match(&self, pattern: &str, candidate: &str, options: TextSearchOptions) -> bool {
        self.compile(pattern, options).is_match(candidate)
    }

    /**
     * 校验模式是否合法（用于在界面上提示用户）
     *
     * # 返回
     * * `Ok(())` - 合法（普通文本总是合法）
     * * `Err(AppError::Pattern)` - 非法正则
     */
    pub fn validate_pattern(&self, pattern: &str, options: TextSearchOptions) -> Result<()> {
        match self.compile(pattern, options) {
            CompiledText::Invalid { error } => Err(AppError::pattern_error(error.to_string())),
            _ => Ok(()),
        }
    }

    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            compilations: self.compilations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cached_patterns: self.cache.lock().len(),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
        debug!("Text matcher cache cleared");
    }

    fn regex(&self, pattern: &str, case_sensitivity: CaseSensitivity) -> CachedPattern {
        let key = PatternKey {
            pattern: pattern.to_string(),
            case_sensitivity,
        };

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }

        self.compilations.fetch_add(1, Ordering::Relaxed);
        let compiled: CachedPattern = RegexBuilder::new(pattern)
            .case_insensitive(case_sensitivity == CaseSensitivity::Insensitive)
            .build()
            .map(Arc::new)
            .map_err(|e| {
                warn!(pattern, error = %e, "Invalid regex pattern, treating as non-matching");
                Arc::from(e.to_string())
            });

        cache.put(key, compiled.clone());
        compiled
    }
}

impl Default for TextMatcher {
    fn default() -> Self {
        Self::new(64)
    }
}
