//! 搜索条件数据结构
//!
//! `Criteria` 是一个纯值类型，由若干互相独立的子条件组成：
//! - 共享条件：会话、时间范围、文本搜索、置顶
//! - 仅日志：日志级别、标签
//! - 仅网络：主机、网络属性、响应属性
//!
//! 每个子条件都带有 `is_enabled` 开关和默认（无过滤效果）状态。
//! 被禁用的子条件永远不会影响谓词结果。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::record::{LogLevel, RecordKind, ResponseSource, SessionId, TaskType};

/// 控制台模式 - 决定谓词作用于哪类记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMode {
    /// 同时显示日志消息和网络任务
    #[default]
    All,
    /// 仅显示日志消息
    Logs,
    /// 仅显示网络任务
    Network,
}

impl ConsoleMode {
    pub fn title(&self) -> &'static str {
        match self {
            ConsoleMode::All => "Console",
            ConsoleMode::Logs => "Logs",
            ConsoleMode::Network => "Network",
        }
    }

    /// 该模式是否包含指定类型的记录
    pub fn includes(&self, kind: RecordKind) -> bool {
        match self {
            ConsoleMode::All => true,
            ConsoleMode::Logs => kind == RecordKind::Message,
            ConsoleMode::Network => kind == RecordKind::Task,
        }
    }
}

/// 完整的搜索条件
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    pub sessions: Sessions,
    pub dates: Dates,
    pub text: TextSearch,
    pub log_levels: LogLevels,
    pub labels: Labels,
    pub host: Host,
    pub networking: Networking,
    pub response: Response,
    pub pins: Pins,
}

impl Criteria {
    /// 仅包含指定会话的默认条件
    pub fn for_session(session: SessionId) -> Self {
        let mut criteria = Self::default();
        criteria.sessions.selection.insert(session);
        criteria
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// 当前实际参与过滤的子条件数量
    pub fn active_filter_count(&self) -> usize {
        [
            self.sessions.has_effect(),
            self.dates.has_effect(),
            self.text.has_effect(),
            self.log_levels.has_effect(),
            self.labels.has_effect(),
            self.host.has_effect(),
            self.networking.has_effect(),
            self.response.has_effect(),
            self.pins.has_effect(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }
}

/// 会话过滤：空集合表示不限会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sessions {
    pub is_enabled: bool,
    pub selection: BTreeSet<SessionId>,
}

impl Default for Sessions {
    fn default() -> Self {
        Self {
            is_enabled: true,
            selection: BTreeSet::new(),
        }
    }
}

impl Sessions {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && !self.selection.is_empty()
    }
}

/// 时间范围预设，在谓词求值时才解析为具体区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePreset {
    /// 最近一段时间（窗口长度可配置，默认 10 分钟）
    Recent,
    /// 当天（本地时间零点到当前时刻）
    Today,
}

/// 时间范围过滤
///
/// 设置了 `preset` 时以预设为准，`start`/`end` 被忽略。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dates {
    pub is_enabled: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub preset: Option<DatePreset>,
}

impl Default for Dates {
    fn default() -> Self {
        Self {
            is_enabled: true,
            start: None,
            end: None,
            preset: None,
        }
    }
}

impl Dates {
    pub fn recent() -> Self {
        Self {
            preset: Some(DatePreset::Recent),
            ..Self::default()
        }
    }

    pub fn today() -> Self {
        Self {
            preset: Some(DatePreset::Today),
            ..Self::default()
        }
    }

    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// 设置开始时间，同时清除预设
    pub fn set_start(&mut self, start: Option<DateTime<Utc>>) {
        self.preset = None;
        self.start = start;
    }

    /// 设置结束时间，同时清除预设
    pub fn set_end(&mut self, end: Option<DateTime<Utc>>) {
        self.preset = None;
        self.end = end;
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && (self.preset.is_some() || self.start.is_some() || self.end.is_some())
    }
}

/// 日志级别过滤：默认包含全部级别
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLevels {
    pub is_enabled: bool,
    pub levels: BTreeSet<LogLevel>,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            is_enabled: true,
            levels: LogLevel::ALL.into_iter().collect(),
        }
    }
}

impl LogLevels {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && self.levels.len() != LogLevel::ALL.len()
    }
}

/// 标签过滤
///
/// `focused` 优先于 `hidden`：设置了焦点标签时只显示该标签，隐藏列表被忽略。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub is_enabled: bool,
    pub focused: Option<String>,
    pub hidden: BTreeSet<String>,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            is_enabled: true,
            focused: None,
            hidden: BTreeSet::new(),
        }
    }
}

impl Labels {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && (self.focused.is_some() || !self.hidden.is_empty())
    }
}

/// 搜索类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Text,
    Regex,
}

/// 大小写敏感性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    Sensitive,
    #[default]
    Insensitive,
}

/// 匹配规则（仅对 `SearchKind::Text` 有意义）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchingRule {
    #[default]
    Contains,
    BeginsWith,
    EndsWith,
    Equals,
}

/// 文本搜索选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextSearchOptions {
    pub kind: SearchKind,
    pub case_sensitivity: CaseSensitivity,
    pub rule: MatchingRule,
}

/// 文本搜索：空模式不过滤任何记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    pub is_enabled: bool,
    pub pattern: String,
    pub options: TextSearchOptions,
}

impl Default for TextSearch {
    fn default() -> Self {
        Self {
            is_enabled: true,
            pattern: String::new(),
            options: TextSearchOptions::default(),
        }
    }
}

impl TextSearch {
    pub fn new(pattern: impl Into<String>, options: TextSearchOptions) -> Self {
        Self {
            is_enabled: true,
            pattern: pattern.into(),
            options,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && !self.pattern.is_empty()
    }
}

/// 主机过滤：空集合表示全部主机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub is_enabled: bool,
    pub values: BTreeSet<String>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            is_enabled: true,
            values: BTreeSet::new(),
        }
    }
}

impl Host {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && !self.values.is_empty()
    }

    /// 切换某个主机的选中状态，返回切换后是否选中
    pub fn toggle(&mut self, host: &str) -> bool {
        if self.values.remove(host) {
            false
        } else {
            self.values.insert(host.to_string());
            true
        }
    }
}

/// 网络属性过滤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Networking {
    pub is_enabled: bool,
    pub task_type: Option<TaskType>,
    pub source: Option<ResponseSource>,
    pub is_redirect: Option<bool>,
}

impl Default for Networking {
    fn default() -> Self {
        Self {
            is_enabled: true,
            task_type: None,
            source: None,
            is_redirect: None,
        }
    }
}

impl Networking {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled
            && (self.task_type.is_some() || self.source.is_some() || self.is_redirect.is_some())
    }
}

/// 闭区间范围，任一端为空表示不限
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for ValueRange<T> {
    fn default() -> Self {
        Self { min: None, max: None }
    }
}

impl<T: PartialOrd + Copy> ValueRange<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// 响应属性过滤（状态码、耗时、响应体大小）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub is_enabled: bool,
    pub status_code: ValueRange<u16>,
    /// 耗时范围（秒）
    pub duration: ValueRange<f64>,
    /// 响应体大小范围（字节）
    pub response_size: ValueRange<u64>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            is_enabled: true,
            status_code: ValueRange::default(),
            duration: ValueRange::default(),
            response_size: ValueRange::default(),
        }
    }
}

impl Response {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled
            && !(self.status_code.is_unbounded()
                && self.duration.is_unbounded()
                && self.response_size.is_unbounded())
    }
}

/// 置顶过滤：打开 `only_pinned` 后只显示置顶的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    pub is_enabled: bool,
    pub only_pinned: bool,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            is_enabled: true,
            only_pinned: false,
        }
    }
}

impl Pins {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_effect(&self) -> bool {
        self.is_enabled && self.only_pinned
    }
}
