//! 记录数据结构
//!
//! 存储中的记录分为两类：普通日志消息和网络任务。两者共享标识、创建时间和会话 ID，
//! 使用带标签的枚举表示，由谓词编译器显式地按类型分派。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 记录 ID（由存储分配，单调递增）
pub type RecordId = u64;

/// 会话 ID - 被检查应用的一次连续运行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 日志级别，按严重程度排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 网络任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    DataTask,
    DownloadTask,
    UploadTask,
    StreamTask,
    WebSocketTask,
}

/// 响应来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// 日志消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub session: SessionId,
    pub level: LogLevel,
    pub label: String,
    pub text: String,
    /// 用户置顶标记
    #[serde(default)]
    pub is_pinned: bool,
}

/// 网络任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTask {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub session: SessionId,
    pub url: Option<String>,
    pub host: Option<String>,
    pub http_method: Option<String>,
    pub status_code: Option<u16>,
    pub task_type: TaskType,
    pub response_source: ResponseSource,
    pub is_redirect: bool,
    /// 请求耗时（秒）
    pub duration: Option<f64>,
    pub request_body_size: u64,
    pub response_body_size: u64,
    #[serde(default)]
    pub is_pinned: bool,
}

/// 存储中的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Record {
    Message(LogMessage),
    Task(NetworkTask),
}

/// 记录类型（不含数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Message,
    Task,
}

impl Record {
    pub fn id(&self) -> RecordId {
        match self {
            Record::Message(m) => m.id,
            Record::Task(t) => t.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Message(m) => m.created_at,
            Record::Task(t) => t.created_at,
        }
    }

    pub fn session(&self) -> SessionId {
        match self {
            Record::Message(m) => m.session,
            Record::Task(t) => t.session,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Message(_) => RecordKind::Message,
            Record::Task(_) => RecordKind::Task,
        }
    }

    pub fn is_pinned(&self) -> bool {
        match self {
            Record::Message(m) => m.is_pinned,
            Record::Task(t) => t.is_pinned,
        }
    }

    pub(crate) fn set_pinned(&mut self, pinned: bool) {
        match self {
            Record::Message(m) => m.is_pinned = pinned,
            Record::Task(t) => t.is_pinned = pinned,
        }
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        match self {
            Record::Message(m) => m.id = id,
            Record::Task(t) => t.id = id,
        }
    }
}

impl From<LogMessage> for Record {
    fn from(message: LogMessage) -> Self {
        Record::Message(message)
    }
}

impl From<NetworkTask> for Record {
    fn from(task: NetworkTask) -> Self {
        Record::Task(task)
    }
}

impl LogMessage {
    /// 创建一条待写入存储的消息（ID 由存储分配）
    pub fn new(
        session: SessionId,
        level: LogLevel,
        label: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            session,
            level,
            label: label.into(),
            text: text.into(),
            is_pinned: false,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl NetworkTask {
    /// 根据 URL 创建网络任务，主机名从 URL 中解析
    pub fn new(session: SessionId, url: impl Into<String>) -> Self {
        let url = url.into();
        let host = host_from_url(&url);
        Self {
            id: 0,
            created_at: Utc::now(),
            session,
            url: Some(url),
            host,
            http_method: Some("GET".to_string()),
            status_code: None,
            task_type: TaskType::DataTask,
            response_source: ResponseSource::Network,
            is_redirect: false,
            duration: None,
            request_body_size: 0,
            response_body_size: 0,
            is_pinned: false,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_response_source(mut self, source: ResponseSource) -> Self {
        self.response_source = source;
        self
    }

    pub fn with_redirect(mut self, is_redirect: bool) -> Self {
        self.is_redirect = is_redirect;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_response_body_size(mut self, bytes: u64) -> Self {
        self.response_body_size = bytes;
        self
    }
}

/// 从 URL 中提取主机名（不含端口和用户信息），IPv6 地址保留方括号
pub fn host_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_lowercase)
}
