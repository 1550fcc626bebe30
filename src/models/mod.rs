pub mod config;
pub mod criteria;
pub mod record;

// 重新导出核心类型
pub use config::{ConsoleConfig, EventBusConfig, LiveQueryConfig, LoggingConfig, SearchConfig};
pub use criteria::{
    CaseSensitivity, ConsoleMode, Criteria, DatePreset, Dates, Host, Labels, LogLevels,
    MatchingRule, Networking, Pins, Response, SearchKind, Sessions, TextSearch, TextSearchOptions,
    ValueRange,
};
pub use record::{
    host_from_url, LogLevel, LogMessage, NetworkTask, Record, RecordId, RecordKind,
    ResponseSource, SessionId, TaskType,
};
