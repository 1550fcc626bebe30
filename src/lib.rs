//! 日志控制台核心
//!
//! 把结构化的搜索条件编译为记录谓词，并在记录存储持续变化时维护各模式的实时数量和结果：
//!
//! - `models`：搜索条件、记录和配置等值类型
//! - `services`：文本匹配、谓词编译、二级索引、存储协作者、实时查询和会话控制器
//!
//! ```ignore
//! let store = Arc::new(InMemoryStore::new(1000));
//! let session = Arc::new(SearchSession::new(store.clone(), ConsoleConfig::default())?);
//! session.spawn_store_listener();
//! session.hide_label("network");
//! let counts = session.counts();
//! ```

pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use error::{AppError, Result};
pub use logging::init_tracing;
pub use models::{
    ConsoleConfig, ConsoleMode, Criteria, LogLevel, LogMessage, NetworkTask, Record, SessionId,
};
pub use services::{
    InMemoryStore, LiveSnapshot, ModeCounts, RecordStore, SearchSession, SessionUpdate,
};
