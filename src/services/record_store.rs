//! 记录存储协作者
//!
//! `RecordStore` 描述控制台核心对存储的全部需求：按谓词分页获取（最新在前）、
//! 按谓词计数、变化通知订阅以及会话枚举。
//!
//! 每次插入、更新或清空都会使存储修订号恰好加一，并通过 broadcast 通道发布带修订号的事件，
//! 实时查询据此对通知去重、检测丢失的通知。

use parking_lot::RwLock;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::config::ConsoleConfig;
use crate::models::record::{Record, RecordId, SessionId};
use crate::services::predicate::Predicate;

/// 存储修订号
pub type Revision = u64;

/// 存储变化通知
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// 插入了一条记录（已分配 ID）
    Inserted { record: Record, revision: Revision },
    /// 已有记录的可变属性（置顶）发生变化
    Updated { record: Record, revision: Revision },
    /// 存储被全部清空
    Cleared { revision: Revision },
}

impl StoreEvent {
    pub fn revision(&self) -> Revision {
        match self {
            StoreEvent::Inserted { revision, .. }
            | StoreEvent::Updated { revision, .. }
            | StoreEvent::Cleared { revision } => *revision,
        }
    }
}

/// 一页记录及其对应的存储修订号
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    pub revision: Revision,
}

/// 计数结果及其对应的存储修订号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counted {
    pub count: usize,
    pub revision: Revision,
}

/// 结果排序键：创建时间倒序，同一时刻按 ID 倒序
pub fn newest_first_key(record: &Record) -> Reverse<(chrono::DateTime<chrono::Utc>, RecordId)> {
    Reverse((record.created_at(), record.id()))
}

/**
 * 记录存储接口
 *
 * 实现必须是线程安全的；通知可以从任意线程发出。
 */
pub trait RecordStore: Send + Sync {
    /// 按谓词获取一页记录，最新的在前
    fn fetch(&self, predicate: &Predicate, offset: usize, limit: usize) -> Result<Page>;

    /// 统计匹配谓词的记录数量
    fn count(&self, predicate: &Predicate) -> Result<Counted>;

    /// 获取全部记录（最旧在前），用于重建索引
    fn fetch_all(&self) -> Result<Page>;

    /// 订阅变化通知
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// 枚举已知的会话
    fn sessions(&self) -> Result<Vec<SessionId>>;

    /// 当前（正在运行的）会话
    fn current_session(&self) -> SessionId;

    /// 删除全部记录，返回清空后的修订号
    fn remove_all(&self) -> Result<Revision>;

    /**
     * 设置记录的置顶状态
     *
     * 返回状态是否发生变化；未变化时不产生通知。
     *
     * # Errors
     * 记录不存在时返回 `AppError::Validation`
     */
    fn set_pinned(&self, id: RecordId, pinned: bool) -> Result<bool>;
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<Record>,
    sessions: Vec<SessionId>,
    next_id: RecordId,
    revision: Revision,
}

/**
 * 内存记录存储
 *
 * 用于嵌入式场景和测试；`set_failing(true)` 会让读取操作返回存储错误。
 */
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
    sender: broadcast::Sender<StoreEvent>,
    current_session: SessionId,
    failing: AtomicBool,
}

impl InMemoryStore {
    /// 创建新的存储，`capacity` 为通知通道容量
    pub fn new(capacity: usize) -> Self {
        Self::with_session(SessionId::new(), capacity)
    }

    /// 按配置创建，通知通道容量取自 `event_bus.capacity`
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self::new(config.event_bus.capacity)
    }

    pub fn with_session(current_session: SessionId, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        info!(session = %current_session, capacity, "In-memory record store initialized");
        Self {
            inner: RwLock::new(StoreInner {
                sessions: vec![current_session],
                next_id: 1,
                ..StoreInner::default()
            }),
            sender,
            current_session,
            failing: AtomicBool::new(false),
        }
    }

    /// 插入一条记录，返回带已分配 ID 的记录
    pub fn insert(&self, record: impl Into<Record>) -> Record {
        let mut record = record.into();
        let mut inner = self.inner.write();

        record.set_id(inner.next_id);
        inner.next_id += 1;
        inner.revision += 1;
        let session = record.session();
        if !inner.sessions.contains(&session) {
            inner.sessions.push(session);
        }
        inner.records.push(record.clone());

        // 持有写锁发送，保证通知顺序与修订号一致
        let event = StoreEvent::Inserted {
            record: record.clone(),
            revision: inner.revision,
        };
        if self.sender.send(event).is_err() {
            debug!(revision = inner.revision, "No active subscribers for store event");
        }
        record
    }

    /// 批量插入
    pub fn insert_many<I, R>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = R>,
        R: Into<Record>,
    {
        records.into_iter().map(|record| self.insert(record)).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn revision(&self) -> Revision {
        self.inner.read().revision
    }

    /// 故障注入：读取操作返回可重试的存储错误
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            warn!("Record store read rejected: store unavailable");
            return Err(AppError::store_error("Record store unavailable"));
        }
        Ok(())
    }
}

impl RecordStore for InMemoryStore {
    fn fetch(&self, predicate: &Predicate, offset: usize, limit: usize) -> Result<Page> {
        self.check_available()?;
        let inner = self.inner.read();
        let now = predicate.now();

        let mut matching: Vec<&Record> = inner
            .records
            .iter()
            .filter(|record| predicate.matches_at(record, now))
            .collect();
        matching.sort_by_key(|record| newest_first_key(record));

        let records = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(Page {
            records,
            revision: inner.revision,
        })
    }

    fn count(&self, predicate: &Predicate) -> Result<Counted> {
        self.check_available()?;
        let inner = self.inner.read();
        let now = predicate.now();
        let count = inner
            .records
            .iter()
            .filter(|record| predicate.matches_at(record, now))
            .count();
        Ok(Counted {
            count,
            revision: inner.revision,
        })
    }

    fn fetch_all(&self) -> Result<Page> {
        self.check_available()?;
        let inner = self.inner.read();
        Ok(Page {
            records: inner.records.clone(),
            revision: inner.revision,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    fn sessions(&self) -> Result<Vec<SessionId>> {
        self.check_available()?;
        Ok(self.inner.read().sessions.clone())
    }

    fn current_session(&self) -> SessionId {
        self.current_session
    }

    fn remove_all(&self) -> Result<Revision> {
        self.check_available()?;
        let mut inner = self.inner.write();
        let removed = inner.records.len();
        inner.records.clear();
        inner.sessions.retain(|session| *session == self.current_session);
        inner.revision += 1;

        let revision = inner.revision;
        if self.sender.send(StoreEvent::Cleared { revision }).is_err() {
            debug!(revision, "No active subscribers for store event");
        }
        info!(removed, revision, "Record store cleared");
        Ok(revision)
    }

    fn set_pinned(&self, id: RecordId, pinned: bool) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.write();
        let position = inner
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| AppError::validation_error(format!("Unknown record id {id}")))?;
        if inner.records[position].is_pinned() == pinned {
            return Ok(false);
        }

        inner.records[position].set_pinned(pinned);
        inner.revision += 1;
        let event = StoreEvent::Updated {
            record: inner.records[position].clone(),
            revision: inner.revision,
        };
        if self.sender.send(event).is_err() {
            debug!(revision = inner.revision, "No active subscribers for store event");
        }
        debug!(id, pinned, revision = inner.revision, "Record pin changed");
        Ok(true)
    }
}
