//! # 实时查询 / 计数观察器
//!
//! 维护当前谓词下各模式的匹配数量以及当前模式的最新结果窗口（最新在前）。
//!
//! ## 状态机
//!
//! - `Idle`：没有谓词，忽略一切通知
//! - `Active`：设置谓词后进入；每次谓词替换或需要全量重算时发起一次刷新
//!
//! 每次刷新都分配新的代号（generation），只有最新代号的完成结果会被采纳，
//! 过期的完成结果直接丢弃。刷新进行期间到达的通知先缓冲，刷新完成后按修订号重放。
//! 刷新失败时保留最后一次成功的结果，并设置可重试的失败标记。

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::criteria::{ConsoleMode, Criteria};
use crate::models::record::Record;
use crate::services::predicate::{Predicate, PredicateCompiler};
use crate::services::record_store::{newest_first_key, Revision, StoreEvent};

/// 刷新代号
pub type Generation = u64;

/// 刷新期间最多缓冲的通知数量，超出后改为完成后再全量刷新
const MAX_BUFFERED_EVENTS: usize = 4096;

/// 各模式的匹配数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeCounts {
    pub all: usize,
    pub logs: usize,
    pub network: usize,
}

impl ModeCounts {
    pub fn get(&self, mode: ConsoleMode) -> usize {
        match mode {
            ConsoleMode::All => self.all,
            ConsoleMode::Logs => self.logs,
            ConsoleMode::Network => self.network,
        }
    }

    fn increment(&mut self, mode: ConsoleMode) {
        match mode {
            ConsoleMode::All => self.all += 1,
            ConsoleMode::Logs => self.logs += 1,
            ConsoleMode::Network => self.network += 1,
        }
    }
}

/// 刷新失败信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFailure {
    pub message: String,
    pub retryable: bool,
}

impl From<&AppError> for QueryFailure {
    fn from(error: &AppError) -> Self {
        Self {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// 同一份条件在三种模式下编译出的谓词
#[derive(Debug, Clone)]
pub struct ModePredicates {
    pub current: ConsoleMode,
    pub all: Predicate,
    pub logs: Predicate,
    pub network: Predicate,
}

impl ModePredicates {
    pub fn compile(compiler: &PredicateCompiler, criteria: &Criteria, current: ConsoleMode) -> Self {
        Self {
            current,
            all: compiler.compile(criteria, ConsoleMode::All),
            logs: compiler.compile(criteria, ConsoleMode::Logs),
            network: compiler.compile(criteria, ConsoleMode::Network),
        }
    }

    pub fn get(&self, mode: ConsoleMode) -> &Predicate {
        match mode {
            ConsoleMode::All => &self.all,
            ConsoleMode::Logs => &self.logs,
            ConsoleMode::Network => &self.network,
        }
    }

    /// 当前模式的谓词
    pub fn active(&self) -> &Predicate {
        self.get(self.current)
    }

    pub fn is_time_relative(&self) -> bool {
        [&self.all, &self.logs, &self.network]
            .into_iter()
            .any(Predicate::is_time_relative)
    }
}

/// 一次刷新请求：调用方在锁外执行存储查询，再用 `generation` 回报结果
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub generation: Generation,
    pub predicates: ModePredicates,
    pub window: usize,
}

/// 刷新得到的数据，所有字段必须对应同一个存储修订号
#[derive(Debug, Clone, Default)]
pub struct RefreshResult {
    pub counts: ModeCounts,
    pub results: Vec<Record>,
    pub revision: Revision,
}

/// 通知处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// 空闲状态或重复 / 过期的通知
    Ignored,
    /// 刷新进行中，已缓冲
    Buffered,
    /// 已增量应用
    Applied { changed: bool },
    /// 无法增量应用（检测到丢失的通知或没有可用的基准），需要全量刷新
    NeedsRefresh,
}

/// 刷新完成结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied { needs_refresh: bool },
    Stale,
    Failed,
}

/// 对外发布的状态快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub mode: ConsoleMode,
    pub counts: ModeCounts,
    /// 当前模式的最新结果窗口，最新在前
    pub results: Vec<Record>,
    pub generation: Generation,
    pub revision: Revision,
    pub is_active: bool,
    /// 有刷新正在进行
    pub is_loading: bool,
    /// 数量和结果属于已被替换的谓词（最后一次成功的结果）
    pub is_stale: bool,
    pub failure: Option<QueryFailure>,
}

impl LiveSnapshot {
    /// 仅当数据对应当前谓词时返回数量
    pub fn current_counts(&self) -> Option<ModeCounts> {
        (self.is_active && !self.is_stale).then_some(self.counts)
    }
}

#[derive(Debug, Default)]
struct Published {
    counts: ModeCounts,
    results: Vec<Record>,
    revision: Revision,
    /// 数据是否由当前谓词计算得到
    is_current: bool,
}

#[derive(Debug)]
struct ActiveQuery {
    predicates: ModePredicates,
    published: Published,
    pending: Option<Generation>,
    buffered: Vec<StoreEvent>,
    buffer_overflowed: bool,
    failure: Option<QueryFailure>,
}

#[derive(Debug)]
enum QueryState {
    Idle,
    Active(Box<ActiveQuery>),
}

/// 实时查询
#[derive(Debug)]
pub struct LiveQuery {
    state: QueryState,
    generation: Generation,
    window: usize,
}

impl LiveQuery {
    /// `window` 为保留在内存中的结果数量
    pub fn new(window: usize) -> Self {
        Self {
            state: QueryState::Idle,
            generation: 0,
            window: window.max(1),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, QueryState::Active(_))
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn predicates(&self) -> Option<&ModePredicates> {
        match &self.state {
            QueryState::Idle => None,
            QueryState::Active(active) => Some(&active.predicates),
        }
    }

    /**
     * 设置（或替换）谓词并发起刷新
     *
     * 之前发出的刷新请求全部作废。上一次成功的结果保留为 "过期" 数据，直到新的刷新完成。
     */
    pub fn activate(&mut self, predicates: ModePredicates) -> RefreshRequest {
        self.generation += 1;
        let generation = self.generation;
        let request = RefreshRequest {
            generation,
            predicates: predicates.clone(),
            window: self.window,
        };

        match &mut self.state {
            QueryState::Active(active) => {
                active.predicates = predicates;
                active.published.is_current = false;
                active.pending = Some(generation);
            }
            QueryState::Idle => {
                self.state = QueryState::Active(Box::new(ActiveQuery {
                    predicates,
                    published: Published::default(),
                    pending: Some(generation),
                    buffered: Vec::new(),
                    buffer_overflowed: false,
                    failure: None,
                }));
            }
        }

        debug!(generation, "Live query predicate set");
        request
    }

    /// 使用当前谓词发起全量刷新；空闲状态返回 None
    pub fn begin_refresh(&mut self) -> Option<RefreshRequest> {
        let QueryState::Active(active) = &mut self.state else {
            return None;
        };
        self.generation += 1;
        active.pending = Some(self.generation);
        debug!(generation = self.generation, "Live query refresh started");
        Some(RefreshRequest {
            generation: self.generation,
            predicates: active.predicates.clone(),
            window: self.window,
        })
    }

    /// 回到空闲状态，所有进行中的刷新作废
    pub fn deactivate(&mut self) {
        self.generation += 1;
        self.state = QueryState::Idle;
        info!(generation = self.generation, "Live query deactivated");
    }

    /**
     * 回报刷新结果
     *
     * 代号不是最新的结果会被丢弃。成功时采纳数据并按修订号重放缓冲的通知；
     * 失败时保留最后一次成功的数据并记录失败信息。
     */
    pub fn complete(
        &mut self,
        generation: Generation,
        result: crate::error::Result<RefreshResult>,
    ) -> Completion {
        let QueryState::Active(active) = &mut self.state else {
            debug!(generation, "Discarding refresh completion: live query is idle");
            return Completion::Stale;
        };
        if generation != self.generation || active.pending != Some(generation) {
            debug!(
                generation,
                latest = self.generation,
                "Discarding stale refresh completion"
            );
            return Completion::Stale;
        }

        active.pending = None;
        let buffered = std::mem::take(&mut active.buffered);
        let overflowed = std::mem::replace(&mut active.buffer_overflowed, false);

        match result {
            Ok(result) => {
                debug!(
                    generation,
                    revision = result.revision,
                    all = result.counts.all,
                    logs = result.counts.logs,
                    network = result.counts.network,
                    "Live query refreshed"
                );
                active.failure = None;
                active.published = Published {
                    counts: result.counts,
                    results: result.results,
                    revision: result.revision,
                    is_current: true,
                };
                active.published.results.truncate(self.window);

                let mut needs_refresh = overflowed;
                if !needs_refresh {
                    for event in &buffered {
                        if self.apply_event(event) == EventOutcome::NeedsRefresh {
                            needs_refresh = true;
                            break;
                        }
                    }
                }
                Completion::Applied { needs_refresh }
            }
            Err(error) => {
                warn!(generation, error = %error, "Live query refresh failed, keeping last results");
                active.failure = Some(QueryFailure::from(&error));
                Completion::Failed
            }
        }
    }

    /// 处理一条存储变化通知
    pub fn apply_event(&mut self, event: &StoreEvent) -> EventOutcome {
        let window = self.window;
        let QueryState::Active(active) = &mut self.state else {
            return EventOutcome::Ignored;
        };

        if active.pending.is_some() {
            if active.buffered.len() >= MAX_BUFFERED_EVENTS {
                active.buffered.clear();
                active.buffer_overflowed = true;
            }
            if !active.buffer_overflowed {
                active.buffered.push(event.clone());
            }
            return EventOutcome::Buffered;
        }

        let published = &mut active.published;
        if event.revision() <= published.revision {
            return EventOutcome::Ignored;
        }
        // 数据不属于当前谓词或上次刷新失败时，借下一次变化重新刷新
        if !published.is_current || active.failure.is_some() {
            return EventOutcome::NeedsRefresh;
        }

        match event {
            StoreEvent::Cleared { revision } => {
                published.counts = ModeCounts::default();
                published.results.clear();
                published.revision = *revision;
                EventOutcome::Applied { changed: true }
            }
            // 置顶变化可能改变已有记录的匹配结果
            StoreEvent::Updated { .. } => EventOutcome::NeedsRefresh,
            StoreEvent::Inserted { record, revision } => {
                if *revision != published.revision + 1 {
                    debug!(
                        expected = published.revision + 1,
                        received = revision,
                        "Store notification gap detected"
                    );
                    return EventOutcome::NeedsRefresh;
                }

                let predicates = &active.predicates;
                // 滑动窗口会让已有记录移出范围，只能全量重算
                if predicates.is_time_relative() {
                    return EventOutcome::NeedsRefresh;
                }
                published.revision = *revision;

                let now = predicates.active().now();
                let mut changed = false;
                for mode in [ConsoleMode::All, ConsoleMode::Logs, ConsoleMode::Network] {
                    if predicates.get(mode).matches_at(record, now) {
                        published.counts.increment(mode);
                        changed = true;
                    }
                }

                if predicates.active().matches_at(record, now) {
                    let key = newest_first_key(record);
                    let position = published
                        .results
                        .partition_point(|existing| newest_first_key(existing) < key);
                    if position < window {
                        published.results.insert(position, record.clone());
                        published.results.truncate(window);
                    }
                }

                EventOutcome::Applied { changed }
            }
        }
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        match &self.state {
            QueryState::Idle => LiveSnapshot {
                generation: self.generation,
                ..LiveSnapshot::default()
            },
            QueryState::Active(active) => LiveSnapshot {
                mode: active.predicates.current,
                counts: active.published.counts,
                results: active.published.results.clone(),
                generation: self.generation,
                revision: active.published.revision,
                is_active: true,
                is_loading: active.pending.is_some(),
                is_stale: !active.published.is_current,
                failure: active.failure.clone(),
            },
        }
    }
}
