//! # 搜索会话控制器
//!
//! 持有当前条件和模式，是每个会话唯一的串行化点：条件修改、存储通知、刷新完成
//! 都在同一把锁下作用于条件 / 谓词 / 索引 / 实时查询状态。
//!
//! 存储查询在锁外执行，完成时用刷新代号回报，被替换的配置产生的结果自动作废。
//!
//! 订阅回调在锁内同步执行，回调中不得再调用本会话的方法。

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::config::ConsoleConfig;
use crate::models::criteria::{ConsoleMode, Criteria};
use crate::models::record::{LogLevel, Record, RecordId, SessionId};
use crate::services::debounce::Debouncer;
use crate::services::listeners::{Listeners, SubscriptionId};
use crate::services::live_query::{
    Completion, EventOutcome, LiveQuery, LiveSnapshot, ModeCounts, ModePredicates, RefreshRequest,
    RefreshResult,
};
use crate::services::predicate::{Clock, PredicateCompiler, SystemClock};
use crate::services::quick_filters::QuickFilters;
use crate::services::record_index::RecordIndex;
use crate::services::record_store::{RecordStore, StoreEvent};
use crate::services::text_matcher::{MatcherStats, TextMatcher};

/// 一次刷新内，存储在多次读取之间发生变化时的最大重读次数
const MAX_CONSISTENT_READ_ATTEMPTS: usize = 3;

/// 刷新完成后仍落后于存储时，连续追赶的最大轮数
const MAX_REFRESH_ROUNDS: usize = 3;

/// 推送给订阅者的会话变化
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// 条件或模式发生变化
    CriteriaChanged { criteria: Criteria, mode: ConsoleMode },
    /// 数量 / 结果 / 加载状态发生变化
    LiveChanged(LiveSnapshot),
    /// 主机或标签索引发生变化
    IndexChanged,
}

struct SessionState {
    default_criteria: Criteria,
    criteria: Criteria,
    mode: ConsoleMode,
    index: RecordIndex,
    live: LiveQuery,
    quick_filters: QuickFilters,
    listeners: Listeners<SessionUpdate>,
}

impl SessionState {
    fn publish_live(&self) {
        if !self.listeners.is_empty() {
            self.listeners
                .notify(&SessionUpdate::LiveChanged(self.live.snapshot()));
        }
    }
}

/// 搜索会话控制器
pub struct SearchSession {
    store: Arc<dyn RecordStore>,
    compiler: PredicateCompiler,
    config: ConsoleConfig,
    debouncer: Debouncer,
    state: Mutex<SessionState>,
    receiver: Mutex<Option<broadcast::Receiver<StoreEvent>>>,
    shutdown: CancellationToken,
}

impl SearchSession {
    /// 使用系统时钟创建会话
    pub fn new(store: Arc<dyn RecordStore>, config: ConsoleConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /**
     * 创建会话
     *
     * 默认条件只选中创建时存储的当前会话。创建时会订阅存储通知、
     * 用存储的现有内容初始化索引，并完成第一次刷新。
     *
     * # Errors
     * 配置无效时返回 `AppError::Config`
     */
    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        config: ConsoleConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AppError::config_error(format!("{e}")))?;

        // 先订阅，之后的变化都不会遗漏
        let receiver = store.subscribe();

        let matcher = Arc::new(TextMatcher::new(config.search.regex_cache_capacity));
        let compiler = PredicateCompiler::new(matcher, clock, config.search.recent_window());
        let current_session = store.current_session();
        let default_criteria = Criteria::for_session(current_session);

        let mut index = RecordIndex::new();
        match store.fetch_all() {
            Ok(page) => index.rebuild(&page.records, page.revision),
            Err(error) => warn!(error = %error, "Failed to seed record index, starting empty"),
        }

        let mut live = LiveQuery::new(config.live_query.page_size);
        let request = live.activate(ModePredicates::compile(
            &compiler,
            &default_criteria,
            ConsoleMode::All,
        ));

        let session = Self {
            store,
            compiler,
            debouncer: Debouncer::new(config.search.debounce()),
            state: Mutex::new(SessionState {
                criteria: default_criteria.clone(),
                default_criteria,
                mode: ConsoleMode::All,
                index,
                live,
                quick_filters: QuickFilters::new(config.search.max_quick_filters),
                listeners: Listeners::new(),
            }),
            receiver: Mutex::new(Some(receiver)),
            shutdown: CancellationToken::new(),
            config,
        };

        info!(session = %current_session, "Search session started");
        session.run_refresh(request);
        Ok(session)
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn mode(&self) -> ConsoleMode {
        self.state.lock().mode
    }

    pub fn criteria(&self) -> Criteria {
        self.state.lock().criteria.clone()
    }

    /// 会话开始时的默认条件（仅当前会话）
    pub fn default_criteria(&self) -> Criteria {
        self.state.lock().default_criteria.clone()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.state.lock().live.snapshot()
    }

    /// 当前谓词下各模式的数量；数据尚未对应当前谓词时返回 None
    pub fn counts(&self) -> Option<ModeCounts> {
        self.snapshot().current_counts()
    }

    pub fn matcher_stats(&self) -> MatcherStats {
        self.compiler.matcher().stats()
    }

    /// `teardown` 之后会话不再接受修改，也不再处理存储通知
    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ===== 条件与模式 =====

    /// 切换模式，模式未变化时返回 false
    pub fn set_mode(&self, mode: ConsoleMode) -> bool {
        let request = {
            let mut state = self.state.lock();
            if self.is_torn_down() || state.mode == mode {
                return false;
            }
            state.mode = mode;
            debug!(mode = mode.title(), "Console mode changed");
            self.recompile(&mut state)
        };
        self.run_refresh(request);
        true
    }

    /// "仅网络" 开关：打开为 `Network`，关闭为 `All`
    pub fn set_network_only(&self, enabled: bool) -> bool {
        self.set_mode(if enabled {
            ConsoleMode::Network
        } else {
            ConsoleMode::All
        })
    }

    /**
     * 修改条件
     *
     * 修改器在会话锁内执行，不得调用本会话的方法。条件实际发生变化时重新编译谓词并刷新，
     * 返回是否发生了变化。会话结束后修改器不会被调用，直接返回 false。
     */
    pub fn update_criteria<F>(&self, mutator: F) -> bool
    where
        F: FnOnce(&mut Criteria),
    {
        let request = {
            let mut state = self.state.lock();
            if self.is_torn_down() {
                return false;
            }
            let mut criteria = state.criteria.clone();
            mutator(&mut criteria);
            if criteria == state.criteria {
                return false;
            }
            state.criteria = criteria;
            self.recompile(&mut state)
        };
        self.run_refresh(request);
        true
    }

    /// 恢复会话默认条件
    pub fn reset_criteria(&self) -> bool {
        let default_criteria = self.default_criteria();
        self.update_criteria(|criteria| *criteria = default_criteria)
    }

    fn recompile(&self, state: &mut SessionState) -> RefreshRequest {
        let predicates = ModePredicates::compile(&self.compiler, &state.criteria, state.mode);
        state.listeners.notify(&SessionUpdate::CriteriaChanged {
            criteria: state.criteria.clone(),
            mode: state.mode,
        });
        state.live.activate(predicates)
    }

    // ===== 文本搜索 =====

    /// 输入过程中的文本修改（防抖），被后续输入取代时返回 false
    pub async fn set_search_text(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.is_torn_down() || !self.debouncer.wait().await {
            return false;
        }
        self.update_criteria(|criteria| criteria.text.pattern = text)
    }

    /// 提交搜索：去掉首尾空白后立即生效，并记录为快捷过滤器
    pub fn submit_search(&self, text: &str) -> bool {
        if self.is_torn_down() {
            return false;
        }
        self.debouncer.cancel();
        let text = text.trim();
        self.state.lock().quick_filters.add(text);
        self.update_criteria(|criteria| criteria.text.pattern = text.to_string())
    }

    /// 最近提交的搜索文本，最新在前
    pub fn quick_filters(&self) -> Vec<String> {
        self.state
            .lock()
            .quick_filters
            .tokens()
            .map(str::to_string)
            .collect()
    }

    /// 重新提交某个快捷过滤器，索引越界时返回 false
    pub fn apply_quick_filter(&self, index: usize) -> bool {
        let token = self
            .state
            .lock()
            .quick_filters
            .get(index)
            .map(str::to_string);
        match token {
            Some(token) => {
                self.submit_search(&token);
                true
            }
            None => false,
        }
    }

    // ===== 快捷操作 =====

    /// 隐藏标签（如果该标签正处于焦点，同时取消焦点）
    pub fn hide_label(&self, label: &str) -> bool {
        self.update_criteria(|criteria| {
            criteria.labels.hidden.insert(label.to_string());
            if criteria.labels.focused.as_deref() == Some(label) {
                criteria.labels.focused = None;
            }
        })
    }

    /// 只显示某个标签
    pub fn focus_label(&self, label: &str) -> bool {
        self.update_criteria(|criteria| criteria.labels.focused = Some(label.to_string()))
    }

    pub fn hide_level(&self, level: LogLevel) -> bool {
        self.update_criteria(|criteria| {
            criteria.log_levels.levels.remove(&level);
        })
    }

    /// 只显示某个日志级别
    pub fn show_only_level(&self, level: LogLevel) -> bool {
        self.update_criteria(|criteria| criteria.log_levels.levels = [level].into_iter().collect())
    }

    /// 切换主机的选中状态
    pub fn toggle_host(&self, host: &str) -> bool {
        self.update_criteria(|criteria| {
            criteria.host.toggle(host);
        })
    }

    pub fn deselect_all_hosts(&self) -> bool {
        self.update_criteria(|criteria| criteria.host.values.clear())
    }

    /// "仅置顶" 开关
    pub fn set_only_pinned(&self, enabled: bool) -> bool {
        self.update_criteria(|criteria| criteria.pins.only_pinned = enabled)
    }

    /**
     * 置顶或取消置顶一条记录
     *
     * 状态发生变化时立即刷新数量和结果，之后到达的同一修订号通知会被忽略。
     *
     * # Errors
     * 会话已结束或记录不存在时返回 `AppError::Validation`，存储失败时返回 `AppError::Store`
     */
    pub fn set_pinned(&self, id: RecordId, pinned: bool) -> Result<bool> {
        if self.is_torn_down() {
            return Err(AppError::validation_error("Search session has been torn down"));
        }
        let changed = self
            .store
            .set_pinned(id, pinned)
            .map_err(|e| e.with_context(format!("Failed to update pin for record {id}")))?;
        if changed {
            self.refresh();
        }
        Ok(changed)
    }

    // ===== 索引与存储 =====

    pub fn all_hosts(&self) -> Vec<String> {
        self.state.lock().index.all_hosts().to_vec()
    }

    pub fn all_labels(&self) -> Vec<String> {
        self.state.lock().index.all_labels().to_vec()
    }

    pub fn all_sessions(&self) -> Result<Vec<SessionId>> {
        self.store.sessions()
    }

    /// 分页获取当前条件和模式下的记录（最新在前），`limit` 缺省为配置的页大小
    pub fn fetch_page(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Record>> {
        if limit == Some(0) {
            return Err(AppError::validation_error("Page limit must be greater than zero"));
        }
        let predicate = {
            let state = self.state.lock();
            self.compiler.compile(&state.criteria, state.mode)
        };
        let limit = limit.unwrap_or(self.config.live_query.page_size);
        Ok(self.store.fetch(&predicate, offset, limit)?.records)
    }

    /**
     * 删除全部记录
     *
     * 索引、数量和结果与存储一起清空，条件恢复为会话默认值。
     *
     * # Errors
     * 会话已结束时返回 `AppError::Validation`，存储失败时返回 `AppError::Store`
     */
    pub fn remove_all(&self) -> Result<()> {
        if self.is_torn_down() {
            return Err(AppError::validation_error("Search session has been torn down"));
        }
        let revision = self
            .store
            .remove_all()
            .map_err(|e| e.with_context("Failed to remove all records"))?;

        let request = {
            let mut state = self.state.lock();
            if self.is_torn_down() {
                return Ok(());
            }
            state.index.clear_at(revision);
            state.live.apply_event(&StoreEvent::Cleared { revision });
            state.listeners.notify(&SessionUpdate::IndexChanged);
            state.criteria = state.default_criteria.clone();
            self.recompile(&mut state)
        };

        info!(revision, "All records removed");
        self.run_refresh(request);
        Ok(())
    }

    // ===== 存储通知 =====

    /// 处理一条存储通知（来自监听任务或 `drain_events`）
    pub fn handle_store_event(&self, event: &StoreEvent) {
        let needs_refresh = {
            let mut state = self.state.lock();
            if self.is_torn_down() {
                return;
            }
            if state.index.observe(event) {
                state.listeners.notify(&SessionUpdate::IndexChanged);
            }
            match state.live.apply_event(event) {
                EventOutcome::Applied { changed: true } => {
                    state.publish_live();
                    false
                }
                EventOutcome::NeedsRefresh => true,
                _ => false,
            }
        };

        if needs_refresh {
            self.refresh();
        }
    }

    /**
     * 同步处理所有已到达的存储通知，返回处理的数量
     *
     * 监听任务已启动或会话已结束时返回 0。
     */
    pub fn drain_events(&self) -> usize {
        if self.is_torn_down() {
            return 0;
        }
        let mut processed = 0;
        loop {
            let next = {
                let mut receiver = self.receiver.lock();
                match receiver.as_mut() {
                    Some(receiver) => receiver.try_recv(),
                    None => return processed,
                }
            };

            match next {
                Ok(event) => {
                    self.handle_store_event(&event);
                    processed += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Store notifications lagged, resynchronizing");
                    self.resync();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return processed,
            }
        }
    }

    /**
     * 启动后台任务监听存储通知
     *
     * 通知被转交到会话的串行化点处理；接收端落后（Lagged）时重建索引并全量刷新。
     * `teardown` 会停止该任务。任务已启动过或会话已结束时返回 None。
     */
    pub fn spawn_store_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.is_torn_down() {
            return None;
        }
        let mut receiver = self.receiver.lock().take()?;
        let token = self.shutdown.child_token();
        let session = Arc::clone(self);

        Some(tokio::spawn(async move {
            debug!("Store listener started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => session.handle_store_event(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Store listener lagged, resynchronizing");
                            session.resync();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Store listener stopped");
        }))
    }

    /// 从存储重建索引并全量刷新
    pub fn resync(&self) {
        if self.is_torn_down() {
            return;
        }
        match self.store.fetch_all() {
            Ok(page) => {
                let mut state = self.state.lock();
                if self.is_torn_down() {
                    return;
                }
                state.index.rebuild(&page.records, page.revision);
                state.listeners.notify(&SessionUpdate::IndexChanged);
            }
            Err(error) => warn!(error = %error, "Failed to rebuild record index"),
        }
        self.refresh();
    }

    // ===== 刷新 =====

    /// 使用当前谓词全量刷新数量和结果
    pub fn refresh(&self) {
        let request = self.state.lock().live.begin_refresh();
        if let Some(request) = request {
            self.run_refresh(request);
        }
    }

    /// 执行刷新；最后一轮之后不再发起新的请求，剩余的差距由下一条通知的修订号缺口触发补齐
    fn run_refresh(&self, mut request: RefreshRequest) {
        let mut round = 1;
        loop {
            let result = self.execute(&request);

            let mut state = self.state.lock();
            let completion = state.live.complete(request.generation, result);
            if completion != Completion::Stale {
                state.publish_live();
            }

            if completion != (Completion::Applied { needs_refresh: true }) {
                return;
            }
            if round == MAX_REFRESH_ROUNDS {
                warn!(rounds = round, "Live query still behind the store after repeated refreshes");
                return;
            }
            match state.live.begin_refresh() {
                Some(next) => request = next,
                None => return,
            }
            round += 1;
        }
    }

    /// 在锁外执行存储查询，保证数量和结果对应同一个存储修订号
    fn execute(&self, request: &RefreshRequest) -> Result<RefreshResult> {
        let predicates = &request.predicates;
        for attempt in 1..=MAX_CONSISTENT_READ_ATTEMPTS {
            let logs = self.store.count(&predicates.logs)?;
            let network = self.store.count(&predicates.network)?;
            let page = self.store.fetch(predicates.active(), 0, request.window)?;

            if logs.revision == network.revision && network.revision == page.revision {
                // 全部模式的子句按记录类型分别作用，因此 all = logs + network
                return Ok(RefreshResult {
                    counts: ModeCounts {
                        all: logs.count + network.count,
                        logs: logs.count,
                        network: network.count,
                    },
                    results: page.records,
                    revision: page.revision,
                });
            }
            debug!(attempt, "Store changed during refresh, reading again");
        }
        Err(AppError::store_error(
            "Record store kept changing during refresh",
        ))
    }

    // ===== 订阅与生命周期 =====

    /// 订阅会话变化，回调在会话锁内同步执行
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionUpdate) + Send + Sync + 'static,
    {
        self.state.lock().listeners.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().listeners.unsubscribe(id)
    }

    /// 结束会话：停止监听任务和防抖等待，实时查询回到空闲状态
    pub fn teardown(&self) {
        self.shutdown.cancel();
        self.debouncer.cancel();
        let mut state = self.state.lock();
        state.live.deactivate();
        state.publish_live();
        state.listeners.clear();
        info!("Search session torn down");
    }
}
