//! # 谓词编译器
//!
//! 纯函数：`Criteria × ConsoleMode → Predicate`。
//!
//! 每个启用且有效的子条件贡献一个合取子句，被禁用或处于默认状态的子条件不产生子句。
//! 子句按代价排序：记录类型、会话、置顶、时间、级别、标签、网络属性在前，文本匹配最后。
//!
//! 时间预设（最近 / 今天）在求值时才根据时钟解析，因此窗口会随时间滑动。

use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::models::criteria::{ConsoleMode, Criteria, DatePreset, ValueRange};
use crate::models::record::{LogLevel, Record, RecordKind, ResponseSource, SessionId, TaskType};
use crate::services::text_matcher::{CompiledText, TextMatcher};

/// 时钟抽象，用于在求值时解析时间预设
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动控制的时钟（测试和回放场景）
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
enum DateBounds {
    Fixed {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    Recent(chrono::Duration),
    Today,
}

impl DateBounds {
    fn contains(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (start, end) = match self {
            DateBounds::Fixed { start, end } => (*start, *end),
            DateBounds::Recent(window) => (Some(now - *window), Some(now)),
            DateBounds::Today => (Some(local_midnight(now)), Some(now)),
        };
        start.map_or(true, |start| created_at >= start) && end.map_or(true, |end| created_at <= end)
    }
}

/// 求值时刻所在本地日期的零点
fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(midnight) => midnight.with_timezone(&Utc),
        // 零点落在夏令时间隙中
        None => {
            now - chrono::Duration::seconds(i64::from(local.num_seconds_from_midnight()))
                - chrono::Duration::nanoseconds(i64::from(local.nanosecond()))
        }
    }
}

#[derive(Debug, Clone)]
enum Clause {
    Kind(RecordKind),
    Sessions(HashSet<SessionId>),
    Pinned,
    Dates(DateBounds),
    LogLevels(HashSet<LogLevel>),
    FocusedLabel(String),
    HiddenLabels(HashSet<String>),
    Hosts(HashSet<String>),
    Networking {
        task_type: Option<TaskType>,
        source: Option<ResponseSource>,
        is_redirect: Option<bool>,
    },
    Response {
        status_code: ValueRange<u16>,
        duration: ValueRange<f64>,
        response_size: ValueRange<u64>,
    },
    Text(CompiledText),
}

impl Clause {
    /// 仅日志子句对网络任务恒为真，反之亦然
    fn evaluate(&self, record: &Record, now: DateTime<Utc>) -> bool {
        match (self, record) {
            (Clause::Kind(kind), _) => record.kind() == *kind,
            (Clause::Sessions(selection), _) => selection.contains(&record.session()),
            (Clause::Pinned, _) => record.is_pinned(),
            (Clause::Dates(bounds), _) => bounds.contains(record.created_at(), now),

            (Clause::LogLevels(levels), Record::Message(message)) => {
                levels.contains(&message.level)
            }
            (Clause::FocusedLabel(label), Record::Message(message)) => message.label == *label,
            (Clause::HiddenLabels(hidden), Record::Message(message)) => {
                !hidden.contains(&message.label)
            }
            (Clause::LogLevels(_) | Clause::FocusedLabel(_) | Clause::HiddenLabels(_), _) => true,

            (Clause::Hosts(hosts), Record::Task(task)) => task
                .host
                .as_ref()
                .is_some_and(|host| hosts.contains(host)),
            (
                Clause::Networking {
                    task_type,
                    source,
                    is_redirect,
                },
                Record::Task(task),
            ) => {
                task_type.map_or(true, |t| t == task.task_type)
                    && source.map_or(true, |s| s == task.response_source)
                    && is_redirect.map_or(true, |r| r == task.is_redirect)
            }
            (
                Clause::Response {
                    status_code,
                    duration,
                    response_size,
                },
                Record::Task(task),
            ) => {
                range_matches(status_code, task.status_code)
                    && range_matches(duration, task.duration)
                    && response_size.contains(task.response_body_size)
            }
            (Clause::Hosts(_) | Clause::Networking { .. } | Clause::Response { .. }, _) => true,

            (Clause::Text(compiled), Record::Message(message)) => compiled.is_match(&message.text),
            (Clause::Text(compiled), Record::Task(task)) => {
                compiled.is_match(task.url.as_deref().unwrap_or(""))
            }
        }
    }
}

/// 值缺失时只有无界范围才匹配
fn range_matches<T: PartialOrd + Copy>(range: &ValueRange<T>, value: Option<T>) -> bool {
    match value {
        Some(value) => range.contains(value),
        None => range.is_unbounded(),
    }
}

/**
 * 编译后的谓词
 *
 * 克隆代价很低（子句列表通过 `Arc` 共享），可以跨线程传递给存储。
 */
#[derive(Clone)]
pub struct Predicate {
    mode: ConsoleMode,
    clauses: Arc<[Clause]>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("mode", &self.mode)
            .field("clauses", &self.clauses)
            .finish()
    }
}

impl Predicate {
    /// 匹配指定模式下全部记录的谓词
    pub fn match_all(mode: ConsoleMode, clock: Arc<dyn Clock>) -> Self {
        let clauses: Vec<Clause> = match mode {
            ConsoleMode::All => Vec::new(),
            ConsoleMode::Logs => vec![Clause::Kind(RecordKind::Message)],
            ConsoleMode::Network => vec![Clause::Kind(RecordKind::Task)],
        };
        Self {
            mode,
            clauses: clauses.into(),
            clock,
        }
    }

    pub fn mode(&self) -> ConsoleMode {
        self.mode
    }

    /// 当前求值时刻
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 使用时钟的当前时刻求值
    pub fn matches(&self, record: &Record) -> bool {
        self.matches_at(record, self.clock.now())
    }

    /// 在指定时刻求值（批量求值时应对整批记录使用同一时刻）
    pub fn matches_at(&self, record: &Record, now: DateTime<Utc>) -> bool {
        self.clauses.iter().all(|clause| clause.evaluate(record, now))
    }

    /// 除记录类型外的子句数量
    pub fn filter_count(&self) -> usize {
        self.clauses
            .iter()
            .filter(|clause| !matches!(clause, Clause::Kind(_)))
            .count()
    }

    /// 是否包含随时钟滑动的时间窗口（最近 / 今天）
    ///
    /// 这类谓词对已有记录的结论会随时间改变，增量计数不再可靠。
    pub fn is_time_relative(&self) -> bool {
        self.clauses.iter().any(|clause| {
            matches!(
                clause,
                Clause::Dates(DateBounds::Recent(_) | DateBounds::Today)
            )
        })
    }

    /// 文本子句是否因非法正则而永远不匹配
    pub fn has_invalid_pattern(&self) -> bool {
        self.clauses
            .iter()
            .any(|clause| matches!(clause, Clause::Text(compiled) if !compiled.is_valid()))
    }
}

/**
 * 谓词编译器
 *
 * 编译是确定且无副作用的（正则缓存除外），相同的条件和模式总是得到逻辑等价的谓词。
 */
#[derive(Clone)]
pub struct PredicateCompiler {
    matcher: Arc<TextMatcher>,
    clock: Arc<dyn Clock>,
    recent_window: chrono::Duration,
}

impl PredicateCompiler {
    /**
     * 创建新的编译器
     *
     * # 参数
     * * `matcher` - 共享的文本匹配器（带正则缓存）
     * * `clock` - 求值时使用的时钟
     * * `recent_window` - "最近" 预设的窗口长度
     */
    pub fn new(
        matcher: Arc<TextMatcher>,
        clock: Arc<dyn Clock>,
        recent_window: std::time::Duration,
    ) -> Self {
        let recent_window = chrono::Duration::from_std(recent_window)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            matcher,
            clock,
            recent_window,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn matcher(&self) -> &Arc<TextMatcher> {
        &self.matcher
    }

    /**
     * 编译谓词
     *
     * # 规则
     * * `Logs` 模式忽略仅网络的子条件，`Network` 模式忽略仅日志的子条件
     * * `All` 模式下两类子条件都保留，各自只作用于对应类型的记录
     * * 空文本模式不产生子句
     */
    pub fn compile(&self, criteria: &Criteria, mode: ConsoleMode) -> Predicate {
        let mut clauses = Vec::new();

        match mode {
            ConsoleMode::All => {}
            ConsoleMode::Logs => clauses.push(Clause::Kind(RecordKind::Message)),
            ConsoleMode::Network => clauses.push(Clause::Kind(RecordKind::Task)),
        }

        if criteria.sessions.has_effect() {
            clauses.push(Clause::Sessions(
                criteria.sessions.selection.iter().copied().collect(),
            ));
        }

        if criteria.pins.has_effect() {
            clauses.push(Clause::Pinned);
        }

        if criteria.dates.has_effect() {
            let bounds = match criteria.dates.preset {
                Some(DatePreset::Recent) => DateBounds::Recent(self.recent_window),
                Some(DatePreset::Today) => DateBounds::Today,
                None => DateBounds::Fixed {
                    start: criteria.dates.start,
                    end: criteria.dates.end,
                },
            };
            clauses.push(Clause::Dates(bounds));
        }

        if mode != ConsoleMode::Network {
            if criteria.log_levels.has_effect() {
                clauses.push(Clause::LogLevels(
                    criteria.log_levels.levels.iter().copied().collect(),
                ));
            }

            let labels = &criteria.labels;
            if labels.is_enabled {
                if let Some(focused) = &labels.focused {
                    clauses.push(Clause::FocusedLabel(focused.clone()));
                } else if !labels.hidden.is_empty() {
                    clauses.push(Clause::HiddenLabels(labels.hidden.iter().cloned().collect()));
                }
            }
        }

        if mode != ConsoleMode::Logs {
            if criteria.host.has_effect() {
                clauses.push(Clause::Hosts(criteria.host.values.iter().cloned().collect()));
            }

            let networking = &criteria.networking;
            if networking.has_effect() {
                clauses.push(Clause::Networking {
                    task_type: networking.task_type,
                    source: networking.source,
                    is_redirect: networking.is_redirect,
                });
            }

            let response = &criteria.response;
            if response.has_effect() {
                clauses.push(Clause::Response {
                    status_code: response.status_code,
                    duration: response.duration,
                    response_size: response.response_size,
                });
            }
        }

        if criteria.text.has_effect() {
            clauses.push(Clause::Text(
                self.matcher
                    .compile(&criteria.text.pattern, criteria.text.options),
            ));
        }

        debug!(
            ?mode,
            clauses = clauses.len(),
            active_filters = criteria.active_filter_count(),
            "Predicate compiled"
        );

        Predicate {
            mode,
            clauses: clauses.into(),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::criteria::{
        CaseSensitivity, Dates, MatchingRule, SearchKind, TextSearch, TextSearchOptions,
    };
    use crate::models::record::{LogMessage, NetworkTask};
    use chrono::Duration;

    fn noon_today() -> DateTime<Utc> {
        let today = Local::now().date_naive();
        Local
            .from_local_datetime(&today.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn compiler_at(now: DateTime<Utc>) -> PredicateCompiler {
        PredicateCompiler::new(
            Arc::new(TextMatcher::default()),
            Arc::new(ManualClock::new(now)),
            std::time::Duration::from_secs(600),
        )
    }

    fn message(session: SessionId, label: &str, text: &str) -> Record {
        LogMessage::new(session, LogLevel::Info, label, text).into()
    }

    fn task(session: SessionId, url: &str) -> Record {
        NetworkTask::new(session, url).into()
    }

    #[test]
    fn test_default_criteria_matches_everything_in_mode() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let log = message(session, "A", "hello");
        let net = task(session, "https://x.com/a");

        let all = compiler.compile(&Criteria::default(), ConsoleMode::All);
        assert!(all.matches(&log));
        assert!(all.matches(&net));
        assert_eq!(all.filter_count(), 0);

        let logs = compiler.compile(&Criteria::default(), ConsoleMode::Logs);
        assert!(logs.matches(&log));
        assert!(!logs.matches(&net));

        let network = compiler.compile(&Criteria::default(), ConsoleMode::Network);
        assert!(!network.matches(&log));
        assert!(network.matches(&net));
    }

    #[test]
    fn test_sessions_clause() {
        let compiler = compiler_at(Utc::now());
        let current = SessionId::new();
        let other = SessionId::new();
        let predicate = compiler.compile(&Criteria::for_session(current), ConsoleMode::All);

        assert!(predicate.matches(&message(current, "A", "x")));
        assert!(!predicate.matches(&message(other, "A", "x")));
    }

    #[test]
    fn test_hidden_labels_are_excluded() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.labels.hidden.insert("A".to_string());
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);

        assert!(!predicate.matches(&message(session, "A", "x")));
        assert!(predicate.matches(&message(session, "B", "x")));
    }

    #[test]
    fn test_focused_label_overrides_hidden() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.labels.hidden.insert("A".to_string());
        criteria.labels.focused = Some("A".to_string());
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);

        assert!(predicate.matches(&message(session, "A", "x")));
        assert!(!predicate.matches(&message(session, "B", "x")));
    }

    #[test]
    fn test_disabled_labels_have_no_effect() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.labels.hidden.insert("A".to_string());
        criteria.labels.is_enabled = false;
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);
        assert!(predicate.matches(&message(session, "A", "x")));
    }

    #[test]
    fn test_log_levels_clause() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.log_levels.levels = [LogLevel::Error].into_iter().collect();
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);

        let error: Record = LogMessage::new(session, LogLevel::Error, "A", "x").into();
        let info: Record = LogMessage::new(session, LogLevel::Info, "A", "x").into();
        assert!(predicate.matches(&error));
        assert!(!predicate.matches(&info));

        criteria.log_levels.levels.clear();
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);
        assert!(!predicate.matches(&error));
    }

    #[test]
    fn test_network_clauses_ignored_in_logs_mode() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.host.values.insert("x.com".to_string());
        criteria.networking.is_redirect = Some(true);

        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);
        assert_eq!(predicate.filter_count(), 0);
        assert!(predicate.matches(&message(SessionId::new(), "A", "x")));
    }

    #[test]
    fn test_log_clauses_ignored_in_network_mode() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.labels.focused = Some("A".to_string());
        criteria.log_levels.levels.clear();

        let predicate = compiler.compile(&criteria, ConsoleMode::Network);
        assert_eq!(predicate.filter_count(), 0);
        assert!(predicate.matches(&task(SessionId::new(), "https://x.com")));
    }

    #[test]
    fn test_all_mode_applies_clauses_per_record_kind() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.labels.hidden.insert("A".to_string());
        criteria.host.values.insert("x.com".to_string());
        let predicate = compiler.compile(&criteria, ConsoleMode::All);

        assert!(!predicate.matches(&message(session, "A", "x")));
        assert!(predicate.matches(&message(session, "B", "x")));
        assert!(predicate.matches(&task(session, "https://x.com/a")));
        assert!(!predicate.matches(&task(session, "https://y.com/a")));
    }

    #[test]
    fn test_host_filter_empty_values_matches_all_hosts() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.host.is_enabled = true;
        criteria.host.values.clear();
        let predicate = compiler.compile(&criteria, ConsoleMode::Network);
        assert!(predicate.matches(&task(SessionId::new(), "https://anything.io")));
    }

    #[test]
    fn test_host_filter_disabled_ignores_values() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.host.values.insert("x.com".to_string());
        criteria.host.is_enabled = false;
        let predicate = compiler.compile(&criteria, ConsoleMode::Network);
        assert!(predicate.matches(&task(SessionId::new(), "https://y.com")));
    }

    #[test]
    fn test_networking_and_response_clauses() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.networking.is_redirect = Some(true);
        criteria.networking.source = Some(ResponseSource::Cache);
        criteria.response.status_code = ValueRange::new(Some(300), Some(399));
        let predicate = compiler.compile(&criteria, ConsoleMode::Network);

        let hit: Record = NetworkTask::new(session, "https://x.com")
            .with_redirect(true)
            .with_response_source(ResponseSource::Cache)
            .with_status_code(302)
            .into();
        let not_redirect: Record = NetworkTask::new(session, "https://x.com")
            .with_response_source(ResponseSource::Cache)
            .with_status_code(302)
            .into();
        let no_status: Record = NetworkTask::new(session, "https://x.com")
            .with_redirect(true)
            .with_response_source(ResponseSource::Cache)
            .into();

        assert!(predicate.matches(&hit));
        assert!(!predicate.matches(&not_redirect));
        assert!(!predicate.matches(&no_status));
    }

    #[test]
    fn test_empty_text_pattern_is_noop() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.text = TextSearch::new(
            "",
            TextSearchOptions {
                kind: SearchKind::Text,
                case_sensitivity: CaseSensitivity::Sensitive,
                rule: MatchingRule::Equals,
            },
        );
        let predicate = compiler.compile(&criteria, ConsoleMode::All);
        assert_eq!(predicate.filter_count(), 0);
        assert!(predicate.matches(&message(SessionId::new(), "A", "non-empty")));
    }

    #[test]
    fn test_text_search_targets() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.text = TextSearch::new("timeout", TextSearchOptions::default());
        let predicate = compiler.compile(&criteria, ConsoleMode::All);

        assert!(predicate.matches(&message(session, "A", "Request TIMEOUT")));
        assert!(!predicate.matches(&message(session, "A", "ok")));
        assert!(predicate.matches(&task(session, "https://x.com/timeout")));
        assert!(!predicate.matches(&task(session, "https://x.com/ok")));
    }

    #[test]
    fn test_invalid_regex_matches_nothing() {
        let compiler = compiler_at(Utc::now());
        let mut criteria = Criteria::default();
        criteria.text = TextSearch::new(
            "([",
            TextSearchOptions {
                kind: SearchKind::Regex,
                ..TextSearchOptions::default()
            },
        );
        let predicate = compiler.compile(&criteria, ConsoleMode::All);
        assert!(predicate.has_invalid_pattern());
        assert!(!predicate.matches(&message(SessionId::new(), "A", "([")));
    }

    #[test]
    fn test_today_preset() {
        let now = noon_today();
        let compiler = compiler_at(now);
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.dates = Dates::today();
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);

        let yesterday: Record = LogMessage::new(session, LogLevel::Info, "A", "x")
            .with_created_at(now - Duration::days(1))
            .into();
        let minute_ago: Record = LogMessage::new(session, LogLevel::Info, "A", "x")
            .with_created_at(now - Duration::minutes(1))
            .into();

        assert!(!predicate.matches(&yesterday));
        assert!(predicate.matches(&minute_ago));
    }

    #[test]
    fn test_recent_preset_slides_with_clock() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let compiler = PredicateCompiler::new(
            Arc::new(TextMatcher::default()),
            clock.clone(),
            std::time::Duration::from_secs(600),
        );
        let mut criteria = Criteria::default();
        criteria.dates = Dates::recent();
        let predicate = compiler.compile(&criteria, ConsoleMode::Logs);

        let record: Record = LogMessage::new(SessionId::new(), LogLevel::Info, "A", "x")
            .with_created_at(now - Duration::minutes(5))
            .into();
        assert!(predicate.matches(&record));

        // 同一个谓词实例，时钟前进后窗口随之滑动
        clock.advance(Duration::minutes(6));
        assert!(!predicate.matches(&record));
    }

    #[test]
    fn test_only_pinned_clause_applies_to_both_kinds() {
        let compiler = compiler_at(Utc::now());
        let session = SessionId::new();
        let mut criteria = Criteria::default();
        criteria.pins.only_pinned = true;
        let predicate = compiler.compile(&criteria, ConsoleMode::All);
        assert_eq!(predicate.filter_count(), 1);

        let mut pinned_log = message(session, "A", "x");
        pinned_log.set_pinned(true);
        let mut pinned_task = task(session, "https://x.com");
        pinned_task.set_pinned(true);
        assert!(predicate.matches(&pinned_log));
        assert!(predicate.matches(&pinned_task));
        assert!(!predicate.matches(&message(session, "A", "x")));
        assert!(!predicate.matches(&task(session, "https://x.com")));
    }

    #[test]
    fn test_time_relative_presets() {
        let now = Utc::now();
        let compiler = compiler_at(now);
        let mut criteria = Criteria::default();
        assert!(!compiler.compile(&criteria, ConsoleMode::All).is_time_relative());

        criteria.dates = Dates::recent();
        assert!(compiler.compile(&criteria, ConsoleMode::All).is_time_relative());
        criteria.dates = Dates::today();
        assert!(compiler.compile(&criteria, ConsoleMode::Network).is_time_relative());

        criteria.dates = Dates::between(Some(now - Duration::hours(1)), None);
        assert!(!compiler.compile(&criteria, ConsoleMode::All).is_time_relative());

        criteria.dates = Dates::recent();
        criteria.dates.is_enabled = false;
        assert!(!compiler.compile(&criteria, ConsoleMode::All).is_time_relative());
    }

    #[test]
    fn test_fixed_date_range() {
        let now = Utc::now();
        let compiler = compiler_at(now);
        let mut criteria = Criteria::default();
        criteria.dates = Dates::between(Some(now - Duration::hours(2)), Some(now - Duration::hours(1)));
        let predicate = compiler.compile(&criteria, ConsoleMode::All);

        let inside: Record = LogMessage::new(SessionId::new(), LogLevel::Info, "A", "x")
            .with_created_at(now - Duration::minutes(90))
            .into();
        let after: Record = LogMessage::new(SessionId::new(), LogLevel::Info, "A", "x")
            .with_created_at(now - Duration::minutes(30))
            .into();
        assert!(predicate.matches(&inside));
        assert!(!predicate.matches(&after));
    }

    #[test]
    fn test_local_midnight_is_start_of_local_day() {
        let now = noon_today();
        let midnight = local_midnight(now);
        let local = midnight.with_timezone(&Local);
        assert_eq!(local.date_naive(), now.with_timezone(&Local).date_naive());
        assert_eq!(local.hour(), 0);
        assert!(midnight <= now);
    }
}
