//! 谓词编译器与文本匹配器的属性测试

use chrono::{Duration, TimeZone, Utc};
use log_console::models::{
    CaseSensitivity, ConsoleMode, Criteria, DatePreset, LogLevel, LogMessage, MatchingRule,
    NetworkTask, Record, ResponseSource, SearchKind, SessionId, TaskType, TextSearchOptions,
    ValueRange,
};
use log_console::services::{ManualClock, PredicateCompiler, TextMatcher};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

const LABELS: [&str; 4] = ["auth", "network", "db", "ui"];
const HOSTS: [&str; 3] = ["x.com", "y.com", "api.z.io"];

fn sessions() -> [SessionId; 2] {
    [
        SessionId(Uuid::from_u128(1)),
        SessionId(Uuid::from_u128(2)),
    ]
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn compiler() -> PredicateCompiler {
    PredicateCompiler::new(
        Arc::new(TextMatcher::default()),
        Arc::new(ManualClock::new(now())),
        std::time::Duration::from_secs(600),
    )
}

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

fn mode_strategy() -> impl Strategy<Value = ConsoleMode> {
    prop_oneof![
        Just(ConsoleMode::All),
        Just(ConsoleMode::Logs),
        Just(ConsoleMode::Network),
    ]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    let message = (
        0..2usize,
        level_strategy(),
        prop::sample::select(LABELS.to_vec()),
        "[a-zA-Z ]{0,16}",
        0..7200i64,
    )
        .prop_map(|(session, level, label, text, age)| {
            LogMessage::new(sessions()[session], level, label, text)
                .with_created_at(now() - Duration::seconds(age))
                .into()
        });

    let task = (
        0..2usize,
        prop::sample::select(HOSTS.to_vec()),
        "[a-z]{0,8}",
        prop::option::of(100u16..600),
        any::<bool>(),
        0..7200i64,
    )
        .prop_map(|(session, host, path, status, redirect, age)| {
            let mut task = NetworkTask::new(sessions()[session], format!("https://{host}/{path}"))
                .with_redirect(redirect)
                .with_created_at(now() - Duration::seconds(age));
            task.status_code = status;
            task.into()
        });

    prop_oneof![message, task]
}

fn text_options_strategy() -> impl Strategy<Value = TextSearchOptions> {
    (
        prop_oneof![Just(SearchKind::Text), Just(SearchKind::Regex)],
        prop_oneof![
            Just(CaseSensitivity::Sensitive),
            Just(CaseSensitivity::Insensitive)
        ],
        prop_oneof![
            Just(MatchingRule::Contains),
            Just(MatchingRule::BeginsWith),
            Just(MatchingRule::EndsWith),
            Just(MatchingRule::Equals),
        ],
    )
        .prop_map(|(kind, case_sensitivity, rule)| TextSearchOptions {
            kind,
            case_sensitivity,
            rule,
        })
}

fn criteria_strategy() -> impl Strategy<Value = Criteria> {
    (
        prop::sample::subsequence(vec![0usize, 1], 0..=2),
        prop::option::of(prop_oneof![Just(DatePreset::Recent), Just(DatePreset::Today)]),
        prop::sample::subsequence(LogLevel::ALL.to_vec(), 0..=7),
        prop::option::of(prop::sample::select(LABELS.to_vec())),
        prop::sample::subsequence(LABELS.to_vec(), 0..=2),
        prop::sample::subsequence(HOSTS.to_vec(), 0..=2),
        prop::option::of(any::<bool>()),
        ("[a-z(\\[]{0,3}", text_options_strategy()),
        prop::option::of((100u16..400, 300u16..600)),
    )
        .prop_map(
            |(session_ids, preset, levels, focused, hidden, hosts, redirect, text, status)| {
                let mut criteria = Criteria::default();
                criteria.sessions.selection =
                    session_ids.into_iter().map(|i| sessions()[i]).collect();
                criteria.dates.preset = preset;
                criteria.log_levels.levels = levels.into_iter().collect();
                criteria.labels.focused = focused.map(str::to_string);
                criteria.labels.hidden = hidden.into_iter().map(str::to_string).collect();
                criteria.host.values = hosts.into_iter().map(str::to_string).collect();
                criteria.networking.is_redirect = redirect;
                criteria.text.pattern = text.0;
                criteria.text.options = text.1;
                if let Some((min, max)) = status {
                    criteria.response.status_code = ValueRange::new(Some(min), Some(max));
                }
                criteria
            },
        )
}

fn disable_all(criteria: &mut Criteria) {
    criteria.sessions.is_enabled = false;
    criteria.dates.is_enabled = false;
    criteria.text.is_enabled = false;
    criteria.log_levels.is_enabled = false;
    criteria.labels.is_enabled = false;
    criteria.host.is_enabled = false;
    criteria.networking.is_enabled = false;
    criteria.response.is_enabled = false;
    criteria.pins.is_enabled = false;
}

proptest! {
    #[test]
    fn prop_disabled_criteria_match_everything_in_mode(
        mut criteria in criteria_strategy(),
        mode in mode_strategy(),
        record in record_strategy(),
    ) {
        disable_all(&mut criteria);
        let predicate = compiler().compile(&criteria, mode);
        prop_assert_eq!(predicate.matches(&record), mode.includes(record.kind()));
    }

    #[test]
    fn prop_default_criteria_match_everything_in_mode(
        mode in mode_strategy(),
        record in record_strategy(),
    ) {
        let predicate = compiler().compile(&Criteria::default(), mode);
        prop_assert_eq!(predicate.matches(&record), mode.includes(record.kind()));
    }

    #[test]
    fn prop_wrong_kind_never_matches(
        criteria in criteria_strategy(),
        mode in prop_oneof![Just(ConsoleMode::Logs), Just(ConsoleMode::Network)],
        record in record_strategy(),
    ) {
        prop_assume!(!mode.includes(record.kind()));
        let predicate = compiler().compile(&criteria, mode);
        prop_assert!(!predicate.matches(&record));
    }

    #[test]
    fn prop_compilation_is_idempotent(
        criteria in criteria_strategy(),
        mode in mode_strategy(),
        records in prop::collection::vec(record_strategy(), 1..20),
    ) {
        let compiler = compiler();
        let first = compiler.compile(&criteria, mode);
        let second = compiler.compile(&criteria, mode);
        for record in &records {
            prop_assert_eq!(first.matches(record), second.matches(record));
        }
    }

    #[test]
    fn prop_all_mode_is_union_of_logs_and_network(
        criteria in criteria_strategy(),
        record in record_strategy(),
    ) {
        let compiler = compiler();
        let all = compiler.compile(&criteria, ConsoleMode::All).matches(&record);
        let logs = compiler.compile(&criteria, ConsoleMode::Logs).matches(&record);
        let network = compiler.compile(&criteria, ConsoleMode::Network).matches(&record);
        prop_assert!(!(logs && network));
        prop_assert_eq!(all, logs || network);
    }

    #[test]
    fn prop_focused_label_overrides_hidden(
        label in prop::sample::select(LABELS.to_vec()),
        level in level_strategy(),
    ) {
        let mut criteria = Criteria::default();
        criteria.labels.hidden.insert(label.to_string());
        criteria.labels.focused = Some(label.to_string());
        let record: Record = LogMessage::new(sessions()[0], level, label, "x")
            .with_created_at(now())
            .into();
        prop_assert!(compiler().compile(&criteria, ConsoleMode::Logs).matches(&record));
    }

    #[test]
    fn prop_enabled_empty_host_filter_matches_every_host(
        record in record_strategy(),
    ) {
        let mut criteria = Criteria::default();
        criteria.host.is_enabled = true;
        criteria.host.values.clear();
        let predicate = compiler().compile(&criteria, ConsoleMode::Network);
        prop_assert_eq!(predicate.matches(&record), matches!(record, Record::Task(_)));
    }

    #[test]
    fn prop_insensitive_contains_is_lowercase_substring(
        pattern in "\\PC{0,6}",
        candidate in "\\PC{0,24}",
    ) {
        let matcher = TextMatcher::default();
        let options = TextSearchOptions {
            kind: SearchKind::Text,
            case_sensitivity: CaseSensitivity::Insensitive,
            rule: MatchingRule::Contains,
        };
        let expected = candidate.to_lowercase().contains(&pattern.to_lowercase());
        prop_assert_eq!(matcher.is_match(&pattern, &candidate, options), expected);
    }

    #[test]
    fn prop_ascii_insensitive_contains_is_lowercase_substring(
        pattern in "[a-zA-Z]{0,3}",
        candidate in "[a-zA-Z ]{0,24}",
    ) {
        let matcher = TextMatcher::default();
        let options = TextSearchOptions {
            kind: SearchKind::Text,
            case_sensitivity: CaseSensitivity::Insensitive,
            rule: MatchingRule::Contains,
        };
        let expected = candidate.to_lowercase().contains(&pattern.to_lowercase());
        prop_assert_eq!(matcher.is_match(&pattern, &candidate, options), expected);
    }

    #[test]
    fn prop_matcher_never_panics_on_arbitrary_regex(
        pattern in "\\PC{0,12}",
        candidate in "\\PC{0,24}",
        options in text_options_strategy(),
    ) {
        let matcher = TextMatcher::default();
        let _ = matcher.is_match(&pattern, &candidate, options);
    }
}

#[test]
fn test_task_type_clause_uses_record_task_type() {
    let mut criteria = Criteria::default();
    criteria.networking.task_type = Some(TaskType::DownloadTask);
    criteria.networking.source = Some(ResponseSource::Network);
    let predicate = compiler().compile(&criteria, ConsoleMode::Network);

    let download: Record = NetworkTask::new(sessions()[0], "https://x.com/file")
        .with_task_type(TaskType::DownloadTask)
        .with_created_at(now())
        .into();
    let data: Record = NetworkTask::new(sessions()[0], "https://x.com/api")
        .with_created_at(now())
        .into();
    assert!(predicate.matches(&download));
    assert!(!predicate.matches(&data));
}
