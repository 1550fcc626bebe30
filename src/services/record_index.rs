//! 记录二级索引
//!
//! 维护存储中出现过的主机名和日志标签，按首次发现的顺序保存，
//! 供选择器使用而无需全量扫描存储。
//!
//! 通知可以重复或乱序到达：每个值记住最近一次被观察到的存储修订号，
//! 清空只移除修订号不大于清空修订号的值，迟到的清空通知不会抹掉之后插入的数据。

use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::record::Record;
use crate::services::record_store::{Revision, StoreEvent};

/// 保持发现顺序的去重集合
#[derive(Debug, Default, Clone)]
struct OrderedSet {
    order: Vec<String>,
    revisions: HashMap<String, Revision>,
}

impl OrderedSet {
    fn insert(&mut self, value: &str, revision: Revision) -> bool {
        match self.revisions.get_mut(value) {
            Some(seen) => {
                *seen = (*seen).max(revision);
                false
            }
            None => {
                self.revisions.insert(value.to_string(), revision);
                self.order.push(value.to_string());
                true
            }
        }
    }

    fn clear_through(&mut self, revision: Revision) {
        let revisions = &mut self.revisions;
        revisions.retain(|_, seen| *seen > revision);
        self.order.retain(|value| revisions.contains_key(value));
    }

    fn clear(&mut self) {
        self.order.clear();
        self.revisions.clear();
    }
}

/// 主机名 / 标签索引
#[derive(Debug, Default, Clone)]
pub struct RecordIndex {
    hosts: OrderedSet,
    labels: OrderedSet,
    cleared_at: Revision,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条新插入的记录，返回索引是否发生变化
    ///
    /// 修订号不大于最近一次清空（或重建）的插入通知被忽略。
    pub fn observe_insert(&mut self, record: &Record, revision: Revision) -> bool {
        if self.cleared_at > 0 && revision <= self.cleared_at {
            return false;
        }
        match record {
            Record::Message(message) => {
                let added = self.labels.insert(&message.label, revision);
                if added {
                    debug!(label = %message.label, "New label indexed");
                }
                added
            }
            Record::Task(task) => match &task.host {
                Some(host) => {
                    let added = self.hosts.insert(host, revision);
                    if added {
                        debug!(host = %host, "New host indexed");
                    }
                    added
                }
                None => false,
            },
        }
    }

    /// 处理存储变化通知，返回索引是否发生变化
    pub fn observe(&mut self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::Inserted { record, revision } => self.observe_insert(record, *revision),
            // 主机和标签在插入时已经登记
            StoreEvent::Updated { .. } => false,
            StoreEvent::Cleared { revision } => self.clear_at(*revision),
        }
    }

    /**
     * 清空主机和标签
     *
     * 两个集合一起清空；只移除在 `revision` 及之前观察到的值。
     * 重复的清空通知返回 false。
     */
    pub fn clear_at(&mut self, revision: Revision) -> bool {
        if revision <= self.cleared_at {
            return false;
        }
        self.hosts.clear_through(revision);
        self.labels.clear_through(revision);
        self.cleared_at = revision;
        info!(revision, "Record index cleared");
        true
    }

    /**
     * 从存储的当前内容重建索引
     *
     * `records` 应按插入顺序（最旧在前）提供，以保持发现顺序；
     * `revision` 为这批记录对应的存储修订号。
     */
    pub fn rebuild<'a, I>(&mut self, records: I, revision: Revision)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.hosts.clear();
        self.labels.clear();
        self.cleared_at = 0;
        for record in records {
            self.observe_insert(record, revision);
        }
        // 快照已包含 `revision` 及之前的全部变化
        self.cleared_at = revision;
        debug!(
            revision,
            hosts = self.hosts.order.len(),
            labels = self.labels.order.len(),
            "Record index rebuilt"
        );
    }

    /// 按发现顺序返回所有主机名
    pub fn all_hosts(&self) -> &[String] {
        &self.hosts.order
    }

    /// 按发现顺序返回所有标签
    pub fn all_labels(&self) -> &[String] {
        &self.labels.order
    }
}
