//! Task log - entry に追記される 1 行ずつの進捗ログ
//!
//! 形式:
//! `[18/Oct/2026:09:15:02 +0900] severity="NOTICE" msgCount=0 msgID=backend-413 message="..."`
//! 原因エラーがあれば末尾に ` exception="..."` が付く。

use std::error::Error;

use tracing::debug;

use super::TaskRecord;
use crate::domain::{LogMessage, Severity};
use crate::entry::{self, time::format_log_time};

/// ログ行と次の連番
///
/// 連番は entry に既にあるログ行の数から再開し、再利用しない。
#[derive(Debug, Default)]
pub struct TaskLog {
    messages: Vec<String>,
    next_count: u64,
}

impl TaskLog {
    pub fn resume(messages: Vec<String>) -> Self {
        let next_count = messages.len() as u64;
        Self {
            messages,
            next_count,
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn next_count(&mut self) -> u64 {
        let count = self.next_count;
        self.next_count += 1;
        count
    }
}

/// 1 行のログを組み立てる
pub fn build_log_line(
    local_time: &str,
    severity: Severity,
    count: u64,
    message: &LogMessage,
    cause: Option<&(dyn Error + 'static)>,
) -> String {
    let mut line = format!(
        "[{local_time}] severity=\"{}\" msgCount={count} msgID={} message=\"{}\"",
        severity.name(),
        message.id(),
        message.text,
    );
    if let Some(cause) = cause {
        line.push_str(" exception=\"");
        line.push_str(&single_line_cause(cause));
        line.push('"');
    }
    line
}

/// エラーとその source チェーンを 1 行にまとめる
pub fn single_line_cause(err: &(dyn Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(" / caused by: ").replace(['\r', '\n'], " ")
}

impl TaskRecord {
    /// ログを 1 行追加し、entry の `ds-task-log-message` にも追記する
    ///
    /// schema が無い、またはログ attribute を解決できないときは何もしない。
    pub fn add_log_message(
        &self,
        severity: Severity,
        message: &LogMessage,
        cause: Option<&(dyn Error + 'static)>,
    ) {
        let Some(log_type) = self.context.resolve_attribute_type(entry::ATTR_TASK_LOG_MESSAGES)
        else {
            debug!(task_id = %self.task_id, "schema unavailable, dropping task log message");
            return;
        };

        self.mutate(|stored| {
            let now = self.context.clock().now_millis();
            let mut log = self.log.lock();
            let line = build_log_line(&format_log_time(now), severity, log.next_count(), message, cause);
            stored.add_value(log_type.name(), line.clone());
            log.messages.push(line);
        });
    }
}
