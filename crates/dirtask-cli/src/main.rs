//! dirtask デモ: いくつかの管理タスクを登録し、ワーカーで実行して結果を表示する
//!
//! 使い方: `dirtask-cli [config.toml]`
//! ログの詳細度は `RUST_LOG`（例: `RUST_LOG=dirtask_core=debug`）で変えられます。

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dirtask_core::domain::{Dn, LogMessage, Severity, TaskId, TaskState};
use dirtask_core::entry::{self, Entry, time::format_utc};
use dirtask_core::error::TaskError;
use dirtask_core::impls::{DisabledMailTransport, LoggingMailTransport};
use dirtask_core::ports::MailTransport;
use dirtask_core::{
    InMemoryScheduler, SchedulerConfig, ServerContext, TaskBody, TaskClassRegistry, TaskRecord,
    WorkerGroup,
};

const BACKUP_CLASS: &str = "org.example.tasks.BackupTask";
const EXPORT_CLASS: &str = "org.example.tasks.ExportTask";
const IMPORT_CLASS: &str = "org.example.tasks.ImportTask";
const REINDEX_CLASS: &str = "org.example.tasks.RebuildIndexTask";

const ATTR_BACKUP_PROGRESS: &str = "ds-task-backup-progress";

/// 数ステップに分けて進捗を記録するバックアップ
struct BackupBody;

impl TaskBody for BackupBody {
    fn display_name(&self) -> Option<String> {
        Some("Backup".to_string())
    }

    fn attribute_display_name(&self, name: &str) -> Option<String> {
        (name == ATTR_BACKUP_PROGRESS).then(|| "Backup progress".to_string())
    }

    fn run(&self, task: &TaskRecord) -> Result<TaskState, TaskError> {
        for step in 1..=4 {
            if task.interrupt_state().is_some() {
                return Ok(task.final_task_state());
            }
            thread::sleep(Duration::from_millis(50));
            task.replace_attribute_value(ATTR_BACKUP_PROGRESS, &format!("{}%", step * 25));
            task.add_log_message(
                Severity::Notice,
                &LogMessage::new("backup", 100 + step, format!("Backed up part {step} of 4")),
                None,
            );
        }
        Ok(task.final_task_state())
    }

    fn interrupt(&self, task: &TaskRecord, state: TaskState, reason: &LogMessage) {
        task.add_log_message(Severity::Warning, reason, None);
        task.set_interrupt_state(state);
    }

    fn is_interruptable(&self) -> bool {
        true
    }
}

/// バックアップが済んだ後に走る export
struct ExportBody;

impl TaskBody for ExportBody {
    fn display_name(&self) -> Option<String> {
        Some("Export LDIF".to_string())
    }

    fn run(&self, task: &TaskRecord) -> Result<TaskState, TaskError> {
        task.add_log_message(
            Severity::Notice,
            &LogMessage::raw("Exported 1204 entries"),
            None,
        );
        Ok(TaskState::CompletedSuccessfully)
    }
}

/// 入力ファイルが見つからずに失敗する import
struct ImportBody;

impl TaskBody for ImportBody {
    fn display_name(&self) -> Option<String> {
        Some("Import LDIF".to_string())
    }

    fn run(&self, task: &TaskRecord) -> Result<TaskState, TaskError> {
        let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "/var/import/users.ldif");
        task.add_log_message(
            Severity::Error,
            &LogMessage::new("import", 7, "Cannot open the LDIF file"),
            Some(&cause),
        );
        Err(TaskError::Other(Box::new(cause)))
    }
}

/// 止められるまで動き続けるインデックス再構築
struct RebuildIndexBody;

impl TaskBody for RebuildIndexBody {
    fn display_name(&self) -> Option<String> {
        Some("Rebuild Index".to_string())
    }

    fn run(&self, task: &TaskRecord) -> Result<TaskState, TaskError> {
        let mut processed = 0_u64;
        while task.interrupt_state().is_none() {
            thread::sleep(Duration::from_millis(20));
            processed += 500;
        }
        task.add_log_message(
            Severity::Notice,
            &LogMessage::raw(format!("Stopped after processing {processed} records")),
            None,
        );
        Ok(task.final_task_state())
    }

    fn interrupt(&self, task: &TaskRecord, state: TaskState, _reason: &LogMessage) {
        task.set_interrupt_state(state);
    }

    fn is_interruptable(&self) -> bool {
        true
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true));
    if subscriber.try_init().is_err() {
        tracing::debug!("global tracing subscriber already initialized");
    }
}

fn registry() -> anyhow::Result<TaskClassRegistry> {
    let mut registry = TaskClassRegistry::new();
    registry.register(BACKUP_CLASS, || Box::new(BackupBody))?;
    registry.register(EXPORT_CLASS, || Box::new(ExportBody))?;
    registry.register(IMPORT_CLASS, || Box::new(ImportBody))?;
    registry.register(REINDEX_CLASS, || Box::new(RebuildIndexBody))?;
    Ok(registry)
}

fn task_entry(id: &str, class: &str) -> Entry {
    Entry::new(Dn::new(format!("ds-task-id={id},cn=Scheduled Tasks,cn=tasks")))
        .with(entry::ATTR_TASK_ID, &[id])
        .with(entry::ATTR_TASK_CLASS, &[class])
}

fn demo_entries(now_millis: i64) -> Vec<Entry> {
    let start_later = format_utc(now_millis + 300);
    vec![
        task_entry("backup-1", BACKUP_CLASS)
            .with(entry::ATTR_TASK_NOTIFY_ON_COMPLETION, &["admin@example.com"]),
        task_entry("export-1", EXPORT_CLASS)
            .with(entry::ATTR_TASK_DEPENDENCY_IDS, &["backup-1"])
            .with(entry::ATTR_TASK_SCHEDULED_START_TIME, &[start_later.as_str()]),
        task_entry("import-1", IMPORT_CLASS)
            .with(entry::ATTR_TASK_NOTIFY_ON_ERROR, &["oncall@example.com"]),
        task_entry("export-2", EXPORT_CLASS)
            .with(entry::ATTR_TASK_DEPENDENCY_IDS, &["import-1"])
            .with(entry::ATTR_TASK_FAILED_DEPENDENCY_ACTION, &["disable"]),
        task_entry("reindex-1", REINDEX_CLASS)
            .with(entry::ATTR_TASK_NOTIFY_ON_COMPLETION, &["admin@example.com"]),
    ]
}

fn print_tasks(scheduler: &InMemoryScheduler) {
    for task in scheduler.list() {
        println!(
            "{:<10} {:<26} {}",
            task.task_id().as_str(),
            task.state().as_str(),
            task.display_name().unwrap_or_default()
        );
        for line in task.log_messages() {
            println!("    {line}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SchedulerConfig::load(config_path.as_deref())
        .context("failed to load scheduler configuration")?;
    info!(?config, "configuration loaded");

    let mail: Arc<dyn MailTransport> = if config.mail_enabled {
        Arc::new(LoggingMailTransport)
    } else {
        Arc::new(DisabledMailTransport)
    };
    let context = ServerContext::with_defaults().with_mail(mail);
    let now = context.clock().now_millis();
    let registry = registry()?;
    info!(classes = ?registry.class_names(), "task classes registered");
    let scheduler = Arc::new(InMemoryScheduler::new(
        &config,
        context,
        Arc::new(registry),
    ));

    for entry in demo_entries(now) {
        let dn = entry.dn().clone();
        scheduler
            .schedule_entry(entry)
            .with_context(|| format!("failed to schedule {dn}"))?;
    }

    let workers = WorkerGroup::spawn(config.worker_count, Arc::clone(&scheduler));

    // インデックス再構築は管理者が途中で止める
    tokio::time::sleep(Duration::from_millis(400)).await;
    let reindex = TaskId::new("reindex-1");
    match scheduler.cancel(&reindex, &LogMessage::raw("Stopped by the administrator")) {
        Ok(outcome) => info!(task_id = %reindex, ?outcome, "cancel requested"),
        Err(err) => warn!(task_id = %reindex, error = %err, "cancel failed"),
    }

    tokio::select! {
        _ = async {
            while scheduler.has_unfinished() {
                tokio::time::sleep(scheduler.poll_interval()).await;
            }
        } => info!("all tasks finished"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            warn!("interrupted, shutting down");
        }
    }
    workers.shutdown_and_join().await;

    print_tasks(&scheduler);
    println!(
        "{}",
        serde_json::to_string_pretty(&scheduler.counts_by_state())?
    );
    Ok(())
}
