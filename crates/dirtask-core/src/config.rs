//! SchedulerConfig - スケジューラとワーカーの設定
//!
//! 読み込み順（後のものが優先）:
//! 1. 組み込みのデフォルト
//! 2. 設定ファイル（指定された場合のみ、TOML など `config` が扱える形式）
//! 3. 環境変数 `DIRTASK__*`（例: `DIRTASK__WORKER_COUNT=4`）

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

pub const ENV_PREFIX: &str = "DIRTASK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 同時に実行するタスクの数
    pub worker_count: usize,
    /// 実行可能なタスクが無いときに再確認するまでの間隔
    pub poll_interval_ms: u64,
    /// 完了通知メールの送信元
    pub notification_sender: String,
    /// false ならメールサーバー未設定として扱う
    pub mail_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            poll_interval_ms: 250,
            notification_sender: "directory-tasks@localhost".to_string(),
            mail_enabled: false,
        }
    }
}

impl SchedulerConfig {
    /// デフォルト、任意の設定ファイル、環境変数の順に重ねて読み込む
    pub fn load(path: Option<&Path>) -> Result<Self, SchedulerError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SchedulerError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if self.worker_count == 0 {
            return Err(config::ConfigError::Message("worker_count must be at least 1".into()).into());
        }
        if self.poll_interval_ms == 0 {
            return Err(config::ConfigError::Message("poll_interval_ms must be positive".into()).into());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<SchedulerConfig, SchedulerError> {
        SchedulerConfig::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn empty_source_gives_defaults() {
        assert_eq!(from_toml("").unwrap(), SchedulerConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_toml(
            r#"
            worker_count = 8
            notification_sender = "ops@example.com"
            mail_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.notification_sender, "ops@example.com");
        assert!(config.mail_enabled);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = from_toml("worker_count = 0").unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = SchedulerConfig::load(Some(Path::new("/nonexistent/dirtask.toml"))).unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }
}
