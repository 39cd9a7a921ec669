//! MailTransport port - 完了通知メールの送信

use async_trait::async_trait;

use crate::error::NotificationError;

/// 送信するメール 1 通
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    body: String,
}

impl EmailMessage {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>, subject: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            subject: subject.into(),
            body: String::new(),
        }
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn append_to_body(&mut self, text: &str) {
        self.body.push_str(text);
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// MailTransport はメールサーバーへの送信を抽象化
///
/// # 設計原則
/// - `is_configured()` が false なら通知処理そのものを行わない
/// - 送信エラーは握りつぶさずに返す
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}
