//! MailTransport implementations that never talk to a real SMTP server.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::NotificationError;
use crate::ports::{EmailMessage, MailTransport};

/// メールサーバーが設定されていない状態
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailTransport;

#[async_trait]
impl MailTransport for DisabledMailTransport {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Send {
            recipients: message.recipients.clone(),
            reason: "no mail server is configured".to_string(),
        })
    }
}

/// 送信内容を tracing に出力するだけの transport
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailTransport;

#[async_trait]
impl MailTransport for LoggingMailTransport {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            sender = %message.sender,
            recipients = ?message.recipients,
            subject = %message.subject,
            body_len = message.body().len(),
            "completion notification"
        );
        Ok(())
    }
}

/// 送信したメールを保持する transport。`fail_with` を設定すると送信エラーを返す
#[derive(Debug, Default)]
pub struct MemoryMailTransport {
    sent: Mutex<Vec<EmailMessage>>,
    failure: Mutex<Option<String>>,
}

impl MemoryMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MailTransport for MemoryMailTransport {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(NotificationError::Send {
                recipients: message.recipients.clone(),
                reason,
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
